//! Remote API errors

use thiserror::Error;

/// Errors returned by remote procedure calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// A failure that belongs to a specific form field
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    /// The server answered with a procedure error
    #[error("Remote call '{path}' failed: {message}")]
    Remote { path: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl ApiError {
    /// Map an auth procedure error onto the form field it concerns
    pub fn from_auth_failure(path: &str, message: String) -> Self {
        match message.as_str() {
            "auth/user-not-found" => ApiError::Validation {
                field: "email",
                message: "Email not found.",
            },
            "auth/wrong-password" => ApiError::Validation {
                field: "password",
                message: "Invalid password.",
            },
            "auth/email-already-in-use" => ApiError::Validation {
                field: "email",
                message: "Email already in use.",
            },
            _ => ApiError::Remote {
                path: path.to_string(),
                message,
            },
        }
    }

    /// Field name for form-level errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

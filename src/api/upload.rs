//! Profile picture upload

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::Path;

/// Uploads profile pictures to the express endpoint
#[derive(Debug, Clone)]
pub struct PictureUploader {
    http: reqwest::Client,
    endpoint: String,
}

impl PictureUploader {
    pub fn new(upload_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/profile/upload", upload_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload the picture at `path` for the user owning `jwt`.
    ///
    /// Returns whether the server stored the picture. Transport failures
    /// are logged and reported as `false`; only reading the file is an error.
    pub async fn upload(&self, jwt: &str, path: &Path) -> Result<bool> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read picture {:?}", path))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("pfp")
            .to_string();

        let form = Form::new().part("pfp", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(jwt)
            .header(reqwest::header::ACCEPT, "*/*")
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::CREATED {
                    tracing::warn!("Picture upload rejected with status {}", status);
                }
                Ok(status == StatusCode::CREATED)
            }
            Err(e) => {
                tracing::warn!("Picture upload failed: {}", e);
                Ok(false)
            }
        }
    }
}

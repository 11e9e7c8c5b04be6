//! Remote procedure API client
//!
//! Speaks the tRPC HTTP conventions: queries are `GET {base}/{path}?input=<json>`,
//! mutations are `POST {base}/{path}` with a JSON body, and every response is
//! wrapped in either `{"result": {"data": ...}}` or `{"error": {...}}`.

mod error;
mod upload;

pub use error::ApiError;
pub use upload::PictureUploader;

use crate::protocol::{ChatMessage, MessageOrigin, Profile, Room};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Calls the chat runtime depends on
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// List the public rooms
    async fn public_chats(&self) -> Result<Vec<Room>, ApiError>;

    /// Fetch the most recent `length` messages of a room, newest first
    async fn chat_history(&self, chat_id: &str, length: u32) -> Result<Vec<ChatMessage>, ApiError>;

    /// Fetch a user's public profile
    async fn profile_data(&self, uid: &str) -> Result<Profile, ApiError>;
}

/// Successful login or registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub jwt: String,
    pub refresh_token: String,
    pub uid: String,
    pub user: Profile,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Data { result: ResultBody<T> },
    Error { error: ErrorBody },
}

/// Procedures returning nothing omit `data`
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ResultBody<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Unwrap a response body, turning procedure errors into `ApiError::Remote`
fn parse_envelope<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    match serde_json::from_str::<Envelope<T>>(body)? {
        Envelope::Data { result } => match result.data {
            Some(data) => Ok(data),
            None => Ok(serde_json::from_value(serde_json::Value::Null)?),
        },
        Envelope::Error { error } => Err(ApiError::Remote {
            path: path.to_string(),
            message: error.message,
        }),
    }
}

/// Shared API client; construct once and pass by reference
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Authorize subsequent calls with a session token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, ApiError> {
        Ok(url::Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn query<I, O>(&self, path: &str, input: Option<&I>) -> Result<O, ApiError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let mut url = self.endpoint(path)?;
        if let Some(input) = input {
            url.query_pairs_mut()
                .append_pair("input", &serde_json::to_string(input)?);
        }
        tracing::debug!("Query {}", path);

        let body = self.authorize(self.http.get(url)).send().await?.text().await?;
        parse_envelope(path, &body)
    }

    async fn mutate<I, O>(&self, path: &str, input: &I) -> Result<O, ApiError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!("Mutation {}", path);

        let body = self
            .authorize(self.http.post(url))
            .json(input)
            .send()
            .await?
            .text()
            .await?;
        parse_envelope(path, &body)
    }

    /// `auth.login`
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let path = "auth.login";
        self.mutate(path, &json!({ "email": email, "password": password }))
            .await
            .map_err(|e| auth_failure(path, e))
    }

    /// `account.register`
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let path = "account.register";
        self.mutate(
            path,
            &json!({ "email": email, "username": username, "password": password }),
        )
        .await
        .map_err(|e| auth_failure(path, e))
    }

    /// `profile.about`; any successful result counts, with or without data
    pub async fn set_about(&self, about: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .mutate("profile.about", &json!({ "about": about }))
            .await?;
        Ok(())
    }
}

fn auth_failure(path: &str, err: ApiError) -> ApiError {
    match err {
        ApiError::Remote { message, .. } => ApiError::from_auth_failure(path, message),
        other => other,
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn public_chats(&self) -> Result<Vec<Room>, ApiError> {
        self.query::<(), _>("chat.publicChats", None).await
    }

    async fn chat_history(&self, chat_id: &str, length: u32) -> Result<Vec<ChatMessage>, ApiError> {
        let messages: Vec<ChatMessage> = self
            .query(
                "chat.chatHistory",
                Some(&json!({ "chatId": chat_id, "length": length })),
            )
            .await?;
        Ok(messages
            .into_iter()
            .map(|m| m.with_origin(MessageOrigin::History))
            .collect())
    }

    async fn profile_data(&self, uid: &str) -> Result<Profile, ApiError> {
        self.query("profile.profileData", Some(&json!({ "uid": uid })))
            .await
    }
}

use reqwest::StatusCode;
use shared_types::AppError;

use crate::fetch::ResponseBody;

/// A non-success response that was not turned into a login redirect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("HTTP {status} for {url}")]
pub struct HttpError {
    pub status: StatusCode,
    /// The URL as the caller passed it, before joining with the base URL.
    pub url: String,
    pub body: ResponseBody,
}

impl HttpError {
    /// The server's structured error, when the body is an `AppError`.
    pub fn app_error(&self) -> Option<AppError> {
        match &self.body {
            ResponseBody::Json(value) => AppError::from_json_body(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// A message fit for showing to a user.
    pub fn friendly_message(&self) -> String {
        match &self.body {
            ResponseBody::Json(value) => AppError::friendly_message(value),
            ResponseBody::Text(text) if !text.trim().is_empty() => text.clone(),
            ResponseBody::Text(_) => self.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{url} returned no content")]
    EmptyResponse { url: String },
}

impl ClientError {
    /// HTTP status for [`ClientError::Http`] failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http(e) => Some(e.status),
            _ => None,
        }
    }
}

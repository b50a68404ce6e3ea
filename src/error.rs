use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ClickError>;

#[derive(Debug, Error)]
pub enum ClickError {
    /// A store call failed on a request path. `message` is what the client sees.
    #[error("{message}: {source}")]
    Store {
        message: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClickError {
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| ClickError::Store { message, source }
    }
}

impl From<std::io::Error> for ClickError {
    fn from(err: std::io::Error) -> Self {
        ClickError::Internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl IntoResponse for ClickError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let body = match &self {
            ClickError::Store { message, .. } => ErrorResponse::new(*message),
            ClickError::Config(_) | ClickError::Internal(_) => {
                ErrorResponse::new("Internal Server Error")
            }
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

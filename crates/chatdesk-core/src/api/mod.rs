pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::ApiClient;
pub use types::{
    AiAnalysis, ChatReply, ChatRequest, FileInfo, HealthStatus, ModelCatalog, ModelInfo,
    UploadOptions, UploadReply, UploadRequest,
};

/// Outcome of one dispatch. Every cause of failure is folded into a single
/// user-facing message before it reaches the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResult<T> {
    Success(T),
    Failure(String),
}

impl<T> ApiResult<T> {
    /// Normalise a dispatch outcome. The specific cause is logged; only the
    /// server-supplied message (or `fallback`) is kept for display.
    pub fn from_dispatch(result: Result<T, DispatchError>, fallback: &str) -> Self {
        match result {
            Ok(value) => ApiResult::Success(value),
            Err(err) => {
                tracing::warn!(error = %err, "request failed");
                ApiResult::Failure(err.user_message(fallback))
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            ApiResult::Success(value) => Ok(value),
            ApiResult::Failure(message) => Err(message),
        }
    }
}

/// Why a dispatch failed. Never shown to the user directly.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status}")]
    Status {
        status: reqwest::StatusCode,
        message: Option<String>,
    },
    #[error("backend reported failure: {}", .0.as_deref().unwrap_or("<no message>"))]
    Application(Option<String>),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unexpected health status {0:?}")]
    Unhealthy(Option<String>),
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            DispatchError::Status { message: Some(m), .. } | DispatchError::Application(Some(m))
                if !m.trim().is_empty() =>
            {
                m.clone()
            }
            _ => fallback.to_string(),
        }
    }
}

/// The HTTP service the client talks to. `ApiClient` is the real one;
/// tests plug in fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn check_health(&self) -> ApiResult<HealthStatus>;
    async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatReply>;
    async fn send_upload(&self, request: UploadRequest) -> ApiResult<UploadReply>;
    async fn list_models(&self) -> ApiResult<ModelCatalog>;
}

//! Request lifecycle: validate, show a placeholder, dispatch, resolve.
//!
//! `begin_*` and `finish_*` are synchronous so a UI loop can own the state
//! and run the dispatch elsewhere; the token returned by `begin_*` is the
//! only link between the two halves.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::api::{
    ApiResult, Backend, ChatReply, ChatRequest, HealthStatus, UploadOptions, UploadReply,
    UploadRequest,
};
use crate::render::{self, PROCESSING_FILE, THINKING};
use crate::state::{Action, HealthIndicator, RequestToken, Severity, UiState};
use crate::validate::{self, FileDescriptor, ValidationError};

pub const READ_FAILED: &str = "No se pudo leer el archivo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub model: String,
    pub mode: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeginError {
    #[error("{0:?} request already in flight")]
    Busy(Action),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("No se pudo leer el archivo: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub struct PendingChat {
    pub token: RequestToken,
    pub request: ChatRequest,
}

impl PendingChat {
    pub async fn dispatch(&self, backend: &dyn Backend) -> ApiResult<ChatReply> {
        backend.send_chat(&self.request).await
    }
}

#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub token: RequestToken,
    pub path: PathBuf,
    pub file: FileDescriptor,
    pub options: UploadOptions,
}

impl PendingUpload {
    /// The file content is only read here, after validation passed.
    pub async fn dispatch(self, backend: &dyn Backend) -> ApiResult<UploadReply> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "reading upload failed");
                return ApiResult::Failure(READ_FAILED.to_string());
            }
        };
        backend
            .send_upload(UploadRequest {
                file: self.file,
                bytes,
                options: self.options,
            })
            .await
    }
}

impl UiState {
    pub fn begin_chat(
        &mut self,
        message: &str,
        context: &str,
        settings: &ChatSettings,
    ) -> Result<PendingChat, BeginError> {
        if self.is_busy(Action::Chat) {
            return Err(BeginError::Busy(Action::Chat));
        }

        let (message, context) = match validate::validate_chat(message, context) {
            Ok(valid) => valid,
            Err(err) => {
                self.show_transient_alert(&err.to_string(), Severity::Warning);
                return Err(err.into());
            }
        };

        self.render_user_message(&message);
        let token = self.render_loading(THINKING);
        self.mark_in_flight(Action::Chat, token);
        tracing::info!(token = token.value(), model = %settings.model, "chat started");

        Ok(PendingChat {
            token,
            request: ChatRequest {
                message,
                model: settings.model.clone(),
                mode: settings.mode.clone(),
                context,
            },
        })
    }

    /// Returns `false` when `token` was already resolved.
    pub fn finish_chat(&mut self, token: RequestToken, result: ApiResult<ChatReply>) -> bool {
        self.clear_in_flight(token);
        let message = match &result {
            ApiResult::Success(reply) => render::chat_reply_message(reply),
            ApiResult::Failure(_) => render::error_message(),
        };
        self.settle(token, message, result.into_result().err())
    }

    pub fn begin_upload(
        &mut self,
        path: &Path,
        options: UploadOptions,
    ) -> Result<PendingUpload, BeginError> {
        if self.is_busy(Action::Upload) {
            return Err(BeginError::Busy(Action::Upload));
        }

        let file = match FileDescriptor::from_path(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot describe upload");
                self.show_transient_alert(READ_FAILED, Severity::Danger);
                return Err(BeginError::Unreadable(path.display().to_string()));
            }
        };

        let checked = validate::validate_file(&file).and_then(|_| {
            validate::validate_upload_options(options.process_with_ai, options.model.as_deref())
        });
        if let Err(err) = checked {
            tracing::info!(file = %file.name, reason = ?err, "upload rejected");
            self.show_transient_alert(&err.to_string(), Severity::Danger);
            return Err(err.into());
        }

        let options = if options.process_with_ai {
            UploadOptions {
                process_with_ai: true,
                model: options.model,
                question: options.question.filter(|q| !q.trim().is_empty()),
            }
        } else {
            UploadOptions::default()
        };

        self.render_user_message(&format!(
            "📎 {} ({})",
            file.name,
            render::format_file_size(file.size)
        ));
        let token = self.render_loading(PROCESSING_FILE);
        self.mark_in_flight(Action::Upload, token);
        tracing::info!(token = token.value(), file = %file.name, "upload started");

        Ok(PendingUpload {
            token,
            path: path.to_path_buf(),
            file,
            options,
        })
    }

    /// Dropping several files uploads the first one only.
    pub fn begin_drop(
        &mut self,
        paths: &[PathBuf],
        options: UploadOptions,
    ) -> Result<PendingUpload, BeginError> {
        let Some(first) = paths.first() else {
            self.show_transient_alert(&ValidationError::NoFile.to_string(), Severity::Warning);
            return Err(ValidationError::NoFile.into());
        };
        if paths.len() > 1 {
            tracing::debug!(ignored = paths.len() - 1, "multiple files dropped, using the first");
        }
        self.begin_upload(first, options)
    }

    pub fn finish_upload(&mut self, token: RequestToken, result: ApiResult<UploadReply>) -> bool {
        self.clear_in_flight(token);
        let message = match &result {
            ApiResult::Success(reply) => render::upload_reply_message(reply),
            ApiResult::Failure(_) => render::error_message(),
        };
        self.settle(token, message, result.into_result().err())
    }

    pub fn begin_health(&mut self) -> Option<RequestToken> {
        if self.is_busy(Action::Health) {
            return None;
        }
        let token = self.next_token();
        self.mark_in_flight(Action::Health, token);
        self.health = HealthIndicator::Checking;
        Some(token)
    }

    pub fn finish_health(&mut self, token: RequestToken, result: ApiResult<HealthStatus>) {
        self.clear_in_flight(token);
        self.health = match result {
            ApiResult::Success(_) => HealthIndicator::Healthy,
            ApiResult::Failure(message) => HealthIndicator::Unavailable(message),
        };
    }

    fn settle(
        &mut self,
        token: RequestToken,
        message: crate::state::DisplayMessage,
        failure: Option<String>,
    ) -> bool {
        if !self.resolve_loading(token, message) {
            tracing::debug!(token = token.value(), "placeholder already resolved");
            return false;
        }
        if let Some(reason) = failure {
            self.show_transient_alert(&format!("Error: {}", reason), Severity::Danger);
        }
        true
    }
}

/// Run a whole chat round trip in place.
pub async fn submit_chat(
    state: &mut UiState,
    backend: &dyn Backend,
    message: &str,
    context: &str,
    settings: &ChatSettings,
) -> Result<RequestToken, BeginError> {
    let pending = state.begin_chat(message, context, settings)?;
    let result = pending.dispatch(backend).await;
    state.finish_chat(pending.token, result);
    Ok(pending.token)
}

pub async fn submit_upload(
    state: &mut UiState,
    backend: &dyn Backend,
    path: &Path,
    options: UploadOptions,
) -> Result<RequestToken, BeginError> {
    let pending = state.begin_upload(path, options)?;
    let token = pending.token;
    let result = pending.dispatch(backend).await;
    state.finish_upload(token, result);
    Ok(token)
}

pub async fn check_health(state: &mut UiState, backend: &dyn Backend) -> Option<RequestToken> {
    let token = state.begin_health()?;
    let result = backend.check_health().await;
    state.finish_health(token, result);
    Some(token)
}

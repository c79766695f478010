use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{ChatBody, HealthBody, ModelsBody, UploadBody};
use super::{
    ApiResult, Backend, ChatReply, ChatRequest, DispatchError, HealthStatus, ModelCatalog,
    UploadReply, UploadRequest,
};

pub const HEALTHY: &str = "healthy";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const HEALTH_UNAVAILABLE: &str = "API no disponible";
pub const CHAT_FALLBACK: &str = "No se pudo obtener respuesta";
pub const UPLOAD_FALLBACK: &str = "No se pudo procesar el archivo";
pub const MODELS_FALLBACK: &str = "No se pudo obtener la lista de modelos";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_health(&self) -> Result<HealthStatus, DispatchError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let (status, body): (_, HealthBody) = read_body(response).await?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status,
                message: body.message,
            });
        }
        match body.status {
            Some(s) if s == HEALTHY => Ok(HealthStatus {
                status: s,
                message: body.message,
            }),
            other => Err(DispatchError::Unhealthy(other)),
        }
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<ChatReply, DispatchError> {
        tracing::debug!(model = %request.model, mode = %request.mode, "dispatching chat");

        let response = self
            .client
            .post(self.url("/chat"))
            .json(request)
            .send()
            .await?;
        let (status, body): (_, ChatBody) = read_body(response).await?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status,
                message: body.message,
            });
        }
        if !body.success {
            return Err(DispatchError::Application(body.message));
        }

        let response = body
            .response
            .ok_or_else(|| DispatchError::Malformed("chat reply without `response`".to_string()))?;

        Ok(ChatReply {
            response,
            model: body.model,
            mode: body.mode,
            total_tokens: body.usage.and_then(|u| u.total_tokens),
            perspectives: body.metadata.and_then(|m| m.perspectives_analyzed),
        })
    }

    async fn post_upload(&self, request: UploadRequest) -> Result<UploadReply, DispatchError> {
        let UploadRequest {
            file,
            bytes,
            options,
        } = request;
        tracing::debug!(
            file = %file.name,
            size = file.size,
            process_with_ai = options.process_with_ai,
            "dispatching upload"
        );

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let mut form = Form::new().part("file", part);

        if options.process_with_ai {
            form = form.text("process_with_ai", "true");
            if let Some(model) = options.model {
                form = form.text("model", model);
            }
            if let Some(question) = options.question.filter(|q| !q.trim().is_empty()) {
                form = form.text("question", question);
            }
        }

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        let (status, body): (_, UploadBody) = read_body(response).await?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status,
                message: body.message,
            });
        }
        if !body.success {
            return Err(DispatchError::Application(body.message));
        }

        let file_info = body
            .file_info
            .ok_or_else(|| DispatchError::Malformed("upload reply without `file_info`".to_string()))?;

        Ok(UploadReply {
            file_info,
            content_preview: body.content_preview.filter(|p| !p.is_empty()),
            ai_analysis: body.ai_analysis,
        })
    }

    async fn fetch_models(&self) -> Result<ModelCatalog, DispatchError> {
        let response = self.client.get(self.url("/models")).send().await?;
        let (status, body): (_, ModelsBody) = read_body(response).await?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status,
                message: body.message,
            });
        }
        if !body.success {
            return Err(DispatchError::Application(body.message));
        }

        Ok(ModelCatalog {
            models: body.models,
            default_model: body.default_model,
        })
    }
}

/// Read a JSON body. An unparsable body on an error status is reported as
/// the status, not as a parse failure.
async fn read_body<B: DeserializeOwned>(response: Response) -> Result<(StatusCode, B), DispatchError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    match serde_json::from_slice::<B>(&bytes) {
        Ok(body) => Ok((status, body)),
        Err(_) if !status.is_success() => Err(DispatchError::Status {
            status,
            message: None,
        }),
        Err(err) => Err(DispatchError::Malformed(err.to_string())),
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn check_health(&self) -> ApiResult<HealthStatus> {
        match self.fetch_health().await {
            Ok(health) => ApiResult::Success(health),
            Err(err) => {
                // The cause stays in the log; the UI only learns "unavailable".
                tracing::warn!(error = %err, url = %self.base_url, "health check failed");
                ApiResult::Failure(HEALTH_UNAVAILABLE.to_string())
            }
        }
    }

    async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatReply> {
        ApiResult::from_dispatch(self.post_chat(request).await, CHAT_FALLBACK)
    }

    async fn send_upload(&self, request: UploadRequest) -> ApiResult<UploadReply> {
        ApiResult::from_dispatch(self.post_upload(request).await, UPLOAD_FALLBACK)
    }

    async fn list_models(&self) -> ApiResult<ModelCatalog> {
        ApiResult::from_dispatch(self.fetch_models().await, MODELS_FALLBACK)
    }
}

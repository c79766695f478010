use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validate::FileDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// What the user filled in next to the file: the AI fields are only sent
/// when `process_with_ai` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub process_with_ai: bool,
    pub model: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: FileDescriptor,
    pub bytes: Vec<u8>,
    pub options: UploadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub total_tokens: Option<u64>,
    pub perspectives: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub word_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AiAnalysis {
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub file_info: FileInfo,
    pub content_preview: Option<String>,
    pub ai_analysis: Option<AiAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_window: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: BTreeMap<String, ModelInfo>,
    pub default_model: Option<String>,
}

impl ModelCatalog {
    pub fn keys(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}

// Raw response bodies. Every field is optional so that a failure body
// (`{"error": ..., "message": ...}`) still parses and its message survives.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HealthBody {
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Usage {
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ChatMetadata {
    pub perspectives_analyzed: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ChatBody {
    pub success: bool,
    pub response: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub usage: Option<Usage>,
    pub metadata: Option<ChatMetadata>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UploadBody {
    pub success: bool,
    pub file_info: Option<FileInfo>,
    pub content_preview: Option<String>,
    pub ai_analysis: Option<AiAnalysis>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ModelsBody {
    pub success: bool,
    pub models: BTreeMap<String, ModelInfo>,
    pub default_model: Option<String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_missing_context() {
        let request = ChatRequest {
            message: "Hello".to_string(),
            model: "gpt-4".to_string(),
            mode: "standard".to_string(),
            context: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Hello", "model": "gpt-4", "mode": "standard"})
        );
    }

    #[test]
    fn test_chat_body_tolerates_null_metadata() {
        let body: ChatBody = serde_json::from_str(
            r#"{"success": true, "response": "Hi!", "usage": {}, "metadata": {"perspectives_analyzed": null}}"#,
        )
        .unwrap();
        assert!(body.success);
        assert_eq!(body.response.as_deref(), Some("Hi!"));
        assert!(body.metadata.unwrap().perspectives_analyzed.is_none());
    }

    #[test]
    fn test_error_body_parses_as_failure() {
        let body: UploadBody =
            serde_json::from_str(r#"{"error": "File processing error", "message": "No readable text found in PDF"}"#)
                .unwrap();
        assert!(!body.success);
        assert_eq!(body.message.as_deref(), Some("No readable text found in PDF"));
    }
}

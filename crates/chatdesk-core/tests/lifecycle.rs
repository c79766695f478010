use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chatdesk_core::api::{FileInfo, HealthStatus, ModelCatalog, UploadRequest};
use chatdesk_core::lifecycle::{check_health, submit_chat, submit_upload};
use chatdesk_core::render::APOLOGY;
use chatdesk_core::{
    Action, ApiResult, Backend, BeginError, ChatReply, ChatRequest, ChatSettings,
    HealthIndicator, Role, Severity, UiState, UploadOptions, UploadReply, ValidationError,
};

struct FakeBackend {
    chat: ApiResult<ChatReply>,
    upload: ApiResult<UploadReply>,
    health: ApiResult<HealthStatus>,
    chats: Mutex<Vec<ChatRequest>>,
    uploads: Mutex<Vec<(String, usize, UploadOptions)>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            chat: ApiResult::Success(ChatReply {
                response: "Hi!".to_string(),
                model: Some("gpt-4".to_string()),
                mode: Some("standard".to_string()),
                total_tokens: None,
                perspectives: None,
            }),
            upload: ApiResult::Success(UploadReply {
                file_info: FileInfo {
                    filename: "notes.txt".to_string(),
                    size: 11,
                    file_type: "txt".to_string(),
                    word_count: 2,
                },
                content_preview: Some("hello world".to_string()),
                ai_analysis: None,
            }),
            health: ApiResult::Success(HealthStatus {
                status: "healthy".to_string(),
                message: None,
            }),
            chats: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            chat: ApiResult::Failure(message.to_string()),
            upload: ApiResult::Failure(message.to_string()),
            health: ApiResult::Failure("API no disponible".to_string()),
            ..Self::new()
        }
    }

    fn chat_calls(&self) -> usize {
        self.chats.lock().unwrap().len()
    }

    fn upload_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn check_health(&self) -> ApiResult<HealthStatus> {
        self.health.clone()
    }

    async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatReply> {
        self.chats.lock().unwrap().push(request.clone());
        self.chat.clone()
    }

    async fn send_upload(&self, request: UploadRequest) -> ApiResult<UploadReply> {
        self.uploads
            .lock()
            .unwrap()
            .push((request.file.name.clone(), request.bytes.len(), request.options.clone()));
        self.upload.clone()
    }

    async fn list_models(&self) -> ApiResult<ModelCatalog> {
        ApiResult::Success(ModelCatalog::default())
    }
}

fn settings() -> ChatSettings {
    ChatSettings {
        model: "gpt-4".to_string(),
        mode: "standard".to_string(),
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_hello_round_trip() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();

    submit_chat(&mut state, &backend, "Hello", "", &settings()).await.unwrap();

    let sent = backend.chats.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![ChatRequest {
            message: "Hello".to_string(),
            model: "gpt-4".to_string(),
            mode: "standard".to_string(),
            context: None,
        }]
    );

    let messages: Vec<_> = state.transcript.messages().collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].body, "Hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].body, "Hi!");
    assert_eq!(
        messages[1].meta_line().as_deref(),
        Some("Modelo: gpt-4 | Modo: standard")
    );
    assert_eq!(state.transcript.pending(), 0);
    assert!(state.alerts.is_empty());
    assert!(!state.is_busy(Action::Chat));
}

#[tokio::test]
async fn test_placeholder_created_then_removed_once() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();

    let pending = state.begin_chat("Hello", "", &settings()).unwrap();
    assert_eq!(state.transcript.pending(), 1);
    assert!(state.is_busy(Action::Chat));

    let result = pending.dispatch(&backend).await;
    assert!(state.finish_chat(pending.token, result));
    assert_eq!(state.transcript.pending(), 0);
    assert_eq!(
        state.transcript.messages().filter(|m| m.role == Role::Assistant).count(),
        1
    );
}

#[tokio::test]
async fn test_failed_chat_shows_apology_and_alert() {
    let backend = FakeBackend::failing("Groq API key not configured");
    let mut state = UiState::default();

    submit_chat(&mut state, &backend, "Hello", "", &settings()).await.unwrap();

    let last = state.transcript.last_assistant().unwrap();
    assert_eq!(last.body, APOLOGY);
    assert!(last.is_error());
    assert_eq!(last.meta_line(), None);
    assert_eq!(state.transcript.pending(), 0);

    let alerts = state.alerts.items();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Danger);
    assert_eq!(alerts[0].message, "Error: Groq API key not configured");
    assert!(!state.is_busy(Action::Chat));
}

#[tokio::test]
async fn test_context_forwarded_only_when_present() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();

    submit_chat(&mut state, &backend, "Summarise", "  meeting notes ", &settings())
        .await
        .unwrap();
    let sent = backend.chats.lock().unwrap()[0].clone();
    assert_eq!(sent.context.as_deref(), Some("meeting notes"));
}

#[tokio::test]
async fn test_blank_message_never_dispatched() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();

    let err = submit_chat(&mut state, &backend, "   ", "", &settings()).await.unwrap_err();
    assert_eq!(err, BeginError::Invalid(ValidationError::EmptyMessage));
    assert_eq!(backend.chat_calls(), 0);
    assert!(state.transcript.is_empty());
    assert_eq!(state.alerts.items()[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_second_chat_refused_while_in_flight() {
    let mut state = UiState::default();
    let first = state.begin_chat("one", "", &settings()).unwrap();
    let len = state.transcript.len();

    assert_eq!(
        state.begin_chat("two", "", &settings()).unwrap_err(),
        BeginError::Busy(Action::Chat)
    );
    assert_eq!(state.transcript.len(), len);

    state.finish_chat(first.token, ApiResult::Failure("x".to_string()));
    assert!(state.begin_chat("two", "", &settings()).is_ok());
}

#[tokio::test]
async fn test_finish_twice_is_noop() {
    let mut state = UiState::default();
    let pending = state.begin_chat("Hello", "", &settings()).unwrap();

    assert!(state.finish_chat(pending.token, ApiResult::Failure("first".to_string())));
    let transcript_len = state.transcript.len();
    let alerts = state.alerts.items().len();

    assert!(!state.finish_chat(pending.token, ApiResult::Failure("second".to_string())));
    assert_eq!(state.transcript.len(), transcript_len);
    assert_eq!(state.alerts.items().len(), alerts);
}

#[tokio::test]
async fn test_oversized_drop_rejected_without_request() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.pdf");
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(15 * 1000 * 1000).unwrap();

    let err = state.begin_drop(&[path], UploadOptions::default()).unwrap_err();
    assert!(matches!(err, BeginError::Invalid(ValidationError::FileTooLarge { .. })));
    assert_eq!(backend.upload_calls(), 0);
    assert!(state.transcript.is_empty());
    assert_eq!(state.alerts.items()[0].message, "El archivo excede el límite de 10MB");
    assert!(!state.is_busy(Action::Upload));
}

#[tokio::test]
async fn test_unsupported_type_rejected() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "image.png", b"\x89PNG");

    let err = submit_upload(&mut state, &backend, &path, UploadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BeginError::Invalid(ValidationError::UnsupportedFileType { .. })));
    assert_eq!(backend.upload_calls(), 0);
    assert!(state.transcript.is_empty());
}

#[tokio::test]
async fn test_missing_file_is_reported() {
    let mut state = UiState::default();
    let err = state
        .begin_upload(std::path::Path::new("/nonexistent/notes.txt"), UploadOptions::default())
        .unwrap_err();
    assert!(matches!(err, BeginError::Unreadable(_)));
    assert_eq!(state.alerts.items().len(), 1);
}

#[tokio::test]
async fn test_upload_round_trip_strips_ai_fields_when_disabled() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "notes.txt", b"hello world");

    let options = UploadOptions {
        process_with_ai: false,
        model: Some("gemma".to_string()),
        question: Some("ignored".to_string()),
    };
    submit_upload(&mut state, &backend, &path, options).await.unwrap();

    let uploads = backend.uploads.lock().unwrap().clone();
    assert_eq!(uploads, vec![("notes.txt".to_string(), 11, UploadOptions::default())]);

    let messages: Vec<_> = state.transcript.messages().collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].body, "📎 notes.txt (11 Bytes)");
    assert!(messages[1].body.contains("Archivo procesado: notes.txt"));
    assert!(messages[1].metadata.as_ref().unwrap().is_file);
}

#[tokio::test]
async fn test_upload_with_ai_requires_model() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "notes.txt", b"hello");

    let options = UploadOptions {
        process_with_ai: true,
        model: None,
        question: None,
    };
    let err = submit_upload(&mut state, &backend, &path, options).await.unwrap_err();
    assert_eq!(err, BeginError::Invalid(ValidationError::MissingModel));
    assert_eq!(backend.upload_calls(), 0);

    let options = UploadOptions {
        process_with_ai: true,
        model: Some("mixtral".to_string()),
        question: Some("  ".to_string()),
    };
    submit_upload(&mut state, &backend, &path, options).await.unwrap();
    let (_, _, sent) = backend.uploads.lock().unwrap()[0].clone();
    assert!(sent.process_with_ai);
    assert_eq!(sent.model.as_deref(), Some("mixtral"));
    assert_eq!(sent.question, None);
}

#[tokio::test]
async fn test_multi_file_drop_uses_first() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "first.txt", b"one");
    let second = write_file(&dir, "second.txt", b"two");

    let pending = state
        .begin_drop(&[first, second], UploadOptions::default())
        .unwrap();
    assert_eq!(pending.file.name, "first.txt");
    let token = pending.token;
    let result = pending.dispatch(&backend).await;
    assert!(state.finish_upload(token, result));
    assert_eq!(backend.upload_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_actions_resolve_their_own_placeholders() {
    let backend = FakeBackend::new();
    let mut state = UiState::default();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "notes.txt", b"hello world");

    let chat = state.begin_chat("Hello", "", &settings()).unwrap();
    let upload = state.begin_upload(&path, UploadOptions::default()).unwrap();
    assert_eq!(state.transcript.pending(), 2);
    assert_ne!(chat.token, upload.token);

    let upload_token = upload.token;
    let upload_result = upload.dispatch(&backend).await;
    assert!(state.finish_upload(upload_token, upload_result));
    assert_eq!(state.transcript.pending(), 1);
    assert!(state.is_busy(Action::Chat));
    assert!(!state.is_busy(Action::Upload));

    let chat_result = chat.dispatch(&backend).await;
    assert!(state.finish_chat(chat.token, chat_result));
    assert_eq!(state.transcript.pending(), 0);

    let last = state.transcript.last_assistant().unwrap();
    assert_eq!(last.body, "Hi!");
}

#[tokio::test]
async fn test_health_indicator() {
    let mut state = UiState::default();
    assert_eq!(state.health, HealthIndicator::Checking);

    check_health(&mut state, &FakeBackend::new()).await.unwrap();
    assert_eq!(state.health, HealthIndicator::Healthy);

    check_health(&mut state, &FakeBackend::failing("boom")).await.unwrap();
    assert_eq!(
        state.health,
        HealthIndicator::Unavailable("API no disponible".to_string())
    );
    assert!(state.transcript.is_empty());
    assert!(state.alerts.is_empty());
}

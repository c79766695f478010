//! `ApiClient` against an in-process mock of the chat backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use chatdesk_core::api::client::{CHAT_FALLBACK, HEALTH_UNAVAILABLE, UPLOAD_FALLBACK};
use chatdesk_core::api::UploadRequest;
use chatdesk_core::{
    ApiClient, ApiResult, Backend, ChatRequest, FileDescriptor, UploadOptions,
};

#[derive(Clone, Default)]
struct Recorded {
    chats: Arc<Mutex<Vec<Value>>>,
    uploads: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn hello() -> ChatRequest {
    ChatRequest {
        message: "Hello".to_string(),
        model: "gpt-4".to_string(),
        mode: "standard".to_string(),
        context: None,
    }
}

async fn chat_echo(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.chats.lock().unwrap().push(body.clone());
    Json(json!({
        "success": true,
        "response": "Hi!",
        "model": body["model"],
        "mode": body["mode"],
        "usage": {"total_tokens": 42},
        "metadata": {"finish_reason": "stop", "perspectives_analyzed": null}
    }))
}

async fn upload_echo(State(recorded): State<Recorded>, mut multipart: Multipart) -> Json<Value> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                format!("{}|{}|{}", file_name, content_type, bytes.len())
            }
            None => field.text().await.unwrap(),
        };
        fields.push((name, value));
    }
    let with_ai = fields.iter().any(|(n, v)| n == "process_with_ai" && v == "true");
    recorded.uploads.lock().unwrap().push(fields);

    let mut reply = json!({
        "success": true,
        "file_info": {"filename": "notes.txt", "size": 11, "type": "txt", "word_count": 2},
        "content_preview": "hello world"
    });
    if with_ai {
        reply["ai_analysis"] = json!({
            "response": "A greeting.",
            "model": "llama3-8b-8192",
            "question": "General analysis",
            "usage": {}
        });
    }
    Json(reply)
}

fn echo_backend(recorded: Recorded) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "message": "Chatbot API is running"})) }),
        )
        .route("/chat", post(chat_echo))
        .route("/upload", post(upload_echo))
        .route(
            "/models",
            get(|| async {
                Json(json!({
                    "success": true,
                    "models": {
                        "llama3-8b": {"id": "llama3-8b-8192", "name": "Llama 3 8B", "context_window": 8192},
                        "mixtral": {"id": "mixtral-8x7b-32768", "name": "Mixtral 8x7B", "context_window": 32768}
                    },
                    "default_model": "llama3-8b"
                }))
            }),
        )
        .with_state(recorded)
}

fn notes_upload(options: UploadOptions) -> UploadRequest {
    UploadRequest {
        file: FileDescriptor::new("notes.txt", 11, "text/plain"),
        bytes: b"hello world".to_vec(),
        options,
    }
}

#[tokio::test]
async fn test_health_ok() {
    let url = serve(echo_backend(Recorded::default())).await;
    let client = ApiClient::new(&url);
    let health = client.check_health().await.into_result().unwrap();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn test_health_wrong_sentinel_is_unavailable() {
    let router = Router::new().route("/health", get(|| async { Json(json!({"status": "degraded"})) }));
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).check_health().await,
        ApiResult::Failure(HEALTH_UNAVAILABLE.to_string())
    );
}

#[tokio::test]
async fn test_health_non_2xx_is_unavailable() {
    let router = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "healthy"}))) }),
    );
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).check_health().await,
        ApiResult::Failure(HEALTH_UNAVAILABLE.to_string())
    );
}

#[tokio::test]
async fn test_chat_body_shape_and_reply() {
    let recorded = Recorded::default();
    let url = serve(echo_backend(recorded.clone())).await;
    let client = ApiClient::new(&url);

    let reply = client.send_chat(&hello()).await.into_result().unwrap();
    assert_eq!(reply.response, "Hi!");
    assert_eq!(reply.model.as_deref(), Some("gpt-4"));
    assert_eq!(reply.mode.as_deref(), Some("standard"));
    assert_eq!(reply.total_tokens, Some(42));
    assert_eq!(reply.perspectives, None);

    let sent = recorded.chats.lock().unwrap()[0].clone();
    assert_eq!(sent, json!({"message": "Hello", "model": "gpt-4", "mode": "standard"}));
    assert!(sent.get("context").is_none());
}

#[tokio::test]
async fn test_chat_sends_context_when_present() {
    let recorded = Recorded::default();
    let url = serve(echo_backend(recorded.clone())).await;

    let request = ChatRequest {
        context: Some("prior notes".to_string()),
        ..hello()
    };
    ApiClient::new(&url).send_chat(&request).await.into_result().unwrap();
    assert_eq!(recorded.chats.lock().unwrap()[0]["context"], "prior notes");
}

#[tokio::test]
async fn test_chat_validation_error_surfaces_server_message() {
    let router = Router::new().route(
        "/chat",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Validation error", "message": "Mode must be either 'basic' or 'pro'"})),
            )
        }),
    );
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_chat(&hello()).await,
        ApiResult::Failure("Mode must be either 'basic' or 'pro'".to_string())
    );
}

#[tokio::test]
async fn test_chat_success_false_is_failure() {
    let router = Router::new().route(
        "/chat",
        post(|| async { Json(json!({"success": false, "message": "Model overloaded"})) }),
    );
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_chat(&hello()).await,
        ApiResult::Failure("Model overloaded".to_string())
    );
}

#[tokio::test]
async fn test_chat_non_json_error_uses_fallback() {
    let router = Router::new().route(
        "/chat",
        post(|| async { (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").into_response() }),
    );
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_chat(&hello()).await,
        ApiResult::Failure(CHAT_FALLBACK.to_string())
    );
}

#[tokio::test]
async fn test_chat_malformed_success_uses_fallback() {
    let router = Router::new().route("/chat", post(|| async { "definitely not json" }));
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_chat(&hello()).await,
        ApiResult::Failure(CHAT_FALLBACK.to_string())
    );

    let router = Router::new().route("/chat", post(|| async { Json(json!({"success": true})) }));
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_chat(&hello()).await,
        ApiResult::Failure(CHAT_FALLBACK.to_string())
    );
}

#[tokio::test]
async fn test_chat_timeout_is_failure() {
    let router = Router::new().route(
        "/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"success": true, "response": "late"}))
        }),
    );
    let url = serve(router).await;
    let client = ApiClient::with_timeout(&url, Duration::from_millis(200));
    assert_eq!(
        client.send_chat(&hello()).await,
        ApiResult::Failure(CHAT_FALLBACK.to_string())
    );
}

#[tokio::test]
async fn test_upload_without_ai_sends_only_file() {
    let recorded = Recorded::default();
    let url = serve(echo_backend(recorded.clone())).await;

    let options = UploadOptions {
        process_with_ai: false,
        model: Some("gemma".to_string()),
        question: Some("ignored".to_string()),
    };
    let reply = ApiClient::new(&url)
        .send_upload(notes_upload(options))
        .await
        .into_result()
        .unwrap();
    assert_eq!(reply.file_info.filename, "notes.txt");
    assert_eq!(reply.file_info.word_count, 2);
    assert_eq!(reply.content_preview.as_deref(), Some("hello world"));
    assert!(reply.ai_analysis.is_none());

    let fields = recorded.uploads.lock().unwrap()[0].clone();
    assert_eq!(
        fields,
        vec![("file".to_string(), "notes.txt|text/plain|11".to_string())]
    );
}

#[tokio::test]
async fn test_upload_with_ai_sends_fields() {
    let recorded = Recorded::default();
    let url = serve(echo_backend(recorded.clone())).await;

    let options = UploadOptions {
        process_with_ai: true,
        model: Some("llama3-8b".to_string()),
        question: Some("What is this?".to_string()),
    };
    let reply = ApiClient::new(&url)
        .send_upload(notes_upload(options))
        .await
        .into_result()
        .unwrap();
    let analysis = reply.ai_analysis.unwrap();
    assert_eq!(analysis.response, "A greeting.");
    assert_eq!(analysis.model.as_deref(), Some("llama3-8b-8192"));

    let fields = recorded.uploads.lock().unwrap()[0].clone();
    let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["file", "process_with_ai", "model", "question"]);
    assert_eq!(fields[2].1, "llama3-8b");
    assert_eq!(fields[3].1, "What is this?");
}

#[tokio::test]
async fn test_upload_error_message_surfaces() {
    let router = Router::new().route(
        "/upload",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "File processing error", "message": "No readable text found in PDF"})),
            )
        }),
    );
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_upload(notes_upload(UploadOptions::default())).await,
        ApiResult::Failure("No readable text found in PDF".to_string())
    );

    let router = Router::new().route("/upload", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let url = serve(router).await;
    assert_eq!(
        ApiClient::new(&url).send_upload(notes_upload(UploadOptions::default())).await,
        ApiResult::Failure(UPLOAD_FALLBACK.to_string())
    );
}

#[tokio::test]
async fn test_models_catalog() {
    let url = serve(echo_backend(Recorded::default())).await;
    let catalog = ApiClient::new(&url).list_models().await.into_result().unwrap();
    assert_eq!(catalog.keys(), vec!["llama3-8b", "mixtral"]);
    assert_eq!(catalog.default_model.as_deref(), Some("llama3-8b"));
    assert_eq!(catalog.models["mixtral"].context_window, Some(32768));
}

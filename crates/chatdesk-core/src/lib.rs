pub mod api;
pub mod composer;
pub mod config;
pub mod lifecycle;
pub mod render;
pub mod state;
pub mod validate;

// Re-export main types for convenience
pub use api::{ApiClient, ApiResult, Backend, ChatReply, ChatRequest, UploadOptions, UploadReply};
pub use composer::Composer;
pub use config::Config;
pub use lifecycle::{BeginError, ChatSettings, PendingChat, PendingUpload};
pub use state::{
    Action, DisplayMessage, HealthIndicator, MessageMeta, RequestToken, Role, Severity,
    TranscriptEntry, UiState,
};
pub use validate::{FileDescriptor, ValidationError};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chatdesk_core::api::ModelCatalog;
use chatdesk_core::{
    Action, ApiResult, Backend, BeginError, ChatSettings, Config, Severity, UiState, UploadOptions,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::tui::AppEvent;

pub const EXPORT_FILE: &str = "chatdesk-transcript.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Path,
    ProcessWithAi,
    Question,
}

/// The upload dialog opened with Ctrl+U.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub path: String,
    pub process_with_ai: bool,
    pub question: String,
    pub field: UploadField,
}

impl UploadForm {
    fn new() -> Self {
        Self {
            path: String::new(),
            process_with_ai: false,
            question: String::new(),
            field: UploadField::Path,
        }
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            UploadField::Path => UploadField::ProcessWithAi,
            // The question only matters when the file goes to the model
            UploadField::ProcessWithAi if self.process_with_ai => UploadField::Question,
            UploadField::ProcessWithAi | UploadField::Question => UploadField::Path,
        };
    }

    /// The text field under the cursor, if any.
    pub fn focused_text(&mut self) -> Option<&mut String> {
        match self.field {
            UploadField::Path => Some(&mut self.path),
            UploadField::Question => Some(&mut self.question),
            UploadField::ProcessWithAi => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Popup {
    Upload(UploadForm),
    ModelPicker,
    ModePicker,
    /// Edits the optional context sent along with each chat message.
    Context(String),
}

pub struct App {
    pub should_quit: bool,
    pub state: UiState,
    pub config: Config,
    pub settings: ChatSettings,
    pub context: String,
    pub popup: Option<Popup>,

    // Model picker
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,
    pub models_loading: bool,

    // Mode picker
    pub available_modes: Vec<String>,
    pub mode_picker_state: ListState,

    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Layout from the last draw, for mouse hit-testing and scrolling
    pub transcript_area: Option<Rect>,
    pub sidebar_area: Option<Rect>,
    pub max_scroll: u16,

    backend: Arc<dyn Backend>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        events: UnboundedSender<AppEvent>,
        width: u16,
    ) -> Self {
        let mut state = UiState::new(config.sidebar_breakpoint(), config.composer_max_rows());
        state.sidebar.on_resize(width);

        let settings = ChatSettings {
            model: config.model().to_string(),
            mode: config.mode().to_string(),
        };
        let available_models = config.known_models();
        let available_modes = config.known_modes();

        Self {
            should_quit: false,
            state,
            settings,
            context: String::new(),
            popup: None,
            available_models,
            model_picker_state: ListState::default(),
            models_loading: false,
            available_modes,
            mode_picker_state: ListState::default(),
            animation_frame: 0,
            transcript_area: None,
            sidebar_area: None,
            max_scroll: 0,
            config,
            backend,
            events,
        }
    }

    /// Send the composer text. On success the composer is cleared; a
    /// rejected message stays put so it can be fixed.
    pub fn submit_chat(&mut self) {
        let text = self.state.composer.text().to_string();
        let pending = match self.state.begin_chat(&text, &self.context, &self.settings) {
            Ok(pending) => pending,
            Err(BeginError::Busy(_)) => return,
            Err(err) => {
                debug!(error = %err, "chat not sent");
                return;
            }
        };
        self.state.composer.clear();

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = pending.dispatch(backend.as_ref()).await;
            let _ = tx.send(AppEvent::Chat(pending.token, result));
        });
    }

    pub fn start_upload(&mut self, path: &Path, options: UploadOptions) {
        let pending = self.state.begin_upload(path, options);
        self.spawn_upload(pending);
    }

    /// Files dropped onto the terminal go straight to upload without AI
    /// processing; only the first is used.
    pub fn handle_drop(&mut self, paths: &[PathBuf]) {
        let pending = self.state.begin_drop(paths, UploadOptions::default());
        self.spawn_upload(pending);
    }

    fn spawn_upload(&mut self, pending: Result<chatdesk_core::PendingUpload, BeginError>) {
        let pending = match pending {
            Ok(pending) => pending,
            Err(BeginError::Busy(_)) => {
                self.state
                    .show_transient_alert("Ya hay un archivo en proceso", Severity::Info);
                return;
            }
            Err(err) => {
                debug!(error = %err, "upload not sent");
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let token = pending.token;
            let result = pending.dispatch(backend.as_ref()).await;
            let _ = tx.send(AppEvent::Upload(token, result));
        });
    }

    pub fn request_health(&mut self) {
        let Some(token) = self.state.begin_health() else {
            return;
        };

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.check_health().await;
            let _ = tx.send(AppEvent::Health(token, result));
        });
    }

    // Upload dialog
    pub fn open_upload_dialog(&mut self) {
        if self.state.is_busy(Action::Upload) {
            self.state
                .show_transient_alert("Ya hay un archivo en proceso", Severity::Info);
            return;
        }
        self.popup = Some(Popup::Upload(UploadForm::new()));
    }

    pub fn submit_upload_dialog(&mut self) {
        let Some(Popup::Upload(form)) = self.popup.take() else {
            return;
        };

        let path = form.path.trim();
        if path.is_empty() {
            self.state.show_transient_alert(
                &chatdesk_core::ValidationError::NoFile.to_string(),
                Severity::Warning,
            );
            self.popup = Some(Popup::Upload(form));
            return;
        }

        let question = form.question.trim();
        let options = UploadOptions {
            process_with_ai: form.process_with_ai,
            model: form.process_with_ai.then(|| self.settings.model.clone()),
            question: (!question.is_empty()).then(|| question.to_string()),
        };
        let path = expand_home(path);
        self.start_upload(&path, options);
    }

    // Model picker
    pub fn open_model_picker(&mut self) {
        self.select_current(true);
        self.popup = Some(Popup::ModelPicker);
        self.models_loading = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.list_models().await;
            let _ = tx.send(AppEvent::Models(result));
        });
    }

    /// Prefer the backend's catalog, falling back to the configured list.
    pub fn apply_models(&mut self, result: ApiResult<ModelCatalog>) {
        self.models_loading = false;
        match result {
            ApiResult::Success(catalog) if !catalog.models.is_empty() => {
                self.available_models = catalog.keys();
            }
            ApiResult::Success(_) => {}
            ApiResult::Failure(message) => {
                warn!(%message, "model list unavailable, using configured models");
                self.available_models = self.config.known_models();
            }
        }
        self.select_current(true);
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.settings.model = model.clone();
                self.popup = None;
                info!(model = %self.settings.model, "model selected");
                // Save to config
                if let Err(err) = Config::save_default_model(&self.settings.model) {
                    warn!(error = %err, "could not save default model");
                }
            }
        }
    }

    // Mode picker
    pub fn open_mode_picker(&mut self) {
        self.select_current(false);
        self.popup = Some(Popup::ModePicker);
    }

    pub fn mode_picker_nav_down(&mut self) {
        let len = self.available_modes.len();
        if len > 0 {
            let i = self.mode_picker_state.selected().unwrap_or(0);
            self.mode_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn mode_picker_nav_up(&mut self) {
        let i = self.mode_picker_state.selected().unwrap_or(0);
        self.mode_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_mode(&mut self) {
        if let Some(i) = self.mode_picker_state.selected() {
            if let Some(mode) = self.available_modes.get(i) {
                self.settings.mode = mode.clone();
                self.popup = None;
            }
        }
    }

    fn select_current(&mut self, models: bool) {
        let (items, current, state) = if models {
            (&self.available_models, &self.settings.model, &mut self.model_picker_state)
        } else {
            (&self.available_modes, &self.settings.mode, &mut self.mode_picker_state)
        };
        let index = items.iter().position(|m| m == current).unwrap_or(0);
        state.select((!items.is_empty()).then_some(index));
    }

    // Context editor
    pub fn open_context_editor(&mut self) {
        self.popup = Some(Popup::Context(self.context.clone()));
    }

    pub fn save_context(&mut self) {
        if let Some(Popup::Context(text)) = self.popup.take() {
            self.context = text;
        }
    }

    /// Tick animation frame and drop expired alerts (called by Tick event)
    pub fn tick(&mut self) {
        if self.state.transcript.pending() > 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.state.expire_alerts(std::time::Instant::now());
    }

    /// Esc closes the open popup first, then the newest alert.
    pub fn dismiss(&mut self) {
        if self.popup.take().is_none() {
            self.state.alerts.dismiss_newest();
        }
    }

    pub fn copy_last_reply(&mut self) {
        let Some(text) = self.state.transcript.last_assistant().map(|m| m.body.clone()) else {
            self.state
                .show_transient_alert("No hay respuestas para copiar", Severity::Info);
            return;
        };

        match copy_to_clipboard(&text) {
            Ok(()) => {
                self.state
                    .show_transient_alert("Respuesta copiada al portapapeles", Severity::Success);
            }
            Err(err) => {
                warn!(error = %err, "clipboard copy failed");
                self.state
                    .show_transient_alert("No se pudo copiar al portapapeles", Severity::Danger);
            }
        }
    }

    pub fn export_transcript(&mut self) {
        self.export_transcript_to(Path::new(EXPORT_FILE));
    }

    pub fn export_transcript_to(&mut self, path: &Path) {
        if self.state.transcript.messages().next().is_none() {
            self.state
                .show_transient_alert("No hay mensajes para exportar", Severity::Info);
            return;
        }

        let page = self.state.transcript.to_html_document("Conversación");
        match std::fs::write(path, page) {
            Ok(()) => {
                info!(path = %path.display(), "transcript exported");
                self.state.show_transient_alert(
                    &format!("Conversación exportada a {}", path.display()),
                    Severity::Success,
                );
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "export failed");
                self.state
                    .show_transient_alert("No se pudo exportar la conversación", Severity::Danger);
            }
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Pipe `text` into the first clipboard tool that accepts it.
fn copy_to_clipboard(text: &str) -> Result<()> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let candidates: [(&str, &[&str]); 4] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("clip.exe", &[]),
    ];

    for (program, args) in candidates {
        let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        if child.wait()?.success() {
            return Ok(());
        }
    }

    anyhow::bail!("no clipboard tool available")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chatdesk_core::api::{HealthStatus, ModelCatalog, UploadRequest};
    use chatdesk_core::{ApiResult, Backend, ChatReply, ChatRequest, Config, UploadReply};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::App;
    use crate::tui::AppEvent;

    /// Every call fails; tests read the result off the event channel.
    pub struct NoBackend;

    #[async_trait::async_trait]
    impl Backend for NoBackend {
        async fn check_health(&self) -> ApiResult<HealthStatus> {
            ApiResult::Failure("offline".to_string())
        }
        async fn send_chat(&self, _: &ChatRequest) -> ApiResult<ChatReply> {
            ApiResult::Failure("offline".to_string())
        }
        async fn send_upload(&self, _: UploadRequest) -> ApiResult<UploadReply> {
            ApiResult::Failure("offline".to_string())
        }
        async fn list_models(&self) -> ApiResult<ModelCatalog> {
            ApiResult::Failure("offline".to_string())
        }
    }

    pub fn app(width: u16) -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (App::new(Config::new(), Arc::new(NoBackend), tx, width), rx)
    }
}

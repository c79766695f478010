//! UI-agnostic session state
//!
//! Everything the view shows lives here as plain data, so the request
//! lifecycle can be driven and inspected without a terminal.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::composer::Composer;
use crate::render;

/// How long an alert stays up unless dismissed first.
pub const ALERT_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_SIDEBAR_BREAKPOINT: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub model: Option<String>,
    pub mode: Option<String>,
    pub perspectives: Option<u32>,
    pub tokens: Option<u64>,
    pub is_error: bool,
    pub is_file: bool,
}

/// A transcript message. `body` is the raw text, `html` its escaped
/// rendering; both are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub role: Role,
    pub body: String,
    pub html: String,
    pub metadata: Option<MessageMeta>,
}

impl DisplayMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            body: text.to_string(),
            html: render::user_html(text),
            metadata: None,
        }
    }

    pub fn assistant(text: &str, metadata: Option<MessageMeta>) -> Self {
        Self {
            role: Role::Assistant,
            body: text.to_string(),
            html: render::assistant_html(text),
            metadata,
        }
    }

    /// For bodies whose markup is assembled piecewise rather than derived
    /// from the whole text.
    pub fn assistant_with_html(text: &str, html: String, metadata: Option<MessageMeta>) -> Self {
        Self {
            role: Role::Assistant,
            body: text.to_string(),
            html,
            metadata,
        }
    }

    pub fn is_error(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_error)
    }

    /// Upload summaries carry file content, which never gets bold markup.
    pub fn is_file(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_file)
    }

    pub fn meta_line(&self) -> Option<String> {
        self.metadata.as_ref().and_then(render::meta_line)
    }

    pub fn to_html(&self) -> String {
        let role = match self.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let error = if self.is_error() { " error" } else { "" };
        let mut html = format!(
            "<div class=\"message {role}{error}\"><div class=\"message-content\">{}</div>",
            self.html
        );
        if let Some(meta) = self.meta_line() {
            html.push_str(&format!(
                "<div class=\"message-meta\">{}</div>",
                render::escape_html(&meta)
            ));
        }
        html.push_str("</div>");
        html
    }
}

/// Identifies one dispatched request and its loading placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Message(DisplayMessage),
    Loading { id: RequestToken, label: String },
}

/// Append-only list of what the user sees. Placeholders are the only
/// entries ever removed, and only by id.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &DisplayMessage> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Message(m) => Some(m),
            TranscriptEntry::Loading { .. } => None,
        })
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Loading { .. }))
            .count()
    }

    pub fn last_assistant(&self) -> Option<&DisplayMessage> {
        self.messages().filter(|m| m.role == Role::Assistant).last()
    }

    pub fn push(&mut self, message: DisplayMessage) {
        self.entries.push(TranscriptEntry::Message(message));
    }

    fn push_loading(&mut self, id: RequestToken, label: &str) {
        self.entries.push(TranscriptEntry::Loading {
            id,
            label: label.to_string(),
        });
    }

    /// Swap the placeholder `id` for `message`. Returns `false`, and appends
    /// nothing, when the placeholder is already gone.
    fn resolve(&mut self, id: RequestToken, message: DisplayMessage) -> bool {
        let position = self
            .entries
            .iter()
            .position(|e| matches!(e, TranscriptEntry::Loading { id: pid, .. } if *pid == id));

        match position {
            Some(index) => {
                self.entries.remove(index);
                self.entries.push(TranscriptEntry::Message(message));
                true
            }
            None => false,
        }
    }

    /// Standalone page with every message; pending placeholders are skipped.
    pub fn to_html_document(&self, title: &str) -> String {
        let title = render::escape_html(title);
        let mut body = String::new();
        for message in self.messages() {
            body.push_str(&message.to_html());
            body.push('\n');
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body{{font-family:sans-serif;max-width:48rem;margin:2rem auto;line-height:1.5}}
.message{{padding:.75rem 1rem;margin:.5rem 0;border-radius:.5rem}}
.message.user{{background:#e8f0fe;margin-left:20%}}
.message.assistant{{background:#f1f3f4;margin-right:20%}}
.message.error{{background:#fce8e6}}
.message-meta{{font-size:.8rem;color:#5f6368;margin-top:.25rem}}
</style>
</head>
<body>
<h1>{title}</h1>
{body}</body>
</html>
"#
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId(u64);

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: AlertId,
    pub message: String,
    pub severity: Severity,
    pub shown_at: Instant,
}

#[derive(Debug, Default)]
pub struct Alerts {
    items: Vec<Alert>,
    next_id: u64,
}

impl Alerts {
    pub fn show(&mut self, message: &str, severity: Severity, now: Instant) -> AlertId {
        self.next_id += 1;
        let id = AlertId(self.next_id);
        // Newest first, like banners inserted at the top of the page.
        self.items.insert(
            0,
            Alert {
                id,
                message: message.to_string(),
                severity,
                shown_at: now,
            },
        );
        id
    }

    pub fn dismiss(&mut self, id: AlertId) -> bool {
        let before = self.items.len();
        self.items.retain(|a| a.id != id);
        self.items.len() != before
    }

    pub fn dismiss_newest(&mut self) -> bool {
        match self.items.first().map(|a| a.id) {
            Some(id) => self.dismiss(id),
            None => false,
        }
    }

    pub fn expire(&mut self, now: Instant) {
        self.items
            .retain(|a| now.saturating_duration_since(a.shown_at) < ALERT_TTL);
    }

    pub fn items(&self) -> &[Alert] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Sidebar {
    open: bool,
    breakpoint: u16,
    wide: bool,
}

impl Sidebar {
    pub fn new(breakpoint: u16) -> Self {
        Self {
            open: false,
            breakpoint,
            wide: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Below the breakpoint an open sidebar floats over the transcript.
    pub fn is_overlay(&self) -> bool {
        self.open && !self.wide
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Resizing always wins over whatever the user toggled before.
    pub fn on_resize(&mut self, width: u16) {
        self.wide = width >= self.breakpoint;
        self.open = self.wide;
    }
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new(DEFAULT_SIDEBAR_BREAKPOINT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HealthIndicator {
    #[default]
    Checking,
    Healthy,
    Unavailable(String),
}

/// Which user action a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Chat,
    Upload,
    Health,
}

#[derive(Debug)]
pub struct UiState {
    pub transcript: Transcript,
    pub alerts: Alerts,
    pub sidebar: Sidebar,
    pub composer: Composer,
    pub health: HealthIndicator,
    /// When set, the view follows the newest transcript entry.
    pub pinned_to_bottom: bool,
    pub scroll: u16,
    in_flight: Vec<(Action, RequestToken)>,
    next_token: u64,
}

impl UiState {
    pub fn new(sidebar_breakpoint: u16, composer_max_rows: u16) -> Self {
        Self {
            transcript: Transcript::default(),
            alerts: Alerts::default(),
            sidebar: Sidebar::new(sidebar_breakpoint),
            composer: Composer::new(composer_max_rows),
            health: HealthIndicator::default(),
            pinned_to_bottom: true,
            scroll: 0,
            in_flight: Vec::new(),
            next_token: 0,
        }
    }

    pub fn next_token(&mut self) -> RequestToken {
        self.next_token += 1;
        RequestToken(self.next_token)
    }

    /// An action's control is disabled while its own request is in flight.
    pub fn is_busy(&self, action: Action) -> bool {
        self.in_flight.iter().any(|(a, _)| *a == action)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn mark_in_flight(&mut self, action: Action, token: RequestToken) {
        self.in_flight.push((action, token));
    }

    pub(crate) fn clear_in_flight(&mut self, token: RequestToken) {
        self.in_flight.retain(|(_, t)| *t != token);
    }

    pub fn render_loading(&mut self, label: &str) -> RequestToken {
        let id = self.next_token();
        self.transcript.push_loading(id, label);
        self.scroll_to_bottom();
        id
    }

    pub fn resolve_loading(&mut self, id: RequestToken, message: DisplayMessage) -> bool {
        let resolved = self.transcript.resolve(id, message);
        if resolved {
            self.scroll_to_bottom();
        }
        resolved
    }

    pub fn render_user_message(&mut self, text: &str) {
        self.transcript.push(DisplayMessage::user(text));
        self.scroll_to_bottom();
    }

    pub fn render_assistant_message(&mut self, text: &str, metadata: Option<MessageMeta>) {
        self.transcript.push(DisplayMessage::assistant(text, metadata));
        self.scroll_to_bottom();
    }

    pub fn show_transient_alert(&mut self, message: &str, severity: Severity) -> AlertId {
        self.alerts.show(message, severity, Instant::now())
    }

    pub fn dismiss_alert(&mut self, id: AlertId) -> bool {
        self.alerts.dismiss(id)
    }

    pub fn expire_alerts(&mut self, now: Instant) {
        self.alerts.expire(now);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.pinned_to_bottom = true;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.pinned_to_bottom = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// `max_scroll` is only known at draw time; reaching it re-pins the view.
    pub fn scroll_down(&mut self, lines: u16, max_scroll: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(max_scroll);
        if self.scroll >= max_scroll {
            self.pinned_to_bottom = true;
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(DEFAULT_SIDEBAR_BREAKPOINT, crate::composer::DEFAULT_MAX_ROWS)
    }
}

//! Text → markup transformations for transcript entries.
//!
//! All user and server text is escaped before it is placed in the view. The
//! single markup form reinterpreted afterwards is the `**bold**` span on
//! assistant messages.

use regex::Regex;
use std::sync::OnceLock;

use crate::api::{ChatReply, UploadReply};
use crate::state::{DisplayMessage, MessageMeta, Role};

/// Shown in place of a reply when a dispatch fails.
pub const APOLOGY: &str =
    "Lo siento, ocurrió un error al procesar tu solicitud. Por favor, inténtalo de nuevo.";
pub const THINKING: &str = "Pensando";
pub const PROCESSING_FILE: &str = "Procesando archivo";

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

/// `&`, `<` and `>` become entities; everything else passes through.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br>")
}

/// User input gets no markup interpretation at all.
pub fn user_html(text: &str) -> String {
    line_breaks(&escape_html(text))
}

/// Escape, then `**bold**` → `<strong>`, then newlines → `<br>`.
pub fn assistant_html(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = bold_pattern().replace_all(&escaped, "<strong>$1</strong>");
    line_breaks(&bolded)
}

/// `Modelo: X | Modo: Y | Perspectivas: N | Tokens: N`, or `None` when there
/// is nothing to show or the message is an error.
pub fn meta_line(meta: &MessageMeta) -> Option<String> {
    if meta.is_error {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(model) = &meta.model {
        parts.push(format!("Modelo: {}", model));
    }
    if let Some(mode) = &meta.mode {
        parts.push(format!("Modo: {}", mode));
    }
    if let Some(perspectives) = meta.perspectives {
        parts.push(format!("Perspectivas: {}", perspectives));
    }
    if let Some(tokens) = meta.tokens {
        parts.push(format!("Tokens: {}", tokens));
    }

    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// `0 Bytes`, `512 Bytes`, `1.5 KB`, `10 MB`; at most two decimals, trailing
/// zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// `1234567` → `1,234,567`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn chat_reply_message(reply: &ChatReply) -> DisplayMessage {
    let meta = MessageMeta {
        model: reply.model.clone(),
        mode: reply.mode.clone(),
        perspectives: reply.perspectives,
        tokens: reply.total_tokens,
        ..MessageMeta::default()
    };
    DisplayMessage::assistant(&reply.response, Some(meta))
}

/// Plain-text body for a processed upload. Every value comes from the
/// server or the document itself, so none of it is read as markup.
pub fn upload_summary(reply: &UploadReply) -> String {
    let info = &reply.file_info;
    let mut body = format!(
        "Archivo procesado: {}\nTamaño: {}\nTipo: {}\nPalabras: {}",
        info.filename,
        format_file_size(info.size),
        info.file_type.to_uppercase(),
        format_thousands(info.word_count),
    );

    if let Some(preview) = &reply.content_preview {
        body.push_str("\n\nVista previa:\n");
        body.push_str(preview);
    }

    if let Some(analysis) = &reply.ai_analysis {
        body.push_str("\n\nAnálisis IA");
        if let Some(question) = analysis.question.as_deref().filter(|q| !q.is_empty()) {
            body.push_str(&format!(" ({})", question));
        }
        body.push_str(":\n");
        body.push_str(&analysis.response);
    }

    body
}

/// Same content as [`upload_summary`]; only the fixed labels are bold.
pub fn upload_html(reply: &UploadReply) -> String {
    let info = &reply.file_info;
    let mut html = format!(
        "<strong>Archivo procesado:</strong> {}<br><strong>Tamaño:</strong> {}<br>\
         <strong>Tipo:</strong> {}<br><strong>Palabras:</strong> {}",
        escape_html(&info.filename),
        format_file_size(info.size),
        escape_html(&info.file_type.to_uppercase()),
        format_thousands(info.word_count),
    );

    if let Some(preview) = &reply.content_preview {
        html.push_str("<br><br><strong>Vista previa:</strong><br>");
        html.push_str(&user_html(preview));
    }

    if let Some(analysis) = &reply.ai_analysis {
        html.push_str("<br><br><strong>Análisis IA</strong>");
        if let Some(question) = analysis.question.as_deref().filter(|q| !q.is_empty()) {
            html.push_str(&format!(" ({})", escape_html(question)));
        }
        html.push_str(":<br>");
        html.push_str(&user_html(&analysis.response));
    }

    html
}

pub fn upload_reply_message(reply: &UploadReply) -> DisplayMessage {
    let meta = MessageMeta {
        model: reply.ai_analysis.as_ref().and_then(|a| a.model.clone()),
        is_file: true,
        ..MessageMeta::default()
    };
    DisplayMessage::assistant_with_html(&upload_summary(reply), upload_html(reply), Some(meta))
}

pub fn error_message() -> DisplayMessage {
    let meta = MessageMeta {
        is_error: true,
        ..MessageMeta::default()
    };
    DisplayMessage::assistant(APOLOGY, Some(meta))
}

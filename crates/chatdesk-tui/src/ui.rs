use chatdesk_core::{DisplayMessage, HealthIndicator, Role, Severity, TranscriptEntry};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::{App, Popup, UploadField, UploadForm};

const SIDEBAR_WIDTH: u16 = 32;
const MAX_VISIBLE_ALERTS: usize = 3;

/// Split markdown-style `**bold**` runs into styled spans. An unclosed
/// marker is kept as literal text.
fn parse_markdown_line(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                current_text.push_str("**");
                current_text.push_str(&bold_text);
                if found_close {
                    current_text.push_str("**");
                }
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }
    spans
}

/// Word-wrap styled spans to `width` columns. Words longer than a line are
/// split so nothing is cut off.
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_len = 0;

    for span in spans {
        let style = span.style;
        for word in span.content.split_inclusive(' ') {
            let mut word: String = word.to_string();
            loop {
                let visible = word.trim_end().chars().count();
                if current_len > 0 && current_len + visible > width {
                    lines.push(Line::from(std::mem::take(&mut current)));
                    current_len = 0;
                }
                let len = word.chars().count();
                if current_len == 0 && visible > width {
                    let split = word
                        .char_indices()
                        .nth(width)
                        .map(|(i, _)| i)
                        .unwrap_or(word.len());
                    let rest = word.split_off(split);
                    current.push(Span::styled(word, style));
                    lines.push(Line::from(std::mem::take(&mut current)));
                    word = rest;
                    continue;
                }
                current_len += len;
                current.push(Span::styled(word, style));
                break;
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn message_lines(message: &DisplayMessage, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, color) = match message.role {
        Role::User => ("Tú", Color::Cyan),
        Role::Assistant if message.is_error() => ("Asistente", Color::Red),
        Role::Assistant => ("Asistente", Color::Green),
    };
    lines.push(Line::from(Span::styled(
        format!("{}:", label),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));

    let body_style = if message.is_error() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    for raw in message.body.lines() {
        // User text and file content are shown verbatim; only replies get bold markup
        let spans = match message.role {
            Role::Assistant if !message.is_file() => parse_markdown_line(raw),
            _ => vec![Span::raw(raw.to_string())],
        };
        let spans = spans
            .into_iter()
            .map(|s| s.patch_style(body_style))
            .collect();
        lines.extend(wrap_spans(spans, width));
    }

    if let Some(meta) = message.meta_line() {
        lines.push(Line::from(Span::styled(
            meta,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}

fn transcript_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for entry in app.state.transcript.entries() {
        match entry {
            TranscriptEntry::Message(message) => lines.extend(message_lines(message, width)),
            TranscriptEntry::Loading { label, .. } => {
                let dots = ".".repeat(app.animation_frame as usize + 1);
                lines.push(Line::from(Span::styled(
                    "Asistente:",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    format!("{}{}", label, dots),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let docked = app.state.sidebar.is_open() && !app.state.sidebar.is_overlay();
    let (sidebar_area, main_area) = if docked {
        let [side, main] = Layout::horizontal([
            Constraint::Length(SIDEBAR_WIDTH.min(body_area.width / 2)),
            Constraint::Min(0),
        ])
        .areas(body_area);
        (Some(side), main)
    } else {
        (None, body_area)
    };

    render_main(app, frame, main_area);

    if let Some(side) = sidebar_area {
        render_sidebar(app, frame, side);
        app.sidebar_area = Some(side);
    } else if app.state.sidebar.is_overlay() {
        // Floats over the transcript on narrow terminals
        let side = Rect::new(
            body_area.x,
            body_area.y,
            SIDEBAR_WIDTH.min(body_area.width),
            body_area.height,
        );
        frame.render_widget(Clear, side);
        render_sidebar(app, frame, side);
        app.sidebar_area = Some(side);
    } else {
        app.sidebar_area = None;
    }

    render_footer(app, frame, footer_area);

    match app.popup.clone() {
        Some(Popup::Upload(form)) => render_upload_dialog(app, &form, frame, area),
        Some(Popup::ModelPicker) => render_model_picker(app, frame, area),
        Some(Popup::ModePicker) => render_mode_picker(app, frame, area),
        Some(Popup::Context(text)) => render_context_editor(&text, frame, area),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status, status_style) = match &app.state.health {
        HealthIndicator::Checking => ("● Comprobando".to_string(), Style::default().fg(Color::Yellow)),
        HealthIndicator::Healthy => ("● Conectado".to_string(), Style::default().fg(Color::Green)),
        HealthIndicator::Unavailable(message) => {
            (format!("● {}", message), Style::default().fg(Color::Red))
        }
    };

    let title = Line::from(vec![
        Span::styled(" Chatdesk ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(status, status_style.bold()),
        Span::raw("  "),
        Span::styled(
            format!("{} · {}", app.settings.model, app.settings.mode),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Sesión ");

    let label = Style::default().fg(Color::DarkGray);
    let context = if app.context.trim().is_empty() {
        "(ninguno)".to_string()
    } else {
        app.context.trim().to_string()
    };

    let mut lines = vec![
        Line::from(Span::styled("API", label)),
        Line::from(app.config.api_url().to_string()),
        Line::default(),
        Line::from(Span::styled("Modelo", label)),
        Line::from(app.settings.model.clone()),
        Line::default(),
        Line::from(Span::styled("Modo", label)),
        Line::from(app.settings.mode.clone()),
        Line::default(),
        Line::from(Span::styled("Contexto", label)),
        Line::from(context),
        Line::default(),
        Line::from(Span::styled("Atajos", label)),
    ];
    for (key, action) in [
        ("Enter", "enviar"),
        ("S-Enter", "nueva línea"),
        ("^U", "subir archivo"),
        ("^O", "modelo"),
        ("^T", "modo"),
        ("^X", "contexto"),
        ("^Y", "copiar respuesta"),
        ("^S", "exportar HTML"),
        ("^R", "comprobar API"),
        ("^/", "panel"),
        ("^C", "salir"),
    ] {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<8}", key), Style::default().fg(Color::Yellow)),
            Span::raw(action),
        ]));
    }

    let sidebar = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(sidebar, area);
}

fn render_main(app: &mut App, frame: &mut Frame, area: Rect) {
    let alerts = app.state.alerts.items().len().min(MAX_VISIBLE_ALERTS) as u16;
    let composer_height = app.state.composer.height() + 2;

    let [transcript_area, alerts_area, composer_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(alerts),
        Constraint::Length(composer_height),
    ])
    .areas(area);

    render_transcript(app, frame, transcript_area);
    render_alerts(app, frame, alerts_area);
    render_composer(app, frame, composer_area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversación ");
    let inner = block.inner(area);
    app.transcript_area = Some(area);

    let lines = if app.state.transcript.is_empty() {
        vec![Line::from(Span::styled(
            "Escribe un mensaje o arrastra un archivo PDF/TXT para empezar.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        transcript_lines(app, inner.width as usize)
    };

    let total = lines.len().min(u16::MAX as usize) as u16;
    app.max_scroll = total.saturating_sub(inner.height);
    if app.state.pinned_to_bottom || app.state.scroll > app.max_scroll {
        app.state.scroll = app.max_scroll;
    }

    let transcript = Paragraph::new(lines)
        .block(block)
        .scroll((app.state.scroll, 0));
    frame.render_widget(transcript, area);
}

fn render_alerts(app: &App, frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }

    let lines: Vec<Line> = app
        .state
        .alerts
        .items()
        .iter()
        .take(MAX_VISIBLE_ALERTS)
        .map(|alert| {
            let style = match alert.severity {
                Severity::Info => Style::default().bg(Color::Blue).fg(Color::White),
                Severity::Success => Style::default().bg(Color::Green).fg(Color::Black),
                Severity::Warning => Style::default().bg(Color::Yellow).fg(Color::Black),
                Severity::Danger => Style::default().bg(Color::Red).fg(Color::White),
            };
            Line::from(vec![
                Span::styled(format!(" {} ", alert.message), style),
                Span::styled(" Esc ", Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.state.is_busy(chatdesk_core::Action::Chat);
    let (title, border) = if busy {
        (" Esperando respuesta... ", Color::DarkGray)
    } else {
        (" Mensaje ", Color::Yellow)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title);
    let inner = block.inner(area);

    let composer = &app.state.composer;
    let input = Paragraph::new(composer.text().to_string())
        .block(block)
        .scroll((composer.scroll(), 0));
    frame.render_widget(input, area);

    if app.popup.is_none() {
        let (row, col) = composer.cursor_position();
        let y = inner.y + row.saturating_sub(composer.scroll());
        let x = inner.x + col.min(inner.width.saturating_sub(1));
        frame.set_cursor_position((x, y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: &[(&str, &str)] = match app.popup {
        Some(Popup::Upload(_)) => &[
            ("Tab", "campo"),
            ("Espacio", "IA sí/no"),
            ("Enter", "subir"),
            ("Esc", "cancelar"),
        ],
        Some(Popup::ModelPicker) | Some(Popup::ModePicker) => {
            &[("j/k", "mover"), ("Enter", "elegir"), ("Esc", "cancelar")]
        }
        Some(Popup::Context(_)) => &[("Enter", "guardar"), ("Esc", "cancelar")],
        None => &[
            ("Enter", "enviar"),
            ("S-Enter", "línea"),
            ("^U", "archivo"),
            ("^O", "modelo"),
            ("^/", "panel"),
            ("^C", "salir"),
        ],
    };

    let mut spans = vec![Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White))];
    for (key, label) in hints {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_upload_dialog(app: &App, form: &UploadForm, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 64, 10);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Subir archivo (PDF o TXT, máx. 10MB) ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let focused = |field: UploadField| {
        if form.field == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let checkbox = if form.process_with_ai { "[x]" } else { "[ ]" };

    let mut lines = vec![
        Line::from(Span::styled("Ruta", focused(UploadField::Path))),
        Line::from(form.path.clone()),
        Line::default(),
        Line::from(vec![
            Span::styled(format!("{} ", checkbox), focused(UploadField::ProcessWithAi)),
            Span::raw(format!("Procesar con IA ({})", app.settings.model)),
        ]),
    ];
    if form.process_with_ai {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Pregunta (opcional)",
            focused(UploadField::Question),
        )));
        lines.push(Line::from(form.question.clone()));
    }
    frame.render_widget(Paragraph::new(lines), inner);

    let cursor = match form.field {
        UploadField::Path => Some((form.path.chars().count() as u16, 1)),
        UploadField::Question => Some((form.question.chars().count() as u16, 6)),
        UploadField::ProcessWithAi => None,
    };
    if let Some((col, row)) = cursor {
        if row < inner.height {
            let x = inner.x + col.min(inner.width.saturating_sub(1));
            frame.set_cursor_position((x, inner.y + row));
        }
    }
}

fn render_picker(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    items: &[String],
    current: &str,
    state: &mut ListState,
) {
    let popup_area = centered(area, 40, items.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title.to_string());

    let items: Vec<ListItem> = items
        .iter()
        .map(|item| {
            let style = if item == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", item)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, state);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = if app.models_loading {
        " Modelo (cargando...) "
    } else {
        " Modelo (Enter elige, Esc cancela) "
    };
    render_picker(
        frame,
        area,
        title,
        &app.available_models,
        &app.settings.model,
        &mut app.model_picker_state,
    );
}

fn render_mode_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    render_picker(
        frame,
        area,
        " Modo (Enter elige, Esc cancela) ",
        &app.available_modes,
        &app.settings.mode,
        &mut app.mode_picker_state,
    );
}

fn render_context_editor(text: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 64, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Contexto adicional ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Se envía con cada mensaje. Enter guarda, Esc cancela.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, inner.height.saturating_sub(2));
    frame.render_widget(
        Paragraph::new(text.to_string())
            .style(Style::default().fg(Color::Cyan))
            .wrap(Wrap { trim: false }),
        input_area,
    );
}

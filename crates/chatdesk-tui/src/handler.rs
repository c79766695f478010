use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, Popup, UploadField};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(width, _) => app.state.sidebar.on_resize(width),
        AppEvent::Tick => app.tick(),
        AppEvent::Health(token, result) => app.state.finish_health(token, result),
        AppEvent::Chat(token, result) => {
            app.state.finish_chat(token, result);
        }
        AppEvent::Upload(token, result) => {
            app.state.finish_upload(token, result);
        }
        AppEvent::Models(result) => app.apply_models(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work everywhere
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
            app.should_quit = true;
            return;
        }
        // Terminals without keyboard enhancement report Ctrl+/ as Ctrl+7
        KeyCode::Char('/') | KeyCode::Char('7') if ctrl => {
            app.state.sidebar.toggle();
            return;
        }
        // Ctrl+Enter sends from any focus; legacy terminals report it as Ctrl+J
        KeyCode::Enter | KeyCode::Char('j') if ctrl => {
            if matches!(app.popup, Some(Popup::Context(_))) {
                app.save_context();
            }
            app.submit_chat();
            return;
        }
        KeyCode::Esc => {
            app.dismiss();
            return;
        }
        _ => {}
    }

    match app.popup {
        Some(Popup::Upload(_)) => handle_upload_dialog(app, key),
        Some(Popup::ModelPicker) => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
            KeyCode::Enter => app.select_model(),
            _ => {}
        },
        Some(Popup::ModePicker) => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.mode_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.mode_picker_nav_up(),
            KeyCode::Enter => app.select_mode(),
            _ => {}
        },
        Some(Popup::Context(_)) => handle_context_editor(app, key),
        None => handle_composer(app, key),
    }
}

fn handle_composer(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let composer = &mut app.state.composer;

    match key.code {
        // Shift+Enter / Alt+Enter add a line; plain Enter sends
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            composer.insert_newline();
        }
        KeyCode::Enter => app.submit_chat(),

        KeyCode::Char('u') if ctrl => app.open_upload_dialog(),
        KeyCode::Char('o') if ctrl => app.open_model_picker(),
        KeyCode::Char('t') if ctrl => app.open_mode_picker(),
        KeyCode::Char('x') if ctrl => app.open_context_editor(),
        KeyCode::Char('y') if ctrl => app.copy_last_reply(),
        KeyCode::Char('s') if ctrl => app.export_transcript(),
        KeyCode::Char('r') if ctrl => app.request_health(),
        KeyCode::Char(_) if ctrl => {}

        KeyCode::Char(c) => composer.insert_char(c),
        KeyCode::Backspace => composer.backspace(),
        KeyCode::Delete => composer.delete(),
        KeyCode::Left => composer.move_left(),
        KeyCode::Right => composer.move_right(),
        KeyCode::Home => composer.move_home(),
        KeyCode::End => composer.move_end(),

        KeyCode::PageUp => app.state.scroll_up(page(app.transcript_area)),
        KeyCode::PageDown => {
            let max = app.max_scroll;
            app.state.scroll_down(page(app.transcript_area), max);
        }
        _ => {}
    }
}

fn handle_upload_dialog(app: &mut App, key: KeyEvent) {
    let Some(Popup::Upload(form)) = app.popup.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::Enter => app.submit_upload_dialog(),
        KeyCode::Char(' ') if form.field == UploadField::ProcessWithAi => {
            form.process_with_ai = !form.process_with_ai;
            if !form.process_with_ai {
                form.question.clear();
            }
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(text) = form.focused_text() {
                text.push(c);
            }
        }
        KeyCode::Backspace => {
            if let Some(text) = form.focused_text() {
                text.pop();
            }
        }
        _ => {}
    }
}

fn handle_context_editor(app: &mut App, key: KeyEvent) {
    let Some(Popup::Context(text)) = app.popup.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Enter => app.save_context(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => text.push(c),
        KeyCode::Backspace => {
            text.pop();
        }
        _ => {}
    }
}

/// A paste of existing file paths is a drop; anything else is typed text.
fn handle_paste(app: &mut App, text: &str) {
    match app.popup.as_mut() {
        Some(Popup::Upload(form)) => {
            if let Some(field) = form.focused_text() {
                field.push_str(text.trim_end_matches(['\r', '\n']));
            }
            return;
        }
        Some(Popup::Context(context)) => {
            context.push_str(text);
            return;
        }
        Some(_) => return,
        None => {}
    }

    let paths = dropped_paths(text);
    if paths.is_empty() {
        app.state.composer.insert_str(&text.replace("\r\n", "\n"));
    } else {
        app.handle_drop(&paths);
    }
}

/// Paths a terminal inserts when files are dragged onto it, one per line or
/// space separated with shell quoting. Empty unless every token names an
/// existing file.
pub fn dropped_paths(text: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for token in split_shell_words(text) {
        let token = token.strip_prefix("file://").unwrap_or(token.as_str()).to_string();
        let path = PathBuf::from(token);
        if !path.is_file() {
            return Vec::new();
        }
        paths.push(path);
    }
    paths
}

fn split_shell_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn page(area: Option<Rect>) -> u16 {
    area.map(|r| r.height.saturating_sub(2)).unwrap_or(10).max(1)
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_sidebar = app
        .sidebar_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_transcript && !in_sidebar => {
            let max = app.max_scroll;
            app.state.scroll_down(3, max);
        }
        MouseEventKind::ScrollUp if in_transcript && !in_sidebar => app.state.scroll_up(3),
        // Clicking anywhere outside a floating sidebar closes it
        MouseEventKind::Down(MouseButton::Left) if app.state.sidebar.is_overlay() && !in_sidebar => {
            app.state.sidebar.close();
        }
        _ => {}
    }
}

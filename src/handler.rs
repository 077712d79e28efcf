use anyhow::{anyhow, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::conversation::ChatMode;
use crate::media;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Reply(result) => {
            app.chat.complete(result);
            app.scroll_to_bottom();
        }
        AppEvent::ModelsLoaded(result) => {
            if let Err(e) = &result {
                tracing::warn!("image model list unavailable: {}", e);
            }
            app.chat.models_loaded(result);
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Tab => app.toggle_mode(),
        KeyCode::Char('t') => app.set_mode(ChatMode::Text),
        KeyCode::Char('g') => app.set_mode(ChatMode::Image),
        KeyCode::Char('m') => app.open_model_picker(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2)
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height),
        KeyCode::PageUp => app.scroll_up(app.chat_height),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Char('y') => copy_last_reply(app),
        KeyCode::Char('s') => save_last_image(app),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Tab => app.toggle_mode(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn copy_last_reply(app: &mut App) {
    let Some(text) = app
        .chat
        .conversation()
        .last_assistant()
        .map(|m| m.content.clone())
    else {
        app.chat.notify("Nothing to copy yet");
        return;
    };

    match copy_to_clipboard(&text) {
        Ok(()) => app.chat.notify("Copied reply to clipboard"),
        Err(e) => {
            tracing::warn!("clipboard copy failed: {}", e);
            app.chat.notify("Clipboard unavailable");
        }
    }
}

fn save_last_image(app: &mut App) {
    let Some(data_uri) = app
        .chat
        .conversation()
        .last_image()
        .and_then(|m| m.image.clone())
    else {
        app.chat.notify("No image to save");
        return;
    };

    match media::save_image(&data_uri, &app.config.download_dir()) {
        Ok(path) => {
            tracing::info!("saved image to {}", path.display());
            app.chat.notify(format!("Saved {}", path.display()));
        }
        Err(e) => {
            tracing::error!("saving image failed: {:#}", e);
            app.chat.notify("Could not save image");
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

/// Pipe text into the first clipboard tool that is installed
fn copy_to_clipboard(text: &str) -> Result<()> {
    const TOOLS: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
    ];

    for (program, args) in TOOLS {
        match pipe_to(program, args, text) {
            Ok(true) => return Ok(()),
            Ok(false) => continue,
            Err(e) => tracing::debug!("{} failed: {:#}", program, e),
        }
    }

    Err(anyhow!("no clipboard tool found (tried pbcopy, wl-copy, xclip)"))
}

/// Feed `text` to a program's stdin. `Ok(false)` when the program is not
/// installed or exits unsuccessfully. The child is always waited on, even
/// when writing to it fails.
fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<bool> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let Ok(mut child) = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return Ok(false);
    };

    // Dropping stdin closes the pipe so the child sees EOF before the wait
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::Reply;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut config = Config::new();
        config.backend_url = "http://127.0.0.1:9".to_string();
        App::new(config, tx)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[tokio::test]
    async fn test_editing_handles_multibyte_cursor() {
        let mut app = test_app();
        type_text(&mut app, "naïve");
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "nave");
        assert_eq!(app.input_cursor, 2);

        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Delete);
        assert_eq!(app.input, "ave");
    }

    #[tokio::test]
    async fn test_enter_submits_and_reply_lands() {
        let mut app = test_app();
        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter);
        assert!(app.chat.is_loading());
        assert_eq!(app.chat.conversation().len(), 1);

        handle_event(&mut app, AppEvent::Reply(Ok(Reply::Text("hi".to_string()))));
        assert!(!app.chat.is_loading());
        assert_eq!(app.chat.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_whitespace_enter_is_ignored() {
        let mut app = test_app();
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert!(!app.chat.is_loading());
        assert!(app.chat.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_normal_mode_keys() {
        let mut app = test_app();
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);

        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.chat.mode(), ChatMode::Image);
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.chat.mode(), ChatMode::Text);

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.chat.notice().unwrap().text, "No image to save");

        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 4, 4);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(5, 5, rect));
        assert!(!point_in_rect(6, 5, rect));
        assert!(!point_in_rect(1, 3, rect));
    }

    #[test]
    fn test_pipe_to_missing_program() {
        assert!(!pipe_to("aurelius-no-such-clipboard-tool", &[], "hi").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_pipe_to_reaps_child() {
        assert!(pipe_to("cat", &[], "hello").unwrap());
        assert!(!pipe_to("sh", &["-c", "cat >/dev/null; exit 1"], "hello").unwrap());

        // `true` exits without reading, so a large write may hit a closed
        // pipe; either way the call returns instead of leaving a zombie
        let big = "x".repeat(1 << 20);
        let _ = pipe_to("true", &[], &big);
    }
}

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use pulldown_cmark::{CodeBlockKind, Event as MdEvent, Options, Parser, Tag, TagEnd};
use crate::app::{App, InputMode};
use crate::conversation::{ChatMode, Message, Role};
use crate::media;

const USER_COLOR: Color = Color::Cyan;
const AI_COLOR: Color = Color::Yellow;
const CODE_COLOR: Color = Color::Green;

const HEADING_COLOR: Color = Color::Cyan;

fn flush_line(lines: &mut Vec<Line<'static>>, spans: &mut Vec<Span<'static>>) {
    if !spans.is_empty() {
        lines.push(Line::from(std::mem::take(spans)));
    }
}

/// Blank line between top-level blocks, never two in a row
fn separate_block(lines: &mut Vec<Line<'static>>) {
    if lines.last().is_some_and(|l| l.width() > 0) {
        lines.push(Line::default());
    }
}

/// Render a reply body as markdown: emphasis, inline code, headings, lists
/// and fenced code blocks with a language label.
fn markdown_lines(content: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    // Innermost last; each entry is the next ordinal for ordered lists
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut styles: Vec<Style> = vec![Style::default()];
    let mut code: Option<String> = None;

    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    for event in Parser::new_ext(content, options) {
        let style = styles.last().copied().unwrap_or_default();
        match event {
            MdEvent::Start(Tag::CodeBlock(kind)) => {
                flush_line(&mut lines, &mut spans);
                if lists.is_empty() {
                    separate_block(&mut lines);
                }
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => lang.trim().to_string(),
                    _ => "plaintext".to_string(),
                };
                lines.push(Line::from(Span::styled(
                    format!(" {} ", lang),
                    Style::default().fg(Color::Black).bg(Color::DarkGray),
                )));
                code = Some(String::new());
            }
            MdEvent::End(TagEnd::CodeBlock) => {
                for line in code.take().unwrap_or_default().lines() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", line),
                        Style::default().fg(CODE_COLOR),
                    )));
                }
            }
            MdEvent::Text(text) => match code.as_mut() {
                Some(buf) => buf.push_str(&text),
                None => spans.push(Span::styled(text.into_string(), style)),
            },
            MdEvent::Code(text) => {
                spans.push(Span::styled(text.into_string(), style.fg(CODE_COLOR)));
            }
            MdEvent::Start(Tag::Strong) => styles.push(style.add_modifier(Modifier::BOLD)),
            MdEvent::Start(Tag::Emphasis) => styles.push(style.add_modifier(Modifier::ITALIC)),
            MdEvent::Start(Tag::Strikethrough) => {
                styles.push(style.add_modifier(Modifier::CROSSED_OUT))
            }
            MdEvent::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                if styles.len() > 1 {
                    styles.pop();
                }
            }
            MdEvent::Start(Tag::Paragraph) => {
                if lists.is_empty() {
                    separate_block(&mut lines);
                }
            }
            MdEvent::Start(Tag::Heading { level, .. }) => {
                separate_block(&mut lines);
                let heading = Style::default().fg(HEADING_COLOR).add_modifier(Modifier::BOLD);
                spans.push(Span::styled(format!("{} ", "#".repeat(level as usize)), heading));
                styles.push(heading);
            }
            MdEvent::End(TagEnd::Heading(_)) => {
                if styles.len() > 1 {
                    styles.pop();
                }
                flush_line(&mut lines, &mut spans);
            }
            MdEvent::End(TagEnd::Paragraph | TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead) => {
                flush_line(&mut lines, &mut spans);
            }
            MdEvent::SoftBreak | MdEvent::HardBreak => flush_line(&mut lines, &mut spans),
            MdEvent::Start(Tag::List(first)) => {
                flush_line(&mut lines, &mut spans);
                if lists.is_empty() {
                    separate_block(&mut lines);
                }
                lists.push(first);
            }
            MdEvent::End(TagEnd::List(_)) => {
                lists.pop();
            }
            MdEvent::Start(Tag::Item) => {
                let indent = "  ".repeat(lists.len().saturating_sub(1));
                let marker = match lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                spans.push(Span::styled(marker, Style::default().fg(AI_COLOR)));
            }
            MdEvent::Start(Tag::TableCell) => {
                if !spans.is_empty() {
                    spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
            }
            MdEvent::Rule => {
                separate_block(&mut lines);
                lines.push(Line::from(Span::styled("───", Style::default().fg(Color::DarkGray))));
            }
            _ => {}
        }
    }

    flush_line(&mut lines, &mut spans);
    lines
}

fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let (label, color) = match message.role {
        Role::User => ("You", USER_COLOR),
        Role::Assistant => ("AI", AI_COLOR),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{}:", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}", message.timestamp.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ])];

    match message.role {
        Role::User => lines.extend(message.content.lines().map(|l| Line::from(l.to_string()))),
        Role::Assistant => lines.extend(markdown_lines(&message.content)),
    }

    if let Some(data_uri) = &message.image {
        lines.push(Line::from(vec![
            Span::styled(" ▣ ", Style::default().fg(Color::Black).bg(Color::Magenta)),
            Span::styled(
                format!(" {} ", media::describe(data_uri)),
                Style::default().fg(Color::Magenta),
            ),
            Span::styled("(s to save)", Style::default().fg(Color::DarkGray)),
        ]));
    }

    lines.push(Line::default());
    lines
}

/// Number of terminal rows the lines take once wrapped to `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| {
            // Display width, not byte length, so wide glyphs wrap correctly
            let cols = line.width();
            if cols == 0 { 1 } else { cols.div_ceil(width) }
        })
        .sum::<usize>()
        .min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Aurelius ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(app.backend.base_url().to_string(), Style::default().fg(Color::White)),
        Span::styled(
            format!("  {} messages", app.chat.conversation().len()),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    if app.chat.conversation().is_empty() && !app.chat.is_loading() {
        let inner_height = area.height.saturating_sub(2);
        let mut lines = vec![Line::default(); (inner_height / 2).saturating_sub(2) as usize];
        lines.extend([
            Line::from(Span::styled(" A ", Style::default().fg(Color::Black).bg(Color::White).bold())),
            Line::default(),
            Line::from(Span::styled("How can I help you today?", Style::default().bold())),
            Line::from(Span::styled(
                "Chat or switch to Image mode to generate pictures.",
                Style::default().fg(Color::Gray),
            )),
        ]);
        let greeting = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(greeting, area);
        return;
    }

    let mut lines: Vec<Line> = app
        .chat
        .conversation()
        .messages()
        .iter()
        .flat_map(message_lines)
        .collect();

    if app.chat.is_loading() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(AI_COLOR).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        // Follows the request in flight, not the tab the user is on now
        let verb = match app.chat.pending_mode() {
            Some(ChatMode::Image) => "Painting",
            _ => "Thinking",
        };
        lines.push(Line::from(Span::styled(
            format!("{}{}", verb, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Inner size minus borders
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    app.update_scroll(wrapped_height(&lines, app.chat_width));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn mode_tabs(current: ChatMode) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for mode in [ChatMode::Text, ChatMode::Image] {
        let style = if mode == current {
            Style::default().fg(Color::Black).bg(Color::White).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", mode.label()), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.chat.is_loading();
    let border_color = if loading {
        Color::DarkGray
    } else if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(mode_tabs(app.chat.mode()));

    if app.chat.model_selector_visible() {
        let model = app.chat.image_model().unwrap_or("-");
        block = block.title_bottom(
            Line::from(format!(" model: {} (m) ", model)).right_aligned(),
        );
    }

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Keep cursor visible with horizontal scrolling
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        let placeholder = match app.chat.mode() {
            ChatMode::Text => "Message Aurelius...",
            ChatMode::Image => "Describe the image you want...",
        };
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let fg = if loading { Color::DarkGray } else { USER_COLOR };
        Paragraph::new(visible_text).style(Style::default().fg(fg))
    };

    frame.render_widget(input.block(block), area);

    if app.input_mode == InputMode::Editing && !app.show_model_picker {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];

    if let Some(notice) = app.chat.notice() {
        spans.push(Span::styled(
            format!(" {} ", notice.text),
            Style::default().bg(Color::Red).fg(Color::White).bold(),
        ));
    } else {
        let mut hints: Vec<(&str, &str)> = match app.input_mode {
            InputMode::Editing => vec![("Enter", "send"), ("Tab", "mode"), ("Esc", "stop typing")],
            InputMode::Normal => vec![
                ("i", "type"),
                ("j/k", "scroll"),
                ("Tab", "mode"),
                ("y", "copy"),
                ("s", "save image"),
            ],
        };
        if app.input_mode == InputMode::Normal && app.chat.model_selector_visible() {
            hints.push(("m", "model"));
        }
        if app.input_mode == InputMode::Normal {
            hints.push(("q", "quit"));
        }

        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {} ", label), label_style));
        }
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = (app.chat.image_models().len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Image Model (Enter to select, Esc to cancel) ");

    let current = app.chat.image_model();
    let items: Vec<ListItem> = app
        .chat
        .image_models()
        .iter()
        .map(|model| {
            let style = if Some(model.name.as_str()) == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let loaded = if model.loaded { " ✓" } else { "" };
            ListItem::new(format!(" {}{} ", model.name, loaded)).style(style)
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

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ImageModelInfo, ImageModelList};
    use crate::config::Config;
    use crate::controller::Reply;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                text.push_str(cell.symbol());
            }
            text.push('\n');
        }
        text
    }

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut config = Config::new();
        config.backend_url = "http://127.0.0.1:9".to_string();
        App::new(config, tx)
    }

    #[test]
    fn test_markdown_bold_and_code() {
        let lines = markdown_lines("use **tokio** with `spawn` now");
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.spans.len(), 5);
        assert_eq!(line.spans[1].content, "tokio");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].content, "spawn");
        assert_eq!(line.spans[3].style.fg, Some(CODE_COLOR));
    }

    #[test]
    fn test_markdown_unclosed_is_literal() {
        let lines = markdown_lines("2 ** 3 and a `tick");
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "2 ** 3 and a `tick");
    }

    #[test]
    fn test_code_fence_gets_label() {
        let lines = markdown_lines("Here:\n```rust\nfn main() {}\n```\ndone");
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["Here:", "", " rust ", "  fn main() {}", "", "done"]);

        let lines = markdown_lines("```\nplain\n```");
        assert_eq!(line_text(&lines[0]), " plaintext ");
    }

    #[test]
    fn test_markdown_heading_and_lists() {
        let lines = markdown_lines("## Steps\n\n- fetch\n- *build*\n\n1. one\n2. two");
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(
            texts,
            vec!["## Steps", "", "• fetch", "• build", "", "1. one", "2. two"]
        );
        assert_eq!(lines[0].spans[0].style.fg, Some(HEADING_COLOR));
        assert!(lines[3].spans[1].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_markdown_soft_breaks_keep_lines() {
        let lines = markdown_lines("first line\nsecond line");
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["first line", "second line"]);
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdefghij"), Line::default(), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 4), 3 + 1 + 1);
    }

    #[tokio::test]
    async fn test_render_empty_state() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("How can I help you today?"));
        assert!(screen.contains("Message Aurelius..."));
    }

    #[tokio::test]
    async fn test_render_conversation_and_thinking() {
        let mut app = test_app();
        app.chat.submit("hello there").unwrap();

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("hello there"));
        assert!(screen.contains("Thinking."));

        app.chat.complete(Ok(Reply::Text("General Kenobi".to_string())));
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("General Kenobi"));
        assert!(!screen.contains("Thinking"));
    }

    #[tokio::test]
    async fn test_loading_text_follows_request_not_tab() {
        let mut app = test_app();
        app.chat.submit("hello there").unwrap();
        app.chat.set_mode(ChatMode::Image);

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("Thinking."));
        assert!(!screen.contains("Painting"));
    }

    #[tokio::test]
    async fn test_model_hint_only_with_models() {
        let mut app = test_app();
        app.chat.set_mode(ChatMode::Image);
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(!screen_text(&terminal).contains("model:"));

        app.chat.models_loaded(Ok(ImageModelList {
            models: vec![ImageModelInfo {
                name: "realvis".to_string(),
                path: "/m".to_string(),
                loaded: true,
            }],
            default: "realvis".to_string(),
        }));
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("model: realvis"));
        assert!(screen.contains("Describe the image you want..."));
    }
}

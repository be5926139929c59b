use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use conversa_core::{PipelineState, Provider};

use crate::app::{App, Entry, Speaker};
use crate::markup::markup_lines;

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
    render_chat(app, frame, body_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Conversa ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{}: {}", app.current_provider.display_name(), app.selected_model),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.pipeline_state() {
        PipelineState::Idle => (" PRONTO ", Style::default().bg(Color::Blue).fg(Color::White)),
        PipelineState::AwaitingResponse => (
            " AGUARDANDO ",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        PipelineState::Typing => (
            " DIGITANDO ",
            Style::default().bg(Color::Green).fg(Color::Black),
        ),
    };

    let hints = match app.pipeline_state() {
        PipelineState::Typing => " Esc: interromper  PgUp/PgDn: rolar  Ctrl-C: sair",
        _ => " Enter: enviar  Ctrl-R: regenerar  Ctrl-P: provedor  /help  Ctrl-C: sair",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(footer), area);
}

fn entry_lines(entry: &Entry) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match entry.speaker {
        Speaker::User => {
            lines.push(Line::from(Span::styled(
                "Você:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in entry.body.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Speaker::Assistant => {
            let mut heading = vec![Span::styled(
                "Assistente:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )];
            if let Some(timestamp) = &entry.timestamp {
                heading.push(Span::styled(
                    format!(" {}", timestamp),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(heading));
            lines.extend(markup_lines(&entry.body, Style::default()));
        }
        Speaker::Notice => {
            let style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
            for line in entry.body.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), style)));
            }
        }
    }
    lines.push(Line::default());
    lines
}

/// Rows a line takes once wrapped to `width`.
fn wrapped_height(line: &Line<'_>, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let cells = line.width();
    if cells == 0 {
        1
    } else {
        cells.div_ceil(width) as u16
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store area for mouse hit-testing
    app.chat_area = Some(chat_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let awaiting = app.pipeline_state() == PipelineState::AwaitingResponse;
    let chat_text = if app.transcript.is_empty() && !awaiting {
        Text::from(Span::styled(
            "Digite uma mensagem para começar...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = app.transcript.iter().flat_map(entry_lines).collect();

        if awaiting {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Pensando{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let total: u16 = chat_text
        .lines
        .iter()
        .map(|line| wrapped_height(line, app.chat_width))
        .fold(0u16, u16::saturating_add);
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow || app.scroll >= max_scroll {
        app.scroll = max_scroll;
        app.follow = true;
    }

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let mut title = String::from(" Mensagem ");
    if !app.attachments.is_empty() {
        title.push_str(&format!("[{}] ", app.attachments.join(", ")));
    }

    let border_color = if app.input_enabled && !app.is_busy() {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    let popup_open = app.show_api_key_input || app.show_provider_picker || app.show_model_picker;
    if !popup_open {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// A centered popup of the given size, clamped to the screen.
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 44, app.available_models.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Modelo (Enter seleciona, Esc cancela) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
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

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();
    let popup_area = popup_rect(area, 45, providers.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Provedor ");

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let key_source = app.get_key_source(*provider);
            let is_current = *provider == app.current_provider;

            let status = match key_source {
                Some("env") => "(variável de ambiente)",
                Some("config") => "(configurado)",
                Some("local") => "(local)",
                _ => "(precisa de chave)",
            };
            let prefix = if is_current { "* " } else { "  " };

            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if key_source.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(format!("{}{} {}", prefix, provider.display_name(), status)).style(style)
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

    frame.render_stateful_widget(list, popup_area, &mut app.provider_picker_state);
}

/// Mask all but the last four characters.
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let masked_len = len - 4;
    let last_four: String = key.chars().skip(masked_len).collect();
    format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider_name = app
        .api_key_target_provider
        .map(|p| p.display_name())
        .unwrap_or("provedor");

    let popup_area = popup_rect(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Chave de API para {} ", provider_name));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Cole a chave abaixo. Enter salva, Esc cancela.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(mask_key(&app.api_key_input)).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    // Show cursor
    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} caracteres", app.api_key_input.chars().count()))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::line_text;

    #[test]
    fn test_mask_key_keeps_last_four() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key("sk-123456"), "*****...3456");
    }

    #[test]
    fn test_wrapped_height() {
        assert_eq!(wrapped_height(&Line::from(""), 10), 1);
        assert_eq!(wrapped_height(&Line::from("0123456789"), 10), 1);
        assert_eq!(wrapped_height(&Line::from("0123456789a"), 10), 2);
    }

    #[test]
    fn test_assistant_entry_renders_markup_and_timestamp() {
        let entry = Entry {
            speaker: Speaker::Assistant,
            body: "um<br><strong>dois</strong>".to_string(),
            timestamp: Some("14:05".to_string()),
            typing: false,
        };
        let lines: Vec<String> = entry_lines(&entry).iter().map(line_text).collect();
        assert_eq!(lines, vec!["Assistente: 14:05", "um", "dois", ""]);
    }
}

use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{debug, warn};

use conversa_core::config::ResponseStyle;

use crate::app::App;
use crate::tui::AppEvent;

pub const HELP: &str = "Comandos:
/file <caminho>       anexa um arquivo de texto à próxima mensagem
/image <caminho|url>  anexa uma imagem à próxima mensagem
/regen                gera a última resposta novamente
/stop                 interrompe a digitação da resposta
/clear                limpa a conversa
/settings             mostra as configurações atuais
/nickname <nome>      define como o assistente chama você
/style <estilo>       default, concise, detailed, friendly ou formal
/instructions <texto> substitui as instruções do assistente
/speed <ms>           velocidade da digitação
/save                 salva as configurações
/reset                restaura as configurações padrão
/models               escolhe o modelo
/provider             escolhe o provedor
/quit                 sai

Atalhos: Enter envia, Esc interrompe, Ctrl-R regenera, Ctrl-P provedor, PgUp/PgDn rolam.";

/// A slash command typed in the input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    File(PathBuf),
    Image(String),
    Regenerate,
    Stop,
    Clear,
    Settings,
    Nickname(String),
    Style(ResponseStyle),
    Instructions(String),
    Speed(u64),
    Save,
    Reset,
    Models,
    Provider,
    Help,
    Quit,
}

/// `Ok(None)` means the text is a message, not a command.
pub fn parse_command(input: &str) -> Result<Option<Command>, String> {
    let input = input.trim();
    let Some(rest) = input.strip_prefix('/') else {
        return Ok(None);
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let required = |what: &str| {
        if arg.is_empty() {
            Err(format!("Uso: /{} <{}>", name, what))
        } else {
            Ok(arg.to_string())
        }
    };

    let command = match name {
        "file" => Command::File(PathBuf::from(required("caminho")?)),
        "image" => Command::Image(required("caminho ou url")?),
        "regen" => Command::Regenerate,
        "stop" => Command::Stop,
        "clear" => Command::Clear,
        "settings" => Command::Settings,
        // An empty nickname clears it.
        "nickname" => Command::Nickname(arg.to_string()),
        "style" => Command::Style(required("estilo")?.parse()?),
        "instructions" => Command::Instructions(required("texto")?),
        "speed" => Command::Speed(
            required("ms")?
                .parse()
                .map_err(|_| format!("Velocidade inválida: {}", arg))?,
        ),
        "save" => Command::Save,
        "reset" => Command::Reset,
        "models" => Command::Models,
        "provider" => Command::Provider,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Comando desconhecido: /{}. Digite /help.", other)),
    };
    Ok(Some(command))
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::View(update) => app.apply_view_update(update),
        AppEvent::TurnFinished(outcome) => app.finish_turn(outcome),
        AppEvent::Greeting(greeting) => app.notice(&greeting),
        AppEvent::Models(Ok(models)) => app.show_models(models),
        AppEvent::Models(Err(e)) => {
            warn!("failed to list models: {}", e);
            app.notice(&format!("Não foi possível listar os modelos: {}", e));
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_api_key_input {
        handle_api_key_input(app, key);
    } else if app.show_provider_picker {
        handle_provider_picker(app, key);
    } else if app.show_model_picker {
        handle_model_picker(app, key);
    } else {
        handle_chat_input(app, key);
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
            app.api_key_target_provider = None;
        }
        KeyCode::Enter => app.submit_api_key(),
        KeyCode::Backspace => {
            if app.api_key_input_cursor > 0 {
                app.api_key_input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_input_cursor += 1;
        }
        KeyCode::Left => {
            app.api_key_input_cursor = app.api_key_input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_input_cursor = (app.api_key_input_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

fn handle_provider_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_provider_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => app.pick_provider(),
        _ => {}
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

fn handle_chat_input(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            if !app.stop_typing() {
                app.input.clear();
                app.cursor = 0;
            }
        }
        KeyCode::Char('r') if ctrl => app.regenerate(),
        KeyCode::Char('p') if ctrl => app.open_provider_picker(),
        KeyCode::Char('l') if ctrl => app.clear_conversation(),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::End if ctrl => app.scroll_to_bottom(),
        KeyCode::Enter => submit(app),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) if !ctrl => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn submit(app: &mut App) {
    let text = app.input.trim().to_string();

    match parse_command(&text) {
        Ok(Some(command)) => {
            debug!(?command, "command");
            app.input.clear();
            app.cursor = 0;
            run_command(app, command);
        }
        Ok(None) => {
            // Input stays put while a reply is pending.
            if !app.input_enabled || app.is_busy() {
                return;
            }
            let has_attachment = !app.attachments.is_empty();
            if text.is_empty() && !has_attachment {
                return;
            }
            app.input.clear();
            app.cursor = 0;
            app.send_message(text);
        }
        Err(message) => app.notice(&message),
    }
}

fn run_command(app: &mut App, command: Command) {
    match command {
        Command::File(path) => app.attach_file(&path),
        Command::Image(source) => app.attach_image(&source),
        Command::Regenerate => app.regenerate(),
        Command::Stop => {
            if !app.stop_typing() {
                app.notice("Nenhuma resposta sendo digitada.");
            }
        }
        Command::Clear => app.clear_conversation(),
        Command::Settings => {
            let summary = app.settings_summary();
            app.notice(&summary);
        }
        Command::Nickname(nickname) => app.set_nickname(&nickname),
        Command::Style(style) => app.set_style(style),
        Command::Instructions(text) => app.set_instructions(&text),
        Command::Speed(ms) => app.set_typing_speed(ms),
        Command::Save => app.save_settings(),
        Command::Reset => app.reset_settings(),
        Command::Models => app.open_model_picker(),
        Command::Provider => app.open_provider_picker(),
        Command::Help => app.notice(HELP),
        Command::Quit => app.should_quit = true,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("olá, tudo bem?"), Ok(None));
        assert_eq!(parse_command(""), Ok(None));
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            parse_command("/file  notas/relatório.txt "),
            Ok(Some(Command::File(PathBuf::from("notas/relatório.txt"))))
        );
        assert_eq!(
            parse_command("/image https://example.com/gato.png"),
            Ok(Some(Command::Image("https://example.com/gato.png".to_string())))
        );
        assert_eq!(
            parse_command("/style Formal"),
            Ok(Some(Command::Style(ResponseStyle::Formal)))
        );
        assert_eq!(parse_command("/speed 25"), Ok(Some(Command::Speed(25))));
        assert_eq!(
            parse_command("/instructions Seja breve."),
            Ok(Some(Command::Instructions("Seja breve.".to_string())))
        );
    }

    #[test]
    fn test_nickname_may_be_cleared() {
        assert_eq!(
            parse_command("/nickname"),
            Ok(Some(Command::Nickname(String::new())))
        );
    }

    #[test]
    fn test_missing_argument_reports_usage() {
        assert_eq!(parse_command("/file"), Err("Uso: /file <caminho>".to_string()));
    }

    #[test]
    fn test_bad_arguments_rejected() {
        assert!(parse_command("/style sarcastic").is_err());
        assert!(parse_command("/speed rápido").is_err());
        assert!(parse_command("/dance").is_err());
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        assert_eq!(char_to_byte_index("ação", 2), 3);
        assert_eq!(char_to_byte_index("ação", 10), "ação".len());
    }
}

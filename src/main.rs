use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conversa_core::{NominatimLocator, Provider, Settings};

mod app;
mod handler;
mod markup;
mod tui;
mod ui;
mod view;

use app::{App, INIT_APOLOGY};
use tui::EventHandler;

#[derive(Parser, Debug)]
#[command(name = "conversa")]
#[command(version, about = "Terminal chat with markdown, syntax highlighting and typed-out replies")]
struct Cli {
    /// AI provider: ollama, claude or openai
    #[arg(short, long)]
    provider: Option<Provider>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL for the provider API
    #[arg(long)]
    base_url: Option<String>,

    /// Anthropic API key (ANTHROPIC_API_KEY also works)
    #[arg(long)]
    claude_api_key: Option<String>,

    /// OpenAI API key (OPENAI_API_KEY also works)
    #[arg(long)]
    openai_api_key: Option<String>,

    /// Latitude used for the greeting and date answers
    #[arg(long, allow_negative_numbers = true, requires = "longitude")]
    latitude: Option<f64>,

    /// Longitude used for the greeting and date answers
    #[arg(long, allow_negative_numbers = true, requires = "latitude")]
    longitude: Option<f64>,

    /// Milliseconds per typing step
    #[arg(long)]
    speed: Option<u64>,

    /// Render code blocks without syntax colors
    #[arg(long)]
    no_highlight: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "CONVERSA_CONFIG")]
    config: Option<PathBuf>,

    /// Log verbosity when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn log_dir() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("conversa"))
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(level: &str) -> Option<WorkerGuard> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).ok()?;

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }
    let log_file = log_file_opts.open(dir.join("conversa.log")).ok()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let default_filter = format!("conversa={level},conversa_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();

    Some(guard)
}

/// Settings from disk with command line overrides applied. The flag is set
/// when the file existed but could not be used.
fn load_settings(cli: &Cli) -> (Settings, Option<PathBuf>, bool) {
    let path = cli
        .config
        .clone()
        .or_else(|| Settings::get_config_path().ok());

    let (mut settings, failed) = match &path {
        Some(path) => match Settings::load_from(path) {
            Ok(settings) => (settings, false),
            Err(e) => {
                warn!("failed to load settings, using defaults: {}", e);
                (Settings::default(), true)
            }
        },
        None => {
            warn!("no config directory, settings will not persist");
            (Settings::default(), false)
        }
    };

    if let Some(provider) = cli.provider {
        if provider != settings.provider {
            settings.default_model = None;
            settings.base_url = None;
        }
        settings.provider = provider;
    }
    if let Some(model) = &cli.model {
        settings.default_model = Some(model.clone());
    }
    if let Some(base_url) = &cli.base_url {
        settings.base_url = Some(base_url.clone());
    }
    if let Some(key) = &cli.claude_api_key {
        settings.claude_api_key = Some(key.clone());
    }
    if let Some(key) = &cli.openai_api_key {
        settings.openai_api_key = Some(key.clone());
    }
    if let (Some(lat), Some(lon)) = (cli.latitude, cli.longitude) {
        settings.latitude = Some(lat);
        settings.longitude = Some(lon);
    }
    if let Some(speed) = cli.speed {
        settings.ai.typing_speed = speed.max(1);
    }
    if cli.no_highlight {
        settings.chat.syntax_highlighting = false;
    }

    (settings, path, failed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_level);

    let (settings, settings_path, load_failed) = load_settings(&cli);
    info!(
        provider = settings.provider.as_str(),
        model = settings.default_model.as_deref().unwrap_or("default"),
        "starting"
    );

    let locator = Arc::new(NominatimLocator::new(
        settings.coordinates(),
        settings.chat.location_timeout(),
    ));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(settings, settings_path, locator, events.sender());
    if load_failed {
        app.notice(INIT_APOLOGY);
    }
    app.spawn_greeting();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        warn!("exiting with error: {:#}", e);
    }
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;
    }
    Ok(())
}

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod config;
mod controller;
mod conversation;
mod error;
mod handler;
mod media;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is best effort, the TUI must still start without it
    if let Err(e) = init_logging() {
        eprintln!("aurelius: logging disabled: {}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("could not read config, using defaults: {}", e);
        Config::new()
    });
    tracing::info!(backend = %config.backend_url, "starting");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, config).await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!("exited with error: {:#}", e);
    }
    result
}

async fn run(terminal: &mut Tui, config: Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(&mut app, event);
    }

    Ok(())
}

/// Log to `<data dir>/aurelius/aurelius.log`; stderr belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("aurelius");
    let log_file = open_log_file(&log_dir)?;

    let filter = EnvFilter::try_from_env("AURELIUS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("{}", e))?;
    Ok(())
}

/// Open `aurelius.log` for appending so earlier sessions are kept
fn open_log_file(dir: &Path) -> Result<File> {
    fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("aurelius.log"))?;
    Ok(file)
}

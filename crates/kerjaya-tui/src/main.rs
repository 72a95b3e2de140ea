//! KerjayaFlow - a terminal client for the KerjayaFlow resume tools.
//!
//! Restores the previous session on startup, shows the login form until the
//! user is signed in, and signs them out again after ten minutes without
//! keyboard or mouse activity.

mod app;
mod ui;

use std::io;
use std::path::Path;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use kerjaya_core::Config;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState, BackgroundResult};
use ui::input::{activity_for, handle_input};
use ui::render::render;

/// Log file written inside the cache directory
const LOG_FILE: &str = "kerjaya.log";

/// Initialize the tracing subscriber for logging.
///
/// The terminal is in alternate-screen mode, so logs go to a file.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };

    let log_dir = config.cache_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let _log_guard = init_tracing(&log_dir);
    info!(api = %config.api_base_url, "KerjayaFlow starting");

    let (mut app, mut background) = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &mut background).await;

    // Leaving keeps the saved session for next time but drops the countdown
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("KerjayaFlow shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    background: &mut mpsc::Receiver<BackgroundResult>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut notices = app.session.notices();

    loop {
        terminal.draw(|f| render(f, app))?;

        tokio::select! {
            maybe_event = events.next() => {
                let event = match maybe_event {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                };

                if let Some(activity) = activity_for(&event) {
                    app.record_activity(activity);
                }

                if let Event::Key(key) = event {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }
                    if handle_input(app, key)? {
                        return Ok(());
                    }
                }
            }
            Some(result) = background.recv() => app.apply_background(result),
            notice = notices.recv() => match notice {
                Ok(notice) => app.on_notice(notice),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session notices"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

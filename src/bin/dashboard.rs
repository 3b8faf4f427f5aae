//! Asphalt Rush dashboard
//!
//! Serves the control plane on localhost: launches and stops the game,
//! hands it the car color, records its scores and keeps an event log.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use asphalt_rush::orchestrator::{
    Clock, CommandLauncher, Dashboard, Logbook, SystemClock, router,
};
use asphalt_rush::protocol::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "asphalt-dashboard",
    version,
    about = "Launch Asphalt Rush and collect its results over HTTP"
)]
struct Cli {
    /// Port to listen on (127.0.0.1 only)
    #[arg(long, env = "ASPHALT_DASHBOARD_PORT", default_value_t = 5000)]
    port: u16,
    /// Game executable (default: asphalt-rush next to this binary)
    #[arg(long, env = "ASPHALT_GAME_BIN")]
    game_bin: Option<PathBuf>,
    /// Durable copy of the event log
    #[arg(long, env = "ASPHALT_LOG_FILE", default_value = "session_logs.json")]
    log_file: PathBuf,
}

fn sibling_game_binary() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let dir = exe
        .parent()
        .context("own executable has no parent directory")?;
    Ok(dir.join(format!("asphalt-rush{}", std::env::consts::EXE_SUFFIX)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Ctrl-C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Dashboard shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let game_bin = match cli.game_bin {
        Some(path) => path,
        None => sibling_game_binary()?,
    };
    let url = format!("http://127.0.0.1:{}", cli.port);

    let clock = SystemClock;
    let logbook = Logbook::open(&cli.log_file, clock.now());
    let mut dashboard = Dashboard::new(
        Box::new(CommandLauncher::new(&game_bin)),
        Box::new(clock),
        logbook,
    )
    .with_control_url(url.clone());

    dashboard.record(
        LogLevel::Info,
        "Dashboard starting",
        Some(json!({ "game_bin": game_bin.display().to_string() })),
    );
    if !game_bin.is_file() {
        dashboard.record(
            LogLevel::Error,
            &format!("Game binary not found: {}", game_bin.display()),
            None,
        );
    }

    let listener = TcpListener::bind(("127.0.0.1", cli.port))
        .await
        .with_context(|| format!("failed to bind 127.0.0.1:{}", cli.port))?;
    dashboard.record(LogLevel::Info, &format!("Dashboard listening on {url}"), None);

    let app = router(Arc::new(Mutex::new(dashboard)));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("dashboard server failed")?;
    Ok(())
}

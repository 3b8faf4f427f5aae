//! Asphalt Rush entry point
//!
//! Parses launch parameters, wires the dashboard client and the input source
//! into the game driver, and runs it until quit or a termination signal.

use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use asphalt_rush::autopilot::Autopilot;
use asphalt_rush::client::HttpControl;
use asphalt_rush::consts::{DEFAULT_CAR_HEX, DEFAULT_LANES, SCORE_PUSH_TIMEOUT_MS};
use asphalt_rush::game::{ExitReason, Game, InputEvent, InputSource, LogPresenter};
use asphalt_rush::protocol::{DEFAULT_CONTROL_URL, LaunchParams};
use asphalt_rush::sim::GameState;
use asphalt_rush::{Difficulty, Rgb, clamp_lanes};

/// Exit status for a failed startup
const EXIT_STARTUP_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "asphalt-rush", version, about = "Lane-dodging arcade game")]
struct Cli {
    /// Number of lanes (clamped to 2..=6)
    #[arg(long, default_value_t = DEFAULT_LANES as i64, allow_negative_numbers = true)]
    lanes: i64,
    /// Faster ramp and a lower spawn interval floor
    #[arg(long)]
    hard: bool,
    /// Who launched the game; "dashboard" enables live color updates
    #[arg(long)]
    caller: Option<String>,
    /// Initial car color (#RGB or #RRGGBB)
    #[arg(long)]
    car_color: Option<String>,
    /// Dashboard base URL
    #[arg(long, env = "ASPHALT_CONTROL_URL", default_value = DEFAULT_CONTROL_URL)]
    control_url: String,
    /// Fixed RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Let the computer drive
    #[arg(long)]
    autopilot: bool,
}

impl Cli {
    fn launch_params(&self) -> LaunchParams {
        LaunchParams {
            lanes: clamp_lanes(self.lanes),
            difficulty: if self.hard {
                Difficulty::Hard
            } else {
                Difficulty::Normal
            },
            caller: self.caller.clone(),
            car_color: self.car_color.clone(),
            control_url: Some(self.control_url.clone()),
        }
    }
}

/// Console keys, one per line, read on a background thread
struct KeyboardInput {
    rx: mpsc::Receiver<InputEvent>,
}

impl KeyboardInput {
    fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-keys".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if let Some(event) = InputEvent::from_key(&line) {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
                // Closed stdin (detached launch) just means no more keys
                log::debug!("Keyboard input closed");
            })
            .context("failed to start keyboard thread")?;
        Ok(Self { rx })
    }
}

/// Keyboard plus optional autopilot
struct Controls {
    keys: KeyboardInput,
    pilot: Option<Autopilot>,
}

impl InputSource for Controls {
    fn poll(&mut self, state: &GameState) -> Vec<InputEvent> {
        let mut events: Vec<InputEvent> = self.keys.rx.try_iter().collect();
        if let Some(pilot) = &mut self.pilot {
            events.extend(pilot.poll(state));
        }
        events
    }
}

/// Resolves on SIGTERM or Ctrl-C
async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                log::warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn starting_color(params: &LaunchParams) -> Rgb {
    let requested = params.car_color.as_deref().unwrap_or(DEFAULT_CAR_HEX);
    Rgb::from_hex(requested).unwrap_or_else(|| {
        log::warn!("Ignoring invalid car color {requested:?}");
        Rgb::from_hex(DEFAULT_CAR_HEX).unwrap_or(Rgb(15, 118, 110))
    })
}

fn run(cli: Cli) -> Result<ExitReason> {
    let params = cli.launch_params();
    let control_url = params
        .control_url
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTROL_URL.to_string());
    let control = HttpControl::new(control_url).context("control plane client")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    control.handle().spawn(async move {
        termination_signal().await;
        flag.store(true, Ordering::Release);
    });

    let seed = cli.seed.unwrap_or_else(rand::random);
    let state = GameState::new(
        seed,
        params.lanes,
        params.difficulty.tuning(),
        starting_color(&params),
    );
    log::info!(
        "Asphalt Rush starting: lanes={} mode={} seed={} caller={}",
        params.lanes,
        params.difficulty.as_str(),
        seed,
        params.caller.as_deref().unwrap_or("none")
    );

    let controls = Controls {
        keys: KeyboardInput::spawn()?,
        pilot: cli.autopilot.then(Autopilot::new),
    };
    let mut game = Game::new(
        state,
        controls,
        LogPresenter::default(),
        control,
        params.from_dashboard(),
        Instant::now(),
    );
    let reason = game.run(&shutdown);
    game.into_control()
        .shutdown(Duration::from_millis(SCORE_PUSH_TIMEOUT_MS));
    Ok(reason)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(reason) => {
            log::info!("Asphalt Rush exiting ({reason:?})");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Startup failed: {e:#}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

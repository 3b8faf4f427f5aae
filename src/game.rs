//! Game process driver
//!
//! Wraps the deterministic simulation with everything that touches the
//! outside world, once per fixed tick:
//! 1. drain input (lane changes, audio keys, restart, quit)
//! 2. pull the dashboard color when the poll timer is due
//! 3. advance the simulation (`sim::tick`)
//! 4. on a crash, report the score and show the game-over state; a new run
//!    starts on a restart key or once `GAME_OVER_HOLD_MS` has passed
//! 5. hand the frame to the presenter
//!
//! Rendering and audio playback live behind [`Presenter`]; input devices
//! behind [`InputSource`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::audio::{AudioMix, SoundCue};
use crate::client::ControlPlane;
use crate::color::Rgb;
use crate::consts::*;
use crate::protocol::ScoreSubmission;
use crate::sim::{GameState, RunPhase, RunReport, TickInput, tick};

/// Discrete input events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    SteerLeft,
    SteerRight,
    ToggleMute,
    VolumeUp,
    VolumeDown,
    Restart,
    Quit,
}

impl InputEvent {
    /// Map a key name (as typed on the console) to an event
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "a" | "left" => Some(InputEvent::SteerLeft),
            "d" | "right" => Some(InputEvent::SteerRight),
            "m" => Some(InputEvent::ToggleMute),
            "+" | "=" => Some(InputEvent::VolumeUp),
            "-" => Some(InputEvent::VolumeDown),
            "r" => Some(InputEvent::Restart),
            "q" | "quit" => Some(InputEvent::Quit),
            _ => None,
        }
    }
}

/// Source of player input, polled once per tick
pub trait InputSource {
    fn poll(&mut self, state: &GameState) -> Vec<InputEvent>;
}

/// Output side: drawing and sound
pub trait Presenter {
    /// Called after every tick
    fn frame(&mut self, state: &GameState, hud: &str);
    /// Called once when a run ends, before the game waits for restart
    fn game_over(&mut self, report: &RunReport);
    fn cue(&mut self, cue: SoundCue, volume: f32);
}

/// Why the driver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Quit key
    UserQuit,
    /// Termination signal from outside
    Terminated,
}

/// Result of a single driver step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Wall-clock timer for dashboard color pulls
#[derive(Debug, Clone)]
struct ColorPoll {
    interval: Duration,
    last: Instant,
}

impl ColorPoll {
    fn due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// One game process: simulation plus its I/O
pub struct Game<I, P, C> {
    pub state: GameState,
    input: I,
    presenter: P,
    control: C,
    audio: AudioMix,
    color_poll: Option<ColorPoll>,
    /// Wall-clock time the current game over began
    game_over_at: Option<Instant>,
}

impl<I: InputSource, P: Presenter, C: ControlPlane> Game<I, P, C> {
    /// `poll_color` enables dashboard color pulls (only for dashboard launches)
    pub fn new(
        state: GameState,
        input: I,
        presenter: P,
        control: C,
        poll_color: bool,
        now: Instant,
    ) -> Self {
        let color_poll = poll_color.then(|| ColorPoll {
            interval: Duration::from_millis(COLOR_POLL_INTERVAL_MS),
            last: now,
        });
        let mut game = Self {
            state,
            input,
            presenter,
            control,
            audio: AudioMix::default(),
            color_poll,
            game_over_at: None,
        };
        game.presenter.cue(SoundCue::RunStart, game.audio.effective_volume());
        game
    }

    pub fn audio(&self) -> &AudioMix {
        &self.audio
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Give back the control plane (to flush it on exit)
    pub fn into_control(self) -> C {
        self.control
    }

    /// Run one fixed tick at wall-clock time `now`
    pub fn step(&mut self, now: Instant) -> Flow {
        let mut tick_input = TickInput::default();
        for event in self.input.poll(&self.state) {
            match event {
                InputEvent::SteerLeft => tick_input.steer = Some(-1),
                InputEvent::SteerRight => tick_input.steer = Some(1),
                InputEvent::ToggleMute => self.audio.toggle_mute(),
                InputEvent::VolumeUp => self.audio.volume_up(),
                InputEvent::VolumeDown => self.audio.volume_down(),
                InputEvent::Restart => tick_input.restart = true,
                InputEvent::Quit => {
                    log::info!("Quit requested");
                    return Flow::Quit;
                }
            }
        }

        if let Some(since) = self.game_over_at {
            let hold = Duration::from_millis(GAME_OVER_HOLD_MS);
            if !tick_input.restart && now.duration_since(since) >= hold {
                log::info!("Game over screen elapsed, starting a new run");
                tick_input.restart = true;
            }
        }

        self.apply_dashboard_color(now);

        let outcome = tick(&mut self.state, &tick_input);
        if outcome.restarted {
            self.game_over_at = None;
            log::info!("New run started");
            self.presenter.cue(SoundCue::RunStart, self.audio.effective_volume());
        }
        if let Some(report) = outcome.run_ended {
            self.presenter.cue(SoundCue::Crash, self.audio.effective_volume());
            self.control.submit_score(ScoreSubmission {
                score: report.score as u64,
                lanes: report.lanes as u32,
            });
            self.presenter.game_over(&report);
            self.game_over_at = Some(now);
        }

        let hud = self.state.scheduler.stats().readout();
        self.presenter.frame(&self.state, &hud);
        Flow::Continue
    }

    /// Pick up a color delivered by the last pull, then start the next pull if due
    fn apply_dashboard_color(&mut self, now: Instant) {
        let Some(poll) = self.color_poll.as_mut() else {
            return;
        };
        if let Some(doc) = self.control.take_color() {
            if let Some(rgb) = Rgb::from_hex(&doc.hex) {
                if rgb != self.state.color {
                    log::info!("Dashboard color -> {} ({})", doc.hex, doc.name);
                    self.state.color = rgb;
                }
            }
        }
        if poll.due(now) {
            self.control.request_color();
        }
    }

    /// Fixed-tick loop until quit or `shutdown` is raised
    pub fn run(&mut self, shutdown: &AtomicBool) -> ExitReason {
        let tick_len = Duration::from_secs_f64(TICK_MS / 1000.0);
        let mut last = Instant::now();
        let mut accumulator = Duration::ZERO;

        loop {
            if shutdown.load(Ordering::Acquire) {
                log::info!("Termination signal received");
                return ExitReason::Terminated;
            }

            let now = Instant::now();
            accumulator += now.duration_since(last).min(Duration::from_millis(100));
            last = now;

            let mut substeps = 0;
            while accumulator >= tick_len && substeps < MAX_SUBSTEPS {
                if self.step(now) == Flow::Quit {
                    return ExitReason::UserQuit;
                }
                accumulator -= tick_len;
                substeps += 1;
            }
            if substeps == MAX_SUBSTEPS {
                accumulator = Duration::ZERO;
            }

            std::thread::sleep(tick_len.saturating_sub(accumulator));
        }
    }
}

/// Headless presenter: reports the HUD through the log
#[derive(Debug, Default)]
pub struct LogPresenter {
    frames: u64,
}

impl Presenter for LogPresenter {
    fn frame(&mut self, state: &GameState, hud: &str) {
        self.frames += 1;
        if state.phase == RunPhase::Running && self.frames % (5 * TICK_RATE as u64) == 0 {
            log::info!(
                "Score: {} | lane {} | {} | speed {:.2}",
                state.score,
                state.player.logical_lane + 1,
                hud,
                state.scheduler.speed()
            );
        }
    }

    fn game_over(&mut self, report: &RunReport) {
        log::info!("GAME OVER - final score {} ({} lanes)", report.score, report.lanes);
    }

    fn cue(&mut self, cue: SoundCue, volume: f32) {
        log::debug!("Sound cue {cue:?} at volume {volume:.1}");
    }
}

//! Dashboard state and transitions
//!
//! Everything the control plane knows lives in one [`Dashboard`] value:
//! the tracked game process, the last-run summary, the car color handed to
//! games, the UI theme and the event log. The HTTP layer owns it behind a
//! mutex and calls exactly one method per request, so every transition below
//! runs to completion without interleaving.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::logbook::Logbook;
use super::process::{ChildProcess, Launcher, Liveness, StopPolicy, stop_child};
use crate::clamp_lanes;
use crate::color::preset_name;
use crate::consts::DEFAULT_LANES;
use crate::protocol::{
    ColorDoc, ControlError, DASHBOARD_CALLER, LastRunSummary, LaunchParams, LogLevel, LogQuery,
    RuntimeStatus, ScoreSubmission, StartReply, StartRequest, StopReply, whole_seconds,
};
use crate::settings::Difficulty;

/// Wall-clock source (unix seconds)
pub trait Clock: Send {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Dashboard color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Green,
    Blue,
}

impl Theme {
    /// Unknown keys fall back to green
    pub fn from_key(key: &str) -> Self {
        match key {
            "blue" => Theme::Blue,
            _ => Theme::Green,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Green => "green",
            Theme::Blue => "blue",
        }
    }
}

/// A game process started by this dashboard
struct RunSession {
    child: Box<dyn ChildProcess>,
    pid: u32,
}

/// Orchestrator-owned state
pub struct Dashboard {
    launcher: Box<dyn Launcher>,
    clock: Box<dyn Clock>,
    stop_policy: StopPolicy,
    /// Passed to launched games so they call back to the right port
    control_url: Option<String>,
    session: Option<RunSession>,
    last_run: LastRunSummary,
    color: ColorDoc,
    theme: Theme,
    logbook: Logbook,
}

impl Dashboard {
    pub fn new(launcher: Box<dyn Launcher>, clock: Box<dyn Clock>, logbook: Logbook) -> Self {
        Self {
            launcher,
            clock,
            stop_policy: StopPolicy::default(),
            control_url: None,
            session: None,
            last_run: LastRunSummary::default(),
            color: ColorDoc::default(),
            theme: Theme::default(),
            logbook,
        }
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = Some(url.into());
        self
    }

    /// Append to the event log, stamped with the dashboard clock
    pub fn record(&mut self, level: LogLevel, message: &str, detail: Option<Value>) {
        let now = self.clock.now();
        self.logbook.append(now, level, message, detail);
    }

    /// Launch a game unless one is already alive
    pub fn start(&mut self, request: StartRequest) -> Result<StartReply, ControlError> {
        self.reconcile();
        if let Some(session) = &self.session {
            return Err(ControlError::AlreadyRunning {
                pid: Some(session.pid),
            });
        }

        let lanes = clamp_lanes(request.lanes.unwrap_or(DEFAULT_LANES as i64));
        let mode = request.mode.unwrap_or_else(|| Difficulty::Normal.as_str().to_string());
        let params = LaunchParams {
            lanes,
            difficulty: Difficulty::from_mode(&mode),
            caller: Some(DASHBOARD_CALLER.to_string()),
            car_color: Some(self.color.hex.clone()),
            control_url: self.control_url.clone(),
        };

        let args = self.launcher.describe(&params);
        self.record(LogLevel::Info, "Launching game", Some(json!({ "args": args })));

        let child = match self.launcher.launch(&params) {
            Ok(child) => child,
            Err(e) => {
                self.record(
                    LogLevel::Error,
                    "Failed to launch game",
                    Some(json!({ "error": e.to_string() })),
                );
                return Err(ControlError::LaunchFailure(e.to_string()));
            }
        };

        let pid = child.id();
        let started = self.clock.now();
        self.session = Some(RunSession { child, pid });
        self.last_run = LastRunSummary {
            lanes: Some(lanes as u32),
            start_time: Some(started),
            ..Default::default()
        };
        self.record(
            LogLevel::Info,
            "Game launched",
            Some(json!({
                "pid": pid,
                "lanes": lanes,
                "mode": params.difficulty.as_str(),
                "color": self.color.hex,
            })),
        );
        Ok(StartReply {
            pid,
            lanes: lanes as u32,
        })
    }

    /// Stop the tracked game: terminate, bounded wait, then kill
    ///
    /// Blocks for up to the stop policy's window. The handle is cleared on
    /// every path.
    pub fn stop(&mut self) -> Result<StopReply, ControlError> {
        let Some(mut session) = self.session.take() else {
            return Err(ControlError::NotRunning);
        };
        let pid = session.pid;
        self.record(LogLevel::Info, "Stopping game", Some(json!({ "pid": pid })));

        let retcode = match stop_child(session.child.as_mut(), self.stop_policy) {
            Ok(outcome) => {
                if outcome.forced {
                    log::warn!("Game pid {pid} ignored termination and was killed");
                }
                outcome.retcode
            }
            Err(e) => {
                self.record(
                    LogLevel::Error,
                    "Failed to stop game",
                    Some(json!({ "pid": pid, "error": e.to_string() })),
                );
                None
            }
        };

        self.record(
            LogLevel::Info,
            "Game stopped",
            Some(json!({ "pid": pid, "retcode": retcode })),
        );
        let now = self.clock.now();
        self.last_run.close(now);
        Ok(StopReply { retcode })
    }

    /// Liveness query; notices games that exited on their own
    ///
    /// A child whose state cannot be read reports `running: false` but stays
    /// tracked, so `start` still refuses and `stop` can still reach it.
    pub fn query_runtime(&mut self) -> RuntimeStatus {
        let running = self.reconcile();
        RuntimeStatus {
            running,
            pid: self.session.as_ref().map(|s| s.pid),
        }
    }

    /// Drop the handle of a child that has exited and close its run.
    /// Returns true only when the child is known to be alive.
    fn reconcile(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let retcode = match session.child.poll() {
            Ok(Liveness::Running) => return true,
            Ok(Liveness::Exited(code)) => code,
            Err(e) => {
                log::warn!("Could not poll game pid {}: {e}", session.pid);
                return false;
            }
        };
        let pid = session.pid;
        self.session = None;
        self.record(
            LogLevel::Info,
            "Game terminated (detected)",
            Some(json!({ "pid": pid, "retcode": retcode })),
        );
        let now = self.clock.now();
        self.last_run.close(now);
        false
    }

    /// Final score reported by a game
    pub fn submit_score(&mut self, submission: ScoreSubmission) {
        self.record(
            LogLevel::Info,
            "Score submitted by game",
            Some(json!({ "score": submission.score, "lanes": submission.lanes })),
        );
        let now = self.clock.now();
        self.last_run.score = Some(submission.score);
        self.last_run.lanes = Some(submission.lanes);
        self.last_run.end_time = Some(now);
        if let Some(start) = self.last_run.start_time {
            self.last_run.duration_s = Some(whole_seconds(now - start));
        }
    }

    /// A score body that did not parse
    pub fn reject_score(&mut self) -> ControlError {
        self.record(LogLevel::Warn, "submit_score invalid JSON", None);
        ControlError::Validation("invalid JSON".into())
    }

    pub fn last_run(&self) -> LastRunSummary {
        self.last_run.clone()
    }

    pub fn color(&self) -> ColorDoc {
        self.color.clone()
    }

    /// Replace the color handed to games; invalid input leaves it untouched
    pub fn set_color(&mut self, mut doc: ColorDoc) -> Result<ColorDoc, ControlError> {
        doc.validate()?;
        if doc.name.is_empty() {
            if let Some(name) = preset_name(&doc.hex) {
                doc.name = name.to_string();
            }
        }
        self.record(
            LogLevel::Info,
            "Color selected on dashboard",
            Some(json!({ "hex": doc.hex, "name": doc.name })),
        );
        self.color = doc.clone();
        Ok(doc)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, key: &str) -> Theme {
        self.theme = Theme::from_key(key);
        self.record(
            LogLevel::Info,
            "Theme changed",
            Some(json!({ "theme": self.theme.as_str() })),
        );
        self.theme
    }

    pub fn logs(&self) -> LogQuery {
        self.logbook.query()
    }

    pub fn clear_logs(&mut self) {
        self.logbook.clear();
        self.record(LogLevel::Info, "In-memory logs cleared by user", None);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::orchestrator::process::fake::FakeLauncher;

    /// Clock the test moves by hand (millisecond resolution)
    #[derive(Debug, Clone, Default)]
    pub struct ManualClock(pub Arc<AtomicU64>);

    impl ManualClock {
        pub fn starting_at(secs: u64) -> Self {
            Self(Arc::new(AtomicU64::new(secs * 1000)))
        }

        pub fn advance_ms(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            self.0.load(Ordering::SeqCst) as f64 / 1000.0
        }
    }

    pub fn quick_stop() -> StopPolicy {
        StopPolicy {
            attempts: 2,
            interval: Duration::from_millis(1),
        }
    }

    pub fn dashboard(launcher: FakeLauncher, clock: ManualClock) -> Dashboard {
        Dashboard::new(Box::new(launcher), Box::new(clock), Logbook::default())
            .with_stop_policy(quick_stop())
    }
}

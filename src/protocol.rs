//! Control protocol shared by the game and the dashboard
//!
//! Both processes build their requests and replies from these types, so the
//! route table and the JSON shapes exist in exactly one place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::color::is_valid_hex;
use crate::consts::DEFAULT_LANES;
use crate::settings::Difficulty;

/// HTTP routes served by the dashboard
pub mod routes {
    pub const RUNTIME: &str = "/api/runtime";
    pub const START: &str = "/api/start";
    pub const STOP: &str = "/api/stop";
    pub const SUBMIT_SCORE: &str = "/submit_score";
    pub const LAST_RUN: &str = "/api/last_run";
    pub const LOGS: &str = "/api/logs";
    pub const CLEAR_LOGS: &str = "/api/clear_logs";
    pub const COLOR: &str = "/api/color";
    pub const SET_COLOR: &str = "/api/set_color";
    pub const THEME: &str = "/api/theme";
    pub const SET_THEME: &str = "/api/set_theme";
    pub const HEALTH: &str = "/health";
}

/// Default dashboard address the game talks to
pub const DEFAULT_CONTROL_URL: &str = "http://127.0.0.1:5000";
/// Caller marker the dashboard passes to games it launches
pub const DASHBOARD_CALLER: &str = "dashboard";

/// Failures on either side of the control plane
#[derive(Debug, Error)]
pub enum ControlError {
    /// Malformed input rejected at the boundary
    #[error("{0}")]
    Validation(String),
    #[error("game already running")]
    AlreadyRunning { pid: Option<u32> },
    #[error("no running process started via dashboard")]
    NotRunning,
    /// Peer refused, timed out or answered garbage
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("failed to launch game: {0}")]
    LaunchFailure(String),
    /// Dashboard-side fault unrelated to the request
    #[error("internal error: {0}")]
    Internal(String),
}

/// Car color as exchanged between dashboard and game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorDoc {
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub name: String,
}

impl ColorDoc {
    pub fn new(hex: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hex: hex.into(),
            name: name.into(),
        }
    }

    /// Accept only `#RGB` / `#RRGGBB`
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.hex.is_empty() {
            return Err(ControlError::Validation("missing hex".into()));
        }
        if !is_valid_hex(&self.hex) {
            return Err(ControlError::Validation("invalid hex".into()));
        }
        Ok(())
    }
}

impl Default for ColorDoc {
    fn default() -> Self {
        Self::new(crate::consts::DEFAULT_CAR_HEX, crate::consts::DEFAULT_CAR_NAME)
    }
}

/// Final score pushed by the game on game over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub lanes: u32,
}

/// Liveness of the tracked game process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

/// Outcome of the most recent launch; fields fill in as the run progresses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastRunSummary {
    pub score: Option<u64>,
    pub lanes: Option<u32>,
    /// Unix seconds
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    /// Whole seconds between start and end (floored)
    pub duration_s: Option<u64>,
}

impl LastRunSummary {
    /// Stamp the end of the run if nothing has yet
    pub fn close(&mut self, now: f64) {
        if self.end_time.is_none() {
            if let Some(start) = self.start_time {
                self.end_time = Some(now);
                self.duration_s = Some(whole_seconds(now - start));
            }
        }
    }
}

/// Floor a non-negative duration to whole seconds
pub fn whole_seconds(secs: f64) -> u64 {
    secs.max(0.0).floor() as u64
}

/// Body of a start request from the dashboard UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub lanes: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Reply to a successful start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReply {
    pub pid: u32,
    pub lanes: u32,
}

/// Reply to a successful stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReply {
    /// Exit status, `None` if the platform reported none (e.g. killed by signal)
    pub retcode: Option<i32>,
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One dashboard log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix seconds
    #[serde(rename = "t")]
    pub timestamp: f64,
    pub level: LogLevel,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(rename = "extra", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Counters derived from the log ring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub launch_count: usize,
    pub scored_runs: usize,
}

/// Reply to a log query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub logs: Vec<LogEntry>,
    pub stats: LogStats,
}

/// Dashboard theme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDoc {
    #[serde(default)]
    pub key: String,
}

/// Parameters the dashboard passes to a new game process
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchParams {
    /// Already clamped to the supported range
    pub lanes: usize,
    pub difficulty: Difficulty,
    /// Origin marker; games launched by the dashboard poll it for color
    pub caller: Option<String>,
    pub car_color: Option<String>,
    /// Where the game should reach the dashboard
    pub control_url: Option<String>,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES,
            difficulty: Difficulty::Normal,
            caller: None,
            car_color: None,
            control_url: None,
        }
    }
}

impl LaunchParams {
    /// True when the dashboard launched this game
    pub fn from_dashboard(&self) -> bool {
        self.caller.as_deref() == Some(DASHBOARD_CALLER)
    }

    /// Command-line form understood by the game binary
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--lanes".to_string(), self.lanes.to_string()];
        if let Some(caller) = &self.caller {
            args.push("--caller".into());
            args.push(caller.clone());
        }
        if self.difficulty == Difficulty::Hard {
            args.push("--hard".into());
        }
        if let Some(color) = &self.car_color {
            args.push("--car-color".into());
            args.push(color.clone());
        }
        if let Some(url) = &self.control_url {
            args.push("--control-url".into());
            args.push(url.clone());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_validation() {
        assert!(ColorDoc::new("#0f766e", "Teal Dark").validate().is_ok());
        assert!(ColorDoc::new("#abc", "").validate().is_ok());
        assert!(matches!(
            ColorDoc::new("not-a-color", "x").validate(),
            Err(ControlError::Validation(msg)) if msg == "invalid hex"
        ));
        assert!(matches!(
            ColorDoc::new("", "x").validate(),
            Err(ControlError::Validation(msg)) if msg == "missing hex"
        ));
    }

    #[test]
    fn test_score_defaults_missing_fields() {
        let doc: ScoreSubmission = serde_json::from_str(r#"{"score": 7}"#).unwrap();
        assert_eq!(doc, ScoreSubmission { score: 7, lanes: 0 });
        assert!(serde_json::from_str::<ScoreSubmission>(r#"{"score": -3}"#).is_err());
    }

    #[test]
    fn test_log_entry_wire_names() {
        let entry = LogEntry {
            timestamp: 1.5,
            level: LogLevel::Warn,
            message: "hello".into(),
            detail: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"t": 1.5, "level": "warn", "msg": "hello"}));
    }

    #[test]
    fn test_summary_close_once() {
        let mut summary = LastRunSummary {
            start_time: Some(100.0),
            ..Default::default()
        };
        summary.close(112.9);
        assert_eq!(summary.duration_s, Some(12));
        summary.close(500.0);
        assert_eq!(summary.end_time, Some(112.9));
    }

    #[test]
    fn test_launch_args() {
        let params = LaunchParams {
            lanes: 4,
            difficulty: Difficulty::Hard,
            caller: Some(DASHBOARD_CALLER.into()),
            car_color: Some("#0f766e".into()),
            control_url: None,
        };
        assert!(params.from_dashboard());
        assert_eq!(
            params.to_args(),
            vec!["--lanes", "4", "--caller", "dashboard", "--hard", "--car-color", "#0f766e"]
        );
    }
}

//! Game-side control plane calls
//!
//! Color pulls and score pushes are at-most-once, time-boxed and never retried.
//! They run on a small private runtime; the tick loop only ever does a
//! non-blocking channel read, so a dead dashboard costs the game nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::consts::{COLOR_PULL_TIMEOUT_MS, SCORE_PUSH_TIMEOUT_MS};
use crate::protocol::{ColorDoc, ControlError, ScoreSubmission, routes};

/// What the game loop needs from the dashboard
pub trait ControlPlane {
    /// Start a color pull unless one is already in flight
    fn request_color(&mut self);
    /// Most recent color delivered since the last call, if any
    fn take_color(&mut self) -> Option<ColorDoc>;
    /// Fire-and-forget final score
    fn submit_score(&mut self, submission: ScoreSubmission);
}

/// GET the dashboard's current color
pub async fn fetch_color(
    http: &Client,
    base_url: &str,
    timeout: Duration,
) -> Result<ColorDoc, ControlError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), routes::COLOR);
    let resp = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .timeout(timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ControlError::Unreachable(e.to_string()))?;
    let doc: ColorDoc = resp
        .json()
        .await
        .map_err(|e| ControlError::Unreachable(e.to_string()))?;
    doc.validate()?;
    Ok(doc)
}

/// POST a final score
pub async fn post_score(
    http: &Client,
    base_url: &str,
    submission: &ScoreSubmission,
    timeout: Duration,
) -> Result<(), ControlError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), routes::SUBMIT_SCORE);
    http.post(url)
        .json(submission)
        .timeout(timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ControlError::Unreachable(e.to_string()))?;
    Ok(())
}

/// HTTP implementation of [`ControlPlane`]
pub struct HttpControl {
    runtime: Runtime,
    http: Client,
    base_url: String,
    color_tx: mpsc::Sender<ColorDoc>,
    color_rx: mpsc::Receiver<ColorDoc>,
    color_in_flight: Arc<AtomicBool>,
    score_tasks: Vec<JoinHandle<()>>,
}

impl HttpControl {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("control-client")
            .enable_all()
            .build()
            .context("failed to start control client runtime")?;
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let (color_tx, color_rx) = mpsc::channel();
        Ok(Self {
            runtime,
            http,
            base_url: base_url.into(),
            color_tx,
            color_rx,
            color_in_flight: Arc::new(AtomicBool::new(false)),
            score_tasks: Vec::new(),
        })
    }

    /// Handle for spawning other background work (signal watchers)
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Give in-flight score pushes up to `grace` to finish, then drop the runtime
    pub fn shutdown(self, grace: Duration) {
        let pending = self.score_tasks;
        if pending.is_empty() {
            return;
        }
        let drained = self.runtime.block_on(async move {
            tokio::time::timeout(grace, async move {
                for task in pending {
                    let _ = task.await;
                }
            })
            .await
        });
        if drained.is_err() {
            log::debug!("Dropped unfinished score submission on exit");
        }
    }
}

impl ControlPlane for HttpControl {
    fn request_color(&mut self) {
        if self.color_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let tx = self.color_tx.clone();
        let in_flight = self.color_in_flight.clone();
        self.runtime.spawn(async move {
            match fetch_color(&http, &base_url, Duration::from_millis(COLOR_PULL_TIMEOUT_MS)).await {
                Ok(doc) => {
                    let _ = tx.send(doc);
                }
                Err(e) => log::debug!("Color pull skipped: {e}"),
            }
            in_flight.store(false, Ordering::Release);
        });
    }

    fn take_color(&mut self) -> Option<ColorDoc> {
        self.color_rx.try_iter().last()
    }

    fn submit_score(&mut self, submission: ScoreSubmission) {
        self.score_tasks.retain(|task| !task.is_finished());
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let task = self.runtime.spawn(async move {
            let timeout = Duration::from_millis(SCORE_PUSH_TIMEOUT_MS);
            match post_score(&http, &base_url, &submission, timeout).await {
                Ok(()) => log::info!("Score {} submitted", submission.score),
                Err(e) => log::debug!("Score submission dropped: {e}"),
            }
        });
        self.score_tasks.push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_dashboard_is_soft_error() {
        // Nothing listens on port 9 on loopback in CI
        let http = Client::new();
        let err = fetch_color(&http, "http://127.0.0.1:9", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Unreachable(_)));

        let submission = ScoreSubmission { score: 1, lanes: 3 };
        let err = post_score(&http, "http://127.0.0.1:9", &submission, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Unreachable(_)));
    }

    #[test]
    fn test_http_control_without_peer_keeps_running() {
        let mut control = HttpControl::new("http://127.0.0.1:9").unwrap();
        control.request_color();
        // Second request while the first is pending is a no-op
        control.request_color();
        control.submit_score(ScoreSubmission { score: 4, lanes: 2 });
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(control.take_color(), None);
        control.shutdown(Duration::from_secs(2));
    }
}

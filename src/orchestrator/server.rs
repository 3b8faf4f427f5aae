//! HTTP surface of the dashboard
//!
//! Thin axum handlers: parse the body, hop onto the blocking pool, lock the
//! [`Dashboard`], call one transition, serialize the reply. Bodies are parsed
//! by hand so a missing or wrong `Content-Type` is tolerated the same way a
//! malformed body is rejected: with a `{ ok: false, error }` reply.

use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::dashboard::Dashboard;
use crate::protocol::{ColorDoc, ControlError, ScoreSubmission, StartRequest, ThemeDoc, routes};

/// Dashboard shared between request handlers
pub type SharedDashboard = Arc<Mutex<Dashboard>>;

#[derive(Clone)]
struct AppState {
    dashboard: SharedDashboard,
}

impl ControlError {
    pub fn status(&self) -> StatusCode {
        match self {
            ControlError::Validation(_)
            | ControlError::AlreadyRunning { .. }
            | ControlError::NotRunning => StatusCode::BAD_REQUEST,
            ControlError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            ControlError::LaunchFailure(_) | ControlError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let mut body = json!({ "ok": false, "error": self.to_string() });
        if let ControlError::AlreadyRunning { pid } = &self {
            body["meta"] = json!({ "pid": pid });
        }
        (self.status(), Json(body)).into_response()
    }
}

/// Run `f` against the locked dashboard on the blocking pool
async fn with_dashboard<R, F>(state: &AppState, f: F) -> Result<R, ControlError>
where
    R: Send + 'static,
    F: FnOnce(&mut Dashboard) -> R + Send + 'static,
{
    let dashboard = state.dashboard.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = dashboard.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    })
    .await
    .map_err(|e| ControlError::Internal(format!("dashboard worker failed: {e}")))
}

/// Empty body means "all defaults"
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ControlError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ControlError::Validation("invalid JSON".into()))
}

fn ok_with(key: &str, value: Value) -> Json<Value> {
    let mut body = json!({ "ok": true });
    body[key] = value;
    Json(body)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn runtime(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let status = with_dashboard(&state, |d| d.query_runtime()).await?;
    Ok(Json(status))
}

async fn start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ControlError> {
    let request: StartRequest = parse_body(&body)?;
    let reply = with_dashboard(&state, move |d| d.start(request)).await??;
    Ok(ok_with("meta", json!(reply)))
}

async fn stop(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let reply = with_dashboard(&state, |d| d.stop()).await??;
    Ok(ok_with("meta", json!(reply)))
}

async fn submit_score(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ControlError> {
    let parsed = serde_json::from_slice::<ScoreSubmission>(&body);
    with_dashboard(&state, move |d| match parsed {
        Ok(submission) => {
            d.submit_score(submission);
            Ok(())
        }
        Err(_) => Err(d.reject_score()),
    })
    .await??;
    Ok(Json(json!({ "ok": true })))
}

async fn last_run(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let summary = with_dashboard(&state, |d| d.last_run()).await?;
    Ok(Json(summary))
}

async fn logs(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let query = with_dashboard(&state, |d| d.logs()).await?;
    Ok(Json(query))
}

async fn clear_logs(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    with_dashboard(&state, |d| d.clear_logs()).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn color(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let doc = with_dashboard(&state, |d| d.color()).await?;
    Ok(Json(doc))
}

async fn set_color(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ControlError> {
    let doc: ColorDoc = serde_json::from_slice(&body)
        .map_err(|_| ControlError::Validation("invalid JSON".into()))?;
    let stored = with_dashboard(&state, move |d| d.set_color(doc)).await??;
    Ok(ok_with("color", json!(stored)))
}

async fn theme(State(state): State<AppState>) -> Result<impl IntoResponse, ControlError> {
    let theme = with_dashboard(&state, |d| d.theme()).await?;
    Ok(Json(json!({ "key": theme.as_str() })))
}

async fn set_theme(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ControlError> {
    let doc: ThemeDoc = parse_body(&body)?;
    let theme = with_dashboard(&state, move |d| d.set_theme(&doc.key)).await?;
    Ok(ok_with("key", json!(theme.as_str())))
}

/// Routes of the control plane
pub fn router(dashboard: SharedDashboard) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health))
        .route(routes::RUNTIME, get(runtime))
        .route(routes::START, post(start))
        .route(routes::STOP, post(stop))
        .route(routes::SUBMIT_SCORE, post(submit_score))
        .route(routes::LAST_RUN, get(last_run))
        .route(routes::LOGS, get(logs))
        .route(routes::CLEAR_LOGS, post(clear_logs))
        .route(routes::COLOR, get(color))
        .route(routes::SET_COLOR, post(set_color))
        .route(routes::THEME, get(theme))
        .route(routes::SET_THEME, post(set_theme))
        .with_state(AppState { dashboard })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Client;
    use tokio::net::TcpListener;

    use super::*;
    use crate::client::{ControlPlane, HttpControl, fetch_color, post_score};
    use crate::orchestrator::dashboard::test_support::{ManualClock, dashboard};
    use crate::orchestrator::process::fake::FakeLauncher;
    use crate::protocol::{LastRunSummary, LogQuery, RuntimeStatus};

    async fn spawn_server(dash: Dashboard) -> (String, SharedDashboard) {
        let shared = Arc::new(Mutex::new(dash));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(shared.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), shared)
    }

    fn timeout() -> Duration {
        Duration::from_secs(2)
    }

    #[tokio::test]
    async fn test_color_push_then_pull() {
        let (base, _) = spawn_server(dashboard(FakeLauncher::new(), ManualClock::starting_at(0))).await;
        let http = Client::new();

        let resp = http
            .post(format!("{base}{}", routes::SET_COLOR))
            .json(&json!({ "hex": "#0f766e", "name": "Teal Dark" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["color"]["hex"], "#0f766e");

        let pulled = fetch_color(&http, &base, timeout()).await.unwrap();
        assert_eq!(pulled, ColorDoc::new("#0f766e", "Teal Dark"));

        let resp = http
            .post(format!("{base}{}", routes::SET_COLOR))
            .json(&json!({ "hex": "not-a-color", "name": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "ok": false, "error": "invalid hex" }));

        let pulled = fetch_color(&http, &base, timeout()).await.unwrap();
        assert_eq!(pulled, ColorDoc::new("#0f766e", "Teal Dark"));
    }

    #[tokio::test]
    async fn test_start_score_last_run() {
        let clock = ManualClock::starting_at(500);
        let (base, _) = spawn_server(dashboard(FakeLauncher::new(), clock.clone())).await;
        let http = Client::new();

        let resp = http
            .post(format!("{base}{}", routes::START))
            .json(&json!({ "lanes": 3 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["meta"]["lanes"], 3);
        let pid = body["meta"]["pid"].as_u64().unwrap();

        // Second start is refused with the live pid
        let resp = http.post(format!("{base}{}", routes::START)).send().await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "game already running");
        assert_eq!(body["meta"]["pid"], pid);

        clock.advance_ms(12_400);
        post_score(&http, &base, &ScoreSubmission { score: 12, lanes: 3 }, timeout())
            .await
            .unwrap();

        let summary: LastRunSummary = http
            .get(format!("{base}{}", routes::LAST_RUN))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary.score, Some(12));
        assert_eq!(summary.lanes, Some(3));
        assert_eq!(summary.duration_s, Some(12));

        let status: RuntimeStatus = http
            .get(format!("{base}{}", routes::RUNTIME))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(status.running);

        let resp = http.post(format!("{base}{}", routes::STOP)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = http.post(format!("{base}{}", routes::STOP)).send().await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_bad_score_body_rejected_and_logged() {
        let (base, _) = spawn_server(dashboard(FakeLauncher::new(), ManualClock::starting_at(0))).await;
        let http = Client::new();
        let resp = http
            .post(format!("{base}{}", routes::SUBMIT_SCORE))
            .body("{score: twelve")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let logs: LogQuery = http
            .get(format!("{base}{}", routes::LOGS))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(logs.logs.iter().any(|e| e.message == "submit_score invalid JSON"));
        assert_eq!(logs.stats.scored_runs, 0);
    }

    #[tokio::test]
    async fn test_theme_and_health() {
        let (base, shared) = spawn_server(dashboard(FakeLauncher::new(), ManualClock::starting_at(0))).await;
        let http = Client::new();

        let body: Value = http
            .post(format!("{base}{}", routes::SET_THEME))
            .body(r#"{"key":"neon"}"#)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "ok": true, "key": "green" }));

        let body: Value = http
            .get(format!("{base}{}", routes::HEALTH))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");

        http.post(format!("{base}{}", routes::CLEAR_LOGS)).send().await.unwrap();
        let dash = shared.lock().unwrap();
        assert_eq!(dash.logs().logs.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_game_client_picks_up_color() {
        let (base, _) = spawn_server(dashboard(FakeLauncher::new(), ManualClock::starting_at(0))).await;
        Client::new()
            .post(format!("{base}{}", routes::SET_COLOR))
            .json(&ColorDoc::new("#9f1239", "Crimson"))
            .send()
            .await
            .unwrap();

        // The game-side client owns a runtime; drive it from a plain thread
        let picked = tokio::task::spawn_blocking(move || {
            std::thread::spawn(move || {
                let mut control = HttpControl::new(base).unwrap();
                control.request_color();
                let deadline = std::time::Instant::now() + Duration::from_secs(3);
                while std::time::Instant::now() < deadline {
                    if let Some(doc) = control.take_color() {
                        return Some(doc);
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                None
            })
            .join()
            .unwrap()
        })
        .await
        .unwrap();
        assert_eq!(picked, Some(ColorDoc::new("#9f1239", "Crimson")));
    }
}

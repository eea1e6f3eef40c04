use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::board::StatusBoard;
use crate::controller::{Controller, StartOutcome, StopOutcome};
use crate::models::{ProbeReport, RunState};

/// Shared with every handler.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<Controller>,
    pub board: Arc<Mutex<StatusBoard>>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: RunState,
    pub target: String,
    pub probe_timeout_ms: u64,
    pub loop_interval_ms: u64,
    pub latest: Option<ProbeReport>,
    pub recent: Vec<ProbeReport>,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub state: RunState,
    pub changed: bool,
}

pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let config = state.controller.config();
    let (latest, recent) = {
        let board = state.board.lock().await;
        (board.last().cloned(), board.recent())
    };
    Json(StatusResponse {
        state: state.controller.state(),
        target: config.target().to_string(),
        probe_timeout_ms: config.probe_timeout().as_millis() as u64,
        loop_interval_ms: config.loop_interval().as_millis() as u64,
        latest,
        recent,
    })
}

pub async fn post_start(
    State(state): State<ApiState>,
) -> Result<Json<ControlResponse>, (StatusCode, String)> {
    match state.controller.start() {
        Ok(outcome) => Ok(Json(ControlResponse {
            state: state.controller.state(),
            changed: outcome == StartOutcome::Started,
        })),
        Err(e) => {
            warn!("Start via API failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn post_stop(State(state): State<ApiState>) -> Json<ControlResponse> {
    let outcome = state.controller.stop().await;
    Json(ControlResponse {
        state: state.controller.state(),
        changed: outcome == StopOutcome::Stopped,
    })
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/start", post(post_start))
        .route("/api/stop", post(post_stop))
        .with_state(state)
}

pub async fn start_server(port: u16, state: ApiState) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    info!("Control API: http://localhost:{}/api/status", addr.port());
    axum::serve(listener, app).await.context("Control API server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::models::{ProbeOutcome, ProbeTarget};
    use crate::observer::ProbeObserver;
    use crate::prober::Prober;
    use async_trait::async_trait;
    use std::time::Duration;

    struct AlwaysUp;

    #[async_trait]
    impl Prober for AlwaysUp {
        async fn probe(&self, _target: &ProbeTarget, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::Reachable
        }
    }

    fn api_state() -> ApiState {
        let config = ControllerConfig::new(
            "status.example",
            Duration::from_millis(50),
            Duration::from_secs(60),
        )
        .unwrap();
        let board = Arc::new(Mutex::new(StatusBoard::default()));
        let observer: Arc<dyn ProbeObserver> = Arc::new(|_: ProbeReport| {});
        ApiState {
            controller: Arc::new(Controller::new(config, Arc::new(AlwaysUp), observer)),
            board,
        }
    }

    #[tokio::test]
    async fn start_and_stop_toggle_run_state() {
        let state = api_state();

        let Json(started) = post_start(State(state.clone())).await.unwrap();
        assert!(started.changed);
        assert_eq!(started.state, RunState::Running);

        let Json(again) = post_start(State(state.clone())).await.unwrap();
        assert!(!again.changed);

        let Json(stopped) = post_stop(State(state.clone())).await;
        assert!(stopped.changed);
        assert_eq!(stopped.state, RunState::Idle);

        let Json(idle) = post_stop(State(state)).await;
        assert!(!idle.changed);
    }

    #[tokio::test]
    async fn status_reports_config_and_recent_outcomes() {
        let state = api_state();
        let Json(status) = get_status(State(state.clone())).await;
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.target, "status.example");
        assert_eq!(status.probe_timeout_ms, 50);
        assert_eq!(status.loop_interval_ms, 60_000);
        assert!(status.latest.is_none());
        assert!(status.recent.is_empty());

        state.board.lock().await.record(ProbeReport::new(
            1,
            ProbeTarget::new("status.example").unwrap(),
            chrono::Utc::now(),
            ProbeOutcome::Unreachable,
            Duration::from_millis(50),
        ));
        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.recent.len(), 1);
        assert_eq!(status.recent[0].outcome, ProbeOutcome::Unreachable);
        assert_eq!(status.latest.map(|r| r.sequence), Some(1));
    }
}

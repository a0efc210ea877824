//! Readiness/liveness surface (§6).
//!
//! The worker itself has no request traffic to drain, so this is a
//! pared-down version of the shutdown controller pattern: the health
//! state still moves `Starting -> Ready -> Draining -> Stopped`, but
//! there is no in-flight request counter to wait on.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::watch;

/// Worker process health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Ready => "ready",
            HealthState::Draining => "draining",
            HealthState::Stopped => "stopped",
        }
    }
}

/// Tracks health state and shutdown notification for the worker
/// process and its health HTTP surface.
#[derive(Debug)]
pub struct HealthController {
    state: Arc<ArcSwap<HealthState>>,
    shutdown_signal: watch::Sender<bool>,
}

impl HealthController {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
            shutdown_signal: tx,
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    pub fn set_draining(&self) {
        self.state.store(Arc::new(HealthState::Draining));
        let _ = self.shutdown_signal.send(true);
    }

    pub fn set_stopped(&self) {
        self.state.store(Arc::new(HealthState::Stopped));
    }

    #[must_use]
    pub fn state(&self) -> HealthState {
        **self.state.load()
    }

    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }
}

impl Default for HealthController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthController>,
}

/// Builds the `/healthz` (readiness) and `/livez` (liveness) router.
#[must_use]
pub fn router(health: Arc<HealthController>) -> Router {
    let state = AppState { health };
    Router::new()
        .route("/healthz", get(readiness_handler))
        .route("/livez", get(liveness_handler))
        .with_state(state)
}

async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn readiness_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let health = state.health.state();
    let status = if health == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "state": health.as_str() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_starting() {
        let controller = HealthController::new();
        assert_eq!(controller.state(), HealthState::Starting);
    }

    #[test]
    fn set_ready_then_draining_then_stopped() {
        let controller = HealthController::new();
        controller.set_ready();
        assert_eq!(controller.state(), HealthState::Ready);
        controller.set_draining();
        assert_eq!(controller.state(), HealthState::Draining);
        controller.set_stopped();
        assert_eq!(controller.state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn set_draining_notifies_shutdown_receiver() {
        let controller = HealthController::new();
        let mut rx = controller.shutdown_receiver();
        assert!(!*rx.borrow());
        controller.set_draining();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn readiness_handler_reports_503_until_ready() {
        let controller = Arc::new(HealthController::new());
        let state = AppState { health: controller.clone() };
        let (status, _) = readiness_handler(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        controller.set_ready();
        let (status, _) = readiness_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn liveness_handler_always_reports_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }
}

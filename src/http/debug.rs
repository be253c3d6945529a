//! Отладочный слушатель: счётчики процесса.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{pubsub::BrokerStats, schedule::StoreStats};

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamVars {
    pub active: usize,
    pub opened: u64,
    pub delivered: u64,
}

#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub build: String,
    pub environment: String,
    pub broker: BrokerStats,
    pub store: StoreStats,
    pub streams: StreamVars,
}

pub fn debug_router(state: AppState) -> Router {
    Router::new()
        .route("/debug/vars", get(vars))
        .route("/debug/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn vars(State(state): State<AppState>) -> Json<DebugVars> {
    Json(DebugVars {
        build: state.settings.build.clone(),
        environment: state.settings.environment.to_string(),
        broker: state.broker.stats(),
        store: state.store.stats(),
        streams: StreamVars {
            active: state.feeds.active(),
            opened: state.feeds.opened(),
            delivered: state.feeds.delivered(),
        },
    })
}

//! HTTP-поверхность сервиса.
//!
//! - `api_router`: поток сообщений, health/warmup, RPC `Chat`, задачи.
//! - `debug_router`: счётчики процесса (только в окружении `local`).
//! - [`HttpServer`]: слушатель с graceful shutdown.

pub mod debug;
pub mod health;
pub mod rpc;
pub mod server;
pub mod state;
pub mod stream;
pub mod tasks;

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
pub use debug::debug_router;
pub use server::HttpServer;
pub use state::AppState;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info_span, warn};

use crate::SERVICE_NAME;

pub fn api_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.web.allowed_origins);
    let build = state.settings.build.clone();
    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request| {
        info_span!(
            "http_request",
            service = SERVICE_NAME,
            build = %build,
            method = %request.method(),
            uri = %request.uri(),
        )
    });

    Router::new()
        .route("/_ah/health", get(health::health))
        .route("/_ah/warmup", get(health::warmup))
        .route("/stream", get(stream::stream_handler))
        .route("/rpc/Chat/Ping", post(rpc::ping))
        .route("/rpc/Chat/Version", post(rpc::version))
        .route("/rpc/Chat/CreateChatMessage", post(rpc::create_chat_message))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/{owner}/{period}", get(tasks::read_partition))
        .route(
            "/tasks/{owner}/{period}/{day}/{start_hour}",
            get(tasks::read_task).delete(tasks::delete_task),
        )
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

/// CORS для браузерных клиентов: только перечисленные источники, с
/// передачей учётных данных.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::USER_AGENT,
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

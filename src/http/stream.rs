//! Потоковый эндпоинт `GET /stream` (Server-Sent Events).

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures::{future, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    stream::ClientFeed,
};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Открывает поток сообщений клиента.
///
/// Поток живёт, пока клиент подключён, брокер не сообщил об ошибке и
/// сервер не начал остановку. Каждое сообщение отдаётся событием `message`
/// с полезной нагрузкой без изменений; нагрузка не в UTF-8 пропускается.
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> ApiResult<impl IntoResponse> {
    let email = params
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("email query parameter is required".into()))?;
    let role = params.role.unwrap_or_default();

    let feed = ClientFeed::open(
        state.bridge(),
        state.shutdown.child_token(),
        &email,
        state.settings.stream.feed_config(),
        state.feeds.clone(),
    );
    info!(topic = feed.topic(), %role, "Client stream opened");

    // SSE передаёт только текст: нагрузку не в UTF-8 пропускаем, а не
    // искажаем.
    let topic = feed.topic().to_string();
    let events = feed.into_stream().filter_map(move |payload| {
        let event = match std::str::from_utf8(&payload) {
            Ok(text) => Some(Ok::<_, Infallible>(
                Event::default().event("message").data(text),
            )),
            Err(err) => {
                warn!(%topic, error = %err, len = payload.len(), "Skipping non UTF-8 payload");
                None
            }
        };
        future::ready(event)
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    ))
}

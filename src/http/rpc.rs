//! RPC-эндпоинты сервиса `Chat` (`POST /rpc/Chat/<Method>`).

use axum::{extract::State, Json};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    pubsub::Broker,
};

pub const WEBRPC_VERSION: &str = "v1";
pub const SCHEMA_VERSION: &str = "0.0.1";
pub const SCHEMA_HASH: &str = "a4fdc6d6993d7313905a53c2e256053b6a0b3ee2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub webrpc_version: String,
    pub schema_version: String,
    pub schema_hash: String,
    pub app_version: String,
}

/// Сообщение чата в том виде, в каком его видят клиенты.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub to_email: String,
    #[serde(rename = "messageUUID", default)]
    pub message_uuid: String,
    #[serde(rename = "PK", default)]
    pub pk: String,
    #[serde(rename = "SK", default)]
    pub sk: String,
    #[serde(default)]
    pub message_text: String,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: String,
}

impl ChatMessage {
    fn validate(&self) -> ApiResult<()> {
        let required = [
            ("fromEmail", &self.from_email),
            ("toEmail", &self.to_email),
            ("messageText", &self.message_text),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ApiError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingReturn {
    pub status: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionReturn {
    pub version: Version,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChatMessageArgs {
    pub req: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChatMessageReturn {
    pub res: bool,
}

pub async fn ping() -> Json<PingReturn> {
    Json(PingReturn { status: true })
}

pub async fn version(State(state): State<AppState>) -> Json<VersionReturn> {
    Json(VersionReturn {
        version: Version {
            webrpc_version: WEBRPC_VERSION.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            schema_hash: SCHEMA_HASH.to_string(),
            app_version: state.settings.build.clone(),
        },
    })
}

/// Публикует сообщение в темы получателя и отправителя, чтобы оба увидели
/// его в своих потоках.
pub async fn create_chat_message(
    State(state): State<AppState>,
    Json(args): Json<CreateChatMessageArgs>,
) -> ApiResult<Json<CreateChatMessageReturn>> {
    let mut message = args.req;
    message.validate()?;
    // Темы строятся так же, как в `GET /stream`.
    message.to_email = message.to_email.trim().to_string();
    message.from_email = message.from_email.trim().to_string();
    if message.message_uuid.is_empty() {
        message.message_uuid = Uuid::new_v4().to_string();
    }
    if message.updated_at.is_none() {
        message.updated_at = Some(Utc::now());
    }

    let payload = Bytes::from(serde_json::to_vec(&message).map_err(anyhow::Error::from)?);

    let mut topics = vec![state.chat_topic(&message.to_email)];
    let sender_topic = state.chat_topic(&message.from_email);
    if !topics.contains(&sender_topic) {
        topics.push(sender_topic);
    }

    for topic in &topics {
        if let Err(err) = state.broker.publish(topic, payload.clone()).await {
            error!(%topic, error = %err, "Cannot publish chat message after creation");
            return Err(err.into());
        }
    }

    info!(
        message_uuid = %message.message_uuid,
        to = %message.to_email,
        from = %message.from_email,
        "Chat message published"
    );
    Ok(Json(CreateChatMessageReturn { res: true }))
}

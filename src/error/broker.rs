use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Ошибки брокера сообщений.
///
/// Транспортные ошибки не повторяются автоматически: они передаются
/// вызывающему коду (публикация) или один раз отправляются в канал ошибок
/// подписки.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("cannot publish to topic {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("cannot subscribe to topic {topic}: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("subscriber on topic {topic} lagged behind by {skipped} messages")]
    Lagged { topic: String, skipped: u64 },

    #[error("topic {topic} was closed by the broker")]
    Closed { topic: String },
}

impl BrokerError {
    /// Тема, к которой относится ошибка.
    pub fn topic(&self) -> &str {
        match self {
            BrokerError::InvalidTopic(topic) => topic,
            BrokerError::PublishFailed { topic, .. }
            | BrokerError::SubscribeFailed { topic, .. }
            | BrokerError::Lagged { topic, .. }
            | BrokerError::Closed { topic } => topic,
        }
    }
}

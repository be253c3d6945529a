use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::{
    error::BrokerError,
    pubsub::{chat_topic, Broker},
};

/// Адаптер клиента к брокеру.
///
/// Создаётся заново на каждый потоковый запрос. Сам от брокера не
/// отписывается: отмена `cancel` одновременно завершает и мост, и подписку.
#[derive(Clone)]
pub struct SubscriptionBridge {
    broker: Arc<dyn Broker>,
    prefix: Arc<str>,
}

impl SubscriptionBridge {
    pub fn new(
        broker: Arc<dyn Broker>,
        prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            broker,
            prefix: prefix.into(),
        }
    }

    /// Полное имя темы для идентификатора клиента.
    pub fn topic_for(
        &self,
        identifier: &str,
    ) -> String {
        chat_topic(&self.prefix, identifier)
    }

    /// Запускает подписку отдельной задачей и ждёт отмены `cancel`.
    ///
    /// Возвращается только после завершения задачи подписки. Если брокер
    /// закрыл `messages` раньше, мост всё равно ждёт отмены: завершение
    /// ответа клиенту остаётся за обработчиком.
    pub async fn start(
        self,
        cancel: CancellationToken,
        identifier: &str,
        messages: mpsc::Sender<Bytes>,
        errors: mpsc::Sender<BrokerError>,
    ) {
        let topic = self.topic_for(identifier);
        info!(topic, "Streamer started");

        let subscription = tokio::spawn({
            let broker = self.broker.clone();
            let cancel = cancel.clone();
            let topic = topic.clone();
            async move { broker.subscribe(cancel, topic, messages, errors).await }
                .in_current_span()
        });

        cancel.cancelled().await;
        info!(topic, "Client closed connection on topic");

        if let Err(err) = subscription.await {
            warn!(topic, error = %err, "Broker subscription task failed");
        }
        info!(topic, "Streamer closed");
    }
}

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::Settings,
    lifecycle::ShutdownHandle,
    pubsub::LocalBroker,
    schedule::ScheduleStore,
    stream::{FeedMetrics, SubscriptionBridge},
};

/// Общее состояние обработчиков.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub broker: Arc<LocalBroker>,
    pub store: ScheduleStore,
    pub feeds: Arc<FeedMetrics>,
    /// Токен остановки HTTP-сервера. Потоки клиентов берут от него дочерние.
    pub shutdown: CancellationToken,
    pub shutdown_handle: ShutdownHandle,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        broker: Arc<LocalBroker>,
        store: ScheduleStore,
        shutdown: CancellationToken,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            settings,
            broker,
            store,
            feeds: Arc::new(FeedMetrics::default()),
            shutdown,
            shutdown_handle,
        }
    }

    /// Мост для нового клиентского потока.
    pub fn bridge(&self) -> SubscriptionBridge {
        SubscriptionBridge::new(
            self.broker.clone(),
            self.settings.broker.chat_topic_prefix.as_str(),
        )
    }

    pub fn chat_topic(
        &self,
        identifier: &str,
    ) -> String {
        crate::pubsub::chat_topic(&self.settings.broker.chat_topic_prefix, identifier)
    }
}

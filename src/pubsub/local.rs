use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{validate_topic, Broker, Message, Subscription};
use crate::error::{BrokerError, BrokerResult};

/// Ёмкость буфера темы по умолчанию.
pub const DEFAULT_TOPIC_CAPACITY: usize = 512;

type TopicKey = Arc<str>;

/// Внутрипроцессный брокер сообщений.
///
/// Поддерживает:
/// - Точные подписки по имени темы
/// - Автоматическое удаление тем без подписчиков
/// - Статистику публикаций и неудачных отправок
pub struct LocalBroker {
    /// Тема → `Sender`
    topics: DashMap<TopicKey, broadcast::Sender<Message>>,
    /// Ёмкость буфера каждого `broadcast::channel`
    capacity: usize,
    /// Брокер закрыт: публикации и новые подписки отклоняются
    closed: AtomicBool,
    /// Общее количество вызовов `publish`
    publish_count: AtomicUsize,
    /// Количество публикаций без подписчиков
    send_error_count: AtomicUsize,
}

/// Снимок счётчиков брокера.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BrokerStats {
    pub publish_count: usize,
    pub send_error_count: usize,
    pub topics: usize,
}

impl LocalBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
            publish_count: AtomicUsize::new(0),
            send_error_count: AtomicUsize::new(0),
        }
    }

    /// Открывает подписку на тему (точное совпадение).
    pub fn open(
        &self,
        topic: &str,
    ) -> BrokerResult<Subscription> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "broker is closed".into(),
            });
        }
        validate_topic(topic).map_err(|err| BrokerError::SubscribeFailed {
            topic: topic.to_string(),
            reason: err.to_string(),
        })?;

        // Receiver создаётся под блокировкой шарда, иначе `prune` может
        // удалить тему между вставкой и подпиской.
        let key: TopicKey = Arc::from(topic);
        let rx = self
            .topics
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Ok(Subscription::new(key, rx))
    }

    /// Удаляет тему: все её подписчики получат `Closed`.
    pub fn close_topic(
        &self,
        topic: &str,
    ) {
        self.topics.remove(topic);
    }

    /// Закрывает брокер целиком.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.topics.clear();
    }

    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            publish_count: self.publish_count.load(Ordering::Relaxed),
            send_error_count: self.send_error_count.load(Ordering::Relaxed),
            topics: self.topics.len(),
        }
    }

    /// Удаляет тему, если у неё не осталось подписчиков.
    fn prune(
        &self,
        topic: &str,
    ) {
        self.topics
            .remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> BrokerResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::PublishFailed {
                topic: topic.to_string(),
                reason: "broker is closed".into(),
            });
        }
        validate_topic(topic).map_err(|err| BrokerError::PublishFailed {
            topic: topic.to_string(),
            reason: err.to_string(),
        })?;

        self.publish_count.fetch_add(1, Ordering::Relaxed);

        // Нет подписчиков - сообщение никому не нужно, это не ошибка.
        let Some(tx) = self.topics.get(topic).map(|entry| entry.value().clone()) else {
            trace!(topic, "Published to topic without subscribers");
            return Ok(());
        };

        let msg = Message::new(Arc::<str>::from(topic), payload);
        if tx.send(msg).is_err() {
            self.send_error_count.fetch_add(1, Ordering::Relaxed);
            self.prune(topic);
        }
        debug!(topic, "Successfully published to topic");
        Ok(())
    }

    async fn subscribe(
        &self,
        cancel: CancellationToken,
        topic: String,
        messages: mpsc::Sender<Bytes>,
        errors: mpsc::Sender<BrokerError>,
    ) {
        let mut subscription = match self.open(&topic) {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(topic, error = %err, "Cannot subscribe to topic");
                let _ = errors.try_send(err);
                return;
            }
        };
        debug!(topic, "Subscribed to topic");

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(topic, "Subscriber signaled unsubscription from topic");
                    break;
                }
                received = subscription.recv() => received,
            };

            let fault = match received {
                Ok(message) => {
                    // Потребитель может не успевать: ждём места в канале, но
                    // продолжаем реагировать на отмену.
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = messages.send(message.payload) => sent,
                    };
                    if sent.is_err() {
                        debug!(topic, "Message consumer is gone");
                        break;
                    }
                    continue;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => BrokerError::Lagged {
                    topic: topic.clone(),
                    skipped,
                },
                Err(broadcast::error::RecvError::Closed) => BrokerError::Closed {
                    topic: topic.clone(),
                },
            };

            warn!(topic, error = %fault, "Subscription terminated by transport fault");
            let _ = errors.try_send(fault);
            break;
        }

        drop(subscription);
        self.prune(&topic);
        debug!(topic, "Returned from topic");
        // `messages` уничтожается здесь: потребитель видит конец потока.
    }
}

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::SubscriptionBridge;
use crate::error::BrokerError;

/// Ёмкости каналов одного клиентского потока.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub message_buffer: usize,
    pub error_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            message_buffer: 512,
            error_buffer: 100,
        }
    }
}

/// Счётчики клиентских потоков.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    active: AtomicUsize,
    opened: AtomicU64,
    delivered: AtomicU64,
}

impl FeedMetrics {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

/// Поток сообщений одного клиента.
///
/// Владеет каналами сообщений и ошибок и задачей моста. Поток завершается
/// при ошибке брокера, закрытии канала сообщений или уничтожении самого
/// `ClientFeed` (клиент отключился). Во всех случаях общий токен отменяется,
/// и мост вместе с подпиской завершаются.
pub struct ClientFeed {
    topic: String,
    messages: mpsc::Receiver<Bytes>,
    errors: mpsc::Receiver<BrokerError>,
    cancel: CancellationToken,
    bridge: Option<JoinHandle<()>>,
    metrics: Arc<FeedMetrics>,
    finished: bool,
}

impl ClientFeed {
    /// Создаёт каналы, запускает мост отдельной задачей.
    ///
    /// `cancel` - токен клиентского контекста; обычно дочерний токен
    /// остановки HTTP-сервера.
    pub fn open(
        bridge: SubscriptionBridge,
        cancel: CancellationToken,
        identifier: &str,
        config: FeedConfig,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(config.message_buffer.max(1));
        let (err_tx, err_rx) = mpsc::channel(config.error_buffer.max(1));
        let topic = bridge.topic_for(identifier);

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            let identifier = identifier.to_string();
            async move { bridge.start(cancel, &identifier, msg_tx, err_tx).await }
                .in_current_span()
        });

        metrics.active.fetch_add(1, Ordering::Relaxed);
        metrics.opened.fetch_add(1, Ordering::Relaxed);

        Self {
            topic,
            messages: msg_rx,
            errors: err_rx,
            cancel,
            bridge: Some(handle),
            metrics,
            finished: false,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Следующее сообщение для клиента или `None`, если поток завершён.
    pub async fn next(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }

        // Сообщения, уже попавшие в канал до сбоя, отдаются первыми.
        let outcome = tokio::select! {
            biased;
            message = self.messages.recv() => match message {
                Some(payload) => Ok(payload),
                None => Err(None),
            },
            Some(err) = self.errors.recv() => Err(Some(err)),
        };

        match outcome {
            Ok(payload) => {
                debug!(topic = %self.topic, bytes = payload.len(), "SSE message");
                self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                Some(payload)
            }
            Err(Some(err)) => {
                warn!(topic = %self.topic, error = %err, "Cannot receive from broker");
                self.finish();
                None
            }
            Err(None) => {
                info!(topic = %self.topic, "Streamer broker channel closed");
                self.finish();
                None
            }
        }
    }

    /// Превращает поток в `Stream` полезных нагрузок.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send + 'static {
        futures::stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|payload| (payload, feed))
        })
    }

    /// Отменяет поток и ждёт завершения моста.
    pub async fn close(mut self) {
        self.finish();
        if let Some(handle) = self.bridge.take() {
            if let Err(err) = handle.await {
                warn!(topic = %self.topic, error = %err, "Bridge task failed");
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.cancel.cancel();
    }
}

impl Drop for ClientFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.metrics.active.fetch_sub(1, Ordering::Relaxed);
        debug!(topic = %self.topic, "Stream handler ended");
    }
}

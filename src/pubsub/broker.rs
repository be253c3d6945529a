use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{BrokerError, BrokerResult};

/// Абстракция брокера сообщений.
///
/// Реализация отвечает за транспорт; потребители видят только две операции.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Однократная попытка доставить `payload` в тему `topic`.
    ///
    /// Потоки клиентов (SSE) доставляют только нагрузку в UTF-8.
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> BrokerResult<()>;

    /// Подписывается на `topic` и пересылает входящие сообщения в
    /// `messages` до отмены `cancel`.
    ///
    /// Ошибка регистрации или транспорта отправляется в `errors` один раз,
    /// после чего подписка завершается. При любом выходе `messages`
    /// закрывается (отправитель уничтожается), что сигнализирует потребителю
    /// конец потока. Метод занимает вызывающую задачу до отмены или сбоя,
    /// поэтому его запускают отдельной задачей на каждого подписчика.
    async fn subscribe(
        &self,
        cancel: CancellationToken,
        topic: String,
        messages: mpsc::Sender<Bytes>,
        errors: mpsc::Sender<BrokerError>,
    );
}

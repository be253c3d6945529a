use std::sync::Arc;

use tokio::sync::broadcast;

use super::Message;

/// Подписка на конкретную тему.
///
/// Отписка происходит автоматически при `Drop`: внутренний приёмник
/// уничтожается и перестаёт учитываться брокером.
pub struct Subscription {
    /// Тема, на которую подписаны.
    pub topic: Arc<str>,
    pub(crate) inner: broadcast::Receiver<Message>,
}

impl Subscription {
    pub(crate) fn new(
        topic: Arc<str>,
        inner: broadcast::Receiver<Message>,
    ) -> Self {
        Self { topic, inner }
    }

    /// Асинхронно ожидает следующее сообщение темы.
    ///
    /// # Возвращает
    /// - `Ok(Message)` при успешном получении сообщения
    /// - `Err(RecvError::Closed)` если тема закрыта брокером
    /// - `Err(RecvError::Lagged(n))` если подписчик отстал на `n` сообщений
    pub async fn recv(&mut self) -> Result<Message, broadcast::error::RecvError> {
        self.inner.recv().await
    }

    /// Количество сообщений, ожидающих получения.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    /// Тест проверяет, что дроп подписки уменьшает счётчик слушателей.
    #[test]
    fn test_drop_unsubscribes() {
        let (tx, rx) = broadcast::channel(5);
        let sub = Subscription::new(Arc::from("foo"), rx);
        assert_eq!(tx.receiver_count(), 1);
        drop(sub);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_in_order() {
        let (tx, rx) = broadcast::channel(5);
        let mut sub = Subscription::new(Arc::from("t"), rx);
        tx.send(Message::new("t", Bytes::from_static(b"1"))).unwrap();
        tx.send(Message::new("t", Bytes::from_static(b"2"))).unwrap();
        assert_eq!(sub.len(), 2);

        assert_eq!(sub.recv().await.unwrap().payload, Bytes::from_static(b"1"));
        assert_eq!(sub.recv().await.unwrap().payload, Bytes::from_static(b"2"));
        assert!(sub.is_empty());
    }
}

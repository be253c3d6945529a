use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{
    mpsc::{self, error::SendTimeoutError},
    oneshot,
};
use tracing::{debug, info, trace};

use super::{Partition, PartitionKey, SortKey, Task};
use crate::error::{StoreError, StoreResult};

/// Ёмкость очереди команд по умолчанию.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

type Reply<T> = oneshot::Sender<StoreResult<T>>;

/// Команды, которые обрабатывает цикл хранилища.
#[derive(Debug)]
enum Command {
    Create {
        partition: PartitionKey,
        sort: SortKey,
        task: Task,
        reply: Reply<()>,
    },
    Read {
        partition: PartitionKey,
        sort: SortKey,
        reply: Reply<Task>,
    },
    Delete {
        partition: PartitionKey,
        sort: SortKey,
        reply: Reply<()>,
    },
    ReadPartition {
        partition: PartitionKey,
        reply: Reply<Arc<Partition>>,
    },
}

/// Дескриптор таблицы расписания.
///
/// Клонируется свободно: все клоны отправляют команды в один и тот же цикл
/// [`StoreLoop`]. Если очередь заполнена, операции ждут освобождения места
/// (без ограничения по времени, если не задан `submit_timeout`).
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    commands: mpsc::Sender<Command>,
    quit: mpsc::Sender<oneshot::Sender<()>>,
    submit_timeout: Option<Duration>,
}

/// Цикл обработки команд. Единственный владелец таблицы.
#[derive(Debug)]
pub struct StoreLoop {
    commands: mpsc::Receiver<Command>,
    quit: mpsc::Receiver<oneshot::Sender<()>>,
    table: HashMap<PartitionKey, Arc<Partition>>,
}

/// Снимок состояния очереди.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub queue_capacity: usize,
    pub pending: usize,
}

impl ScheduleStore {
    /// Создаёт дескриптор и цикл с очередью ёмкостью `capacity`.
    ///
    /// Цикл нужно запустить через [`StoreLoop::run`], иначе операции будут
    /// ждать бесконечно.
    pub fn new(capacity: usize) -> (Self, StoreLoop) {
        let (commands_tx, commands_rx) = mpsc::channel(capacity.max(1));
        let (quit_tx, quit_rx) = mpsc::channel(1);

        let store = Self {
            commands: commands_tx,
            quit: quit_tx,
            submit_timeout: None,
        };
        let runner = StoreLoop {
            commands: commands_rx,
            quit: quit_rx,
            table: HashMap::new(),
        };
        (store, runner)
    }

    /// Ограничивает ожидание места в очереди. `None` - ждать без ограничения.
    pub fn with_submit_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.submit_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    /// Добавляет задачу. Возвращает `AlreadyExists`, если по этой паре
    /// ключей уже есть запись.
    pub async fn create_task(
        &self,
        partition: PartitionKey,
        sort: SortKey,
        task: Task,
    ) -> StoreResult<()> {
        self.submit(|reply| Command::Create {
            partition,
            sort,
            task,
            reply,
        })
        .await
    }

    pub async fn read_task(
        &self,
        partition: PartitionKey,
        sort: SortKey,
    ) -> StoreResult<Task> {
        self.submit(|reply| Command::Read {
            partition,
            sort,
            reply,
        })
        .await
    }

    pub async fn delete_task(
        &self,
        partition: PartitionKey,
        sort: SortKey,
    ) -> StoreResult<()> {
        self.submit(|reply| Command::Delete {
            partition,
            sort,
            reply,
        })
        .await
    }

    /// Возвращает партицию целиком.
    ///
    /// Партиция отдаётся по `Arc` без копирования. Последующие изменения
    /// таблицы не видны через уже полученную ссылку: цикл копирует партицию
    /// перед записью, пока на неё есть внешние ссылки.
    pub async fn read_partition(
        &self,
        partition: PartitionKey,
    ) -> StoreResult<Arc<Partition>> {
        self.submit(|reply| Command::ReadPartition { partition, reply })
            .await
    }

    /// Просит цикл остановиться и ждёт подтверждения.
    ///
    /// Если цикл уже завершился, возвращается сразу.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.quit.send(ack_tx).await.is_err() {
            debug!("Schedule store already stopped");
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn stats(&self) -> StoreStats {
        let queue_capacity = self.commands.max_capacity();
        StoreStats {
            queue_capacity,
            pending: queue_capacity - self.commands.capacity(),
        }
    }

    async fn submit<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> StoreResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = build(reply_tx);

        match self.submit_timeout {
            None => self
                .commands
                .send(command)
                .await
                .map_err(|_| StoreError::Unavailable)?,
            Some(limit) => match self.commands.send_timeout(command, limit).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => return Err(StoreError::Busy(limit)),
                Err(SendTimeoutError::Closed(_)) => return Err(StoreError::Unavailable),
            },
        }

        // Канал ответа закрывается без значения только если цикл
        // остановился раньше, чем дошёл до команды.
        reply_rx.await.map_err(|_| StoreError::Unavailable)?
    }
}

impl StoreLoop {
    /// Обрабатывает команды строго в порядке поступления до вызова
    /// [`ScheduleStore::stop`].
    pub async fn run(mut self) {
        info!(
            queue_capacity = self.commands.max_capacity(),
            "Schedule store started"
        );

        let ack = loop {
            tokio::select! {
                Some(command) = self.commands.recv() => self.apply(command),
                quit = self.quit.recv() => break quit,
            }
        };

        info!(
            partitions = self.table.len(),
            "Schedule store closed"
        );

        // Подтверждаем остановку уже после выхода из цикла.
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn apply(
        &mut self,
        command: Command,
    ) {
        trace!(?command, "Schedule store command received");

        // Вызывающий мог отменить ожидание: результат тогда просто теряется.
        match command {
            Command::Create {
                partition,
                sort,
                task,
                reply,
            } => {
                let _ = reply.send(self.create(partition, sort, task));
            }
            Command::Read {
                partition,
                sort,
                reply,
            } => {
                let _ = reply.send(self.read(&partition, &sort));
            }
            Command::Delete {
                partition,
                sort,
                reply,
            } => {
                let _ = reply.send(self.delete(&partition, &sort));
            }
            Command::ReadPartition { partition, reply } => {
                let _ = reply.send(
                    self.table
                        .get(&partition)
                        .cloned()
                        .ok_or(StoreError::NotFound),
                );
            }
        }
    }

    fn create(
        &mut self,
        partition: PartitionKey,
        sort: SortKey,
        task: Task,
    ) -> StoreResult<()> {
        let entries = self.table.entry(partition).or_default();
        if entries.contains_key(&sort) {
            return Err(StoreError::AlreadyExists);
        }
        Arc::make_mut(entries).insert(sort, task);
        Ok(())
    }

    fn read(
        &self,
        partition: &PartitionKey,
        sort: &SortKey,
    ) -> StoreResult<Task> {
        self.table
            .get(partition)
            .and_then(|entries| entries.get(sort))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Пустая партиция после удаления остаётся в таблице.
    fn delete(
        &mut self,
        partition: &PartitionKey,
        sort: &SortKey,
    ) -> StoreResult<()> {
        match self.table.get_mut(partition) {
            Some(entries) if entries.contains_key(sort) => {
                Arc::make_mut(entries).remove(sort);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Duration};

    use super::*;

    fn spawn_store() -> (ScheduleStore, tokio::task::JoinHandle<()>) {
        let (store, runner) = ScheduleStore::new(16);
        let handle = tokio::spawn(runner.run());
        (store, handle)
    }

    /// Полный сценарий: создание, повторное создание, чтение, удаление.
    #[tokio::test]
    async fn test_create_read_delete_cycle() {
        let (store, handle) = spawn_store();
        let pk = PartitionKey::new("alice", 1);
        let sk = SortKey::new(2, 9);
        let task = Task::new("drive", 9, 4);

        assert_eq!(store.create_task(pk.clone(), sk, task.clone()).await, Ok(()));
        assert_eq!(
            store.create_task(pk.clone(), sk, task.clone()).await,
            Err(StoreError::AlreadyExists)
        );
        assert_eq!(store.read_task(pk.clone(), sk).await, Ok(task));
        assert_eq!(store.delete_task(pk.clone(), sk).await, Ok(()));
        assert_eq!(store.read_task(pk.clone(), sk).await, Err(StoreError::NotFound));

        store.stop().await;
        handle.await.unwrap();
    }

    /// Тест проверяет, что удаление отсутствующей записи даёт `NotFound`, а
    /// не сбой, и что пустая партиция остаётся в таблице.
    #[tokio::test]
    async fn test_delete_missing_and_empty_partition_lingers() {
        let (store, handle) = spawn_store();
        let pk = PartitionKey::new("bob", 7);
        let sk = SortKey::new(1, 8);

        assert_eq!(store.delete_task(pk.clone(), sk).await, Err(StoreError::NotFound));

        store.create_task(pk.clone(), sk, Task::new("load", 8, 2)).await.unwrap();
        store.delete_task(pk.clone(), sk).await.unwrap();
        assert_eq!(store.delete_task(pk.clone(), sk).await, Err(StoreError::NotFound));

        let partition = store.read_partition(pk).await.unwrap();
        assert!(partition.is_empty());

        store.stop().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_partition_missing() {
        let (store, handle) = spawn_store();
        assert_eq!(
            store.read_partition(PartitionKey::new("nobody", 0)).await,
            Err(StoreError::NotFound)
        );
        store.stop().await;
        handle.await.unwrap();
    }

    /// Тест проверяет, что ранее полученная партиция не меняется при
    /// последующей записи в таблицу.
    #[tokio::test]
    async fn test_read_partition_is_stable_snapshot() {
        let (store, handle) = spawn_store();
        let pk = PartitionKey::new("carol", 3);

        store
            .create_task(pk.clone(), SortKey::new(1, 6), Task::new("drive", 6, 3))
            .await
            .unwrap();
        let before = store.read_partition(pk.clone()).await.unwrap();

        store
            .create_task(pk.clone(), SortKey::new(1, 12), Task::new("rest", 12, 1))
            .await
            .unwrap();
        let after = store.read_partition(pk).await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);

        store.stop().await;
        handle.await.unwrap();
    }

    /// После остановки операции возвращают `Unavailable`, а повторный
    /// `stop` не блокируется.
    #[tokio::test]
    async fn test_operations_after_stop() {
        let (store, handle) = spawn_store();
        store.stop().await;
        handle.await.unwrap();

        let res = store
            .read_task(PartitionKey::new("alice", 1), SortKey::new(1, 1))
            .await;
        assert_eq!(res, Err(StoreError::Unavailable));

        timeout(Duration::from_millis(100), store.stop())
            .await
            .expect("second stop must not block");
    }

    /// Без запущенного цикла заполненная очередь даёт `Busy`, если задан
    /// таймаут ожидания.
    #[tokio::test]
    async fn test_submit_timeout_when_queue_full() {
        let (store, _runner) = ScheduleStore::new(1);
        let store = store.with_submit_timeout(Some(Duration::from_millis(20)));
        let pk = PartitionKey::new("dave", 1);

        // Первая команда занимает единственное место в очереди и ждёт ответа.
        let first = tokio::spawn({
            let store = store.clone();
            let pk = pk.clone();
            async move { store.read_task(pk, SortKey::new(1, 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.stats().pending, 1);

        let res = store.read_task(pk, SortKey::new(1, 2)).await;
        assert_eq!(res, Err(StoreError::Busy(Duration::from_millis(20))));
        first.abort();
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let (store, _runner) = ScheduleStore::new(4);
        let store = store.with_submit_timeout(Some(Duration::ZERO));
        assert!(store.submit_timeout.is_none());
        assert_eq!(
            store.stats(),
            StoreStats {
                queue_capacity: 4,
                pending: 0
            }
        );
    }
}

//! Таблица расписания задач.
//!
//! Двухуровневая таблица `PartitionKey → SortKey → Task`, которой владеет
//! единственный цикл обработки. Все операции (включая чтение) отправляются
//! в цикл через ограниченную очередь команд; каждая команда несёт свой
//! собственный канал ответа.
//!
//! - `types`: ключи и значение задачи.
//! - `store`: дескриптор `ScheduleStore` и цикл `StoreLoop`.

pub mod store;
pub mod types;

pub use store::{ScheduleStore, StoreLoop, StoreStats, DEFAULT_QUEUE_CAPACITY};
pub use types::{Partition, PartitionKey, SortKey, Task};

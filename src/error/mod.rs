//! Типы ошибок сервиса.
//!
//! Каждая подсистема имеет собственный enum ошибок:
//!
//! - `store`: доменные исходы таблицы задач (`AlreadyExists`, `NotFound`) и
//!   недоступность цикла обработки.
//! - `broker`: ошибки публикации и подписки.
//! - `lifecycle`: ошибки запуска и остановки сервисов координатора.
//! - `api`: HTTP-ошибки обработчиков (реализуют `IntoResponse`).

pub mod api;
pub mod broker;
pub mod lifecycle;
pub mod store;

pub use api::{ApiError, ApiResult};
pub use broker::{BrokerError, BrokerResult};
pub use lifecycle::{LifecycleError, LifecycleResult};
pub use store::{StoreError, StoreResult};

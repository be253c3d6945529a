//! Потоковая доставка сообщений клиентам.
//!
//! - `bridge`: [`SubscriptionBridge`] открывает одну подписку брокера на
//!   клиента и ждёт отмены общего токена.
//! - `feed`: [`ClientFeed`] читает каналы сообщений и ошибок и отдаёт
//!   HTTP-обработчику последовательность полезных нагрузок.

pub mod bridge;
pub mod feed;

pub use bridge::SubscriptionBridge;
pub use feed::{ClientFeed, FeedConfig, FeedMetrics};

//! Подсистема Publish–Subscribe (pub/sub).
//!
//! - `broker`: трейт [`Broker`], через который остальной код публикует
//!   сообщения и открывает подписки.
//! - `local`: внутрипроцессная реализация [`LocalBroker`] на
//!   `tokio::sync::broadcast`.
//! - `message`: сообщение, доставляемое подписчикам темы.
//! - `subscriber`: подписка на одну тему, отписка при `Drop`.
//! - `topic`: правила имён тем и построение темы чата.

pub mod broker;
pub mod local;
pub mod message;
pub mod subscriber;
pub mod topic;

pub use broker::Broker;
pub use local::{BrokerStats, LocalBroker, DEFAULT_TOPIC_CAPACITY};
pub use message::Message;
pub use subscriber::Subscription;
pub use topic::{chat_topic, validate_topic, DEFAULT_CHAT_TOPIC_PREFIX};

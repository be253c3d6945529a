/// Process assembly: wires the broker, the task store and HTTP listeners into the coordinator.
pub mod app;
/// Configuration loading: defaults, TOML file, environment, CLI.
pub mod config;
/// Error types per concern: store, broker, lifecycle, HTTP.
pub mod error;
/// HTTP surface: SSE stream, RPC, task administration, debug vars.
pub mod http;
/// Lifecycle coordination: run/stop units, shutdown requests, OS signals.
pub mod lifecycle;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Pub/Sub: Broker capability, in-process broker, topics.
pub mod pubsub;
/// Keyed task table served by a single command loop.
pub mod schedule;
/// Per-client message feed bridging the broker to a streaming response.
pub mod stream;

/// Service name attached to the root tracing span.
pub const SERVICE_NAME: &str = "chatline";

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use app::Application;
pub use config::{Cli, Settings, SettingsError};
pub use error::{
    ApiError, BrokerError, BrokerResult, LifecycleError, LifecycleResult, StoreError, StoreResult,
};
pub use lifecycle::{Coordinator, Phase, ShutdownHandle};
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
pub use pubsub::{Broker, LocalBroker, Message};
pub use schedule::{PartitionKey, ScheduleStore, SortKey, Task};
pub use stream::{ClientFeed, SubscriptionBridge};

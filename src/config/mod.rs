pub mod cli;
pub mod settings;

pub use cli::Cli;
pub use settings::{
    AppEnvironment, BrokerConfig, Settings, SettingsError, StoreConfig, StreamConfig, WebConfig,
    ENV_PREFIX,
};

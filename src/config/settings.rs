use std::{env, fmt, net::SocketAddr, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Cli;
use crate::{
    logging::{LoggingConfig, LoggingConfigError},
    pubsub::{validate_topic, DEFAULT_CHAT_TOPIC_PREFIX, DEFAULT_TOPIC_CAPACITY},
    schedule::DEFAULT_QUEUE_CAPACITY,
    stream::FeedConfig,
};

/// Префикс переменных окружения (`CHATLINE_WEB__API_HOST`).
pub const ENV_PREFIX: &str = "CHATLINE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid PORT value '{0}'")]
    InvalidPort(String),

    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("invalid chat topic prefix '{0}'")]
    InvalidTopicPrefix(String),

    #[error(transparent)]
    Logging(#[from] LoggingConfigError),
}

/// Окружение развёртывания.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    #[default]
    Local,
    Staging,
    Production,
}

impl AppEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnvironment::Local => "local",
            AppEnvironment::Staging => "staging",
            AppEnvironment::Production => "production",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, AppEnvironment::Local)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebConfig {
    pub api_host: String,
    pub debug_host: String,
    /// Секунды на graceful shutdown.
    pub shutdown_timeout: u64,
    pub allowed_origins: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0:9000".to_string(),
            debug_host: "0.0.0.0:4000".to_string(),
            shutdown_timeout: 20,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl WebConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Буфер одного топика.
    pub capacity: usize,
    pub chat_topic_prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TOPIC_CAPACITY,
            chat_topic_prefix: DEFAULT_CHAT_TOPIC_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub message_buffer: usize,
    pub error_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let feed = FeedConfig::default();
        Self {
            message_buffer: feed.message_buffer,
            error_buffer: feed.error_buffer,
        }
    }
}

impl StreamConfig {
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            message_buffer: self.message_buffer,
            error_buffer: self.error_buffer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub queue_capacity: usize,
    /// 0 - ждать место в очереди без ограничения.
    pub submit_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            submit_timeout_ms: 0,
        }
    }
}

impl StoreConfig {
    pub fn submit_timeout(&self) -> Option<Duration> {
        (self.submit_timeout_ms > 0).then(|| Duration::from_millis(self.submit_timeout_ms))
    }
}

/// Полная конфигурация сервиса.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub environment: AppEnvironment,
    pub build: String,
    pub web: WebConfig,
    pub broker: BrokerConfig,
    pub stream: StreamConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::default(),
            build: env!("GIT_COMMIT").to_string(),
            web: WebConfig::default(),
            broker: BrokerConfig::default(),
            stream: StreamConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Загружает конфигурацию: значения по умолчанию, TOML-файл из `--config`,
    /// переменные окружения `CHATLINE_*`, `PORT`, аргументы командной строки.
    pub fn load(cli: &Cli) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("web.allowed_origins")
                .try_parsing(true),
        );

        // Соглашение хостинг-платформ: PORT переопределяет адрес API.
        if let Ok(port) = env::var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| SettingsError::InvalidPort(port.clone()))?;
            builder = builder.set_override("web.api_host", format!("0.0.0.0:{port}"))?;
        }

        for (key, value) in cli.overrides() {
            builder = builder.set_override(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.api_addr()?;
        self.debug_addr()?;

        if self.broker.capacity == 0 {
            return Err(SettingsError::ZeroCapacity("broker.capacity"));
        }
        if self.stream.message_buffer == 0 {
            return Err(SettingsError::ZeroCapacity("stream.message_buffer"));
        }
        if self.stream.error_buffer == 0 {
            return Err(SettingsError::ZeroCapacity("stream.error_buffer"));
        }
        if self.store.queue_capacity == 0 {
            return Err(SettingsError::ZeroCapacity("store.queue_capacity"));
        }

        let probe = format!("{}probe", self.broker.chat_topic_prefix);
        if validate_topic(&probe).is_err() {
            return Err(SettingsError::InvalidTopicPrefix(
                self.broker.chat_topic_prefix.clone(),
            ));
        }

        self.logging.validate()?;
        Ok(())
    }

    pub fn api_addr(&self) -> Result<SocketAddr, SettingsError> {
        parse_addr("web.api_host", &self.web.api_host)
    }

    pub fn debug_addr(&self) -> Result<SocketAddr, SettingsError> {
        parse_addr("web.debug_host", &self.web.debug_host)
    }

    /// Конфигурация логирования с учётом окружения: цвета только локально.
    pub fn logging_config(&self) -> LoggingConfig {
        let mut logging = self.logging.clone();
        if !self.environment.is_local() {
            logging.console.with_ansi = false;
        }
        logging
    }
}

fn parse_addr(
    field: &'static str,
    value: &str,
) -> Result<SocketAddr, SettingsError> {
    value
        .parse()
        .map_err(|_| SettingsError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;
    use crate::logging::LogFormat;

    const VARS: &[&str] = &[
        "PORT",
        "CHATLINE_ENVIRONMENT",
        "CHATLINE_WEB__API_HOST",
        "CHATLINE_WEB__ALLOWED_ORIGINS",
        "CHATLINE_STORE__SUBMIT_TIMEOUT_MS",
        "CHATLINE_BROKER__CAPACITY",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::load(&Cli::default()).unwrap();

        assert_eq!(settings.environment, AppEnvironment::Local);
        assert_eq!(settings.web.api_host, "0.0.0.0:9000");
        assert_eq!(settings.web.debug_host, "0.0.0.0:4000");
        assert_eq!(settings.web.shutdown_grace(), Duration::from_secs(20));
        assert_eq!(settings.web.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(settings.broker.capacity, 512);
        assert_eq!(settings.broker.chat_topic_prefix, "users.chat.");
        assert_eq!(settings.stream.message_buffer, 512);
        assert_eq!(settings.stream.error_buffer, 100);
        assert_eq!(settings.store.queue_capacity, 1000);
        assert_eq!(settings.store.submit_timeout(), None);
    }

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        clear_env();
        env::set_var("CHATLINE_ENVIRONMENT", "production");
        env::set_var("CHATLINE_WEB__API_HOST", "127.0.0.1:9100");
        env::set_var(
            "CHATLINE_WEB__ALLOWED_ORIGINS",
            "https://a.example,https://b.example",
        );
        env::set_var("CHATLINE_STORE__SUBMIT_TIMEOUT_MS", "250");

        let settings = Settings::load(&Cli::default());
        clear_env();
        let settings = settings.unwrap();

        assert_eq!(settings.environment, AppEnvironment::Production);
        assert_eq!(settings.web.api_host, "127.0.0.1:9100");
        assert_eq!(
            settings.web.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            settings.store.submit_timeout(),
            Some(Duration::from_millis(250))
        );
        assert!(!settings.logging_config().console.with_ansi);
    }

    #[test]
    #[serial]
    fn test_port_rewrites_api_host() {
        clear_env();
        env::set_var("PORT", "8081");
        let settings = Settings::load(&Cli::default());
        clear_env();

        assert_eq!(settings.unwrap().web.api_host, "0.0.0.0:8081");
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        let settings = Settings::load(&Cli::default());
        clear_env();

        assert!(matches!(settings, Err(SettingsError::InvalidPort(p)) if p == "not-a-port"));
    }

    #[test]
    #[serial]
    fn test_cli_wins_over_file_and_env() {
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "environment = \"staging\"\n\n[web]\napi_host = \"127.0.0.1:7000\"\nshutdown_timeout = 3\n\n[broker]\nchat_topic_prefix = \"team.chat.\""
        )
        .unwrap();

        env::set_var("CHATLINE_WEB__API_HOST", "127.0.0.1:7001");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            api_host: Some("127.0.0.1:7002".into()),
            log_format: Some(LogFormat::Json),
            ..Default::default()
        };
        let settings = Settings::load(&cli);
        clear_env();
        let settings = settings.unwrap();

        assert_eq!(settings.environment, AppEnvironment::Staging);
        assert_eq!(settings.web.api_host, "127.0.0.1:7002");
        assert_eq!(settings.web.shutdown_timeout, 3);
        assert_eq!(settings.broker.chat_topic_prefix, "team.chat.");
        assert_eq!(settings.logging.console.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_zero_capacity_is_rejected() {
        clear_env();
        env::set_var("CHATLINE_BROKER__CAPACITY", "0");
        let settings = Settings::load(&Cli::default());
        clear_env();

        assert!(matches!(
            settings,
            Err(SettingsError::ZeroCapacity("broker.capacity"))
        ));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let mut settings = Settings::default();
        settings.web.debug_host = "localhost".into();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidAddress {
                field: "web.debug_host",
                ..
            })
        ));
    }

    #[test]
    fn test_bad_topic_prefix_is_rejected() {
        let mut settings = Settings::default();
        settings.broker.chat_topic_prefix = "users chat.".into();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidTopicPrefix(_))
        ));
    }
}

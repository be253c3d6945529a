use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingConfigError {
    #[error("invalid log level directive '{directive}': {reason}")]
    InvalidLevel { directive: String, reason: String },

    #[error("file logging is enabled but the file prefix is empty")]
    EmptyFilePrefix,

    #[error("cannot create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Pretty,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

/// Настройки файлового вывода (ежедневная ротация).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub prefix: String,
    pub format: LogFormat,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("logs"),
            prefix: "chatline.log".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или директива `EnvFilter` (`info`, `chatline=debug,tower_http=info`).
    /// `RUST_LOG`, если задана, имеет приоритет.
    pub level: String,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Директива фильтра из конфигурации.
    ///
    /// Голый уровень (`debug`) применяется к крейту, а шумные зависимости
    /// остаются на `info`.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("{level},hyper=info,h2=info")
        }
    }

    pub fn validate(&self) -> Result<(), LoggingConfigError> {
        let directive = self.build_filter_directive();
        EnvFilter::try_new(&directive).map_err(|e| LoggingConfigError::InvalidLevel {
            directive,
            reason: e.to_string(),
        })?;

        if self.file.enabled && self.file.prefix.trim().is_empty() {
            return Err(LoggingConfigError::EmptyFilePrefix);
        }
        Ok(())
    }

    /// Создаёт каталог логов, если включён файловый вывод.
    pub fn ensure_log_dir(&self) -> Result<(), LoggingConfigError> {
        if !self.file.enabled {
            return Ok(());
        }
        std::fs::create_dir_all(&self.file.dir).map_err(|source| LoggingConfigError::LogDir {
            path: self.file.dir.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_expands_directive() {
        let cfg = LoggingConfig {
            level: "debug".into(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "debug,hyper=info,h2=info");

        let cfg = LoggingConfig {
            level: "chatline=trace".into(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "chatline=trace");
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let cfg = LoggingConfig {
            level: "chatline=notalevel".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(LoggingConfigError::InvalidLevel { .. })
        ));
        assert!(LoggingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut cfg = LoggingConfig::default();
        cfg.file.enabled = true;
        cfg.file.prefix = "  ".into();
        assert!(matches!(
            cfg.validate(),
            Err(LoggingConfigError::EmptyFilePrefix)
        ));
    }

    #[test]
    fn test_ensure_log_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::default();
        cfg.file.enabled = true;
        cfg.file.dir = tmp.path().join("nested").join("logs");

        cfg.ensure_log_dir().unwrap();
        assert!(cfg.file.dir.is_dir());
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let fmt: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(fmt, LogFormat::Json);
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }
}

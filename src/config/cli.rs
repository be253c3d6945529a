use std::path::PathBuf;

use clap::Parser;

use super::settings::AppEnvironment;
use crate::logging::LogFormat;

/// Аргументы командной строки.
///
/// Все поля необязательные: заданные значения перекрывают файл
/// конфигурации и переменные окружения.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "chatline")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ")"))]
#[command(about = "Chatline - chat message streaming and task scheduling service", long_about = None)]
pub struct Cli {
    /// Путь к TOML-файлу конфигурации
    #[arg(short, long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum, help = "Deployment environment")]
    pub environment: Option<AppEnvironment>,

    #[arg(long, help = "API listener address, e.g. 0.0.0.0:9000")]
    pub api_host: Option<String>,

    #[arg(long, help = "Debug listener address, e.g. 0.0.0.0:4000")]
    pub debug_host: Option<String>,

    /// Время на graceful shutdown в секундах
    #[arg(long, help = "Graceful shutdown timeout in seconds")]
    pub shutdown_timeout: Option<u64>,

    #[arg(long, help = "Log level or filter directive")]
    pub log_level: Option<String>,

    #[arg(long, value_enum, help = "Console log format")]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Пары `ключ -> значение` для `config::ConfigBuilder::set_override`.
    pub(crate) fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(env) = self.environment {
            out.push(("environment", env.to_string()));
        }
        if let Some(host) = &self.api_host {
            out.push(("web.api_host", host.clone()));
        }
        if let Some(host) = &self.debug_host {
            out.push(("web.debug_host", host.clone()));
        }
        if let Some(secs) = self.shutdown_timeout {
            out.push(("web.shutdown_timeout", secs.to_string()));
        }
        if let Some(level) = &self.log_level {
            out.push(("logging.level", level.clone()));
        }
        if let Some(format) = self.log_format {
            out.push(("logging.console.format", format.to_string()));
        }
        out
    }
}

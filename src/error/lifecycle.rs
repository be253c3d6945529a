use std::{io, time::Duration};

use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Ошибки жизненного цикла процесса.
///
/// Любая из них, полученная координатором, приводит к полной остановке всех
/// зарегистрированных сервисов и ненулевому коду выхода.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("service {name} failed: {source}")]
    Service {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot bind {name} listener on {addr}: {source}")]
    Bind {
        name: String,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("signal handler error: {0}")]
    Signal(#[from] io::Error),

    #[error("integrity issue caused shutdown: {0}")]
    IntegrityFault(String),

    #[error("could not stop {name} gracefully within {grace:?}")]
    GracefulShutdown { name: String, grace: Duration },

    #[error("service {name} panicked")]
    Panicked { name: String },
}

impl LifecycleError {
    pub fn service(
        name: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        LifecycleError::Service {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::service("http", anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "service http failed: boom");

        let err = LifecycleError::IntegrityFault("table corrupted".into());
        assert_eq!(
            err.to_string(),
            "integrity issue caused shutdown: table corrupted"
        );
    }
}

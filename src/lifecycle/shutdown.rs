use tokio::sync::mpsc;
use tracing::{error, info};

/// Запрос остановки, отправленный координатору.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Обычная остановка, код выхода 0.
    Graceful,
    /// Обнаружено невосстановимое состояние, код выхода ненулевой.
    IntegrityFault(String),
}

/// Дескриптор для запроса остановки процесса.
///
/// Только координатор решает, когда начинать остановку; обработчики лишь
/// отправляют запрос.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<ShutdownRequest>,
}

impl ShutdownHandle {
    pub(crate) fn new(tx: mpsc::Sender<ShutdownRequest>) -> Self {
        Self { tx }
    }

    pub fn request_shutdown(&self) {
        info!("Graceful shutdown requested");
        // Очередь занята - запрос остановки уже в пути.
        let _ = self.tx.try_send(ShutdownRequest::Graceful);
    }

    pub fn signal_integrity_fault(
        &self,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        error!(reason, "Integrity issue reported, shutting down");
        let _ = self.tx.try_send(ShutdownRequest::IntegrityFault(reason));
    }
}

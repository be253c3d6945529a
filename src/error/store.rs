use std::time::Duration;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Ошибки таблицы задач.
///
/// `AlreadyExists` и `NotFound` являются обычными доменными исходами и
/// обрабатываются вызывающим кодом. `Unavailable` и `Busy` означают, что
/// цикл обработки не принял или не обработал команду.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task already exists")]
    AlreadyExists,

    #[error("not found")]
    NotFound,

    #[error("schedule store is not running")]
    Unavailable,

    #[error("schedule store queue is full (waited {0:?})")]
    Busy(Duration),
}

impl StoreError {
    /// Является ли ошибка доменным исходом операции, а не сбоем хранилища.
    pub fn is_domain(&self) -> bool {
        matches!(self, StoreError::AlreadyExists | StoreError::NotFound)
    }
}

//! Жизненный цикл процесса.
//!
//! - `coordinator`: [`Coordinator`] запускает зарегистрированные сервисы
//!   параллельно и останавливает их все при первом завершении или внешнем
//!   сигнале.
//! - `shutdown`: [`ShutdownHandle`] для запроса остановки из обработчиков.
//! - `signals`: ожидание сигналов ОС.

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{Coordinator, Phase};
pub use shutdown::{ShutdownHandle, ShutdownRequest};
pub use signals::wait_for_shutdown_signal;

use std::{fmt, future::Future, io, panic::AssertUnwindSafe};

use futures::{
    future::{join_all, BoxFuture},
    FutureExt,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};
use tracing::{error, info, warn, Instrument};

use super::{ShutdownHandle, ShutdownRequest};
use crate::error::{LifecycleError, LifecycleResult};

type RunFuture = BoxFuture<'static, anyhow::Result<()>>;
type StopFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Фаза жизненного цикла координатора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registering,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Phase::Registering => "registering",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct Unit {
    name: String,
    run: RunFuture,
    stop: StopFn,
}

/// Причина перехода в `Stopping`.
enum Trigger {
    Finished {
        name: String,
        result: LifecycleResult<()>,
    },
    Signal(io::Result<()>),
    Request(ShutdownRequest),
    Empty,
}

/// Координатор долгоживущих сервисов.
///
/// Каждый сервис - пара `{run, stop}`. Все `run` запускаются параллельно;
/// первое завершение любого из них (успешное или с ошибкой), внешний сигнал
/// или запрос через [`ShutdownHandle`] переводят координатор в остановку:
/// каждая функция `stop` вызывается ровно один раз (параллельно с
/// остальными), после чего координатор ждёт возврата всех `run`.
pub struct Coordinator {
    units: Vec<Unit>,
    phase: watch::Sender<Phase>,
    requests_tx: mpsc::Sender<ShutdownRequest>,
    requests_rx: mpsc::Receiver<ShutdownRequest>,
}

impl Coordinator {
    pub fn new() -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(8);
        let (phase, _) = watch::channel(Phase::Registering);
        Self {
            units: Vec::new(),
            phase,
            requests_tx,
            requests_rx,
        }
    }

    /// Регистрирует сервис.
    pub fn add<R, S, SF>(
        &mut self,
        name: impl Into<String>,
        run: R,
        stop: S,
    ) -> &mut Self
    where
        R: Future<Output = anyhow::Result<()>> + Send + 'static,
        S: FnOnce() -> SF + Send + 'static,
        SF: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        info!(service = %name, "Service registered");
        self.units.push(Unit {
            name,
            run: run.boxed(),
            stop: Box::new(move || stop().boxed()),
        });
        self
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.requests_tx.clone())
    }

    /// Подписка на смену фаз.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Запускает все сервисы и ждёт их полной остановки.
    ///
    /// `signal` - внешний сигнал остановки (обычно
    /// [`wait_for_shutdown_signal`](super::wait_for_shutdown_signal)).
    ///
    /// Возвращает ошибку, вызвавшую остановку, либо первую ошибку, полученную
    /// во время остановки. Сигнал и запрос `Graceful` сами по себе ошибкой не
    /// являются.
    pub async fn run<F>(
        mut self,
        signal: F,
    ) -> LifecycleResult<()>
    where
        F: Future<Output = io::Result<()>> + Send,
    {
        let mut stops = Vec::with_capacity(self.units.len());
        let mut running = JoinSet::new();

        for unit in self.units.drain(..) {
            let Unit { name, run, stop } = unit;
            info!(service = %name, "Service starting");
            stops.push((name.clone(), stop));
            running.spawn(
                async move {
                    let result = match AssertUnwindSafe(run).catch_unwind().await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(err)) => Err(into_lifecycle_error(&name, err)),
                        Err(_) => Err(LifecycleError::Panicked { name: name.clone() }),
                    };
                    (name, result)
                }
                .in_current_span(),
            );
        }
        self.set_phase(Phase::Running);

        let trigger = tokio::select! {
            finished = running.join_next() => match finished {
                Some(Ok((name, result))) => Trigger::Finished { name, result },
                Some(Err(err)) => Trigger::Finished {
                    name: "unknown".into(),
                    result: Err(LifecycleError::service("unknown", err)),
                },
                None => Trigger::Empty,
            },
            res = signal => Trigger::Signal(res),
            Some(request) = self.requests_rx.recv() => Trigger::Request(request),
        };

        let mut outcome = match trigger {
            Trigger::Finished { name, result } => {
                match &result {
                    Ok(()) => info!(service = %name, "Service returned, start shutdown"),
                    Err(err) => error!(service = %name, error = %err, "Service failed, start shutdown"),
                }
                result
            }
            Trigger::Signal(Ok(())) => {
                info!("Shutdown signal, start shutdown");
                Ok(())
            }
            Trigger::Signal(Err(err)) => {
                error!(error = %err, "Signal handler failed, start shutdown");
                Err(LifecycleError::Signal(err))
            }
            Trigger::Request(ShutdownRequest::Graceful) => {
                info!("Shutdown requested, start shutdown");
                Ok(())
            }
            Trigger::Request(ShutdownRequest::IntegrityFault(reason)) => {
                error!(reason, "Integrity issue, start shutdown");
                Err(LifecycleError::IntegrityFault(reason))
            }
            Trigger::Empty => Ok(()),
        };

        self.set_phase(Phase::Stopping);

        let stopping = join_all(stops.into_iter().map(|(name, stop)| async move {
            info!(service = %name, "Stopping service");
            stop().await;
        }));
        let draining = async {
            let mut first_error = None;
            while let Some(joined) = running.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => info!(service = %name, "Service stopped"),
                    Ok((name, Err(err))) => {
                        warn!(service = %name, error = %err, "Service stopped with error");
                        first_error.get_or_insert(err);
                    }
                    Err(err) => {
                        first_error.get_or_insert(LifecycleError::service("unknown", err));
                    }
                }
            }
            first_error
        };
        let (_, drain_error) = tokio::join!(stopping, draining);

        if outcome.is_ok() {
            if let Some(err) = drain_error {
                outcome = Err(err);
            }
        }

        self.set_phase(Phase::Stopped);
        info!("All services stopped");
        outcome
    }

    fn set_phase(
        &self,
        phase: Phase,
    ) {
        info!(%phase, "Coordinator phase changed");
        self.phase.send_replace(phase);
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ошибки жизненного цикла сохраняются как есть, остальные оборачиваются
/// именем сервиса.
fn into_lifecycle_error(
    name: &str,
    err: anyhow::Error,
) -> LifecycleError {
    match err.downcast::<LifecycleError>() {
        Ok(err) => err,
        Err(err) => LifecycleError::service(name, err),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::pending,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio_util::sync::CancellationToken;

    use super::*;

    /// Сервис, который работает до отмены токена и считает вызовы `stop`.
    fn cancellable(
        coordinator: &mut Coordinator,
        name: &str,
        stops: Arc<AtomicUsize>,
    ) {
        let token = CancellationToken::new();
        let run_token = token.clone();
        coordinator.add(
            name,
            async move {
                run_token.cancelled().await;
                Ok(())
            },
            move || async move {
                stops.fetch_add(1, Ordering::SeqCst);
                token.cancel();
            },
        );
    }

    #[tokio::test]
    async fn test_failure_stops_every_unit_once() {
        let mut coordinator = Coordinator::new();
        let stops = Arc::new(AtomicUsize::new(0));
        cancellable(&mut coordinator, "a", stops.clone());
        cancellable(&mut coordinator, "b", stops.clone());

        let failed_stops = stops.clone();
        coordinator.add(
            "failing",
            async { Err(anyhow::anyhow!("boom")) },
            move || async move {
                failed_stops.fetch_add(1, Ordering::SeqCst);
            },
        );

        let res = tokio::time::timeout(Duration::from_secs(1), coordinator.run(pending()))
            .await
            .expect("coordinator must finish");

        match res {
            Err(LifecycleError::Service { name, .. }) => assert_eq!(name, "failing"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stops.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_signal_triggers_graceful_stop() {
        let mut coordinator = Coordinator::new();
        let stops = Arc::new(AtomicUsize::new(0));
        cancellable(&mut coordinator, "a", stops.clone());
        let mut phase = coordinator.phase();

        let res = coordinator.run(async { Ok(()) }).await;
        assert!(res.is_ok());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(*phase.borrow_and_update(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_integrity_fault_request() {
        let mut coordinator = Coordinator::new();
        let stops = Arc::new(AtomicUsize::new(0));
        cancellable(&mut coordinator, "a", stops.clone());

        let handle = coordinator.handle();
        handle.signal_integrity_fault("corrupted");

        let res = coordinator.run(pending()).await;
        assert!(matches!(res, Err(LifecycleError::IntegrityFault(reason)) if reason == "corrupted"));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    /// Координатор ждёт возврата всех `run`, даже медленных.
    #[tokio::test]
    async fn test_waits_for_full_drain() {
        let mut coordinator = Coordinator::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let slow_done = finished.clone();
        let token = CancellationToken::new();
        let run_token = token.clone();
        coordinator.add(
            "slow",
            async move {
                run_token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(30)).await;
                slow_done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move || async move { token.cancel() },
        );
        coordinator.add("quick", async { Ok(()) }, || async {});

        coordinator.run(pending()).await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    /// Ошибка при остановке делает результат ошибочным.
    #[tokio::test]
    async fn test_error_during_drain_is_reported() {
        let mut coordinator = Coordinator::new();
        let token = CancellationToken::new();
        let run_token = token.clone();
        coordinator.add(
            "http",
            async move {
                run_token.cancelled().await;
                Err(LifecycleError::GracefulShutdown {
                    name: "http".into(),
                    grace: Duration::from_secs(1),
                }
                .into())
            },
            move || async move { token.cancel() },
        );

        let handle = coordinator.handle();
        handle.request_shutdown();

        let res = coordinator.run(pending()).await;
        assert!(matches!(res, Err(LifecycleError::GracefulShutdown { .. })));
    }

    #[tokio::test]
    async fn test_panicking_unit_is_reported() {
        let mut coordinator = Coordinator::new();
        coordinator.add(
            "panicky",
            async {
                panic!("unit panicked");
                #[allow(unreachable_code)]
                Ok(())
            },
            || async {},
        );

        let res = coordinator.run(pending()).await;
        assert!(matches!(res, Err(LifecycleError::Panicked { name }) if name == "panicky"));
    }

    #[tokio::test]
    async fn test_empty_coordinator_returns() {
        let coordinator = Coordinator::new();
        assert!(coordinator.is_empty());
        coordinator.run(pending()).await.unwrap();
    }
}

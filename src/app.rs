//! Сборка процесса: брокер, стор задач, HTTP-слушатели и координатор.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Settings,
    error::{LifecycleError, LifecycleResult},
    http::{api_router, debug_router, AppState, HttpServer},
    lifecycle::{Coordinator, Phase, ShutdownHandle},
    pubsub::LocalBroker,
    schedule::ScheduleStore,
};

/// Готовый к запуску процесс.
///
/// Слушатели уже привязаны к адресам, сервисы зарегистрированы в
/// координаторе в порядке: `api`, `debug` (только `local`), `broker`,
/// `schedule-store`.
pub struct Application {
    coordinator: Coordinator,
    state: AppState,
    api_addr: SocketAddr,
    debug_addr: Option<SocketAddr>,
}

impl Application {
    pub async fn build(settings: Settings) -> LifecycleResult<Self> {
        let settings = Arc::new(settings);
        let grace = settings.web.shutdown_grace();
        let mut coordinator = Coordinator::new();

        let broker = Arc::new(LocalBroker::new(settings.broker.capacity));
        let (store, store_loop) = ScheduleStore::new(settings.store.queue_capacity);
        let store = store.with_submit_timeout(settings.store.submit_timeout());

        let http_shutdown = CancellationToken::new();
        let state = AppState::new(
            settings.clone(),
            broker.clone(),
            store.clone(),
            http_shutdown.clone(),
            coordinator.handle(),
        );

        let api = HttpServer::bind(
            "api",
            resolve("api", &settings.web.api_host)?,
            api_router(state.clone()),
            http_shutdown.clone(),
            grace,
        )
        .await?;
        let api_addr = local_addr("api", &api)?;
        coordinator.add("api", api.run(), move || async move {
            http_shutdown.cancel();
        });

        let debug_addr = if settings.environment.is_local() {
            let debug_shutdown = CancellationToken::new();
            let debug = HttpServer::bind(
                "debug",
                resolve("debug", &settings.web.debug_host)?,
                debug_router(state.clone()),
                debug_shutdown.clone(),
                grace,
            )
            .await?;
            let addr = local_addr("debug", &debug)?;
            coordinator.add("debug", debug.run(), move || async move {
                debug_shutdown.cancel();
            });
            Some(addr)
        } else {
            info!(environment = %settings.environment, "Debug listener disabled");
            None
        };

        let broker_done = CancellationToken::new();
        let broker_wait = broker_done.clone();
        coordinator.add(
            "broker",
            async move {
                broker_wait.cancelled().await;
                Ok(())
            },
            move || async move {
                broker.close();
                broker_done.cancel();
            },
        );

        coordinator.add(
            "schedule-store",
            async move {
                store_loop.run().await;
                Ok(())
            },
            move || async move { store.stop().await },
        );

        info!(
            %api_addr,
            debug_addr = ?debug_addr,
            services = coordinator.len(),
            "Application assembled"
        );

        Ok(Self {
            coordinator,
            state,
            api_addr,
            debug_addr,
        })
    }

    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub fn debug_addr(&self) -> Option<SocketAddr> {
        self.debug_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.coordinator.handle()
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.coordinator.phase()
    }

    /// Запускает все сервисы и ждёт полной остановки.
    pub async fn run<F>(
        self,
        signal: F,
    ) -> LifecycleResult<()>
    where
        F: Future<Output = io::Result<()>> + Send,
    {
        self.coordinator.run(signal).await
    }
}

fn resolve(
    name: &str,
    host: &str,
) -> LifecycleResult<SocketAddr> {
    host.parse().map_err(|err: std::net::AddrParseError| LifecycleError::Bind {
        name: name.to_string(),
        addr: host.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, err),
    })
}

fn local_addr(
    name: &str,
    server: &HttpServer,
) -> LifecycleResult<SocketAddr> {
    server.local_addr().map_err(|source| LifecycleError::Bind {
        name: name.to_string(),
        addr: "unknown".to_string(),
        source,
    })
}

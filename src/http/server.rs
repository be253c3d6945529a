use std::{future::IntoFuture, net::SocketAddr, time::Duration};

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{LifecycleError, LifecycleResult};

/// HTTP-сервер с привязанным слушателем.
///
/// Останавливается отменой `shutdown`: новые соединения перестают
/// приниматься, открытые получают `grace` на завершение.
pub struct HttpServer {
    name: String,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
}

impl HttpServer {
    pub async fn bind(
        name: impl Into<String>,
        addr: SocketAddr,
        router: Router,
        shutdown: CancellationToken,
        grace: Duration,
    ) -> LifecycleResult<Self> {
        let name = name.into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| LifecycleError::Bind {
                name: name.clone(),
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            name,
            listener,
            router,
            shutdown,
            grace,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            name,
            listener,
            router,
            shutdown,
            grace,
        } = self;

        let addr = listener.local_addr()?;
        info!(server = %name, %addr, "HTTP server listening");

        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            res = &mut serve => {
                res?;
                info!(server = %name, "HTTP server stopped");
                return Ok(());
            }
            _ = shutdown.cancelled() => {
                info!(server = %name, grace = ?grace, "HTTP server shutdown started");
            }
        }

        match tokio::time::timeout(grace, serve).await {
            Ok(res) => {
                res?;
                info!(server = %name, "HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                warn!(server = %name, grace = ?grace, "Could not stop HTTP server gracefully");
                Err(LifecycleError::GracefulShutdown { name, grace }.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;

    use super::*;

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap();

        let res = HttpServer::bind(
            "api",
            addr,
            Router::new(),
            CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(res, Err(LifecycleError::Bind { name, .. }) if name == "api"));
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_server() {
        let token = CancellationToken::new();
        let server = HttpServer::bind(
            "api",
            "127.0.0.1:0".parse().unwrap(),
            Router::new().route("/", get(|| async { "ok" })),
            token.clone(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let handle = tokio::spawn(server.run());
        token.cancel();

        let res = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("server must stop")
            .unwrap();
        assert!(res.is_ok());
    }
}

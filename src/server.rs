use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cache::BookingCache;
use crate::error::ServerError;
use crate::router::build_router;
use crate::service::BookingRelay;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<BookingRelay>,
    pub cache: Arc<BookingCache>,
}

impl AppState {
    pub fn new(relay: BookingRelay, cache: BookingCache) -> Self {
        Self {
            relay: Arc::new(relay),
            cache: Arc::new(cache),
        }
    }
}

pub struct RelayServer {
    addr: SocketAddr,
    state: AppState,
    max_body_bytes: usize,
}

impl RelayServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            state,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, size: usize) -> Self {
        self.max_body_bytes = size;
        self
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state, self.max_body_bytes);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Bind(self.addr.to_string(), e))?;
        tracing::info!("Server running on http://{}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("server shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialTable;
    use crate::service::mock_api::MockSchedulingApi;

    fn state() -> AppState {
        let relay = BookingRelay::new(Arc::new(MockSchedulingApi::new()), CredentialTable::new());
        AppState::new(relay, BookingCache::new())
    }

    #[test]
    fn builder_sets_body_limit() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = RelayServer::new(addr, state()).with_max_body_bytes(512);
        assert_eq!(server.max_body_bytes, 512);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let err = RelayServer::new(addr, state())
            .serve(async {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Bind(_, _)));
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let result = RelayServer::new(addr, state()).serve(async {}).await;
        assert!(result.is_ok());
    }
}

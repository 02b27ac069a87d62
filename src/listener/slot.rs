//! Concrete listeners serving the control API.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::serve::Listener;
use axum::Router;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use super::ManagedListener;
use crate::config::TLS_HANDSHAKE_TIMEOUT_SECS;
use crate::error_handling::ListenerError;

/// TCP listener that completes a TLS handshake before handing out connections.
///
/// Failed or slow handshakes are logged and skipped; `accept` only returns
/// established TLS streams.
pub struct TlsListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    /// Wraps a bound TCP listener.
    pub fn new(inner: TcpListener, config: Arc<ServerConfig>) -> Self {
        Self {
            inner,
            acceptor: TlsAcceptor::from(config),
        }
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (stream, addr) = Listener::accept(&mut self.inner).await;
            let handshake = tokio::time::timeout(
                Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
                self.acceptor.accept(stream),
            );
            match handshake.await {
                Ok(Ok(tls)) => return (tls, addr),
                Ok(Err(e)) => log::debug!("TLS handshake with {addr} failed: {e}"),
                Err(_) => log::debug!("TLS handshake with {addr} timed out"),
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

async fn bind(addr: &str) -> Result<TcpListener, ListenerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Checks that `host:port` can be bound right now.
///
/// The probe socket is closed immediately, so the result is only a hint.
pub async fn check_port_available(host: &str, port: u16) -> Result<(), ListenerError> {
    let addr = join_host_port(host, port);
    bind(&addr).await.map(drop)
}

/// Formats a bind address, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// A listener serving a router until it is shut down.
///
/// Shutdown is graceful: new connections are refused and in-flight ones are
/// drained. Draining has no deadline.
pub struct ListenerSlot {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    serving: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl ListenerSlot {
    /// Binds `addr` and serves `app` over plain HTTP.
    pub async fn serve_plain(addr: &str, app: Router) -> Result<Self, ListenerError> {
        let listener = bind(addr).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self::spawn(listener, local_addr, app))
    }

    /// Binds `addr` and serves `app` over HTTPS with `config`.
    pub async fn serve_tls(
        addr: &str,
        app: Router,
        config: Arc<ServerConfig>,
    ) -> Result<Self, ListenerError> {
        let listener = bind(addr).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self::spawn(TlsListener::new(listener, config), local_addr, app))
    }

    fn spawn<L>(listener: L, local_addr: SocketAddr, app: Router) -> Self
    where
        L: Listener<Addr = SocketAddr>,
    {
        let cancel = CancellationToken::new();
        let serving = Arc::new(AtomicBool::new(true));

        let token = cancel.clone();
        let flag = Arc::clone(&serving);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            flag.store(false, Ordering::SeqCst);
            result
        });

        log::info!("Listening on {local_addr}");
        Self {
            local_addr,
            cancel,
            serving,
            task: Mutex::new(Some(task)),
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl ManagedListener for ListenerSlot {
    fn is_bound(&self) -> bool {
        !self.cancel.is_cancelled() && self.serving.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), ListenerError> {
        self.cancel.cancel();
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Ok(())) => {
                log::info!("Listener on {} closed", self.local_addr);
                Ok(())
            }
            Ok(Err(e)) => Err(ListenerError::Serve(e.to_string())),
            Err(e) => Err(ListenerError::Serve(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn app() -> Router {
        Router::new().route("/ping", get(|| async { "pong" }))
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("127.0.0.1", 80), "127.0.0.1:80");
        assert_eq!(join_host_port("::1", 80), "[::1]:80");
        assert_eq!(join_host_port("[::1]", 80), "[::1]:80");
        assert_eq!(join_host_port("localhost", 3000), "localhost:3000");
    }

    #[tokio::test]
    async fn test_plain_slot_serves_and_shuts_down() {
        let slot = ListenerSlot::serve_plain("127.0.0.1:0", app()).await.unwrap();
        assert!(slot.is_bound());

        let mut stream = TcpStream::connect(slot.local_addr()).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("pong"));

        slot.shutdown().await.unwrap();
        assert!(!slot.is_bound());
        // A second shutdown is a no-op
        slot.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_port_check_detects_bound_port() {
        let slot = ListenerSlot::serve_plain("127.0.0.1:0", app()).await.unwrap();
        let port = slot.local_addr().port();
        match check_port_available("127.0.0.1", port).await {
            Err(ListenerError::Bind { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("expected bind error, got {:?}", other),
        }
        slot.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_port_check_accepts_free_port() {
        assert!(check_port_available("127.0.0.1", 0).await.is_ok());
    }
}

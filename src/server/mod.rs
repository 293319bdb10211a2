//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and hands each one to its own [`Session`] task.
//! There is no admission limit: every accepted connection gets a task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_IDLE_TIMEOUT;
use crate::router::Router;

pub mod session;

pub use session::{Session, SessionError};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The halo HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use halo::context::AppState;
/// use halo::handlers;
/// use halo::server::Server;
/// use halo::storage::FileStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let state = AppState::new(FileStore::new("files"), Duration::from_millis(500));
///     let router = handlers::routes(Arc::new(state));
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    idle_timeout: Duration,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Sets how long a connection may take to deliver its next request.
    #[must_use]
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, running one session per connection.
    ///
    /// Accept failures are logged and skipped; a failing session only ends
    /// its own connection.
    ///
    /// # Errors
    ///
    /// Currently never returns; the signature leaves room for fatal
    /// listener errors.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(address = %self.local_addr, "halo listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let session = Session::new(stream, peer_addr, Arc::clone(&router), self.idle_timeout);

            tokio::spawn(async move {
                if let Err(e) = session.run().await {
                    warn!(peer = %peer_addr, error = %e, "connection aborted");
                }
            });
        }
    }
}

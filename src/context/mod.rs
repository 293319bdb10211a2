//! Per-request context handed to route handlers.
//!
//! A [`Context`] bundles the completed request, the part of the path matched
//! by a prefix route, and a handle to the process-wide [`AppState`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::mime::MimeTable;
use crate::storage::FileStore;
use crate::Request;

/// Read-only state shared by every session.
///
/// Built once at startup and never mutated afterwards, so sessions read it
/// through an [`Arc`] without synchronization.
#[derive(Debug, Clone)]
pub struct AppState {
    pub files: FileStore,
    pub mime: MimeTable,
    pub stream_interval: Duration,
}

impl AppState {
    pub fn new(files: FileStore, stream_interval: Duration) -> Self {
        Self {
            files,
            mime: MimeTable::new(),
            stream_interval,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(FileStore::new(&config.files_dir), config.stream_interval)
    }
}

/// Everything a handler needs to build its response.
#[derive(Debug, Clone)]
pub struct Context {
    request: Request,
    suffix: String,
    state: Arc<AppState>,
}

impl Context {
    pub fn new(request: Request, state: Arc<AppState>) -> Self {
        Self {
            request,
            suffix: String::new(),
            state,
        }
    }

    /// Attaches the path remainder captured by a prefix route.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The path text after a matched prefix, e.g. `a.txt` for
    /// `/files/a.txt` under `/files/*`. Empty for exact routes.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

//! The server's route handlers and the fixed route table.
//!
//! Each handler is a plain async function from [`Context`] to [`Response`].
//! Fallible handlers compute a `Result<Response, HandlerError>` and convert
//! the error into its status code at the edge.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::context::{AppState, Context};
use crate::router::Router;
use crate::storage::StorageError;
use crate::{Response, StatusCode};

pub mod echo;
pub mod files;
pub mod root;
pub mod stream;

/// Errors a handler turns into an error response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl HandlerError {
    /// The status code reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Storage(StorageError::Traversal(_) | StorageError::EmptyName) => {
                StatusCode::BadRequest
            }
            Self::Storage(StorageError::NotFound(_)) => StatusCode::NotFound,
            Self::Storage(StorageError::Io { .. }) => StatusCode::InternalServerError,
        }
    }
}

impl From<HandlerError> for Response {
    fn from(err: HandlerError) -> Self {
        Response::new(err.status())
    }
}

/// Collapses a fallible handler result into a response, logging failures.
pub(crate) fn respond(result: Result<Response, HandlerError>) -> Response {
    result.unwrap_or_else(|err| {
        let status = err.status();
        warn!(status = status.as_u16(), error = %err, "handler failed");
        Response::from(err)
    })
}

/// Builds the route table. Order matters: the first match wins.
///
/// 1. `GET /` → [`root::index`]
/// 2. `GET /files/*` → [`files::get`]
/// 3. `GET /stream` → [`stream::count`]
/// 4. `POST /files/*` → [`files::put`]
/// 5. `POST /halo` → [`echo::echo`]
pub fn routes(state: Arc<AppState>) -> Router {
    let mut router = Router::new(state);
    router.get("/", root::index);
    router.get("/files/*", files::get);
    router.get("/stream", stream::count);
    router.post("/files/*", files::put);
    router.post("/halo", echo::echo);
    router
}

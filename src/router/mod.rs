//! Request routing — an ordered table of method + path rules.
//!
//! | Pattern     | Example match     | Suffix passed to the handler |
//! |-------------|-------------------|------------------------------|
//! | `/stream`   | `/stream`         | *(none)*                     |
//! | `/files/*`  | `/files/logo.png` | `logo.png`                   |
//!
//! Exact patterns compare the whole path verbatim; there is no trailing
//! slash normalization. Routes are matched in registration order; the first
//! route whose method and pattern both match wins.
//!
//! Routing happens before the body is read. A matched route's
//! [`BodyPolicy`] tells the session whether `Content-Length` is mandatory.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{AppState, Context};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler that turns a [`Context`] into a [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Response> + Send`
/// that is also `Send + Sync + 'static`.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Whether a route needs the request to declare its body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// `Content-Length` must be present and valid; the body is read in full.
    Required,
    /// `Content-Length` is optional. A valid one is still honored so the
    /// body bytes are not mistaken for the next request.
    Optional,
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    // Matches one exact path string, e.g. `/stream`.
    Exact(String),
    // Matches any path starting with the prefix (slash included), e.g. `/files/`.
    Prefix(String),
}

impl Pattern {
    // `/files/*` compiles to `Prefix("/files/")`; anything else is exact.
    fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_owned()),
            None => Pattern::Exact(pattern.to_owned()),
        }
    }

    // Returns the unmatched remainder of `path` on success.
    fn matches<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            Pattern::Exact(p) => (p == path).then_some(""),
            Pattern::Prefix(prefix) => path.strip_prefix(prefix.as_str()),
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    body: BodyPolicy,
    handler: Handler,
}

/// The outcome of looking up a request in the route table.
pub struct RouteMatch {
    handler: Handler,
    suffix: String,
    body: BodyPolicy,
}

impl RouteMatch {
    pub fn body_policy(&self) -> BodyPolicy {
        self.body
    }

    /// Runs the matched handler on a completed request.
    pub async fn dispatch(self, request: Request, state: Arc<AppState>) -> Response {
        let ctx = Context::new(request, state).with_suffix(self.suffix);
        (self.handler)(ctx).await
    }
}

/// An ordered route table plus the shared state its handlers read.
///
/// When no route matches, the session answers with [`Router::not_found`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use halo::context::AppState;
/// use halo::router::Router;
/// use halo::storage::FileStore;
/// use halo::{Response, StatusCode};
///
/// let state = AppState::new(FileStore::new("files"), Duration::ZERO);
/// let mut router = Router::new(Arc::new(state));
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
/// ```
pub struct Router {
    routes: Vec<Route>,
    state: Arc<AppState>,
}

impl Router {
    /// Creates an empty router over `state`.
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            routes: Vec::new(),
            state,
        }
    }

    /// Registers a `GET` route. The body is optional.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, BodyPolicy::Optional, handler);
    }

    /// Registers a `POST` route. `Content-Length` is required.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, BodyPolicy::Required, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, body: BodyPolicy, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            body,
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Finds the first route matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            if &route.method != method {
                return None;
            }
            route.pattern.matches(path).map(|suffix| RouteMatch {
                handler: Arc::clone(&route.handler),
                suffix: suffix.to_owned(),
                body: route.body,
            })
        })
    }

    /// The response for an unmatched route.
    pub fn not_found() -> Response {
        Response::new(StatusCode::NotFound)
    }
}

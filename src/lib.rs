//! # halo
//!
//! A minimal HTTP/1.1 server written directly over a TCP byte stream.
//!
//! The crate frames requests by hand, completes bodies by `Content-Length`,
//! keeps connections alive between sequential requests, and writes both
//! fixed-length and chunked responses. Routes:
//!
//! | Request               | Response                                  |
//! |-----------------------|-------------------------------------------|
//! | `GET /`               | fixed greeting                            |
//! | `GET /files/<name>`   | stored file bytes                         |
//! | `GET /stream`         | ten chunks, `1` through `10`              |
//! | `POST /files/<name>`  | stores the body, `201 Created`            |
//! | `POST /halo`          | echoes the body                           |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use halo::config::ServerConfig;
//! use halo::context::AppState;
//! use halo::handlers;
//! use halo::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let router = handlers::routes(Arc::new(AppState::from_config(&config)));
//!     Server::bind(&config.addr).await?.run(router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod handlers;
pub mod http;
pub mod mime;
pub mod router;
pub mod server;
pub mod storage;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};

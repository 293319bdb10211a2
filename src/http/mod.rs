//! HTTP/1.1 wire types, framing and serialization.
//!
//! Everything here operates on raw bytes read from (or written to) a stream;
//! no protocol library sits underneath.

use std::fmt;

pub mod body;
pub mod chunked;
pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::{Body, Response};

/// The only protocol version the server accepts and emits.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// The response status codes this server produces.
///
/// # Examples
///
/// ```
/// use halo::http::StatusCode;
///
/// let status = StatusCode::Created;
/// assert_eq!(status.as_u16(), 201);
/// assert_eq!(status.canonical_reason(), "Created");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    NotFound = 404,
    InternalServerError = 500,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// An HTTP request method.
///
/// Only `GET` and `POST` are routed; anything else is kept verbatim in
/// `Other` so the dispatcher can answer it with a 404.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    /// Returns the method token as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    // Method tokens are case-sensitive, so `get` is not `GET`.
    fn from(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            other => Self::Other(other.to_owned()),
        }
    }
}

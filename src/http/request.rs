//! HTTP/1.1 request framing and parsing.
//!
//! The framer looks for the `\r\n\r\n` header terminator in the bytes read
//! so far. Once it is present, the head is split into the start line and the
//! header lines; whatever follows the terminator is the beginning of the body
//! (or, for a body-less request, of the next pipelined request).

use std::str;

use bytes::Bytes;
use thiserror::Error;

use super::body::{self, BodyError};
use super::{HTTP_VERSION, Headers, Method};

/// The four bytes that end a request head.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Largest request head we buffer while waiting for the terminator (64 KiB).
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Errors that can occur while framing or parsing a request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete — more data needed")]
    Incomplete,

    #[error("request head exceeds {max_bytes} bytes")]
    HeadTooLarge { max_bytes: usize },

    #[error("request head is not valid UTF-8")]
    InvalidEncoding,

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unsupported protocol version: {0:?}")]
    UnsupportedVersion(String),
}

/// A parsed HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use halo::http::request::Request;
///
/// let raw = b"POST /halo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
/// let (request, head_len) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/halo");
/// assert_eq!(request.headers().get("content-length"), Some("5"));
/// assert_eq!(&request.body()[..], b"hello");
/// assert_eq!(head_len, raw.len() - 5);
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Parses a request head from `buf` and takes every byte after the
    /// terminator as the initial body.
    ///
    /// Returns the request and the length of the head including its terminator.
    ///
    /// # Errors
    ///
    /// See [`Request::parse_head`].
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let (request, head_len) = Self::parse_head(buf)?;
        let body = Bytes::copy_from_slice(&buf[head_len..]);
        Ok((request.with_body(body), head_len))
    }

    /// Parses only the request head, leaving the body empty.
    ///
    /// The start line must be exactly `METHOD SP PATH SP HTTP/1.1`. Header
    /// lines are split once on `": "`; lines without that separator are
    /// skipped. Header names are lower-cased, and a repeated header keeps
    /// its last value.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — the terminator has not arrived yet.
    /// - [`RequestError::HeadTooLarge`] — the head outgrew [`MAX_HEAD_SIZE`].
    /// - [`RequestError::InvalidEncoding`] — the head is not UTF-8.
    /// - [`RequestError::MissingField`] — the start line has fewer than three tokens.
    /// - [`RequestError::UnsupportedVersion`] — the version is not `HTTP/1.1`.
    pub fn parse_head(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        Self::parse_head_from(buf, 0)
    }

    /// Like [`Request::parse_head`], but skips a prefix already known to
    /// hold no terminator.
    ///
    /// `scanned` is the buffer length at the previous `Incomplete` result.
    /// The search restarts three bytes earlier so a terminator split across
    /// two reads is still found.
    ///
    /// # Errors
    ///
    /// See [`Request::parse_head`].
    pub fn parse_head_from(buf: &[u8], scanned: usize) -> Result<(Self, usize), RequestError> {
        let from = scanned.saturating_sub(HEAD_TERMINATOR.len() - 1);
        let end = match find_head_end(buf, from) {
            Some(end) if end <= MAX_HEAD_SIZE => end,
            Some(_) => {
                return Err(RequestError::HeadTooLarge {
                    max_bytes: MAX_HEAD_SIZE,
                });
            }
            None if buf.len() > MAX_HEAD_SIZE => {
                return Err(RequestError::HeadTooLarge {
                    max_bytes: MAX_HEAD_SIZE,
                });
            }
            None => return Err(RequestError::Incomplete),
        };

        let head = str::from_utf8(&buf[..end]).map_err(|_| RequestError::InvalidEncoding)?;
        let mut lines = head.split("\r\n");

        let start_line = lines.next().unwrap_or_default();
        let mut tokens = start_line.splitn(3, ' ');
        let mut next_token = |field: &'static str| {
            tokens
                .next()
                .filter(|t| !t.is_empty())
                .ok_or(RequestError::MissingField { field })
        };

        let method = Method::from(next_token("method")?);
        let path = next_token("path")?.to_owned();
        let version = next_token("version")?;
        if version != HTTP_VERSION {
            return Err(RequestError::UnsupportedVersion(version.to_owned()));
        }

        let mut headers = Headers::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(": ") {
                headers.insert(name.to_ascii_lowercase(), value);
            }
        }

        Ok((
            Self {
                method,
                path,
                headers,
                body: Bytes::new(),
            },
            end + HEAD_TERMINATOR.len(),
        ))
    }

    /// Replaces the request body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as sent (no percent-decoding).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should stay open after this request.
    ///
    /// A missing `Connection` header means keep-alive; an explicit value
    /// keeps the connection only if it is `keep-alive` (any case).
    pub fn is_keep_alive(&self) -> bool {
        self.headers
            .get("connection")
            .is_none_or(|value| value.eq_ignore_ascii_case("keep-alive"))
    }

    /// Returns the declared `Content-Length`, if any.
    ///
    /// # Errors
    ///
    /// [`BodyError::InvalidContentLength`] if the header is present but is
    /// not a non-negative decimal integer.
    pub fn content_length(&self) -> Result<Option<usize>, BodyError> {
        body::declared_length(&self.headers)
    }
}

/// Returns the offset of the header terminator in `buf`, searching from `from`.
fn find_head_end(buf: &[u8], from: usize) -> Option<usize> {
    let from = from.min(buf.len());
    buf[from..]
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| from + pos)
}

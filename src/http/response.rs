//! HTTP/1.1 response builder and writer.
//!
//! Handlers describe a response as a value; [`Response::write_to`] is the
//! single place that turns it into bytes on the stream. The head is the only
//! text-typed part; bodies stay as raw bytes throughout.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::chunked::{TERMINATOR, encode_chunk};
use super::{HTTP_VERSION, Headers, StatusCode};

/// Content type used when a handler does not set one.
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// How the response body is framed on the wire.
#[derive(Debug, Clone)]
pub enum Body {
    /// A body of known size, framed with `Content-Length`.
    Full(Bytes),
    /// A body sent as a sequence of chunks with a pause between them,
    /// framed with `Transfer-Encoding: chunked`.
    Chunked { chunks: Vec<Bytes>, interval: Duration },
}

/// An HTTP/1.1 response, ready to be written.
///
/// # Examples
///
/// ```
/// use halo::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// assert!(text.contains("Connection: keep-alive\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Full(Bytes::new()),
            keep_alive: true,
        }
    }

    /// Sets a response header, replacing any earlier value for the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a fixed-length body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Sets a chunked body whose chunks are written `interval` apart.
    #[must_use]
    pub fn chunked(mut self, chunks: Vec<Bytes>, interval: Duration) -> Self {
        self.body = Body::Chunked { chunks, interval };
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Serializes the status line and headers, including the blank line.
    ///
    /// Always written:
    /// - `Content-Type` (`text/plain` unless the handler set one).
    /// - `Content-Length: <n>` for a full body, or `Transfer-Encoding: chunked`.
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn head_bytes(&self) -> BytesMut {
        let mut headers = self.headers.clone();
        if !headers.contains("content-type") {
            headers.insert("Content-Type", DEFAULT_CONTENT_TYPE);
        }
        match &self.body {
            Body::Full(bytes) => {
                headers.remove("transfer-encoding");
                headers.insert("Content-Length", bytes.len().to_string());
            }
            Body::Chunked { .. } => {
                headers.remove("content-length");
                headers.insert("Transfer-Encoding", "chunked");
            }
        }
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        headers.insert("Connection", connection);

        let mut buf = BytesMut::with_capacity(64 + headers.len() * 32);
        buf.put(
            format!(
                "{HTTP_VERSION} {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        buf.put(headers.to_string().as_bytes());
        buf.put(&b"\r\n"[..]);
        buf
    }

    /// Serializes the whole response in one buffer.
    ///
    /// Chunked bodies are framed in full without any pacing.
    pub fn into_bytes(self) -> BytesMut {
        let mut buf = self.head_bytes();
        match self.body {
            Body::Full(bytes) => buf.put(bytes),
            Body::Chunked { chunks, .. } => {
                for chunk in chunks.iter().filter(|c| !c.is_empty()) {
                    buf.put(encode_chunk(chunk));
                }
                buf.put(TERMINATOR);
            }
        }
        buf
    }

    /// Writes the response to `writer`.
    ///
    /// A chunked body sends its head first, then each chunk with a flush and
    /// the configured pause in between, then the terminator. Any write error
    /// is returned immediately; nothing further is sent.
    ///
    /// Each write or flush must finish within `stall`; a peer that stops
    /// reading gets an [`io::ErrorKind::TimedOut`] error.
    pub async fn write_to<W>(self, writer: &mut W, stall: Duration) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let head = self.head_bytes();
        match self.body {
            Body::Full(bytes) => {
                let mut buf = head;
                buf.put(bytes);
                within(stall, writer.write_all(&buf)).await?;
            }
            Body::Chunked { chunks, interval } => {
                within(stall, writer.write_all(&head)).await?;
                within(stall, writer.flush()).await?;
                for (i, chunk) in chunks.iter().filter(|c| !c.is_empty()).enumerate() {
                    if i > 0 && !interval.is_zero() {
                        tokio::time::sleep(interval).await;
                    }
                    within(stall, writer.write_all(&encode_chunk(chunk))).await?;
                    within(stall, writer.flush()).await?;
                }
                within(stall, writer.write_all(TERMINATOR)).await?;
            }
        }
        within(stall, writer.flush()).await
    }
}

// Bounds one write step by `stall`.
async fn within<T>(stall: Duration, op: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    timeout(stall, op).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("peer did not accept data within {stall:?}"),
        )
    })?
}

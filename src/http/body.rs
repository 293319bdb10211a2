//! Request body completion by declared `Content-Length`.
//!
//! The framer hands over whatever body bytes arrived together with the head.
//! [`complete`] keeps reading from the stream until the declared length is
//! reached, then splits exactly that many bytes off the connection buffer.
//! Anything past the declared length stays in the buffer and is framed as
//! the next request.
//!
//! Each read gets its own idle window, so a slow client that keeps sending
//! is never cut off; only one that goes quiet for a whole window is.

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use super::Headers;

/// Errors produced while determining or reading a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),

    #[error("stream closed after {received} of {expected} body bytes")]
    Incomplete { expected: usize, received: usize },

    #[error("no body bytes arrived within {0:?}")]
    IdleTimeout(Duration),

    #[error("I/O error while reading body: {0}")]
    Io(#[from] io::Error),
}

/// Reads the `content-length` header.
///
/// Returns `Ok(None)` when the header is absent.
///
/// # Errors
///
/// [`BodyError::InvalidContentLength`] if the value is not a non-negative
/// decimal integer.
pub fn declared_length(headers: &Headers) -> Result<Option<usize>, BodyError> {
    let Some(raw) = headers.get("content-length") else {
        return Ok(None);
    };

    let value = raw.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BodyError::InvalidContentLength(raw.to_owned()));
    }
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| BodyError::InvalidContentLength(raw.to_owned()))
}

/// Reads from `reader` into `buf` until it holds at least `declared` bytes,
/// then splits off and returns exactly `declared` bytes.
///
/// `buf` must already hold the body bytes that arrived with the head.
/// Every read must yield data within `idle`.
///
/// # Errors
///
/// - [`BodyError::Incomplete`] — the peer closed the stream first.
/// - [`BodyError::IdleTimeout`] — a single read waited longer than `idle`.
/// - [`BodyError::Io`] — a read failed.
pub async fn complete<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    declared: usize,
    idle: Duration,
) -> Result<Bytes, BodyError>
where
    R: AsyncRead + Unpin,
{
    while buf.len() < declared {
        buf.reserve((declared - buf.len()).min(READ_CHUNK));
        let read = timeout(idle, reader.read_buf(buf))
            .await
            .map_err(|_| BodyError::IdleTimeout(idle))?;
        if read? == 0 {
            return Err(BodyError::Incomplete {
                expected: declared,
                received: buf.len(),
            });
        }
    }
    Ok(buf.split_to(declared).freeze())
}

// Upper bound on how much we reserve ahead of a single read.
const READ_CHUNK: usize = 64 * 1024;

//! Chunked transfer-encoding framing for response bodies.

use bytes::{BufMut, Bytes, BytesMut};

/// The zero-length chunk that ends every chunked body.
pub const TERMINATOR: &[u8] = b"0\r\n\r\n";

/// Frames `payload` as one chunk: hex length, CRLF, payload, CRLF.
///
/// An empty payload would read as the terminator, so callers must not pass
/// one; use [`TERMINATOR`] to end the body.
///
/// # Examples
///
/// ```
/// use halo::http::chunked::encode_chunk;
///
/// assert_eq!(&encode_chunk(b"10")[..], b"2\r\n10\r\n");
/// assert_eq!(&encode_chunk(&[b'x'; 26])[..4], b"1a\r\n");
/// ```
pub fn encode_chunk(payload: &[u8]) -> Bytes {
    debug_assert!(!payload.is_empty(), "empty chunk would terminate the body");

    let size = format!("{:x}\r\n", payload.len());
    let mut buf = BytesMut::with_capacity(size.len() + payload.len() + 2);
    buf.put(size.as_bytes());
    buf.put(payload);
    buf.put(&b"\r\n"[..]);
    buf.freeze()
}

use bytes::Bytes;

use crate::context::Context;
use crate::{Response, StatusCode};

/// Number of chunks sent by `/stream`.
pub const CHUNK_COUNT: usize = 10;

/// `GET /stream` — counts from 1 to [`CHUNK_COUNT`], one chunk per number,
/// pausing between chunks.
pub async fn count(ctx: Context) -> Response {
    let chunks = (1..=CHUNK_COUNT)
        .map(|n| Bytes::from(n.to_string()))
        .collect();
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .chunked(chunks, ctx.state().stream_interval)
}

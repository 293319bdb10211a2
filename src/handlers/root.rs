use crate::context::Context;
use crate::{Response, StatusCode};

/// Body served at `/`.
pub const GREETING: &str = "Halo's light";

/// `GET /` — a fixed plain-text greeting, whatever the request carried.
pub async fn index(_ctx: Context) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body(GREETING)
}

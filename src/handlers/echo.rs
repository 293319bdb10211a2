use crate::context::Context;
use crate::{Response, StatusCode};

/// `POST /halo` — echoes the request body back as plain text.
///
/// The session has already rejected requests without a valid
/// `Content-Length`, so the body here is complete.
pub async fn echo(ctx: Context) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body(ctx.request().body().clone())
}

//! `/files/<name>` — read and write resources in the sandbox.

use tracing::debug;

use super::{HandlerError, respond};
use crate::context::Context;
use crate::{Response, StatusCode};

/// `GET /files/<name>` — the raw bytes of a stored resource.
pub async fn get(ctx: Context) -> Response {
    respond(read(&ctx).await)
}

/// `POST /files/<name>` — store the request body under `name`.
///
/// `Content-Length` is enforced by the session before this runs.
pub async fn put(ctx: Context) -> Response {
    respond(write(&ctx).await)
}

async fn read(ctx: &Context) -> Result<Response, HandlerError> {
    let name = ctx.suffix();
    let state = ctx.state();
    let contents = state.files.read(name).await?;

    debug!(resource = name, bytes = contents.len(), "serving file");
    Ok(Response::new(StatusCode::Ok)
        .header("Content-Type", state.mime.for_name(name))
        .body(contents))
}

async fn write(ctx: &Context) -> Result<Response, HandlerError> {
    let name = ctx.suffix();
    let body = ctx.request().body();
    ctx.state().files.write(name, body).await?;

    debug!(resource = name, bytes = body.len(), "stored file");
    Ok(Response::new(StatusCode::Created))
}

//! One connection's request/response lifecycle.
//!
//! A session is a small state machine:
//!
//! ```text
//! Idle → Framing → BodyCompletion → Dispatch → Respond ─┬→ Idle
//!          │             │                              └→ Closed
//!          └─────────────┴→ Respond (400 / 500) or Closed
//! ```
//!
//! Every read from the stream gets a fresh idle window. A client that goes
//! quiet for a whole window, between requests or mid-request, is closed
//! silently; one that keeps sending is never cut off. Writes are bounded by
//! the same window. Bytes read past the end of a request stay in the buffer
//! and are framed next.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::http::body::{self, BodyError};
use crate::http::request::{Request, RequestError};
use crate::http::{Response, StatusCode};
use crate::router::{BodyPolicy, RouteMatch, Router};

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Errors that end a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
}

enum State {
    Idle,
    Framing,
    BodyCompletion {
        request: Request,
        route: Option<RouteMatch>,
    },
    Dispatch {
        request: Request,
        route: Option<RouteMatch>,
    },
    Respond(Response),
    Closed,
}

/// Serves sequential requests on one stream until it is closed.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    buf: BytesMut,
    // Leading bytes of `buf` already searched for a head terminator.
    scanned: usize,
    router: Arc<Router>,
    idle_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: SocketAddr, router: Arc<Router>, idle_timeout: Duration) -> Self {
        Self {
            stream,
            peer,
            buf: BytesMut::with_capacity(INITIAL_BUF_SIZE),
            scanned: 0,
            router,
            idle_timeout,
        }
    }

    /// Runs the session to completion.
    ///
    /// Returns `Ok(())` when the peer closes, asks for `Connection: close`,
    /// goes idle past the timeout, or sends a malformed request.
    ///
    /// # Errors
    ///
    /// [`SessionError::Io`] when a read or write on the stream fails, or a
    /// write stalls past the idle timeout; the connection is dropped without
    /// a response.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let mut state = State::Idle;
        loop {
            state = match state {
                State::Idle => {
                    self.scanned = 0;
                    State::Framing
                }
                State::Framing => self.frame().await?,
                State::BodyCompletion { request, route } => {
                    self.complete_body(request, route).await?
                }
                State::Dispatch { request, route } => self.dispatch(request, route).await,
                State::Respond(response) => {
                    let keep_alive = response.is_keep_alive();
                    response.write_to(&mut self.stream, self.idle_timeout).await?;
                    if keep_alive { State::Idle } else { State::Closed }
                }
                State::Closed => break,
            };
        }

        debug!(peer = %self.peer, "closing connection");
        // The peer may already be gone; nothing useful to do on failure.
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    // Reads until a full request head is buffered.
    async fn frame(&mut self) -> Result<State, SessionError> {
        loop {
            match Request::parse_head_from(&self.buf, self.scanned) {
                Ok((request, head_len)) => {
                    self.buf.advance(head_len);
                    let route = self.router.find(request.method(), request.path());
                    return Ok(State::BodyCompletion { request, route });
                }
                Err(RequestError::Incomplete) => self.scanned = self.buf.len(),
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "malformed request, sending 400");
                    return Ok(State::Respond(bad_request(false)));
                }
            }

            match timeout(self.idle_timeout, self.stream.read_buf(&mut self.buf)).await {
                Ok(Ok(0)) => {
                    if self.buf.is_empty() {
                        debug!(peer = %self.peer, "connection closed by peer");
                    } else {
                        debug!(peer = %self.peer, buffered = self.buf.len(), "peer closed mid-request");
                    }
                    return Ok(State::Closed);
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(peer = %self.peer, "idle timeout, closing");
                    return Ok(State::Closed);
                }
            }
        }
    }

    // Settles the request body according to the route's policy.
    async fn complete_body(
        &mut self,
        request: Request,
        route: Option<RouteMatch>,
    ) -> Result<State, SessionError> {
        let policy = route
            .as_ref()
            .map_or(BodyPolicy::Optional, RouteMatch::body_policy);

        let declared = match (request.content_length(), policy) {
            (Ok(len), BodyPolicy::Optional) => {
                // Never wait on the stream for a body nobody reads; drop
                // whatever part of it arrived with the head.
                let buffered = len.unwrap_or(0).min(self.buf.len());
                self.buf.advance(buffered);
                return Ok(State::Dispatch { request, route });
            }
            (Err(e), BodyPolicy::Optional) => {
                debug!(peer = %self.peer, error = %e, "ignoring Content-Length");
                return Ok(State::Dispatch { request, route });
            }
            (Ok(Some(len)), BodyPolicy::Required) => len,
            (Ok(None), BodyPolicy::Required) => {
                warn!(peer = %self.peer, path = request.path(), "missing Content-Length, sending 400");
                return Ok(State::Respond(bad_request(request.is_keep_alive())));
            }
            (Err(e), BodyPolicy::Required) => {
                // Without a usable length the next request cannot be framed.
                warn!(peer = %self.peer, error = %e, "bad Content-Length, sending 400");
                return Ok(State::Respond(bad_request(false)));
            }
        };

        match body::complete(&mut self.stream, &mut self.buf, declared, self.idle_timeout).await {
            Ok(body) => Ok(State::Dispatch {
                request: request.with_body(body),
                route,
            }),
            Err(BodyError::IdleTimeout(_)) => {
                debug!(peer = %self.peer, "idle timeout while reading body, closing");
                Ok(State::Closed)
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "incomplete body, sending 500");
                Ok(State::Respond(
                    Response::new(StatusCode::InternalServerError).keep_alive(false),
                ))
            }
        }
    }

    async fn dispatch(&mut self, request: Request, route: Option<RouteMatch>) -> State {
        let keep_alive = request.is_keep_alive();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let response = match route {
            Some(matched) => matched.dispatch(request, Arc::clone(self.router.state())).await,
            None => Router::not_found(),
        };

        debug!(
            peer = %self.peer,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            keep_alive,
            "request handled"
        );
        State::Respond(response.keep_alive(keep_alive))
    }
}

fn bad_request(keep_alive: bool) -> Response {
    Response::new(StatusCode::BadRequest).keep_alive(keep_alive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers;
    use crate::handlers::test_support::state;
    use tokio::io::DuplexStream;
    use tokio::time::Instant;

    struct Harness {
        client: DuplexStream,
        task: tokio::task::JoinHandle<Result<(), SessionError>>,
        dir: tempfile::TempDir,
    }

    fn start(idle: Duration) -> Harness {
        start_with_capacity(idle, 64 * 1024)
    }

    fn start_with_capacity(idle: Duration, capacity: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(handlers::routes(state(dir.path())));
        let (client, server) = tokio::io::duplex(capacity);
        let session = Session::new(server, "127.0.0.1:9".parse().unwrap(), router, idle);
        Harness {
            client,
            task: tokio::spawn(session.run()),
            dir,
        }
    }

    // Reads one fixed-length response: (head, body).
    async fn read_response(stream: &mut DuplexStream) -> (String, Vec<u8>) {
        let mut buf = Vec::new();
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "stream closed before a full head");
            buf.extend_from_slice(&chunk[..n]);
        };
        let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
        let len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        let mut body = buf[head_end..].to_vec();
        while body.len() < len {
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0);
            body.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(body.len(), len, "no extra bytes expected");
        (head, body)
    }

    async fn assert_closed(stream: &mut DuplexStream) {
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty(), "unexpected trailing bytes: {rest:?}");
    }

    #[tokio::test]
    async fn keep_alive_serves_sequential_requests() {
        let mut h = start(Duration::from_secs(5));
        for _ in 0..3 {
            h.client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
            let (head, body) = read_response(&mut h.client).await;
            assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(head.contains("Connection: keep-alive\r\n"));
            assert_eq!(body, b"Halo's light");
        }
        drop(h.client);
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn connection_close_ends_session() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.contains("Connection: close\r\n"));
        assert_closed(&mut h.client).await;
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn malformed_request_gets_400_and_close() {
        let mut h = start(Duration::from_secs(5));
        h.client.write_all(b"GET / HTTP/2.0\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert!(body.is_empty());
        assert_closed(&mut h.client).await;
    }

    #[tokio::test]
    async fn body_split_across_writes_is_completed() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.client.write_all(b" world").await.unwrap();

        let (head, body) = read_response(&mut h.client).await;
        assert!(head.contains("Content-Length: 11\r\n"));
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn pipelined_request_after_body_is_kept() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiGET / HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let (_, first) = read_response(&mut h.client).await;
        assert_eq!(first, b"hi");
        let (head, second) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(second, b"Halo's light");
    }

    #[tokio::test]
    async fn missing_length_on_post_is_400_and_session_continues() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));

        h.client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn missing_length_on_file_upload_stores_nothing() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /files/x.txt HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let (head, body) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(body.is_empty());
        assert!(!h.dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn invalid_length_on_post_is_400_and_close() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: abc\r\n\r\n")
            .await
            .unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_closed(&mut h.client).await;
    }

    #[tokio::test]
    async fn root_ignores_invalid_length() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"GET / HTTP/1.1\r\nContent-Length: -1\r\n\r\n")
            .await
            .unwrap();
        let (head, body) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"Halo's light");
    }

    #[tokio::test(start_paused = true)]
    async fn root_with_declared_body_answers_without_waiting() {
        let mut h = start(Duration::from_secs(2));
        let started = Instant::now();
        h.client
            .write_all(b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\n")
            .await
            .unwrap();
        let (head, body) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"Halo's light");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn buffered_body_on_get_is_not_framed_as_a_request() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\nxyzGET / HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        for _ in 0..2 {
            let (head, body) = read_response(&mut h.client).await;
            assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
            assert_eq!(body, b"Halo's light");
        }
    }

    #[tokio::test]
    async fn unmatched_route_is_404() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"DELETE /files/a HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(head.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn body_cut_short_gets_500() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        h.client.shutdown().await.unwrap();
        let (head, _) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_times_out_silently() {
        let mut h = start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_closed(&mut h.client).await;
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn body_trickled_within_the_window_is_completed() {
        let mut h = start(Duration::from_secs(1));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: 6\r\n\r\n")
            .await
            .unwrap();
        for byte in b"trickl" {
            tokio::time::sleep(Duration::from_millis(400)).await;
            h.client.write_all(&[*byte]).await.unwrap();
        }
        let (head, body) = read_response(&mut h.client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"trickl");
    }

    #[tokio::test(start_paused = true)]
    async fn body_stalled_past_the_window_closes_silently() {
        let mut h = start(Duration::from_secs(1));
        h.client
            .write_all(b"POST /halo HTTP/1.1\r\nContent-Length: 6\r\n\r\nab")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_closed(&mut h.client).await;
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn each_read_gets_a_fresh_window() {
        let mut h = start(Duration::from_secs(5));
        for _ in 0..3 {
            // The head spans more than one window in total, but no single
            // read waits longer than one.
            h.client.write_all(b"GET / ").await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            h.client.write_all(b"HTTP/1.1\r\n").await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            h.client.write_all(b"\r\n").await.unwrap();

            let (head, _) = read_response(&mut h.client).await;
            assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
            tokio::time::sleep(Duration::from_secs(4)).await;
        }
        drop(h.client);
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn head_delivered_byte_by_byte_is_framed() {
        let mut h = start(Duration::from_secs(5));
        for byte in b"GET /stream HTTP/1.1\r\nConnection: close\r\n\r\n" {
            h.client.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }
        let mut out = String::new();
        h.client.read_to_string(&mut out).await.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("0\r\n\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn peer_that_stops_reading_is_dropped() {
        let mut h = start_with_capacity(Duration::from_secs(1), 1024);
        let body = vec![b'z'; 8 * 1024];
        let head = format!("POST /halo HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len());
        h.client.write_all(head.as_bytes()).await.unwrap();
        h.client.write_all(&body).await.unwrap();

        // The echo does not fit in the pipe and nobody reads it.
        let err = h.task.await.unwrap().unwrap_err();
        let SessionError::Io(io_err) = err;
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn stream_route_writes_chunks() {
        let mut h = start(Duration::from_secs(5));
        h.client
            .write_all(b"GET /stream HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut out = String::new();
        h.client.read_to_string(&mut out).await.unwrap();
        let (head, body) = out.split_once("\r\n\r\n").unwrap();
        assert!(head.contains("Transfer-Encoding: chunked"));
        assert!(body.starts_with("1\r\n1\r\n"));
        assert!(body.ends_with("2\r\n10\r\n0\r\n\r\n"));
    }
}

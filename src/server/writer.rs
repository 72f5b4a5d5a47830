//! Response writing
//!
//! Handlers write a status, headers and body chunks through
//! [`ResponseWriter`] instead of building a whole `Response`, so large
//! files stream without buffering. [`ChannelWriter`] feeds hyper through a
//! channel; [`StatusRecorder`] wraps any writer to capture the status for
//! the request log.

use bytes::Bytes;
use hyper::body::{Body, Frame};
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Chunks buffered between the handler and the connection
const BODY_CHANNEL_CAPACITY: usize = 4;

/// Sink for one HTTP response
pub trait ResponseWriter: Send {
    /// Headers sent with the status line. Changes after the first
    /// `write_header` or `write` are ignored.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line and headers
    fn write_header(&mut self, status: StatusCode);

    /// Send a body chunk, implying `200 OK` if no status was sent yet
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = io::Result<()>> + Send;
}

type Head = (StatusCode, HeaderMap);

/// Writer whose output becomes a hyper response
pub struct ChannelWriter {
    status: StatusCode,
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<io::Result<Bytes>>,
}

/// Receiving half of a [`ChannelWriter`]
pub struct PendingResponse {
    head: oneshot::Receiver<Head>,
    body: mpsc::Receiver<io::Result<Bytes>>,
}

impl ChannelWriter {
    pub fn channel() -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            Self {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                head: Some(head_tx),
                body: body_tx,
            },
            PendingResponse {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    pub fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    fn commit(&mut self) {
        if let Some(head) = self.head.take() {
            // Receiver gone means the connection is gone; nothing to do
            let _ = head.send((self.status, std::mem::take(&mut self.headers)));
        }
    }
}

impl ResponseWriter for ChannelWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.is_committed() {
            debug!("Ignoring superfluous write_header({})", status);
            return;
        }
        self.status = status;
        self.commit();
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.commit();
        if chunk.is_empty() {
            return Ok(());
        }
        self.body
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        // A handler that wrote nothing answers 200 with an empty body,
        // one that panicked before writing answers 500
        if !self.is_committed() && std::thread::panicking() {
            self.status = StatusCode::INTERNAL_SERVER_ERROR;
        }
        self.commit();
    }
}

impl PendingResponse {
    /// Wait for the head and return a response streaming the body
    pub async fn into_response(self) -> Response<ChannelBody> {
        let (status, headers) = self
            .head
            .await
            .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new()));

        let mut response = Response::new(ChannelBody { rx: self.body });
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Response body fed by a [`ChannelWriter`]
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|chunk| chunk.map(Frame::data)))
    }
}

/// Forwards to an inner writer and remembers the first status observed
pub struct StatusRecorder<W> {
    inner: W,
    status: Option<StatusCode>,
}

impl<W> StatusRecorder<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    /// Status sent so far, `200 OK` if nothing was written
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Status sent so far, if any
    pub fn recorded(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for StatusRecorder<W> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
        self.inner.write_header(status);
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.status.get_or_insert(StatusCode::OK);
        self.inner.write(chunk).await
    }
}

//! HTTP file server
//!
//! Serves the shared directory to the onion service. Every request is
//! logged with its method, path, status and duration. Timeouts are generous
//! because Tor circuits are slow: only the request headers have a short
//! deadline.

pub mod files;
pub mod idle;
pub mod writer;

pub use idle::IdleTimeout;
pub use writer::{ChannelBody, ChannelWriter, PendingResponse, ResponseWriter, StatusRecorder};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::transfer::Exclusions;
use bytes::Buf;
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::fmt::Display;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Per-request settings shared by all connections
struct ServerState {
    root: PathBuf,
    exclusions: Exclusions,
    read_timeout: Duration,
    write_timeout: Duration,
}

/// Static file server for the shared directory
#[derive(Clone)]
pub struct FileServer {
    state: Arc<ServerState>,
    listen_addr: SocketAddr,
    header_read_timeout: Duration,
    idle_timeout: Duration,
}

impl FileServer {
    pub fn new(config: &ServerConfig, exclusions: Exclusions) -> Result<Self> {
        let listen_addr = config.socket_addr().ok_or_else(|| {
            Error::Config(format!(
                "server.listen_addr is not a socket address: {}",
                config.listen_addr
            ))
        })?;

        Ok(Self {
            state: Arc::new(ServerState {
                root: config.root.clone(),
                exclusions,
                read_timeout: config.read_timeout(),
                write_timeout: config.write_timeout(),
            }),
            listen_addr,
            header_read_timeout: config.header_read_timeout(),
            idle_timeout: config.idle_timeout(),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.listen_addr)
            .await
            .map_err(|source| Error::Listen {
                addr: self.listen_addr,
                source,
            })
    }

    /// Bind and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` forever
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr().unwrap_or(self.listen_addr);
        info!(
            "Serving {} on http://{}/",
            self.state.root.display(),
            local
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move { server.serve_connection(stream, peer).await });
                },
                Err(e) => {
                    error!("Accept error: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                },
            }
        }
    }

    async fn serve_connection(self, stream: TcpStream, peer: SocketAddr) {
        debug!("Connection from {}", peer);
        let io = TokioIo::new(IdleTimeout::new(stream, self.idle_timeout));

        let state = Arc::clone(&self.state);
        let service = service_fn(move |req| {
            let state = Arc::clone(&state);
            async move { Ok::<_, Infallible>(dispatch(state, req).await) }
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout)
            .keep_alive(true);

        if let Err(e) = builder.serve_connection(io, service).await {
            debug!("Connection error from {}: {}", peer, e);
        }
    }
}

/// Run the handler on its own task and hand hyper the streaming response
async fn dispatch(state: Arc<ServerState>, req: Request<Incoming>) -> Response<ChannelBody> {
    let (writer, pending) = ChannelWriter::channel();
    tokio::spawn(log_request(state, req, writer));
    pending.into_response().await
}

/// Request logging layer around [`handle`]
async fn log_request<B, W>(state: Arc<ServerState>, req: Request<B>, writer: W)
where
    B: Body + Send,
    B::Error: Display,
    W: ResponseWriter,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!("Started {} {}", method, path);

    let mut recorder = StatusRecorder::new(writer);
    match tokio::time::timeout(state.write_timeout, handle(&state, req, &mut recorder)).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => debug!("{} {} aborted: {}", method, path, e),
        Err(_) => warn!("{} {} exceeded the write timeout", method, path),
    }

    info!(
        "Completed {} {} with status {} in {:?}",
        method,
        path,
        recorder.status().as_u16(),
        started.elapsed()
    );
}

/// Drain the request body, then serve the path
///
/// Bodies of rejected methods are never read.
async fn handle<B, W>(state: &ServerState, req: Request<B>, w: &mut W) -> io::Result<()>
where
    B: Body + Send,
    B::Error: Display,
    W: ResponseWriter,
{
    let (parts, body) = req.into_parts();
    if !files::is_allowed(&parts.method) {
        return files::reject_method(w).await;
    }

    match tokio::time::timeout(state.read_timeout, discard(body)).await {
        Ok(Ok(len)) if len > 0 => debug!("Discarded {} byte request body", len),
        Ok(Ok(_)) => {},
        Ok(Err(e)) => {
            debug!("Failed to read request body: {}", e);
            return files::write_error(w, StatusCode::BAD_REQUEST, false).await;
        },
        Err(_) => return files::write_error(w, StatusCode::REQUEST_TIMEOUT, false).await,
    }

    files::serve(
        &state.root,
        &state.exclusions,
        &parts.method,
        parts.uri.path(),
        w,
    )
    .await
}

/// Read the body frame by frame without keeping it
async fn discard<B: Body>(body: B) -> std::result::Result<u64, B::Error> {
    let mut body = std::pin::pin!(body);
    let mut len = 0u64;
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            len += data.remaining() as u64;
        }
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::writer::tests::BufferWriter;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::body::Frame;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn state(root: PathBuf) -> ServerState {
        ServerState {
            root,
            exclusions: Exclusions::new(["tori", "torrc"]),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Fails the test if anything polls it
    struct Untouched;

    impl Body for Untouched {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<Frame<Bytes>, Infallible>>> {
            panic!("request body was read");
        }
    }

    /// Never yields a frame
    struct Stalled;

    impl Body for Stalled {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<Frame<Bytes>, Infallible>>> {
            Poll::Pending
        }
    }

    /// `remaining` chunks of 64 KiB
    struct Chunks {
        remaining: usize,
    }

    static CHUNK: [u8; 64 * 1024] = [0; 64 * 1024];

    impl Body for Chunks {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<Frame<Bytes>, Infallible>>> {
            if self.remaining == 0 {
                return Poll::Ready(None);
            }
            self.remaining -= 1;
            Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(&CHUNK)))))
        }
    }

    #[tokio::test]
    async fn test_rejected_method_body_is_not_read() {
        let dir = tempfile::tempdir().unwrap();

        let req = Request::post("/x").body(Untouched).unwrap();
        let mut w = BufferWriter::default();
        handle(&state(dir.path().to_path_buf()), req, &mut w)
            .await
            .unwrap();

        assert_eq!(w.status, Some(StatusCode::METHOD_NOT_ALLOWED));
        assert_eq!(w.headers[hyper::header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let state = ServerState {
            read_timeout: Duration::from_millis(50),
            ..state(dir.path().to_path_buf())
        };

        let req = Request::get("/a.txt").body(Stalled).unwrap();
        let mut w = BufferWriter::default();
        handle(&state, req, &mut w).await.unwrap();

        assert_eq!(w.status, Some(StatusCode::REQUEST_TIMEOUT));
        assert_eq!(w.body, b"408 Request Timeout\n");
    }

    #[tokio::test]
    async fn test_large_body_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        // 64 MiB, drained one chunk at a time
        let req = Request::get("/a.txt")
            .body(Chunks { remaining: 1024 })
            .unwrap();
        let mut w = BufferWriter::default();
        handle(&state(dir.path().to_path_buf()), req, &mut w)
            .await
            .unwrap();

        assert_eq!(w.status, Some(StatusCode::OK));
        assert_eq!(w.body, b"a");
    }

    #[tokio::test]
    async fn test_discard_counts_bytes() {
        let len = discard(Chunks { remaining: 3 }).await.unwrap();
        assert_eq!(len, 3 * 64 * 1024);
    }

    #[tokio::test]
    async fn test_handle_serves_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF-1.7").unwrap();

        let req = Request::get("/report.pdf")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut w = BufferWriter::default();
        handle(&state(dir.path().to_path_buf()), req, &mut w)
            .await
            .unwrap();

        assert_eq!(w.status, Some(StatusCode::OK));
        assert_eq!(w.body, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_handle_ignores_query_string() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let req = Request::get("/a.txt?download=1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut w = BufferWriter::default();
        handle(&state(dir.path().to_path_buf()), req, &mut w)
            .await
            .unwrap();
        assert_eq!(w.body, b"a");
    }

    #[test]
    fn test_rejects_bad_listen_addr() {
        let config = ServerConfig {
            listen_addr: "nowhere".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            FileServer::new(&config, Exclusions::default()),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_listen_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            listen_addr: taken.local_addr().unwrap().to_string(),
            ..ServerConfig::default()
        };

        let server = FileServer::new(&config, Exclusions::default()).unwrap();
        let err = server.run().await.unwrap_err();
        assert!(matches!(err, Error::Listen { .. }));
    }
}

//! End-to-end transfers: FileServer on loopback, Downloader through a
//! minimal SOCKS5 relay standing in for Tor.

use oniondrop::config::{DownloadConfig, ServerConfig};
use oniondrop::server::FileServer;
use oniondrop::transfer::{Downloader, Exclusions};
use oniondrop::Error;
use reqwest::StatusCode;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serve `root` on an ephemeral loopback port
async fn start_server(root: &Path) -> SocketAddr {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        root: root.to_path_buf(),
        ..ServerConfig::default()
    };
    let server = FileServer::new(&config, Exclusions::new(["tori", "torrc"])).unwrap();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move { server.serve(listener).await });
    addr
}

/// No-auth SOCKS5 CONNECT relay
async fn start_socks_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(relay(stream));
        }
    });
    addr
}

async fn relay(mut client: TcpStream) {
    // Greeting: VER NMETHODS METHODS...
    let mut head = [0u8; 2];
    client.read_exact(&mut head).await.unwrap();
    let mut methods = vec![0u8; head[1] as usize];
    client.read_exact(&mut methods).await.unwrap();
    client.write_all(&[5, 0]).await.unwrap();

    // Request: VER CMD RSV ATYP DST.ADDR DST.PORT
    let mut request = [0u8; 4];
    client.read_exact(&mut request).await.unwrap();
    assert_eq!(request[1], 1, "only CONNECT is supported");

    let host = match request[3] {
        1 => {
            let mut ip = [0u8; 4];
            client.read_exact(&mut ip).await.unwrap();
            Ipv4Addr::from(ip).to_string()
        },
        3 => {
            let len = client.read_u8().await.unwrap();
            let mut name = vec![0u8; len as usize];
            client.read_exact(&mut name).await.unwrap();
            String::from_utf8(name).unwrap()
        },
        4 => {
            let mut ip = [0u8; 16];
            client.read_exact(&mut ip).await.unwrap();
            Ipv6Addr::from(ip).to_string()
        },
        other => panic!("unknown address type {}", other),
    };
    let port = client.read_u16().await.unwrap();

    let mut upstream = TcpStream::connect((host.as_str(), port)).await.unwrap();
    client
        .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0])
        .await
        .unwrap();

    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}

/// One-shot origin answering any request with `response`, then closing
async fn start_raw_origin(response: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            request.extend_from_slice(&buf[..n]);
        }

        stream.write_all(response).await.unwrap();
        stream.shutdown().await.unwrap();
    });
    addr
}

fn downloader(socks: SocketAddr, output_dir: &Path) -> Downloader {
    let config = DownloadConfig {
        socks_proxy: socks.to_string(),
        output_dir: output_dir.to_path_buf(),
        ..DownloadConfig::default()
    };
    Downloader::new(&config).unwrap().quiet(true)
}

/// Client that talks to the server directly
fn direct_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_download_through_socks() {
    let shared = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(shared.path().join("report.pdf"), &body).unwrap();

    let server = start_server(shared.path()).await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/report.pdf", server);
    let task = downloader(socks, out.path()).download(&url).await.unwrap();

    assert_eq!(task.url, url);
    assert_eq!(task.destination, out.path().join("report.pdf"));
    assert_eq!(task.expected_len, Some(body.len() as u64));
    assert_eq!(task.transferred, body.len() as u64);
    assert_eq!(std::fs::read(&task.destination).unwrap(), body);
}

#[tokio::test]
async fn test_download_decodes_file_name() {
    let shared = tempfile::tempdir().unwrap();
    std::fs::write(shared.path().join("my notes.txt"), b"hello").unwrap();

    let server = start_server(shared.path()).await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/my%20notes.txt", server);
    let task = downloader(socks, out.path()).download(&url).await.unwrap();

    assert_eq!(task.destination, out.path().join("my notes.txt"));
    assert_eq!(std::fs::read(&task.destination).unwrap(), b"hello");
}

#[tokio::test]
async fn test_missing_file_is_remote_error() {
    let shared = tempfile::tempdir().unwrap();
    let server = start_server(shared.path()).await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/missing.bin", server);
    let err = downloader(socks, out.path())
        .download(&url)
        .await
        .unwrap_err();

    assert_eq!(err.remote_status(), Some(StatusCode::NOT_FOUND));
    assert!(!out.path().join("missing.bin").exists());
}

#[tokio::test]
async fn test_daemon_config_is_not_served() {
    let shared = tempfile::tempdir().unwrap();
    std::fs::write(shared.path().join("torrc"), b"SocksPort 9050\n").unwrap();

    let server = start_server(shared.path()).await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/torrc", server);
    let err = downloader(socks, out.path())
        .download(&url)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote { status } if status == StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_post_is_rejected() {
    let shared = tempfile::tempdir().unwrap();
    std::fs::write(shared.path().join("a.txt"), b"a").unwrap();
    let server = start_server(shared.path()).await;

    let response = direct_client()
        .post(format!("http://{}/a.txt", server))
        .body("ignored")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, HEAD");
}

#[tokio::test]
async fn test_directory_redirect_and_listing() {
    let shared = tempfile::tempdir().unwrap();
    std::fs::create_dir(shared.path().join("photos")).unwrap();
    std::fs::write(shared.path().join("photos").join("cat.jpg"), b"jpg").unwrap();
    let server = start_server(shared.path()).await;
    let client = direct_client();

    let response = client
        .get(format!("http://{}/photos", server))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/photos/");

    let response = client
        .get(format!("http://{}/photos/", server))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.contains("<a href=\"cat.jpg\">cat.jpg</a>"));
}

#[tokio::test]
async fn test_head_has_length_but_no_body() {
    let shared = tempfile::tempdir().unwrap();
    std::fs::write(shared.path().join("a.txt"), b"abcdef").unwrap();
    let server = start_server(shared.path()).await;

    let response = direct_client()
        .head(format!("http://{}/a.txt", server))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "6");
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_truncated_body_keeps_partial_file() {
    let origin = start_raw_origin(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789").await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/movie.mkv", origin);
    let err = downloader(socks, out.path())
        .download(&url)
        .await
        .unwrap_err();

    match err {
        Error::Transfer { destination, .. } => {
            assert_eq!(destination, out.path().join("movie.mkv"));
        },
        other => panic!("expected a transfer error, got {:?}", other),
    }
    assert_eq!(
        std::fs::read(out.path().join("movie.mkv")).unwrap(),
        b"0123456789"
    );
}

#[tokio::test]
async fn test_download_without_content_length() {
    let origin =
        start_raw_origin(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nhello world").await;
    let socks = start_socks_relay().await;
    let out = tempfile::tempdir().unwrap();

    let url = format!("http://{}/greeting.txt", origin);
    let task = downloader(socks, out.path()).download(&url).await.unwrap();

    assert_eq!(task.expected_len, None);
    assert_eq!(task.transferred, 11);
    assert_eq!(std::fs::read(&task.destination).unwrap(), b"hello world");
}

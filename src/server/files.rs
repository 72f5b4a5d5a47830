//! Static file handler
//!
//! Serves the root directory read-only. Dotfiles and the daemon's files are
//! answered with 404 as if they did not exist.

use crate::server::writer::ResponseWriter;
use crate::transfer::Exclusions;
use crate::util::{decode_path, encode_path_segment};
use bytes::{Bytes, BytesMut};
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use hyper::{Method, StatusCode};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Read size per body chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// Answer one request for `uri_path` under `root`
pub async fn serve<W: ResponseWriter>(
    root: &Path,
    exclusions: &Exclusions,
    method: &Method,
    uri_path: &str,
    w: &mut W,
) -> io::Result<()> {
    let head_only = *method == Method::HEAD;
    if !is_allowed(method) {
        return reject_method(w).await;
    }

    let relative = match resolve(uri_path, exclusions) {
        Ok(relative) => relative,
        Err(status) => return write_error(w, status, head_only).await,
    };
    let path = root.join(&relative);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) => return write_error(w, status_for(&e), head_only).await,
    };

    if !metadata.is_dir() {
        return serve_file(w, &path, &metadata, head_only).await;
    }

    if !uri_path.ends_with('/') {
        let location = format!("{}/", uri_path);
        if let Ok(value) = HeaderValue::from_str(&location) {
            w.headers_mut().insert(LOCATION, value);
        }
        w.write_header(StatusCode::MOVED_PERMANENTLY);
        return Ok(());
    }

    let index = path.join("index.html");
    match tokio::fs::metadata(&index).await {
        Ok(index_meta) if index_meta.is_file() => {
            serve_file(w, &index, &index_meta, head_only).await
        },
        _ => {
            let top_level = relative.as_os_str().is_empty();
            list_directory(w, &path, top_level, exclusions, head_only).await
        },
    }
}

/// Only GET and HEAD are served
pub(crate) fn is_allowed(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// 405 with the methods we do accept
pub(crate) async fn reject_method<W: ResponseWriter>(w: &mut W) -> io::Result<()> {
    w.headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    write_error(w, StatusCode::METHOD_NOT_ALLOWED, false).await
}

/// Map a URL path to a path relative to the root
///
/// Rejects traversal with 400 and hides excluded names with 404. Excluded
/// names only apply at the top level, dotfiles at every level.
pub(crate) fn resolve(uri_path: &str, exclusions: &Exclusions) -> Result<PathBuf, StatusCode> {
    let decoded = decode_path(uri_path).ok_or(StatusCode::BAD_REQUEST)?;
    let mut relative = PathBuf::new();

    let segments = decoded.split('/').filter(|s| !s.is_empty() && *s != ".");
    for (depth, segment) in segments.enumerate() {
        let drive_prefix = cfg!(windows) && segment.contains(':');
        if segment == ".." || segment.contains(['\\', '\0']) || drive_prefix {
            return Err(StatusCode::BAD_REQUEST);
        }

        let hidden = if depth == 0 {
            exclusions.is_excluded(segment)
        } else {
            segment.starts_with('.')
        };
        if hidden {
            return Err(StatusCode::NOT_FOUND);
        }

        relative.push(segment);
    }

    Ok(relative)
}

async fn serve_file<W: ResponseWriter>(
    w: &mut W,
    path: &Path,
    metadata: &Metadata,
    head_only: bool,
) -> io::Result<()> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => return write_error(w, status_for(&e), head_only).await,
    };

    let len = metadata.len();
    let headers = w.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    w.write_header(StatusCode::OK);

    if head_only {
        return Ok(());
    }

    // Never send more than the announced length, even if the file grows
    let mut reader = file.take(len);
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    loop {
        buf.reserve(CHUNK_SIZE);
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        w.write(buf.split().freeze()).await?;
    }
}

async fn list_directory<W: ResponseWriter>(
    w: &mut W,
    dir: &Path,
    top_level: bool,
    exclusions: &Exclusions,
    head_only: bool,
) -> io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => return write_error(w, status_for(&e), head_only).await,
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let hidden = if top_level {
            exclusions.is_excluded(&name)
        } else {
            name.starts_with('.')
        };
        if hidden {
            continue;
        }
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        names.push((name, is_dir));
    }
    names.sort();

    let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
    for (name, is_dir) in &names {
        let slash = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<a href=\"{}{}\">{}{}</a>\n",
            escape_html(&encode_path_segment(name)),
            slash,
            escape_html(name),
            slash
        ));
    }
    html.push_str("</pre>\n");

    let headers = w.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(html.len()));
    w.write_header(StatusCode::OK);
    if head_only {
        return Ok(());
    }
    w.write(Bytes::from(html)).await
}

/// Plain-text error response
pub(crate) async fn write_error<W: ResponseWriter>(
    w: &mut W,
    status: StatusCode,
    head_only: bool,
) -> io::Result<()> {
    let body = format!("{}\n", status);
    let headers = w.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    w.write_header(status);
    if head_only {
        return Ok(());
    }
    w.write(Bytes::from(body)).await
}

fn status_for(err: &io::Error) -> StatusCode {
    match err.kind() {
        io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" | "md" | "log" => "text/plain; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

//! HTTP handler behind the download URLs handed out by `LocalBlobStore`.
//! Streams object bodies to avoid buffering in memory.

use crate::{
    backend::local_blobs::{LocalBlobStore, decode_object_path},
    errors::AppError,
    models::object::StoredObject,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use std::fmt::Write as _;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// `GET /o/{encoded}?token=...`
///
/// `encoded` is the URL-safe base64 of the object path. The token must match
/// the one minted when the object was stored; without it, existing and
/// unknown paths answer the same 403.
pub async fn download_object(
    State(store): State<LocalBlobStore>,
    Path(encoded): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let path = decode_object_path(&encoded)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "malformed object reference"))?;

    let (meta, file) = store
        .open_for_download(&path, query.token.as_deref())
        .await
        .map_err(|err| {
            debug!("rejected download of {}: {}", path, err);
            AppError::from(err)
        })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes.max(0)));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&meta.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// as RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::new();
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

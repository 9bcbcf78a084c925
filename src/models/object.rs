//! Represents an object (file payload) held by the blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Storage-side record of a single object.
///
/// The record carries metadata only; the payload lives on disk under a
/// sharded directory derived from `path`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Full storage path, e.g. `userFiles/{uid}/{ts}-{name}`.
    pub path: String,

    /// Original file name supplied by the uploader.
    pub filename: String,

    /// Content type (MIME type), when known.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, hex encoded.
    pub etag: String,

    /// Secret embedded in download URLs.
    pub download_token: Uuid,

    /// When the object was written.
    pub created_at: DateTime<Utc>,
}

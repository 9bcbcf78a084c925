//! src/backend/local_blobs.rs
//!
//! LocalBlobStore — object storage backed by SQLite for metadata and local
//! disk for payloads sharded beneath `base_path/{shard}/{shard}/{path}`.
//! Download URLs point at the `serve` endpoint and carry a per-object token.

use super::{BlobError, BlobStore, ByteStream, PutRequest};
use crate::models::object::StoredObject;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use futures::StreamExt;
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_PATH_LEN: usize = 1024;

const OBJECT_COLUMNS: &str =
    "id, path, filename, content_type, size_bytes, etag, download_token, created_at";

/// LocalBlobStore provides the blob operations the client relies on:
/// - Create an object from a byte stream (create-only, never overwrites)
/// - Resolve a tokenised download URL
/// - Delete an object (row and payload)
/// - List objects under a prefix
#[derive(Clone)]
pub struct LocalBlobStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Public base URL of the download endpoint, without trailing slash.
    pub public_url: String,
}

impl LocalBlobStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reject paths that could escape `base_path` or confuse the shard layout.
    fn ensure_path_safe(&self, path: &str) -> Result<(), BlobError> {
        if path.is_empty() || path.len() > MAX_OBJECT_PATH_LEN {
            return Err(BlobError::InvalidPath);
        }
        // empty segments cover leading, trailing and doubled slashes
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(BlobError::InvalidPath);
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(BlobError::InvalidPath);
        }
        Ok(())
    }

    /// Two-level shard identifiers: first two bytes of MD5(path) in hex.
    fn object_shards(path: &str) -> (String, String) {
        let digest = md5::compute(path);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, path: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(path);
        let mut file_path = self.base_path.clone();
        file_path.push(shard_a);
        file_path.push(shard_b);
        file_path.push(path);
        file_path
    }

    async fn fetch_object(&self, path: &str) -> Result<StoredObject, BlobError> {
        sqlx::query_as::<_, StoredObject>(&format!(
            "SELECT {} FROM objects WHERE path = ?",
            OBJECT_COLUMNS
        ))
        .bind(path)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    /// Metadata and an open payload handle for streaming out.
    ///
    /// The row is looked up by path and token together, so an unknown path
    /// and a wrong token both come back as `Denied`.
    pub async fn open_for_download(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<(StoredObject, File), BlobError> {
        self.ensure_path_safe(path)?;
        let token = token
            .and_then(|t| Uuid::parse_str(t).ok())
            .ok_or(BlobError::Denied)?;
        let object = sqlx::query_as::<_, StoredObject>(&format!(
            "SELECT {} FROM objects WHERE path = ? AND download_token = ?",
            OBJECT_COLUMNS
        ))
        .bind(path)
        .bind(token)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BlobError::Denied)?;
        let file = File::open(self.object_path(path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound(path.to_string())
            } else {
                BlobError::Io(err)
            }
        })?;
        Ok((object, file))
    }

    fn download_url(&self, object: &StoredObject) -> String {
        format!(
            "{}/o/{}?token={}",
            self.public_url,
            encode_object_path(&object.path),
            object.download_token
        )
    }

    /// Write `body` to a temp file next to the final location, returning the
    /// temp path, byte count and MD5.
    async fn write_temp(
        &self,
        parent: &Path,
        mut body: ByteStream,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<(PathBuf, i64, String), BlobError> {
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let mut size_bytes: u64 = 0;
        let mut digest = Context::new();

        while let Some(chunk_res) = body.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BlobError::Io(err));
                }
            };
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
            size_bytes += chunk.len() as u64;
            progress(size_bytes);
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }

        Ok((tmp_path, size_bytes as i64, format!("{:x}", digest.compute())))
    }

    /// Remove empty directories from `start` up to (excluding) `base_path`.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_stream(
        &self,
        request: PutRequest,
        body: ByteStream,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<StoredObject, BlobError> {
        self.ensure_path_safe(&request.path)?;

        let file_path = self.object_path(&request.path);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let (tmp_path, size_bytes, etag) = self.write_temp(&parent, body, progress).await?;

        // The row claims the path before the payload is moved into place, so
        // a concurrent writer to the same path can never clobber it.
        let inserted = sqlx::query_as::<_, StoredObject>(&format!(
            "INSERT INTO objects ({cols}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {cols}",
            cols = OBJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&request.path)
        .bind(&request.file_name)
        .bind(&request.content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        let object = match inserted {
            Ok(object) => object,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(if is_unique_violation(&err) {
                    BlobError::AlreadyExists(request.path)
                } else {
                    BlobError::Sqlx(err)
                });
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            let _ = sqlx::query("DELETE FROM objects WHERE id = ?")
                .bind(object.id)
                .execute(&*self.db)
                .await;
            return Err(BlobError::Io(err));
        }

        debug!("stored {} ({} bytes)", object.path, object.size_bytes);
        Ok(object)
    }

    async fn resolve_download_url(&self, path: &str) -> Result<String, BlobError> {
        self.ensure_path_safe(path)?;
        let object = self.fetch_object(path).await?;
        Ok(self.download_url(&object))
    }

    async fn object_download_url(&self, object: &StoredObject) -> Result<String, BlobError> {
        Ok(self.download_url(object))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.ensure_path_safe(path)?;
        let result = sqlx::query("DELETE FROM objects WHERE path = ?")
            .bind(path)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BlobError::NotFound(path.to_string()));
        }

        let file_path = self.object_path(path);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(BlobError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, BlobError> {
        let rows = sqlx::query_as::<_, StoredObject>(&format!(
            "SELECT {} FROM objects
             WHERE substr(path, 1, length(?)) = ?
             ORDER BY created_at DESC, path DESC",
            OBJECT_COLUMNS
        ))
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }
}

/// URL-safe encoding of an object path for use in download URLs.
pub fn encode_object_path(path: &str) -> String {
    URL_SAFE_NO_PAD.encode(path)
}

pub fn decode_object_path(encoded: &str) -> Option<String> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

//! Client upload pipeline: stream a local file into the caller's namespace
//! and report fractional progress along the way.

use super::SessionContext;
use crate::{
    backend::{BlobStore, PutRequest},
    errors::ClientError,
    models::file::{UploadedFile, format_file_size, user_namespace},
};
use chrono::Utc;
use futures::StreamExt;
use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// A file picked from the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl LocalFile {
    /// Stat `path` and capture its name and size.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: meta.len(),
        })
    }
}

/// Hands out strictly increasing millisecond timestamps for upload paths.
#[derive(Debug, Default)]
pub struct PathAllocator {
    last: AtomicI64,
}

impl PathAllocator {
    pub fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    /// `userFiles/{uid}/{ts}-{file_name}`
    pub fn allocate(&self, uid: &str, file_name: &str) -> String {
        format!("{}{}-{}", user_namespace(uid), self.next_timestamp(), file_name)
    }
}

pub struct UploadService {
    blobs: Arc<dyn BlobStore>,
    paths: PathAllocator,
}

impl UploadService {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            paths: PathAllocator::default(),
        }
    }

    /// Upload `file` under the caller's namespace.
    ///
    /// `on_progress` receives percentages in `[0, 100]`, never decreasing,
    /// ending with exactly `100` on success. A failed transfer may leave a
    /// partial object behind; nothing is cleaned up here.
    pub async fn upload(
        &self,
        ctx: &SessionContext,
        file: &LocalFile,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<UploadedFile, ClientError> {
        let identity = ctx.require()?;
        let full_path = self.paths.allocate(&identity.uid, &file.name);

        let handle = File::open(&file.path).await.map_err(|err| {
            error!("could not open {}: {}", file.path.display(), err);
            ClientError::UploadFailed(err.to_string())
        })?;
        let body = ReaderStream::with_capacity(handle, READ_CHUNK_BYTES).boxed();

        let request = PutRequest {
            path: full_path.clone(),
            file_name: file.name.clone(),
            content_type: mime_guess::from_path(&file.name)
                .first()
                .map(|mime| mime.to_string()),
        };

        let total = file.size;
        let mut last_reported = 0.0_f64;
        let stored = {
            let mut report = |written: u64| {
                let pct = if total == 0 {
                    100.0
                } else {
                    (written as f64 / total as f64 * 100.0).min(100.0)
                };
                if pct >= last_reported {
                    last_reported = pct;
                    on_progress(pct);
                }
            };
            self.blobs.put_stream(request, body, &mut report).await
        };
        let stored = stored.map_err(|err| {
            error!("upload of {} failed: {}", full_path, err);
            ClientError::UploadFailed(err.to_string())
        })?;
        if last_reported < 100.0 || total == 0 {
            on_progress(100.0);
        }

        let download_url = self
            .blobs
            .resolve_download_url(&stored.path)
            .await
            .map_err(|err| ClientError::UploadFailed(err.to_string()))?;

        info!("uploaded {} ({} bytes)", full_path, stored.size_bytes);
        Ok(UploadedFile {
            name: file.name.clone(),
            download_url,
            size: format_file_size(file.size, 2),
            full_path,
        })
    }
}

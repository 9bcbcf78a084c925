use super::SessionContext;
use crate::{
    backend::{BlobError, BlobStore},
    errors::ClientError,
    models::{
        file::{FileDescriptor, FileKind, format_file_size, user_namespace},
        object::StoredObject,
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a successful [`FileService::delete`] actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was stored at the path; deletes are idempotent.
    AlreadyGone,
    /// Path is not under the caller's namespace; nothing was touched.
    OutsideNamespace,
}

pub struct FileService {
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Every file stored under `userFiles/{owner_id}/`, newest first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<FileDescriptor>, ClientError> {
        let objects = self
            .blobs
            .list(&user_namespace(owner_id))
            .await
            .map_err(|err| {
                error!("listing files of {} failed: {}", owner_id, err);
                ClientError::ListFailed(err.to_string())
            })?;

        let mut files = Vec::with_capacity(objects.len());
        for object in objects {
            match self.blobs.object_download_url(&object).await {
                Ok(url) => files.push(describe(object, url)),
                // deleted between list and resolve
                Err(err) => warn!("skipping {}: {}", object.path, err),
            }
        }
        Ok(files)
    }

    pub async fn delete(
        &self,
        ctx: &SessionContext,
        full_path: &str,
    ) -> Result<DeleteOutcome, ClientError> {
        let identity = ctx.require()?;
        if !identity.owns_path(full_path) {
            warn!(
                "refusing to delete {}: outside namespace of {}",
                full_path, identity.uid
            );
            return Ok(DeleteOutcome::OutsideNamespace);
        }

        match self.blobs.delete(full_path).await {
            Ok(()) => {
                info!("deleted {}", full_path);
                Ok(DeleteOutcome::Deleted)
            }
            Err(BlobError::NotFound(_)) => {
                warn!("{} was already gone", full_path);
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(err) => {
                error!("deleting {} failed: {}", full_path, err);
                Err(ClientError::DeletionFailed(err.to_string()))
            }
        }
    }
}

fn describe(object: StoredObject, download_url: String) -> FileDescriptor {
    let kind = match object.content_type.as_deref().map(FileKind::from_content_type) {
        Some(kind) if kind != FileKind::Generic => kind,
        _ => FileKind::from_file_name(&object.filename),
    };
    FileDescriptor {
        id: object.path.clone(),
        name: object.filename,
        size: format_file_size(object.size_bytes.max(0) as u64, 2),
        uploaded_at: object.created_at,
        download_url,
        kind,
        full_path: object.path,
    }
}

//! Client operations: each one receives an explicit [`SessionContext`]
//! instead of reading a global "current user".

pub mod file_service;
pub mod remote_service;
pub mod session;
pub mod upload_service;

use crate::backend::{BlobStore, JobInvoker};
use std::sync::Arc;

pub use file_service::{DeleteOutcome, FileService};
pub use remote_service::{ConfirmedJob, PROCESS_REMOTE_URL_JOB, RemoteIngestionService};
pub use session::SessionContext;
pub use upload_service::{LocalFile, PathAllocator, UploadService};

/// The three services the view layer drives, sharing one set of backends.
#[derive(Clone)]
pub struct Services {
    pub upload: Arc<UploadService>,
    pub remote: Arc<RemoteIngestionService>,
    pub files: Arc<FileService>,
}

impl Services {
    pub fn new(blobs: Arc<dyn BlobStore>, jobs: Arc<dyn JobInvoker>) -> Self {
        Self {
            upload: Arc::new(UploadService::new(blobs.clone())),
            remote: Arc::new(RemoteIngestionService::new(jobs, blobs.clone())),
            files: Arc::new(FileService::new(blobs)),
        }
    }
}

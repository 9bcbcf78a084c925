use super::status::{FormStatus, Notifier};
use crate::{
    errors::ClientError,
    models::file::UploadedFile,
    services::{LocalFile, SessionContext, UploadService},
};
use tracing::error;

/// Largest file the form accepts for direct upload.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

const TOO_LARGE: &str = "File size exceeds 5GB. For larger files, please use remote upload options or ensure your setup supports it.";
const NOTHING_SELECTED: &str = "Please select a file to upload.";

#[derive(Clone, Debug)]
pub struct UploadForm {
    pub selected: Option<LocalFile>,
    pub status: FormStatus,
    max_bytes: u64,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadForm {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            selected: None,
            status: FormStatus::Idle,
            max_bytes,
        }
    }

    /// Pick a file. Oversized files are refused and clear the selection.
    pub fn select(&mut self, file: LocalFile) -> bool {
        if file.size > self.max_bytes {
            self.selected = None;
            self.status = FormStatus::Failed(TOO_LARGE.to_string());
            return false;
        }
        self.selected = Some(file);
        self.status = FormStatus::Idle;
        true
    }

    pub fn can_submit(&self) -> bool {
        self.selected.is_some() && !self.status.is_busy()
    }

    pub async fn submit(
        &mut self,
        ctx: &SessionContext,
        uploads: &UploadService,
        notifier: &Notifier,
    ) -> Result<UploadedFile, ClientError> {
        self.submit_with_progress(ctx, uploads, notifier, &mut |_: f64| {})
            .await
    }

    /// Upload the selected file, mirroring progress into the form status
    /// and forwarding each value to `on_progress`.
    pub async fn submit_with_progress(
        &mut self,
        ctx: &SessionContext,
        uploads: &UploadService,
        notifier: &Notifier,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<UploadedFile, ClientError> {
        let Some(file) = self.selected.clone() else {
            self.status = FormStatus::Failed(NOTHING_SELECTED.to_string());
            return Err(ClientError::InvalidInput(NOTHING_SELECTED.to_string()));
        };

        self.status = FormStatus::Uploading { progress: 0.0 };
        let status = &mut self.status;
        let result = uploads
            .upload(ctx, &file, &mut |progress: f64| {
                *status = FormStatus::Uploading { progress };
                on_progress(progress);
            })
            .await;

        match result {
            Ok(uploaded) => {
                self.status = FormStatus::Succeeded(format!(
                    "File \"{}\" uploaded successfully!",
                    uploaded.name
                ));
                self.selected = None;
                notifier.success(
                    "Upload Successful",
                    format!("{} has been uploaded.", uploaded.name),
                );
                Ok(uploaded)
            }
            Err(err) => {
                error!("upload of {} failed: {}", file.name, err);
                self.status = FormStatus::Failed(err.to_string());
                notifier.failure("Upload Failed", err.to_string());
                Err(err)
            }
        }
    }
}

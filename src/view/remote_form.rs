use super::status::{FormStatus, Notifier};
use crate::{
    errors::ClientError,
    models::file::FileDescriptor,
    services::{RemoteIngestionService, SessionContext},
};
use tracing::error;

#[derive(Clone, Debug, Default)]
pub struct RemoteForm {
    pub source_url: String,
    pub status: FormStatus,
}

impl RemoteForm {
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.source_url = url.into();
        self.status = FormStatus::Idle;
    }

    pub fn can_submit(&self) -> bool {
        !self.source_url.is_empty() && !self.status.is_busy()
    }

    /// Ask the server to ingest the entered URL.
    ///
    /// Input problems are shown inline only; anything past validation also
    /// raises a notice.
    pub async fn submit(
        &mut self,
        ctx: &SessionContext,
        remote: &RemoteIngestionService,
        notifier: &Notifier,
    ) -> Result<FileDescriptor, ClientError> {
        self.status = FormStatus::Submitting;

        let result = remote.initiate(ctx, &self.source_url).await;
        match result {
            Ok(descriptor) => {
                self.status = FormStatus::Succeeded(format!(
                    "Remote file \"{}\" processing has been initiated.",
                    descriptor.name
                ));
                self.source_url.clear();
                notifier.success(
                    "Remote Upload Initiated",
                    format!(
                        "Processing of {} has started. Check back later for completion.",
                        descriptor.name
                    ),
                );
                Ok(descriptor)
            }
            Err(err @ (ClientError::InvalidInput(_) | ClientError::InvalidUrl(_))) => {
                self.status = FormStatus::Failed(err.to_string());
                Err(err)
            }
            Err(err) => {
                error!("remote upload of {} failed: {}", self.source_url, err);
                self.status = FormStatus::Failed(err.to_string());
                notifier.failure("Remote Upload Failed", err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MockJobInvoker, UpstreamError, db, local_blobs::LocalBlobStore},
        models::identity::Identity,
        view::status::Tone,
    };
    use std::sync::Arc;

    async fn service(jobs: MockJobInvoker) -> (RemoteIngestionService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = Arc::new(db::connect(&url).await.unwrap());
        let blobs = LocalBlobStore::new(pool, dir.path().join("objects"), "http://files.test");
        (RemoteIngestionService::new(Arc::new(jobs), Arc::new(blobs)), dir)
    }

    fn ctx() -> SessionContext {
        SessionContext::signed_in(Identity {
            uid: "u1".into(),
            email: "u1@example.com".into(),
            token: None,
        })
    }

    #[tokio::test]
    async fn validation_errors_stay_inline() {
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke().times(0);
        let (remote, _dir) = service(jobs).await;
        let notifier = Notifier::default();
        let mut form = RemoteForm::default();
        assert!(!form.can_submit());

        form.submit(&ctx(), &remote, &notifier).await.unwrap_err();
        assert_eq!(form.status.error(), Some("Please enter a direct download URL."));

        form.set_url("definitely not a url");
        form.submit(&ctx(), &remote, &notifier).await.unwrap_err();
        assert_eq!(form.status.error(), Some("Please enter a valid URL."));
        assert!(notifier.drain().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_raises_notice_and_keeps_url() {
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke()
            .times(1)
            .returning(|_, _, _| Err(UpstreamError::new("functions/unavailable", "offline")));
        let (remote, _dir) = service(jobs).await;
        let notifier = Notifier::default();
        let mut form = RemoteForm::default();

        form.set_url("https://example.com/file.zip");
        form.submit(&ctx(), &remote, &notifier).await.unwrap_err();
        assert_eq!(form.source_url, "https://example.com/file.zip");
        assert_eq!(
            form.status.error(),
            Some("Error: offline (Code: functions/unavailable)")
        );

        let notices = notifier.drain();
        assert_eq!(notices[0].title, "Remote Upload Failed");
        assert_eq!(notices[0].tone, Tone::Destructive);
    }
}

//! State behind the "My Files" page.
//!
//! The server listing is authoritative: every mutation is followed by a
//! refetch. If that refetch fails the optimistic patch already applied to
//! the in-memory list is what stays on screen. Descriptors returned by
//! remote ingestion are kept as provisional entries for the session, since
//! the job may store them outside the caller's namespace where the listing
//! never looks.

use super::status::Notifier;
use crate::{
    errors::ClientError,
    models::file::{FileDescriptor, UploadedFile},
    services::{DeleteOutcome, FileService, SessionContext},
};
use chrono::Utc;
use tracing::{error, warn};

#[derive(Clone, Debug, Default)]
pub struct FilesPage {
    files: Vec<FileDescriptor>,
    provisional: Vec<FileDescriptor>,
    pub loading: bool,
    /// Id of the row whose deletion is in flight.
    pub deleting: Option<String>,
}

impl FilesPage {
    /// Current rows, newest first.
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn find(&self, id_or_path: &str) -> Option<&FileDescriptor> {
        self.files
            .iter()
            .find(|f| f.id == id_or_path || f.full_path == id_or_path)
    }

    /// Replace the list with the server's view of the caller's files.
    pub async fn refresh(
        &mut self,
        ctx: &SessionContext,
        service: &FileService,
    ) -> Result<(), ClientError> {
        let identity = ctx.require()?;
        self.loading = true;
        let listed = service.list(&identity.uid).await;
        self.loading = false;

        let mut files = listed.map_err(|err| {
            error!("error fetching files: {}", err);
            err
        })?;
        self.provisional
            .retain(|p| !files.iter().any(|f| f.id == p.id));
        files.extend(self.provisional.iter().cloned());
        self.files = files;
        self.sort();
        Ok(())
    }

    /// Record a finished direct upload and return the completed descriptor.
    pub async fn on_uploaded(
        &mut self,
        ctx: &SessionContext,
        service: &FileService,
        uploaded: UploadedFile,
    ) -> FileDescriptor {
        let descriptor = FileDescriptor::from_upload(uploaded, Utc::now());
        self.insert(descriptor.clone());
        self.refresh_or_keep(ctx, service).await;
        descriptor
    }

    pub async fn on_remote_added(
        &mut self,
        ctx: &SessionContext,
        service: &FileService,
        descriptor: FileDescriptor,
    ) {
        self.provisional.retain(|p| p.id != descriptor.id);
        self.provisional.push(descriptor.clone());
        self.insert(descriptor);
        self.refresh_or_keep(ctx, service).await;
    }

    /// Delete the row identified by `id_or_path`.
    ///
    /// The row leaves the list only once the delete call has succeeded.
    pub async fn delete_file(
        &mut self,
        ctx: &SessionContext,
        service: &FileService,
        notifier: &Notifier,
        id_or_path: &str,
    ) -> Result<DeleteOutcome, ClientError> {
        let (id, full_path) = match self.find(id_or_path) {
            Some(file) => (file.id.clone(), file.full_path.clone()),
            None => (id_or_path.to_string(), id_or_path.to_string()),
        };

        self.deleting = Some(id.clone());
        let result = service.delete(ctx, &full_path).await;
        self.deleting = None;

        match result {
            Ok(outcome) => {
                self.files.retain(|f| f.id != id);
                self.provisional.retain(|p| p.id != id);
                notifier.success("File Deleted", "The file has been successfully deleted.");
                self.refresh_or_keep(ctx, service).await;
                Ok(outcome)
            }
            Err(err) => {
                error!("error deleting file {}: {}", full_path, err);
                notifier.failure("Error Deleting File", err.to_string());
                Err(err)
            }
        }
    }

    fn insert(&mut self, descriptor: FileDescriptor) {
        self.files.retain(|f| f.id != descriptor.id);
        self.files.push(descriptor);
        self.sort();
    }

    async fn refresh_or_keep(&mut self, ctx: &SessionContext, service: &FileService) {
        if let Err(err) = self.refresh(ctx, service).await {
            warn!("keeping local file list after failed refresh: {}", err);
        }
    }

    fn sort(&mut self) {
        self.files
            .sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{BlobStore, PutRequest, db, local_blobs::LocalBlobStore},
        models::{file::FileKind, identity::Identity},
    };
    use bytes::Bytes;
    use chrono::Duration;
    use futures::{StreamExt, stream};
    use std::sync::Arc;

    async fn setup() -> (FileService, Arc<LocalBlobStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = Arc::new(db::connect(&url).await.unwrap());
        let store = Arc::new(LocalBlobStore::new(
            pool,
            dir.path().join("objects"),
            "http://files.test",
        ));
        (FileService::new(store.clone()), store, dir)
    }

    async fn put(store: &LocalBlobStore, path: &str) {
        let body = stream::iter(vec![Ok(Bytes::from_static(b"data"))]).boxed();
        store
            .put_stream(
                PutRequest {
                    path: path.into(),
                    file_name: path.rsplit('/').next().unwrap_or(path).into(),
                    content_type: None,
                },
                body,
                &mut |_: u64| {},
            )
            .await
            .unwrap();
    }

    fn ctx() -> SessionContext {
        SessionContext::signed_in(Identity {
            uid: "u1".into(),
            email: "u1@example.com".into(),
            token: None,
        })
    }

    fn remote(id: &str, age_minutes: i64) -> FileDescriptor {
        FileDescriptor {
            id: id.into(),
            name: "file.zip".into(),
            size: "N/A".into(),
            uploaded_at: Utc::now() - Duration::minutes(age_minutes),
            download_url: "http://files.test/o/x?token=t".into(),
            kind: FileKind::Archive,
            full_path: id.into(),
        }
    }

    #[tokio::test]
    async fn refresh_requires_session() {
        let (service, _store, _dir) = setup().await;
        let mut page = FilesPage::default();
        let err = page
            .refresh(&SessionContext::anonymous(), &service)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }

    #[tokio::test]
    async fn list_stays_sorted_newest_first() {
        let (service, store, _dir) = setup().await;
        put(&store, "userFiles/u1/1-a.txt").await;
        let mut page = FilesPage::default();
        page.refresh(&ctx(), &service).await.unwrap();

        page.on_remote_added(&ctx(), &service, remote("jobs/old.zip", 60 * 24))
            .await;
        page.on_remote_added(&ctx(), &service, remote("jobs/new.zip", 0))
            .await;

        let ids: Vec<&str> = page.files().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "jobs/new.zip");
        assert_eq!(ids[2], "jobs/old.zip");
        assert!(
            page.files()
                .windows(2)
                .all(|w| w[0].uploaded_at >= w[1].uploaded_at)
        );
    }

    #[tokio::test]
    async fn provisional_entries_survive_refresh_until_deleted() {
        let (service, _store, _dir) = setup().await;
        let notifier = Notifier::default();
        let mut page = FilesPage::default();

        page.on_remote_added(&ctx(), &service, remote("jobs/abc.zip", 0))
            .await;
        page.refresh(&ctx(), &service).await.unwrap();
        assert!(page.find("jobs/abc.zip").is_some());

        let outcome = page
            .delete_file(&ctx(), &service, &notifier, "jobs/abc.zip")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::OutsideNamespace);
        assert!(page.find("jobs/abc.zip").is_none());
        assert_eq!(notifier.drain()[0].title, "File Deleted");
    }

    #[tokio::test]
    async fn failed_delete_keeps_row() {
        let (service, store, _dir) = setup().await;
        put(&store, "userFiles/u1/1-a.txt").await;
        let notifier = Notifier::default();
        let mut page = FilesPage::default();
        page.refresh(&ctx(), &service).await.unwrap();

        let err = page
            .delete_file(&SessionContext::anonymous(), &service, &notifier, "userFiles/u1/1-a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert!(page.find("userFiles/u1/1-a.txt").is_some());
        assert!(page.deleting.is_none());
        assert_eq!(notifier.drain()[0].title, "Error Deleting File");
    }
}

//! Remote ingestion requestor.
//!
//! Ingestion is a two-step saga:
//! 1. ask the `processRemoteUrl` job to fetch the URL server-side and wait
//!    for its confirmation ([`ConfirmedJob`]);
//! 2. resolve a download URL for the path the job reported.
//!
//! A failure in step 2 is reported as `DownloadUrlUnavailable` so callers
//! can tell "nothing happened" apart from "stored, but not yet fetchable".

use super::SessionContext;
use crate::{
    backend::{BlobStore, JobInvoker},
    errors::ClientError,
    models::file::{FileDescriptor, FileKind, format_file_size},
};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const PROCESS_REMOTE_URL_JOB: &str = "processRemoteUrl";

/// Result record of a confirmed ingestion job.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedJob {
    pub file_path: String,
    pub file_name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResult {
    file_path: Option<String>,
    file_name: Option<String>,
    size: Option<Value>,
    content_type: Option<String>,
}

pub struct RemoteIngestionService {
    jobs: Arc<dyn JobInvoker>,
    blobs: Arc<dyn BlobStore>,
}

impl RemoteIngestionService {
    pub fn new(jobs: Arc<dyn JobInvoker>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { jobs, blobs }
    }

    /// Run both saga steps and return a provisional descriptor.
    pub async fn initiate(
        &self,
        ctx: &SessionContext,
        source_url: &str,
    ) -> Result<FileDescriptor, ClientError> {
        let job = self.request_job(ctx, source_url).await?;
        self.resolve(job).await
    }

    /// Step 1: validate, invoke the job, and check its result record.
    pub async fn request_job(
        &self,
        ctx: &SessionContext,
        source_url: &str,
    ) -> Result<ConfirmedJob, ClientError> {
        let source_url = validate_source_url(source_url)?;
        let identity = ctx.require()?;

        info!(
            "initiating remote processing of {} for {}",
            source_url, identity.uid
        );
        let response = self
            .jobs
            .invoke(
                PROCESS_REMOTE_URL_JOB,
                json!({ "sourceUrl": source_url.as_str() }),
                identity,
            )
            .await
            .map_err(|err| {
                error!("{} failed: {}", PROCESS_REMOTE_URL_JOB, err);
                ClientError::Upstream(err)
            })?;

        parse_job_result(response)
    }

    /// Step 2: turn a confirmed job into a descriptor with a fetch URL.
    pub async fn resolve(&self, job: ConfirmedJob) -> Result<FileDescriptor, ClientError> {
        let download_url = self
            .blobs
            .resolve_download_url(&job.file_path)
            .await
            .map_err(|err| {
                warn!("job confirmed {} but URL resolution failed: {}", job.file_path, err);
                ClientError::DownloadUrlUnavailable {
                    file_path: job.file_path.clone(),
                    message: err.to_string(),
                }
            })?;

        Ok(FileDescriptor {
            id: job.file_path.clone(),
            name: job.file_name,
            size: job
                .size
                .map(|bytes| format_file_size(bytes, 2))
                .unwrap_or_else(|| "N/A".to_string()),
            uploaded_at: Utc::now(),
            download_url,
            kind: job
                .content_type
                .as_deref()
                .map(FileKind::from_content_type)
                .unwrap_or(FileKind::Generic),
            full_path: job.file_path,
        })
    }
}

fn validate_source_url(source_url: &str) -> Result<Url, ClientError> {
    let trimmed = source_url.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidInput(
            "Please enter a direct download URL.".to_string(),
        ));
    }
    Url::parse(trimmed).map_err(|_| ClientError::InvalidUrl(trimmed.to_string()))
}

fn parse_job_result(response: Value) -> Result<ConfirmedJob, ClientError> {
    let result: JobResult = serde_json::from_value(response).map_err(|err| {
        ClientError::MalformedUpstreamResponse(format!("unexpected result shape: {}", err))
    })?;

    let file_path = result.file_path.filter(|p| !p.is_empty());
    let file_name = result.file_name.filter(|n| !n.is_empty());
    let (Some(file_path), Some(file_name)) = (file_path, file_name) else {
        return Err(ClientError::MalformedUpstreamResponse(
            "job did not return the expected file path or name".to_string(),
        ));
    };

    Ok(ConfirmedJob {
        file_path,
        file_name,
        size: result.size.as_ref().and_then(job_size),
        content_type: result.content_type,
    })
}

/// Byte count reported by the job. Numbers and numeric strings are accepted;
/// zero, negative or unparseable sizes count as unknown.
fn job_size(value: &Value) -> Option<u64> {
    let bytes = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (bytes.is_finite() && bytes >= 1.0).then(|| bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            MockJobInvoker, PutRequest, UpstreamError, db, local_blobs::LocalBlobStore,
        },
        models::{file::FileCategory, identity::Identity},
    };
    use bytes::Bytes;
    use futures::{StreamExt, stream};

    async fn blobs() -> (Arc<LocalBlobStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta.db").display());
        let pool = Arc::new(db::connect(&url).await.unwrap());
        let store = LocalBlobStore::new(pool, dir.path().join("objects"), "http://files.test");
        (Arc::new(store), dir)
    }

    async fn seed(store: &LocalBlobStore, path: &str) {
        let body = stream::iter(vec![Ok(Bytes::from_static(b"zip"))]).boxed();
        store
            .put_stream(
                PutRequest {
                    path: path.into(),
                    file_name: "file.zip".into(),
                    content_type: Some("application/zip".into()),
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
            token: Some("tok".into()),
        })
    }

    #[tokio::test]
    async fn malformed_urls_never_reach_the_job() {
        let (store, _dir) = blobs().await;
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke().times(0);
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        for bad in ["not a url", "example.com/file.zip", "http//missing-colon", "://x"] {
            let err = service.initiate(&ctx(), bad).await.unwrap_err();
            assert!(matches!(err, ClientError::InvalidUrl(_)), "{:?}", bad);
        }
        let err = service.initiate(&ctx(), "   ").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn requires_session() {
        let (store, _dir) = blobs().await;
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke().times(0);
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        let err = service
            .initiate(&SessionContext::anonymous(), "https://example.com/file.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }

    #[tokio::test]
    async fn missing_required_fields_are_malformed() {
        let (store, _dir) = blobs().await;
        let responses = vec![
            json!({ "fileName": "file.zip" }),
            json!({ "filePath": "jobs/abc.zip" }),
            json!({ "filePath": "", "fileName": "file.zip" }),
            json!("ok"),
            Value::Null,
        ];
        for response in responses {
            let mut jobs = MockJobInvoker::new();
            let reply = response.clone();
            jobs.expect_invoke()
                .times(1)
                .returning(move |_, _, _| Ok(reply.clone()));
            let service = RemoteIngestionService::new(Arc::new(jobs), store.clone());

            let err = service
                .initiate(&ctx(), "https://example.com/file.zip")
                .await
                .unwrap_err();
            assert!(
                matches!(err, ClientError::MalformedUpstreamResponse(_)),
                "{:?}",
                response
            );
        }
    }

    #[tokio::test]
    async fn confirmed_job_resolves_download_url() {
        let (store, _dir) = blobs().await;
        seed(&store, "jobs/abc.zip").await;

        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke()
            .withf(|job, payload, identity| {
                job.to_string() == PROCESS_REMOTE_URL_JOB
                    && payload["sourceUrl"] == "https://example.com/file.zip"
                    && identity.uid == "u1"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(json!({
                    "filePath": "jobs/abc.zip",
                    "fileName": "file.zip",
                    "contentType": "application/zip",
                    "size": 2048
                }))
            });
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        let descriptor = service
            .initiate(&ctx(), "https://example.com/file.zip")
            .await
            .unwrap();
        assert_eq!(descriptor.kind, FileKind::Archive);
        assert_eq!(descriptor.kind.category(), FileCategory::Archive);
        assert_eq!(descriptor.id, "jobs/abc.zip");
        assert_eq!(descriptor.full_path, "jobs/abc.zip");
        assert_eq!(descriptor.size, "2 KB");
        assert!(descriptor.download_url.starts_with("http://files.test/o/"));
    }

    #[tokio::test]
    async fn optional_fields_fall_back() {
        let (store, _dir) = blobs().await;
        seed(&store, "jobs/plain").await;

        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke()
            .returning(|_, _, _| Ok(json!({ "filePath": "jobs/plain", "fileName": "plain" })));
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        let descriptor = service
            .initiate(&ctx(), "https://example.com/plain")
            .await
            .unwrap();
        assert_eq!(descriptor.size, "N/A");
        assert_eq!(descriptor.kind, FileKind::Generic);
    }

    #[test]
    fn size_is_optional_and_lenient() {
        let parse = |size: Value| {
            parse_job_result(json!({
                "filePath": "jobs/a.zip",
                "fileName": "a.zip",
                "size": size
            }))
            .unwrap()
            .size
        };
        assert_eq!(parse(json!(2048)), Some(2048));
        assert_eq!(parse(json!(1536.0)), Some(1536));
        assert_eq!(parse(json!("2048")), Some(2048));
        assert_eq!(parse(json!(" 10 ")), Some(10));
        for unknown in [
            json!(0),
            json!("0"),
            json!(-5),
            json!("abc"),
            json!("NaN"),
            json!("inf"),
            json!(true),
            json!({ "bytes": 1 }),
            Value::Null,
        ] {
            assert_eq!(parse(unknown.clone()), None, "{:?}", unknown);
        }
    }

    #[tokio::test]
    async fn unknown_sizes_render_as_not_available() {
        let (store, _dir) = blobs().await;
        seed(&store, "jobs/abc.zip").await;

        for size in [json!(0), json!("n/a")] {
            let mut jobs = MockJobInvoker::new();
            let reply = json!({ "filePath": "jobs/abc.zip", "fileName": "file.zip", "size": size });
            jobs.expect_invoke()
                .times(1)
                .returning(move |_, _, _| Ok(reply.clone()));
            let service = RemoteIngestionService::new(Arc::new(jobs), store.clone());

            let descriptor = service
                .initiate(&ctx(), "https://example.com/file.zip")
                .await
                .unwrap();
            assert_eq!(descriptor.size, "N/A");
        }
    }

    #[tokio::test]
    async fn upstream_errors_are_normalized() {
        let (store, _dir) = blobs().await;
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke().returning(|_, _, _| {
            Err(UpstreamError::new("functions/internal", "download failed"))
        });
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        let err = service
            .initiate(&ctx(), "https://example.com/file.zip")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: download failed (Code: functions/internal)"
        );
    }

    #[tokio::test]
    async fn unresolvable_path_is_partial_failure() {
        let (store, _dir) = blobs().await;
        let mut jobs = MockJobInvoker::new();
        jobs.expect_invoke().returning(|_, _, _| {
            Ok(json!({ "filePath": "jobs/not-there.zip", "fileName": "file.zip" }))
        });
        let service = RemoteIngestionService::new(Arc::new(jobs), store);

        let job = service
            .request_job(&ctx(), "https://example.com/file.zip")
            .await
            .unwrap();
        assert_eq!(job.file_path, "jobs/not-there.zip");

        let err = service.resolve(job).await.unwrap_err();
        match err {
            ClientError::DownloadUrlUnavailable { file_path, .. } => {
                assert_eq!(file_path, "jobs/not-there.zip")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

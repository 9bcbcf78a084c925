#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use bytes::Bytes;
use futures::{StreamExt, stream};
use retroshare::{
    backend::{
        BlobStore, PutRequest, db, http_jobs::HttpJobInvoker, local_auth::LocalSessionProvider,
        local_blobs::LocalBlobStore,
    },
    routes::routes::routes,
    services::Services,
    view::Shell,
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// A local platform: SQLite-backed auth and blobs, a download server and a
/// stand-in for the `processRemoteUrl` function.
pub struct TestApp {
    pub shell: Shell,
    pub session: Arc<LocalSessionProvider>,
    pub blobs: Arc<LocalBlobStore>,
    pub services: Services,
    pub job_calls: Arc<AtomicUsize>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn job_calls(&self) -> usize {
        self.job_calls.load(Ordering::SeqCst)
    }

    /// Write a local file of `len` bytes and return its path.
    pub async fn local_file(&self, name: &str, len: usize) -> std::path::PathBuf {
        let path = self.dir.path().join("local").join(name);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, body).await.unwrap();
        path
    }
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("meta/retroshare.db").display());
    let pool = Arc::new(db::connect(&url).await.unwrap());

    let download_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let public_url = format!("http://{}", download_listener.local_addr().unwrap());
    let blobs = LocalBlobStore::new(pool.clone(), dir.path().join("objects"), public_url);

    let app = routes().with_state(blobs.clone());
    tokio::spawn(async move {
        axum::serve(download_listener, app).await.unwrap();
    });

    let job_calls = Arc::new(AtomicUsize::new(0));
    let functions_url = spawn_functions_stub(StubState {
        store: blobs.clone(),
        calls: job_calls.clone(),
    })
    .await;

    let session = Arc::new(LocalSessionProvider::open(pool).await.unwrap());
    let blobs = Arc::new(blobs);
    let services = Services::new(blobs.clone(), Arc::new(HttpJobInvoker::new(functions_url)));
    let shell = Shell::new(session.clone(), services.clone(), MAX_UPLOAD_BYTES);

    TestApp {
        shell,
        session,
        blobs,
        services,
        job_calls,
        dir,
    }
}

#[derive(Clone)]
struct StubState {
    store: LocalBlobStore,
    calls: Arc<AtomicUsize>,
}

async fn spawn_functions_stub(state: StubState) -> String {
    let app = Router::new()
        .route("/processRemoteUrl", post(process_remote_url))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Stores a small payload under `jobs/abc.{ext}` and reports it back.
///
/// URLs containing `incomplete` get a result without `filePath`; URLs
/// containing `unstored` are confirmed without anything being written.
async fn process_remote_url(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.calls.fetch_add(1, Ordering::SeqCst);

    if !headers.contains_key(header::AUTHORIZATION) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": { "status": "UNAUTHENTICATED", "message": "missing token" }
            })),
        );
    }
    let Some(source_url) = body["data"]["sourceUrl"].as_str() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": { "status": "INVALID_ARGUMENT", "message": "sourceUrl is required" }
            })),
        );
    };

    let file_name = source_url.rsplit('/').next().unwrap_or("download").to_string();
    if source_url.contains("incomplete") {
        return (StatusCode::OK, Json(json!({ "result": { "fileName": file_name } })));
    }

    let ext = file_name.rsplit('.').next().unwrap_or("bin");
    let file_path = format!("jobs/abc.{}", ext);
    let content_type = mime_type(ext);
    if !source_url.contains("unstored") {
        let payload = stream::iter(vec![Ok(Bytes::from_static(b"remote payload"))]).boxed();
        state
            .store
            .put_stream(
                PutRequest {
                    path: file_path.clone(),
                    file_name: file_name.clone(),
                    content_type: Some(content_type.to_string()),
                },
                payload,
                &mut |_: u64| {},
            )
            .await
            .unwrap();
    }

    (
        StatusCode::OK,
        Json(json!({
            "result": {
                "filePath": file_path,
                "fileName": file_name,
                "contentType": content_type,
                "size": 14
            }
        })),
    )
}

fn mime_type(ext: &str) -> &'static str {
    match ext {
        "zip" => "application/zip",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

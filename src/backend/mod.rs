//! Contracts of the hosted platform this client talks to, plus the adapters
//! shipped with the crate.
//!
//! The client never reaches for ambient state: identity, blob storage and the
//! remote job runner are handed in as trait objects.
//!
//! - [`SessionProvider`] — sign-in / sign-up / sign-out and identity change feed
//! - [`BlobStore`] — streamed writes, download URLs, deletion, prefix listing
//! - [`JobInvoker`] — single request/response call to a named server-side job

pub mod db;
pub mod http_jobs;
pub mod local_auth;
pub mod local_blobs;

use crate::models::{identity::Identity, object::StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

/// Payload stream accepted by [`BlobStore::put_stream`].
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Listener invoked with the new identity (or `None` once signed out).
pub type IdentityCallback = Box<dyn Fn(Option<Identity>) + Send + Sync>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("the email address is badly formatted")]
    InvalidEmail,
    #[error("password should be at least {0} characters")]
    WeakPassword(usize),
    #[error("the email address `{0}` is already in use by another account")]
    EmailInUse(String),
    #[error("invalid email or password")]
    InvalidCredential,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl AuthError {
    /// Provider-style error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword(_) => "auth/weak-password",
            Self::EmailInUse(_) => "auth/email-already-in-use",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::Hashing(_) | Self::Sqlx(_) => "auth/internal-error",
        }
    }
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object `{0}` already exists")]
    AlreadyExists(String),
    #[error("invalid object path")]
    InvalidPath,
    #[error("invalid or missing download token")]
    Denied,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure reported by (or on the way to) a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_upstream(.code, .message))]
pub struct UpstreamError {
    pub code: Option<String>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

fn render_upstream(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("Error: {} (Code: {})", message, code),
        None => message.to_string(),
    }
}

/// Where and how a new object should be written.
#[derive(Clone, Debug)]
pub struct PutRequest {
    pub path: String,
    pub file_name: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Register a listener. It fires once with the current identity and
    /// again on every change until the returned handle is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self, callback: IdentityCallback) -> Subscription;

    fn current_identity(&self) -> Option<Identity>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `body` into a new object at `request.path`.
    ///
    /// `progress` receives the cumulative number of bytes written after each
    /// chunk. Existing paths are never overwritten.
    async fn put_stream(
        &self,
        request: PutRequest,
        body: ByteStream,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<StoredObject, BlobError>;

    async fn resolve_download_url(&self, path: &str) -> Result<String, BlobError>;

    /// Download URL for an object already in hand, e.g. from [`BlobStore::list`].
    async fn object_download_url(&self, object: &StoredObject) -> Result<String, BlobError> {
        self.resolve_download_url(&object.path).await
    }

    /// Remove the object at `path`; `BlobError::NotFound` if there is none.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    /// All objects whose path starts with `prefix`, newest first.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, BlobError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobInvoker: Send + Sync {
    /// Run `job_name` with `payload` and wait for its single result record.
    async fn invoke(
        &self,
        job_name: &str,
        payload: serde_json::Value,
        identity: &Identity,
    ) -> Result<serde_json::Value, UpstreamError>;
}

/// Handle returned by [`SessionProvider::subscribe`]; dropping it unsubscribes.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Forward every value published on `rx` to `callback`, starting with the
    /// current one.
    pub fn from_watch(mut rx: watch::Receiver<Option<Identity>>, callback: IdentityCallback) -> Self {
        let task = tokio::spawn(async move {
            let current = rx.borrow_and_update().clone();
            callback(current);
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                callback(next);
            }
        });
        Self { task }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Routes served by the `serve` subcommand.
//!
//! - `GET /healthz` liveness
//! - `GET /readyz` readiness
//! - `GET /o/{encoded}?token=...` download an object by its encoded path

use crate::{
    backend::local_blobs::LocalBlobStore,
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::download_object,
    },
};
use axum::{Router, routing::get};

/// The router carries the blob store as shared state to all handlers.
pub fn routes() -> Router<LocalBlobStore> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/o/{encoded}", get(download_object))
}

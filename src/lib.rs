//! RetroShare: a file-sharing client (upload, remote ingestion, listing and
//! deletion of per-user files) over pluggable identity, blob storage and
//! job backends, plus a small server for the download links it hands out.

pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod view;

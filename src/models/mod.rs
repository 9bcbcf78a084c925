//! Core data models for the file-sharing client.
//!
//! `file` holds the user-facing descriptor, `identity` the signed-in account,
//! and `object` the storage-side record that descriptors are built from.

pub mod file;
pub mod identity;
pub mod object;

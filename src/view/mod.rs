//! Headless view layer: form state machines, the files page and table, and
//! the routing shell that ties them to a session.

pub mod auth_form;
pub mod files_page;
pub mod files_table;
pub mod remote_form;
pub mod shell;
pub mod status;
pub mod upload_form;

pub use shell::{Route, Shell, resolve_route};
pub use status::{FormStatus, Notice, Notifier, Tone};

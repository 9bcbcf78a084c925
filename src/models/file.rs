//! Represents a user-owned file as shown in the file list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Root folder under which every user namespace lives.
pub const USER_FILES_ROOT: &str = "userFiles";

const SIZE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Storage prefix owned by `uid`.
pub fn user_namespace(uid: &str) -> String {
    format!("{}/{}/", USER_FILES_ROOT, uid)
}

/// Descriptor of one user-owned file (metadata plus access URL).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Unique within the owner's file set; derived from `full_path`.
    pub id: String,

    /// Original file name.
    pub name: String,

    /// Pre-formatted human-readable size (e.g. "1.2 GB", or "N/A").
    pub size: String,

    /// Client-side completion time; not authoritative.
    pub uploaded_at: DateTime<Utc>,

    /// Fetch location for the payload.
    pub download_url: String,

    /// Coarse type used to pick an icon.
    #[serde(rename = "type")]
    pub kind: FileKind,

    /// Storage path; required for deletion.
    pub full_path: String,
}

impl FileDescriptor {
    /// Complete a direct-upload result into a full descriptor.
    ///
    /// `id` comes from the storage path and `kind` falls back to the file
    /// extension, as the upload pipeline does not report either.
    pub fn from_upload(uploaded: UploadedFile, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            id: uploaded.full_path.clone(),
            kind: FileKind::from_file_name(&uploaded.name),
            name: uploaded.name,
            size: uploaded.size,
            uploaded_at,
            download_url: uploaded.download_url,
            full_path: uploaded.full_path,
        }
    }
}

/// The subset of a descriptor the upload pipeline can vouch for.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub download_url: String,
    pub size: String,
    pub full_path: String,
}

/// File type as recorded on a descriptor.
///
/// Known categories come from content types; direct uploads carry the raw
/// lowercase extension instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileKind {
    Document,
    Pdf,
    Image,
    Video,
    Audio,
    Archive,
    Generic,
    Extension(String),
}

/// Display category collapsed from a [`FileKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Document,
    Image,
    Video,
    Audio,
    Archive,
    Generic,
}

impl FileKind {
    /// Infer a kind from a MIME type.
    ///
    /// Prefix checks win over substring checks, so `text/html` is a document
    /// and `application/x-zip-compressed` an archive.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            Self::Image
        } else if content_type.starts_with("video/") {
            Self::Video
        } else if content_type.starts_with("audio/") {
            Self::Audio
        } else if content_type == "application/pdf" {
            Self::Pdf
        } else if content_type.contains("document") || content_type.contains("text") {
            Self::Document
        } else if content_type.contains("zip") || content_type.contains("archive") {
            Self::Archive
        } else {
            Self::Generic
        }
    }

    /// Fallback used for direct uploads: the raw lowercase extension.
    pub fn from_file_name(name: &str) -> Self {
        match Path::new(name).extension().and_then(|ext| ext.to_str()) {
            Some(ext) if !ext.is_empty() => Self::from(ext.to_ascii_lowercase()),
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Generic => "generic",
            Self::Extension(ext) => ext,
        }
    }

    pub fn category(&self) -> FileCategory {
        match self.as_str().to_ascii_lowercase().as_str() {
            "document" | "pdf" | "doc" | "docx" | "txt" => FileCategory::Document,
            "image" | "png" | "jpg" | "jpeg" | "gif" => FileCategory::Image,
            "video" | "mp4" | "mov" | "avi" => FileCategory::Video,
            "audio" | "mp3" | "wav" => FileCategory::Audio,
            "archive" | "zip" | "rar" => FileCategory::Archive,
            _ => FileCategory::Generic,
        }
    }
}

impl From<String> for FileKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "document" => Self::Document,
            "pdf" => Self::Pdf,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "archive" => Self::Archive,
            "generic" | "" => Self::Generic,
            _ => Self::Extension(value),
        }
    }
}

impl From<FileKind> for String {
    fn from(kind: FileKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FileCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Generic => "file",
        }
    }
}

/// Render a byte count in binary units, trimming trailing zeros.
///
/// `0` renders as `"0 Bytes"`, `1536` as `"1.5 KB"`.
pub fn format_file_size(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0usize;
    let mut threshold = 1024u128;
    while u128::from(bytes) >= threshold && exponent < SIZE_UNITS.len() - 1 {
        exponent += 1;
        threshold *= 1024;
    }
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded: f64 = format!("{:.*}", decimals, scaled)
        .parse()
        .unwrap_or(scaled);
    format!("{} {}", rounded, SIZE_UNITS[exponent])
}

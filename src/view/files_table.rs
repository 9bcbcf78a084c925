use crate::models::file::FileDescriptor;
use std::fmt::Write as _;

pub const UPLOADED_AT_FORMAT: &str = "%b %d, %Y %H:%M";

const LOADING_TEXT: &str = "Loading files...";
const EMPTY_TEXT: &str = "You haven't uploaded any files yet.";
const EMPTY_HINT: &str = "Use the forms above to upload files directly or from a remote URL.";
const CAPTION: &str = "A list of your uploaded files.";

/// One rendered table row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRow {
    pub id: String,
    pub icon: &'static str,
    pub name: String,
    pub size: String,
    pub uploaded_at: String,
    pub download_url: String,
    pub deleting: bool,
}

impl FileRow {
    pub fn new(file: &FileDescriptor, deleting: Option<&str>) -> Self {
        Self {
            id: file.id.clone(),
            icon: file.kind.category().label(),
            name: file.name.clone(),
            size: file.size.clone(),
            uploaded_at: file.uploaded_at.format(UPLOADED_AT_FORMAT).to_string(),
            download_url: file.download_url.clone(),
            deleting: deleting == Some(file.id.as_str()),
        }
    }

    /// Label of the row's delete action.
    pub fn action(&self) -> &'static str {
        if self.deleting { "Deleting..." } else { "Delete" }
    }
}

pub fn rows(files: &[FileDescriptor], deleting: Option<&str>) -> Vec<FileRow> {
    files.iter().map(|f| FileRow::new(f, deleting)).collect()
}

/// Plain-text rendering of the "My Files" table.
pub fn render(files: &[FileDescriptor], loading: bool, deleting: Option<&str>) -> String {
    let mut out = String::from("My Files\n");
    if loading {
        out.push_str(LOADING_TEXT);
        out.push('\n');
        return out;
    }
    if files.is_empty() {
        let _ = writeln!(out, "{}\n{}", EMPTY_TEXT, EMPTY_HINT);
        return out;
    }

    let rows = rows(files, deleting);
    let headers = ["Type", "Name", "Size", "Uploaded At", "Actions"];
    let cells: Vec<[&str; 5]> = rows
        .iter()
        .map(|r| [r.icon, r.name.as_str(), r.size.as_str(), r.uploaded_at.as_str(), r.action()])
        .collect();

    let mut widths = headers.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(&mut out, &headers, &widths);
    for row in &cells {
        write_line(&mut out, row, &widths);
    }
    for row in &rows {
        let _ = writeln!(out, "  {} -> {}", row.name, row.download_url);
    }
    let _ = writeln!(out, "{}", CAPTION);
    out
}

fn write_line(out: &mut String, cols: &[&str; 5], widths: &[usize; 5]) {
    let padded: Vec<String> = cols
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    let _ = writeln!(out, "{}", padded.join("  ").trim_end());
}

//! File records, registries and content stores.
//!
//! - [`FileRecord`]: metadata for one uploaded or mirrored file
//! - [`FileRegistry`]: the authoritative list of records (memory or SQL)
//! - [`ContentChain`]: ordered stores that may hold a record's bytes
//! - [`FileService`]: upload, listing, retrieval and delete

mod blob;
mod content;
mod query;
mod record;
mod registry;
mod repository;
mod service;
mod storage;

pub use blob::BlobStore;
pub use content::{ContentChain, ContentStore, FileContent};
pub use query::{FilePage, FileQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use record::{FileRecord, StorageSource};
pub use registry::{FileRegistry, MemoryRegistry};
pub use repository::SqlFileRegistry;
pub use service::{ContentTarget, FileService, IncomingFile, UploadForm, UploadLimits};
pub use storage::FileStorage;

use std::path::Path;

/// MIME types accepted by upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Extensions picked up from the remote mirror during reconciliation.
pub const MIRRORED_EXTENSIONS: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".gif", ".doc", ".docx", ".xls", ".xlsx",
];

/// Longest base name kept by [`sanitize_filename`], in characters.
pub const MAX_BASE_NAME_CHARS: usize = 80;

/// Check whether a MIME type may be uploaded.
pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

/// Lower-cased extension including the leading dot, if any.
///
/// A leading dot alone (`.profile`) is not an extension.
pub fn extension_of(name: &str) -> Option<String> {
    split_extension(name).1.map(|ext| ext.to_lowercase())
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx..])),
        _ => (name, None),
    }
}

/// Make an uploaded filename safe for storage and the remote mirror.
///
/// Removes `/ \ : * ? " < > |`, turns whitespace runs into `_`, collapses
/// repeated `_`, and caps the base name while keeping the extension.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    let mut collapsed = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        let c = if c.is_whitespace() { '_' } else { c };
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    let (base, ext) = split_extension(&collapsed);
    let sanitized = if base.chars().count() > MAX_BASE_NAME_CHARS {
        let truncated: String = base.chars().take(MAX_BASE_NAME_CHARS).collect();
        format!("{truncated}{}", ext.unwrap_or(""))
    } else {
        collapsed.clone()
    };

    match sanitized.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => sanitized,
    }
}

/// Category label derived from a MIME type.
pub fn category_for_mime(mime: &str) -> &'static str {
    match mime {
        m if m.starts_with("image/") => "image",
        "application/pdf" => "pdf",
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "document",
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "spreadsheet",
        _ => "other",
    }
}

/// Category label derived from a lower-cased extension such as `.pdf`.
pub fn category_for_extension(ext: &str) -> &'static str {
    match ext {
        ".png" | ".jpg" | ".jpeg" | ".gif" => "image",
        ".pdf" => "pdf",
        ".doc" | ".docx" => "document",
        ".xls" | ".xlsx" => "spreadsheet",
        _ => "other",
    }
}

/// Resolve the MIME type of an uploaded part.
///
/// The declared content type wins unless it is missing or the generic
/// `application/octet-stream`, in which case it is guessed from the name.
pub fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    let declared = declared
        .map(|m| m.split(';').next().unwrap_or_default().trim().to_lowercase())
        .filter(|m| !m.is_empty() && m != "application/octet-stream");

    match declared {
        Some(mime) => mime,
        None => mime_guess::from_path(Path::new(file_name))
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload classification.
//
// Decides whether an upload is an archive, a directly supported image, or
// something we skip. The filename extension is authoritative; the declared
// content type is only consulted when there is no extension at all.

use std::path::Path;

/// Extensions accepted as images, lowercase.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Declared content types that identify a ZIP archive.
pub const ARCHIVE_CONTENT_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-zip",
    "multipart/x-zip",
];

/// What the batch should do with one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Archive,
    Image,
    Unsupported,
}

/// Classify an upload by extension first, then by content type.
///
/// | extension          | content type        | result        |
/// |--------------------|---------------------|---------------|
/// | `zip`              | any                 | `Archive`     |
/// | image set          | any                 | `Image`       |
/// | any other          | any                 | `Unsupported` |
/// | none               | ZIP type            | `Archive`     |
/// | none               | anything else       | `Unsupported` |
pub fn classify_upload(filename: &str, content_type: &str) -> UploadKind {
    match extension_of(filename).as_deref() {
        Some("zip") => UploadKind::Archive,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => UploadKind::Image,
        Some(_) => UploadKind::Unsupported,
        None if is_archive_content_type(content_type) => UploadKind::Archive,
        None => UploadKind::Unsupported,
    }
}

/// Whether `content_type` names a ZIP archive (parameters ignored).
pub fn is_archive_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ARCHIVE_CONTENT_TYPES.contains(&essence.as_str())
}

/// Lowercased extension of a caller-supplied filename, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(base_name(filename)?)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether the filename carries one of the recognised image extensions.
pub fn is_image_name(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// MIME type implied by an image extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// The content type to encode against: the declared one, unless it is
/// missing or generic, in which case the extension decides.
pub fn effective_content_type<'a>(filename: &str, declared: &'a str) -> &'a str {
    let declared_trimmed = declared.trim();
    if declared_trimmed.is_empty()
        || declared_trimmed.eq_ignore_ascii_case("application/octet-stream")
    {
        extension_of(filename)
            .and_then(|ext| mime_for_extension(&ext))
            .unwrap_or(declared_trimmed)
    } else {
        declared_trimmed
    }
}

/// Last path component of an entry name, treating both `/` and `\` as
/// separators. Returns `None` for directory-like or traversal names.
pub fn base_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base),
    }
}

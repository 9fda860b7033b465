// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Bildwerk conversions.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// MIME type of every generated document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Standard page sizes offered to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageSize {
    /// Dimensions in PDF points (width, height), portrait.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.28, 841.89),
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
        }
    }

    /// Dimensions in millimetres (width, height), derived from the point size.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_pt();
        (w * 25.4 / 72.0, h * 25.4 / 72.0)
    }

    /// Parse the option keyword (`a4`, `letter`, `legal`), case-insensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            _ => None,
        }
    }
}

/// Nominal compression quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ImageQuality {
    /// Numeric encoder quality (0-100).
    pub fn value(&self) -> u8 {
        match self {
            Self::Low => 50,
            Self::Medium => 80,
            Self::High => 100,
        }
    }

    /// Parse the option keyword (`low`, `medium`, `high`), case-insensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Encoder family used when re-encoding an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Pick the encoder for a declared MIME type. Anything outside the
    /// jpeg/png/webp families is re-encoded as JPEG.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/png" => Self::Png,
            "image/webp" => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

/// Options recognised for one conversion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub quality: ImageQuality,
    pub show_filenames: bool,
    pub page_size: PageSize,
}

impl ConversionOptions {
    /// Build options from the flat string bag sent by the transport layer.
    ///
    /// Recognised keys are `showFilenames`, `imageQuality` and `pageSize`.
    /// Missing or unrecognised values fall back to the defaults.
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        Self::default().with_form(form)
    }

    /// Apply the recognised keys of `form` on top of `self`.
    pub fn with_form(self, form: &HashMap<String, String>) -> Self {
        let mut options = self;

        if let Some(raw) = form.get("showFilenames") {
            options.show_filenames = parse_flag(raw);
        }

        if let Some(raw) = form.get("imageQuality") {
            match ImageQuality::from_keyword(raw) {
                Some(quality) => options.quality = quality,
                None => debug!(value = %raw, "unknown imageQuality, using default"),
            }
        }

        if let Some(raw) = form.get("pageSize") {
            match PageSize::from_keyword(raw) {
                Some(size) => options.page_size = size,
                None => debug!(value = %raw, "unknown pageSize, using default"),
            }
        }

        options
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// An image that has been decoded, measured, and re-encoded.
///
/// Width and height are the dimensions of the original decode and are always
/// non-zero; [`ProcessedImage::new`] refuses to build one otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    bytes: Vec<u8>,
    filename: String,
    width: u32,
    height: u32,
    format: OutputFormat,
}

impl ProcessedImage {
    pub fn new(
        bytes: Vec<u8>,
        filename: impl Into<String>,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            bytes,
            filename: filename.into(),
            width,
            height,
            format,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Original filename, used only as a caption.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

/// Where an upload's bytes live.
#[derive(Debug)]
pub enum UploadSource {
    /// Staged on disk by the transport layer; removed on release.
    File(PathBuf),
    /// Held in memory; dropped on release.
    Memory(Vec<u8>),
}

/// One uploaded blob as handed over by the transport layer.
///
/// The backing resource is released exactly once: either explicitly through
/// [`RawUpload::release`] or, failing that, when the value is dropped.
#[derive(Debug)]
pub struct RawUpload {
    filename: String,
    content_type: String,
    size: u64,
    source: Option<UploadSource>,
}

impl RawUpload {
    /// Wrap a file already staged on disk.
    pub fn from_file(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<PathBuf>,
        size: u64,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size,
            source: Some(UploadSource::File(path.into())),
        }
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: bytes.len() as u64,
            source: Some(UploadSource::Memory(bytes)),
        }
    }

    /// Caller-declared filename. Untrusted; never used as a path.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Backing file, if the upload is file-backed and not yet released.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Some(UploadSource::File(path)) => Some(path),
            _ => None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }

    /// Read the upload's bytes.
    pub fn bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.source {
            Some(UploadSource::Memory(bytes)) => Ok(Cow::Borrowed(bytes)),
            Some(UploadSource::File(path)) => std::fs::read(path).map(Cow::Owned),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("upload '{}' was already released", self.filename),
            )),
        }
    }

    /// Release the backing resource. Later calls are no-ops.
    pub fn release(&mut self) {
        match self.source.take() {
            Some(UploadSource::File(path)) => match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "upload file released"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove upload file, leaving it to the janitor"
                ),
            },
            Some(UploadSource::Memory(_)) | None => {}
        }
    }
}

impl Drop for RawUpload {
    fn drop(&mut self) {
        self.release();
    }
}

/// A finished, closed PDF on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub page_count: usize,
    /// Creation time in Unix epoch milliseconds.
    pub created_at_ms: i64,
}

impl GeneratedDocument {
    /// Download name offered to the consumer: `converted_<epoch-ms>.pdf`.
    pub fn suggested_filename(&self) -> String {
        format!("converted_{}.pdf", self.created_at_ms)
    }

    pub fn content_type(&self) -> &'static str {
        PDF_CONTENT_TYPE
    }
}

/// Structured failure result returned instead of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub message: String,
}

impl ConversionResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

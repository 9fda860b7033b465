// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
///
/// Per-item variants (`CorruptArchive`, `UnsupportedFormat`, `ImageDecode`,
/// `ImageEncode`) are caught at the batch boundary and never reach the caller
/// of a conversion. The rest are request-level failures.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Request errors --
    #[error("no usable images: {0}")]
    EmptyBatch(String),

    #[error("too many uploads: {count} (maximum {max})")]
    TooManyUploads { count: usize, max: usize },

    #[error("upload '{name}' is too large: {size} bytes (maximum {max})")]
    UploadTooLarge { name: String, size: u64, max: u64 },

    // -- Input errors --
    #[error("archive '{name}' is corrupt: {detail}")]
    CorruptArchive { name: String, detail: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to decode image '{name}': {detail}")]
    ImageDecode { name: String, detail: String },

    #[error("image encoding failed: {0}")]
    ImageEncode(String),

    // -- Output errors --
    #[error("failed to write document: {0}")]
    DocumentWrite(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Runtime / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;

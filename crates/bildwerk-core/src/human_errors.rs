// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable failure messages.
//
// Every request-level error is mapped to a plain sentence for the
// `{ success: false, message }` result, plus a status class telling the
// transport layer whether the caller or the server is at fault.

use crate::error::BildwerkError;
use crate::types::ConversionResponse;

/// Who is responsible for a failure, in HTTP terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The request itself cannot be satisfied (4xx).
    Client,
    /// The server failed while handling a valid request (5xx).
    Server,
}

impl StatusClass {
    /// Representative HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Client => 400,
            Self::Server => 500,
        }
    }
}

/// A failure explained for the person who sent the files.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub status: StatusClass,
}

impl HumanError {
    pub fn into_response(self) -> ConversionResponse {
        ConversionResponse::failure(self.message)
    }
}

/// Convert a `BildwerkError` into a message safe to show to the caller.
pub fn humanize_error(err: &BildwerkError) -> HumanError {
    match err {
        BildwerkError::EmptyBatch(detail) => HumanError {
            message: detail.clone(),
            status: StatusClass::Client,
        },

        BildwerkError::TooManyUploads { max, .. } => HumanError {
            message: format!("Too many files. Upload at most {max} files at a time."),
            status: StatusClass::Client,
        },

        BildwerkError::UploadTooLarge { name, max, .. } => HumanError {
            message: format!(
                "The file '{name}' is too large. Each file must be under {} MB.",
                max / (1024 * 1024)
            ),
            status: StatusClass::Client,
        },

        // Per-item errors only reach here if a caller bypasses the batch.
        BildwerkError::CorruptArchive { name, .. } => HumanError {
            message: format!("The archive '{name}' could not be opened. It may be damaged."),
            status: StatusClass::Client,
        },

        BildwerkError::UnsupportedFormat(detail) => HumanError {
            message: format!("This file type isn't supported ({detail})."),
            status: StatusClass::Client,
        },

        BildwerkError::ImageDecode { name, .. } => HumanError {
            message: format!("The image '{name}' could not be read. It may be damaged."),
            status: StatusClass::Client,
        },

        BildwerkError::ImageEncode(_) => HumanError {
            message: "An image could not be processed.".into(),
            status: StatusClass::Server,
        },

        BildwerkError::DocumentWrite(_) | BildwerkError::Pdf(_) => HumanError {
            message: "The PDF could not be created. Please try again later.".into(),
            status: StatusClass::Server,
        },

        BildwerkError::Io(_) | BildwerkError::Serialization(_) | BildwerkError::Task(_) => {
            HumanError {
                message: "Something went wrong while converting your files. Please try again."
                    .into(),
                status: StatusClass::Server,
            }
        }
    }
}

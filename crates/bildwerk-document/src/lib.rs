// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-document: Media processing for the Bildwerk converter.
//
// Classifies uploads, normalises images, extracts image entries from ZIP
// archives, runs whole batches in order, and composes the resulting images
// into a paginated PDF.

pub mod archive;
pub mod batch;
pub mod classify;
pub mod image;
pub mod pdf;

// Re-export the primary structs so callers can use `bildwerk_document::DocumentComposer` etc.
pub use archive::extractor::ArchiveExtractor;
pub use batch::{BatchProcessor, BatchSummary, UploadOutcome};
pub use classify::{UploadKind, classify_upload};
pub use image::normalizer::ImageNormalizer;
pub use pdf::composer::DocumentComposer;
pub use pdf::inspect::PdfInspector;

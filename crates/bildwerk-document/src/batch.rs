// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch processing: walk a request's uploads in order, route each one to the
// archive extractor or the image normaliser, and collect the resulting images.
//
// Per-upload problems never abort the batch. Every upload is released as soon
// as its own processing is finished, before the next one is read.

use bildwerk_core::error::BildwerkError;
use bildwerk_core::types::{ConversionOptions, ProcessedImage, RawUpload};
use tracing::{debug, info, instrument, warn};

use crate::archive::ArchiveExtractor;
use crate::classify::{UploadKind, classify_upload, effective_content_type};
use crate::image::ImageNormalizer;

/// What became of a single upload.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Images contributed to the batch, in order.
    Accepted(Vec<ProcessedImage>),
    /// Not something we convert; carries the reason.
    Skipped(String),
    /// Looked convertible but could not be processed.
    Failed(BildwerkError),
}

/// Result of a whole batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub images: Vec<ProcessedImage>,
    pub accepted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Accepted(mut images) => {
                self.accepted += 1;
                self.images.append(&mut images);
            }
            UploadOutcome::Skipped(_) => self.skipped += 1,
            UploadOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Turns a request's uploads into one ordered list of images.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    extractor: ArchiveExtractor,
    normalizer: ImageNormalizer,
}

impl BatchProcessor {
    pub fn new(extractor: ArchiveExtractor) -> Self {
        Self {
            extractor,
            normalizer: ImageNormalizer::new(),
        }
    }

    /// Process every upload in order. Uploads are consumed and released.
    #[instrument(skip_all, fields(uploads = uploads.len()))]
    pub fn process_batch(
        &self,
        uploads: Vec<RawUpload>,
        options: &ConversionOptions,
    ) -> BatchSummary {
        let quality = options.quality.value();
        let mut summary = BatchSummary::default();

        for mut upload in uploads {
            let outcome = self.process_upload(&upload, quality);
            upload.release();

            match &outcome {
                UploadOutcome::Accepted(images) => debug!(
                    filename = upload.filename(),
                    images = images.len(),
                    "upload accepted"
                ),
                UploadOutcome::Skipped(reason) => debug!(
                    filename = upload.filename(),
                    reason = %reason,
                    "upload skipped"
                ),
                UploadOutcome::Failed(err) => warn!(
                    filename = upload.filename(),
                    error = %err,
                    "upload failed"
                ),
            }
            summary.record(outcome);
        }

        info!(
            images = summary.images.len(),
            accepted = summary.accepted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Batch processed"
        );
        summary
    }

    /// Process one upload without releasing it.
    pub fn process_upload(&self, upload: &RawUpload, quality: u8) -> UploadOutcome {
        match classify_upload(upload.filename(), upload.content_type()) {
            UploadKind::Archive => self.process_archive(upload, quality),
            UploadKind::Image => self.process_image(upload, quality),
            UploadKind::Unsupported => UploadOutcome::Skipped(format!(
                "unsupported file type ({})",
                upload.content_type()
            )),
        }
    }

    fn process_archive(&self, upload: &RawUpload, quality: u8) -> UploadOutcome {
        let data = match upload.bytes() {
            Ok(data) => data,
            Err(err) => return UploadOutcome::Failed(err.into()),
        };
        match self.extractor.extract(&data, upload.filename(), quality) {
            Ok(images) if images.is_empty() => {
                UploadOutcome::Skipped("archive contains no images".into())
            }
            Ok(images) => UploadOutcome::Accepted(images),
            Err(err) => UploadOutcome::Failed(err),
        }
    }

    fn process_image(&self, upload: &RawUpload, quality: u8) -> UploadOutcome {
        let data = match upload.bytes() {
            Ok(data) => data,
            Err(err) => return UploadOutcome::Failed(err.into()),
        };
        let content_type = effective_content_type(upload.filename(), upload.content_type());
        match self
            .normalizer
            .normalize(&data, upload.filename(), content_type, quality)
        {
            Ok(Some(image)) => UploadOutcome::Accepted(vec![image]),
            Ok(None) => UploadOutcome::Failed(BildwerkError::ImageDecode {
                name: upload.filename().to_owned(),
                detail: "not a decodable image".into(),
            }),
            Err(err) => UploadOutcome::Failed(err),
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP extractor: enumerate an uploaded archive, stage its image entries in a
// per-call scratch directory, and normalise each one.
//
// Entries are staged under their base filename, so two entries with the same
// base name in different folders collide and the later one wins. The name
// keeps the position where it first appeared.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::ProcessedImage;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::classify::{base_name, extension_of, is_image_name, mime_for_extension};
use crate::image::ImageNormalizer;

/// Default cap on one entry's uncompressed size (50 MiB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts image entries from ZIP archives.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    /// Directory under which each call creates its own scratch directory.
    scratch_root: PathBuf,
    /// Entries larger than this are skipped.
    max_entry_bytes: u64,
    normalizer: ImageNormalizer,
}

impl ArchiveExtractor {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            normalizer: ImageNormalizer::new(),
        }
    }

    pub fn with_max_entry_bytes(mut self, max_entry_bytes: u64) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    /// Extract and normalise every image entry of `archive`, in enumeration
    /// order.
    ///
    /// Fails with [`BildwerkError::CorruptArchive`] only when the container
    /// itself is empty or unreadable. Bad entries are logged and dropped; an
    /// archive without usable images yields an empty `Vec`. The scratch
    /// directory is gone by the time this returns, on every path.
    #[instrument(skip(self, archive), fields(archive_len = archive.len()))]
    pub fn extract(
        &self,
        archive: &[u8],
        archive_name: &str,
        quality: u8,
    ) -> Result<Vec<ProcessedImage>> {
        if archive.is_empty() {
            return Err(BildwerkError::CorruptArchive {
                name: archive_name.to_owned(),
                detail: "archive is empty".into(),
            });
        }

        let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(|err| {
            BildwerkError::CorruptArchive {
                name: archive_name.to_owned(),
                detail: err.to_string(),
            }
        })?;

        std::fs::create_dir_all(&self.scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix("extract_")
            .tempdir_in(&self.scratch_root)?;

        info!(
            archive = archive_name,
            entries = zip.len(),
            scratch = %scratch.path().display(),
            "Extracting archive"
        );

        let staged = self.stage_entries(&mut zip, archive_name, &scratch)?;

        let mut images = Vec::with_capacity(staged.len());
        for name in &staged {
            if let Some(image) = self.normalize_staged(&scratch.path().join(name), name, quality)
            {
                images.push(image);
            }
        }

        let scratch_path = scratch.path().to_path_buf();
        if let Err(err) = scratch.close() {
            warn!(
                path = %scratch_path.display(),
                error = %err,
                "failed to remove scratch directory, leaving it to the janitor"
            );
        }

        info!(
            archive = archive_name,
            staged = staged.len(),
            images = images.len(),
            "Archive extraction complete"
        );
        Ok(images)
    }

    /// Write every image entry into the scratch directory under its base
    /// name. Returns the staged names in first-appearance order.
    fn stage_entries(
        &self,
        zip: &mut ZipArchive<Cursor<&[u8]>>,
        archive_name: &str,
        scratch: &TempDir,
    ) -> Result<Vec<String>> {
        let mut order: Vec<String> = Vec::new();

        for index in 0..zip.len() {
            let mut entry = match zip.by_index(index) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(archive = archive_name, index, error = %err, "unreadable entry skipped");
                    continue;
                }
            };

            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_owned();
            let Some(base) = base_name(&entry_name).map(str::to_owned) else {
                debug!(entry = %entry_name, "entry without a usable file name skipped");
                continue;
            };

            if !is_image_name(&base) {
                debug!(entry = %entry_name, "non-image entry skipped");
                continue;
            }

            if entry.size() > self.max_entry_bytes {
                warn!(
                    entry = %entry_name,
                    size = entry.size(),
                    max = self.max_entry_bytes,
                    "oversized entry skipped"
                );
                continue;
            }

            let target = scratch.path().join(&base);
            match copy_capped(&mut entry, &target, self.max_entry_bytes) {
                Ok(written) => {
                    if order.iter().any(|name| name == &base) {
                        debug!(entry = %entry_name, base = %base, "duplicate base name, later entry wins");
                    } else {
                        order.push(base);
                    }
                    debug!(entry = %entry_name, bytes = written, "entry staged");
                }
                Err(err) => {
                    warn!(entry = %entry_name, error = %err, "entry could not be read, skipped");
                    // A failed overwrite leaves nothing usable under this name.
                    let _ = std::fs::remove_file(&target);
                    order.retain(|name| name != &base);
                }
            }
        }

        Ok(order)
    }

    /// Normalise one staged entry, logging and dropping failures.
    fn normalize_staged(&self, path: &Path, name: &str, quality: u8) -> Option<ProcessedImage> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                warn!(entry = name, error = %err, "staged entry could not be read");
                return None;
            }
        };

        let content_type = extension_of(name)
            .and_then(|ext| mime_for_extension(&ext))
            .unwrap_or_default();

        match self.normalizer.normalize(&data, name, content_type, quality) {
            Ok(Some(image)) => Some(image),
            Ok(None) => {
                warn!(entry = name, "entry could not be decoded, skipped");
                None
            }
            Err(err) => {
                warn!(entry = name, error = %err, "entry could not be re-encoded, skipped");
                None
            }
        }
    }
}

/// Copy at most `max` bytes of `reader` into `target`. More than `max` bytes
/// means the entry lied about its size and is rejected.
fn copy_capped(reader: &mut impl Read, target: &Path, max: u64) -> io::Result<u64> {
    let mut file = File::create(target)?;
    let written = io::copy(&mut reader.take(max.saturating_add(1)), &mut file)?;
    if written > max {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("entry exceeds {max} bytes"),
        ));
    }
    Ok(written)
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image normaliser: decode, measure, and re-encode one uploaded image into
// the canonical output family chosen from its declared content type.

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{OutputFormat, ProcessedImage};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use tracing::{debug, instrument};

/// Turns raw image buffers into [`ProcessedImage`] records.
///
/// Re-encoding is format-aware but deliberately simple:
///
/// - JPEG is encoded with the requested quality after flattening alpha.
/// - PNG stays lossless; quality only selects the compression effort.
/// - WebP is always lossless, since the `image` crate ships no lossy WebP
///   encoder. Quality has no effect there.
///
/// Anything that is not declared as JPEG, PNG or WebP is re-encoded as JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decode `data`, record its native dimensions, and re-encode it.
    ///
    /// Returns `Ok(None)` when the buffer cannot be decoded or has no pixels;
    /// the caller drops such images. An encoder failure after a successful
    /// decode is reported as [`BildwerkError::ImageEncode`].
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn normalize(
        &self,
        data: &[u8],
        filename: &str,
        declared_content_type: &str,
        quality: u8,
    ) -> Result<Option<ProcessedImage>> {
        let decoded = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(err) => {
                debug!(filename, error = %err, "image could not be decoded");
                return Ok(None);
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            debug!(filename, "image has no pixels");
            return Ok(None);
        }

        let format = OutputFormat::from_mime(declared_content_type);
        let bytes = encode(&decoded, format, quality)?;

        debug!(
            filename,
            width,
            height,
            format = ?format,
            in_bytes = data.len(),
            out_bytes = bytes.len(),
            "Image normalised"
        );

        Ok(ProcessedImage::new(bytes, filename, width, height, format))
    }
}

/// Re-encode `image` in the given family.
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => to_jpeg_bytes(image, quality),
        OutputFormat::Png => to_png_bytes(image, quality),
        OutputFormat::WebP => to_webp_bytes(image),
    }
}

/// Encode as JPEG with the given quality (clamped to 1-100).
fn to_jpeg_bytes(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|err| BildwerkError::ImageEncode(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Encode as PNG. Quality maps to compression effort only.
fn to_png_bytes(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let compression = match quality {
        0..=50 => CompressionType::Fast,
        51..=99 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    // The PNG encoder only takes 8/16-bit integer layouts.
    let normalised = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive);
    normalised
        .write_with_encoder(encoder)
        .map_err(|err| BildwerkError::ImageEncode(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Encode as lossless WebP.
fn to_webp_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgba = image.to_rgba8();
    let encoder = WebPEncoder::new_lossless(&mut buffer);
    rgba.write_with_encoder(encoder)
        .map_err(|err| BildwerkError::ImageEncode(format!("WebP encoding failed: {}", err)))?;
    Ok(buffer)
}

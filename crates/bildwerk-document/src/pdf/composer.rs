// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF composer: one page per processed image, using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`. JPEG output is embedded as-is behind `/DCTDecode`;
// other families are decoded to RGB and left to printpdf's lossless path.
// The serialised bytes are written to a temporary sibling file and renamed
// into place only once they are flushed and synced.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{
    ConversionOptions, GeneratedDocument, OutputFormat, PageSize, ProcessedImage,
};
use printpdf::{
    BuiltinFont, DictItem, ExternalStream, ExternalXObject, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, PdfWarnMsg, Point, Pt, Px, RawImage, RawImageData, RawImageFormat, TextItem,
    XObjectId, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use super::inspect::PdfInspector;
use super::layout::{
    CAPTION_GAP_PT, FOOTER_BASELINE_PT, centered_x, content_area, fit_image, truncate_to_width,
};

const DOCUMENT_TITLE: &str = "Converted Images";
const CAPTION_FONT_SIZE: f32 = 10.0;
const FOOTER_FONT_SIZE: f32 = 9.0;
/// Native image resolution: one pixel per point.
const NATIVE_DPI: f32 = 72.0;

/// Lays out processed images one per page and writes the finished PDF.
#[derive(Debug, Clone, Copy)]
pub struct DocumentComposer {
    page_size: PageSize,
    show_filenames: bool,
}

impl DocumentComposer {
    pub fn new(page_size: PageSize, show_filenames: bool) -> Self {
        Self {
            page_size,
            show_filenames,
        }
    }

    pub fn from_options(options: &ConversionOptions) -> Self {
        Self::new(options.page_size, options.show_filenames)
    }

    /// Page dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.page_size.dimensions_mm();
        (Mm(w_mm), Mm(h_mm))
    }

    // -- Rendering ------------------------------------------------------------

    /// Render the document in memory. Page `n` shows `images[n - 1]`.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn render(&self, images: &[ProcessedImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(BildwerkError::EmptyBatch(
                "No valid images found in the uploaded files".into(),
            ));
        }

        let (page_w, page_h) = self.page_dimensions();
        let (page_w_pt, _) = self.page_size.dimensions_pt();
        let area = content_area(self.page_size, self.show_filenames);
        let total = images.len();

        info!(
            paper = ?self.page_size,
            captions = self.show_filenames,
            pages = total,
            "Composing PDF"
        );

        let mut doc = PdfDocument::new(DOCUMENT_TITLE);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(total);

        for (index, image) in images.iter().enumerate() {
            let xobject_id = embed_image(&mut doc, image)?;
            let placed = fit_image(area, image.width(), image.height());

            let mut ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(placed.x)),
                    translate_y: Some(Pt(placed.y)),
                    scale_x: Some(placed.scale),
                    scale_y: Some(placed.scale),
                    dpi: Some(NATIVE_DPI),
                    rotate: None,
                },
            }];

            if self.show_filenames {
                let caption = truncate_to_width(image.filename(), CAPTION_FONT_SIZE, area.width);
                push_text(
                    &mut ops,
                    &caption,
                    CAPTION_FONT_SIZE,
                    centered_x(&caption, CAPTION_FONT_SIZE, page_w_pt),
                    placed.y - CAPTION_GAP_PT,
                );
            }

            let footer = format!("Page {} of {}", index + 1, total);
            push_text(
                &mut ops,
                &footer,
                FOOTER_FONT_SIZE,
                centered_x(&footer, FOOTER_FONT_SIZE, page_w_pt),
                FOOTER_BASELINE_PT,
            );

            debug!(
                page = index + 1,
                filename = image.filename(),
                format = image.format().mime_type(),
                scale = placed.scale,
                rendered_w_pt = placed.width,
                rendered_h_pt = placed.height,
                "Image placed on page"
            );

            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }

        Ok(output)
    }

    // -- File output ----------------------------------------------------------

    /// Render `images` and write the finished document to `destination`.
    ///
    /// The bytes go to a temporary file in the same directory which is
    /// flushed, synced and renamed into place; the returned handle always
    /// points at a closed, complete file. On failure nothing is left at
    /// `destination` and the temporary file is removed.
    #[instrument(skip(self, images), fields(images = images.len(), destination = %destination.display()))]
    pub fn compose(
        &self,
        images: &[ProcessedImage],
        destination: &Path,
    ) -> Result<GeneratedDocument> {
        let bytes = self.render(images)?;

        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut staging = tempfile::Builder::new()
            .prefix(".composing_")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(write_error)?;

        staging.write_all(&bytes).map_err(write_error)?;
        staging.flush().map_err(write_error)?;
        staging.as_file().sync_all().map_err(write_error)?;
        staging
            .persist(destination)
            .map_err(|err| write_error(err.error))?;

        let page_count = match PdfInspector::open(destination) {
            Ok(inspector) => inspector.page_count(),
            Err(err) => {
                discard(destination);
                return Err(err);
            }
        };
        if page_count != images.len() {
            discard(destination);
            return Err(BildwerkError::Pdf(format!(
                "expected {} pages, document has {}",
                images.len(),
                page_count
            )));
        }

        info!(
            path = %destination.display(),
            pages = page_count,
            bytes = bytes.len(),
            "Wrote PDF"
        );

        Ok(GeneratedDocument {
            path: destination.to_path_buf(),
            page_count,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// Register `image` as an XObject on `doc`.
fn embed_image(doc: &mut PdfDocument, image: &ProcessedImage) -> Result<XObjectId> {
    match image.format() {
        OutputFormat::Jpeg => Ok(doc.add_xobject(&jpeg_xobject(image))),
        OutputFormat::Png | OutputFormat::WebP => Ok(doc.add_image(&decode_for_pdf(image)?)),
    }
}

/// Wrap baseline RGB JPEG bytes in an image XObject without recompressing.
fn jpeg_xobject(image: &ProcessedImage) -> ExternalXObject {
    let mut dict = BTreeMap::new();
    dict.insert("Type".to_owned(), DictItem::Name(b"XObject".to_vec()));
    dict.insert("Subtype".to_owned(), DictItem::Name(b"Image".to_vec()));
    dict.insert("Width".to_owned(), DictItem::Int(i64::from(image.width())));
    dict.insert("Height".to_owned(), DictItem::Int(i64::from(image.height())));
    dict.insert("ColorSpace".to_owned(), DictItem::Name(b"DeviceRGB".to_vec()));
    dict.insert("BitsPerComponent".to_owned(), DictItem::Int(8));
    dict.insert("Filter".to_owned(), DictItem::Name(b"DCTDecode".to_vec()));

    ExternalXObject {
        stream: ExternalStream {
            dict,
            content: image.bytes().to_vec(),
            compress: false,
        },
        width: Some(Px(image.width() as usize)),
        height: Some(Px(image.height() as usize)),
        dpi: Some(NATIVE_DPI),
    }
}

/// Decode a processed image into RGB8 pixels for embedding.
fn decode_for_pdf(image: &ProcessedImage) -> Result<RawImage> {
    let dynamic_image = ::image::load_from_memory(image.bytes()).map_err(|err| {
        BildwerkError::Pdf(format!(
            "failed to decode '{}' for PDF: {}",
            image.filename(),
            err
        ))
    })?;

    let width = dynamic_image.width() as usize;
    let height = dynamic_image.height() as usize;
    let rgb_image = dynamic_image.to_rgb8();

    Ok(RawImage {
        pixels: RawImageData::U8(rgb_image.into_raw()),
        width,
        height,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    })
}

/// Append one line of Helvetica text at (`x`, `y`).
fn push_text(ops: &mut Vec<Op>, text: &str, size: f32, x: f32, y: f32) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_owned())],
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::EndTextSection);
}

fn write_error(err: std::io::Error) -> BildwerkError {
    BildwerkError::DocumentWrite(err.to_string())
}

fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove rejected document");
    }
}

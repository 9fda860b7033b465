// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection: read back a generated document with `lopdf` to confirm
// its page count and look at individual pages.

use std::path::Path;

use bildwerk_core::error::{BildwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, instrument};

/// Read-only view of a finished PDF.
pub struct PdfInspector {
    document: Document,
}

impl PdfInspector {
    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            BildwerkError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    /// Parse a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            BildwerkError::Pdf(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Width and height of page `page_number` (1-indexed) in points,
    /// taken from its MediaBox or the nearest ancestor that defines one.
    pub fn page_size_pt(&self, page_number: u32) -> Result<(f32, f32)> {
        let page_id = self.page_id(page_number)?;
        let media_box = self.inherited(page_id, b"MediaBox")?;
        let values = media_box
            .as_array()
            .map_err(|err| BildwerkError::Pdf(format!("MediaBox is not an array: {}", err)))?;
        let numbers: Vec<f32> = values.iter().filter_map(as_number).collect();
        match numbers.as_slice() {
            [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
            _ => Err(BildwerkError::Pdf(format!(
                "malformed MediaBox on page {}",
                page_number
            ))),
        }
    }

    /// Text shown on page `page_number` (1-indexed), one line per text
    /// operator. Only byte-for-byte string operands are read, which is
    /// sufficient for the ASCII captions and footers this crate writes.
    pub fn page_text(&self, page_number: u32) -> Result<String> {
        let page_id = self.page_id(page_number)?;
        let content = self
            .document
            .get_and_decode_page_content(page_id)
            .map_err(|err| {
                BildwerkError::Pdf(format!("page {} content unreadable: {}", page_number, err))
            })?;

        let mut lines = Vec::new();
        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    if let Some(Object::String(bytes, _)) = operation.operands.last() {
                        lines.push(String::from_utf8_lossy(bytes).into_owned());
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first() {
                        let joined: String = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => {
                                    Some(String::from_utf8_lossy(bytes).into_owned())
                                }
                                _ => None,
                            })
                            .collect();
                        lines.push(joined);
                    }
                }
                _ => {}
            }
        }
        Ok(lines.join("\n"))
    }

    fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&page_number).copied().ok_or_else(|| {
            BildwerkError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })
    }

    /// Look `key` up on a page, walking `/Parent` links for inherited entries.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Result<&Object> {
        let mut dict: &Dictionary = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| BildwerkError::Pdf(format!("page dictionary missing: {}", err)))?;

        loop {
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            let parent = dict
                .get(b"Parent")
                .and_then(Object::as_reference)
                .map_err(|_| {
                    BildwerkError::Pdf(format!(
                        "{} not found in page tree",
                        String::from_utf8_lossy(key)
                    ))
                })?;
            dict = self
                .document
                .get_dictionary(parent)
                .map_err(|err| BildwerkError::Pdf(format!("broken page tree: {}", err)))?;
        }
    }

    fn resolve<'a>(&'a self, value: &'a Object) -> Result<&'a Object> {
        match value {
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .map_err(|err| BildwerkError::Pdf(format!("dangling reference: {}", err))),
            other => Ok(other),
        }
    }
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

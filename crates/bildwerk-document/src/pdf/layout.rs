// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page geometry for one-image-per-page documents.
//
// All values are PDF points with the origin at the bottom-left corner. An
// image's native size is its pixel size at 72 dpi.

use bildwerk_core::types::PageSize;

/// Margin on every side of the page.
pub const MARGIN_PT: f32 = 50.0;
/// Extra space kept free under the content area for a caption.
pub const CAPTION_RESERVE_PT: f32 = 30.0;
/// Distance from the caption baseline to the bottom edge of the image.
pub const CAPTION_GAP_PT: f32 = 16.0;
/// Baseline of the "Page N of T" footer.
pub const FOOTER_BASELINE_PT: f32 = 25.0;

/// Rectangle available to the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where and how large an image is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Uniform scale applied to the native size; never above 1.0.
    pub scale: f32,
}

/// Content area of `page`, shrunk at the bottom when captions are shown.
pub fn content_area(page: PageSize, captions: bool) -> ContentArea {
    let (page_w, page_h) = page.dimensions_pt();
    let bottom = if captions {
        MARGIN_PT + CAPTION_RESERVE_PT
    } else {
        MARGIN_PT
    };
    ContentArea {
        x: MARGIN_PT,
        y: bottom,
        width: page_w - 2.0 * MARGIN_PT,
        height: page_h - MARGIN_PT - bottom,
    }
}

/// Scale an image down to fit `area` (never up) and centre it.
pub fn fit_image(area: ContentArea, img_width: u32, img_height: u32) -> Placement {
    let native_w = img_width as f32;
    let native_h = img_height as f32;

    let scale = if native_w > area.width || native_h > area.height {
        (area.width / native_w).min(area.height / native_h)
    } else {
        1.0
    };

    let width = native_w * scale;
    let height = native_h * scale;

    Placement {
        x: area.x + (area.width - width) / 2.0,
        y: area.y + (area.height - height) / 2.0,
        width,
        height,
        scale,
    }
}

/// Rough Helvetica text width: about half the font size per glyph.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * 0.5 * font_size
}

/// X position that centres `text` horizontally on a page `page_width` wide.
pub fn centered_x(text: &str, font_size: f32, page_width: f32) -> f32 {
    ((page_width - estimate_text_width(text, font_size)) / 2.0).max(0.0)
}

/// Shorten `text` with a trailing ellipsis so it fits within `max_width`.
pub fn truncate_to_width(text: &str, font_size: f32, max_width: f32) -> String {
    if estimate_text_width(text, font_size) <= max_width {
        return text.to_owned();
    }
    let max_chars = (max_width / (0.5 * font_size)) as usize;
    let keep = max_chars.saturating_sub(3);
    let mut shortened: String = text.chars().take(keep).collect();
    shortened.push_str("...");
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn a4_content_area_without_captions() {
        let area = content_area(PageSize::A4, false);
        assert!(close(area.x, 50.0));
        assert!(close(area.y, 50.0));
        assert!(close(area.width, 495.28));
        assert!(close(area.height, 741.89));
    }

    #[test]
    fn captions_reserve_space_at_the_bottom() {
        let area = content_area(PageSize::Letter, true);
        assert!(close(area.y, 80.0));
        assert!(close(area.height, 792.0 - 50.0 - 80.0));
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let area = content_area(PageSize::A4, false);
        let placed = fit_image(area, 100, 50);
        assert!(close(placed.scale, 1.0));
        assert!(close(placed.width, 100.0));
        assert!(close(placed.height, 50.0));
        // Centred in the content area.
        assert!(close(placed.x, 50.0 + (495.28 - 100.0) / 2.0));
        assert!(close(placed.y, 50.0 + (741.89 - 50.0) / 2.0));
    }

    #[test]
    fn wide_image_is_scaled_by_width() {
        let area = content_area(PageSize::A4, true);
        // 800x600 at 72 dpi is wider than the 495.28pt content area.
        let placed = fit_image(area, 800, 600);
        let expected = 495.28 / 800.0;
        assert!(close(placed.scale, expected));
        assert!(close(placed.width, 495.28));
        assert!(close(placed.height, 600.0 * expected));
        assert!(close(placed.x, 50.0));
    }

    #[test]
    fn tall_image_is_scaled_by_height() {
        let area = content_area(PageSize::Legal, false);
        let placed = fit_image(area, 400, 4000);
        assert!(close(placed.height, area.height));
        assert!(placed.width < area.width);
        assert!(placed.scale < 1.0);
    }

    #[test]
    fn long_captions_are_truncated() {
        let long = "x".repeat(500);
        let shortened = truncate_to_width(&long, 10.0, 100.0);
        assert!(estimate_text_width(&shortened, 10.0) <= 100.0);
        assert!(shortened.ends_with("..."));
        assert_eq!(truncate_to_width("short.jpg", 10.0, 100.0), "short.jpg");
    }
}

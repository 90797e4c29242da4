//! Overlay text rendering. Lines are rasterized into a coverage mask so the
//! compositor can stamp the same line at outline offsets without
//! re-rasterizing.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::GrayImage;
use tracing::{debug, warn};

use crate::bitmap_font::{self, CELL_HEIGHT, CELL_WIDTH, GLYPH_WIDTH};

/// Well-known locations tried after the configured font.
pub const SYSTEM_FONTS: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\Helvetica.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
];

#[derive(Clone)]
pub enum TextFont {
    Vector { font: FontArc, source: PathBuf },
    Bitmap,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFont::Vector { source, .. } => f.debug_tuple("Vector").field(source).finish(),
            TextFont::Bitmap => f.write_str("Bitmap"),
        }
    }
}

impl TextFont {
    /// Resolve the overlay font: configured path, then [`SYSTEM_FONTS`], then
    /// the built-in bitmap font. Only the last step is worth a warning.
    pub fn load(configured: &Path) -> Self {
        let candidates = std::iter::once(configured).chain(SYSTEM_FONTS.iter().map(Path::new));
        for path in candidates {
            if let Some(font) = Self::try_load(path) {
                debug!(font = %path.display(), "overlay font loaded");
                return font;
            }
        }
        warn!(configured = %configured.display(), "no TrueType font available, using built-in bitmap font");
        TextFont::Bitmap
    }

    fn try_load(path: &Path) -> Option<Self> {
        let data = std::fs::read(path).ok()?;
        match FontArc::try_from_vec(data) {
            Ok(font) => Some(TextFont::Vector {
                font,
                source: path.to_path_buf(),
            }),
            Err(e) => {
                debug!(font = %path.display(), error = %e, "font file rejected");
                None
            }
        }
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, TextFont::Bitmap)
    }

    /// Rendered `(width, height)` of one line at `px`.
    pub fn measure(&self, text: &str, px: u32) -> (u32, u32) {
        match self {
            TextFont::Vector { font, .. } => {
                let scaled = font.as_scaled(PxScale::from(px as f32));
                let width = vector_advance(&scaled, text);
                let height = scaled.ascent() - scaled.descent();
                (width.ceil().max(0.0) as u32, height.ceil().max(1.0) as u32)
            }
            TextFont::Bitmap => {
                let scale = bitmap_scale(px);
                let chars = text.chars().count() as u32;
                let width = if chars == 0 { 0 } else { (chars * CELL_WIDTH - 1) * scale };
                (width, CELL_HEIGHT * scale)
            }
        }
    }

    /// Coverage mask for one line at `px`, sized exactly to [`measure`](Self::measure).
    pub fn render_line(&self, text: &str, px: u32) -> GrayImage {
        let (w, h) = self.measure(text, px);
        let mut mask = GrayImage::new(w.max(1), h.max(1));
        match self {
            TextFont::Vector { font, .. } => {
                let scaled = font.as_scaled(PxScale::from(px as f32));
                let baseline = scaled.ascent();
                let mut caret = 0.0f32;
                let mut previous = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = previous {
                        caret += scaled.kern(prev, id);
                    }
                    let glyph = id.with_scale_and_position(scaled.scale(), point(caret, baseline));
                    caret += scaled.h_advance(id);
                    previous = Some(id);

                    let Some(outlined) = scaled.outline_glyph(glyph) else {
                        continue;
                    };
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let x = bounds.min.x as i64 + i64::from(gx);
                        let y = bounds.min.y as i64 + i64::from(gy);
                        if x < 0 || y < 0 || x >= i64::from(mask.width()) || y >= i64::from(mask.height()) {
                            return;
                        }
                        let pixel = mask.get_pixel_mut(x as u32, y as u32);
                        let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                        pixel[0] = pixel[0].max(value);
                    });
                }
            }
            TextFont::Bitmap => {
                let scale = bitmap_scale(px);
                for (i, c) in text.chars().enumerate() {
                    let origin = i as u32 * CELL_WIDTH * scale;
                    for col in 0..GLYPH_WIDTH {
                        for row in 0..CELL_HEIGHT {
                            if !bitmap_font::is_set(c, col, row) {
                                continue;
                            }
                            for dy in 0..scale {
                                for dx in 0..scale {
                                    let x = origin + col * scale + dx;
                                    let y = row * scale + dy;
                                    if x < mask.width() && y < mask.height() {
                                        mask.put_pixel(x, y, image::Luma([255]));
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        mask
    }
}

fn vector_advance<F: Font, SF: ScaleFont<F>>(scaled: &SF, text: &str) -> f32 {
    let mut width = 0.0;
    let mut previous = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        previous = Some(id);
    }
    width
}

/// Integer upscale so the 8px bitmap cell roughly matches the requested size.
fn bitmap_scale(px: u32) -> u32 {
    ((px as f32 / CELL_HEIGHT as f32).round() as u32).max(1)
}

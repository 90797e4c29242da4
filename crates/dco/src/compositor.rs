//! Final asset composition: localized message overlay on a translucent
//! backing box, plus the campaign logo when one exists.

use std::path::PathBuf;

use campaign_core::config::{BrandConfig, LogoPosition, TextOverlayConfig};
use campaign_core::{AspectRatio, CampaignError, CampaignResult};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::font::TextFont;

const WRAP_WIDTH_RATIO: f32 = 0.85;
const MAX_LINES: usize = 3;
const MIN_FONT_PX: u32 = 20;
const LINE_SPACING: u32 = 10;
const BACKING_ALPHA: u8 = 128;
const BACKING_PADDING: u32 = 25;
const LOGO_MARGIN: u32 = 20;

/// Where a text block lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPlacement {
    pub center_x: i64,
    pub center_y: i64,
    /// Shaded backing box as `(x1, y1, x2, y2)`, clamped to the canvas.
    pub backing: (i64, i64, i64, i64),
    /// Offset of the first line's center from `center_y`.
    pub first_line_offset: i64,
}

/// Anchor a `block` (widest line, total height) on a canvas. Each aspect
/// has its own anchor height and downward shift of the lines inside the box.
pub fn place_text_block(
    canvas: (u32, u32),
    block: (u32, u32),
    aspect: AspectRatio,
    outline_width: u32,
) -> TextPlacement {
    let (w, h) = canvas;
    let (block_width, block_height) = block;
    let (anchor_ratio, shift_ratio) = match aspect {
        AspectRatio::Square => (0.84, 0.17),
        AspectRatio::Horizontal => (0.85, 0.20),
        AspectRatio::Vertical => (0.90, 0.22),
    };
    let cx = i64::from(w / 2);
    let cy = (f64::from(h) * anchor_ratio) as i64;
    let half_block = i64::from(block_height / 2);
    let half_width = i64::from(block_width / 2);
    let padding = i64::from(BACKING_PADDING + 2 * outline_width);

    TextPlacement {
        center_x: cx,
        center_y: cy,
        backing: (
            (cx - half_width - padding).max(0),
            (cy - half_block - padding).max(0),
            (cx + half_width + padding).min(i64::from(w)),
            (cy + half_block + padding).min(i64::from(h)),
        ),
        first_line_offset: -half_block + (f64::from(block_height) * shift_ratio) as i64,
    }
}

/// Wrapped text ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayout {
    pub font_px: u32,
    pub lines: Vec<String>,
}

pub struct Compositor {
    font: TextFont,
    font_size: u32,
    text_color: Rgba<u8>,
    outline_color: Rgba<u8>,
    outline_width: u32,
    logo_position: LogoPosition,
    logo_opacity: f32,
    logo_scale: f32,
    brand_root: PathBuf,
}

impl Compositor {
    pub fn new(text: &TextOverlayConfig, brand: &BrandConfig) -> CampaignResult<Self> {
        let font = TextFont::load(std::path::Path::new(&text.font));
        Self::with_font(text, brand, font)
    }

    pub fn with_font(text: &TextOverlayConfig, brand: &BrandConfig, font: TextFont) -> CampaignResult<Self> {
        Ok(Self {
            font,
            font_size: text.font_size,
            text_color: parse_hex_color(&text.color)?,
            outline_color: parse_hex_color(&text.outline_color)?,
            outline_width: text.outline_width,
            logo_position: brand.logo_position,
            logo_opacity: brand.logo_opacity.clamp(0.0, 1.0),
            logo_scale: brand.logo_scale,
            brand_root: brand.assets_root.clone(),
        })
    }

    /// Overlay `message` and the campaign logo onto a variant.
    pub fn compose(
        &self,
        variant: &DynamicImage,
        message: &str,
        aspect: AspectRatio,
        locale: &str,
        campaign_id: &str,
    ) -> DynamicImage {
        let mut canvas = variant.to_rgba8();
        self.overlay_text(&mut canvas, message, aspect);

        let logo_path = self.brand_root.join(campaign_id).join("logo.png");
        if logo_path.is_file() {
            match image::open(&logo_path) {
                Ok(logo) => self.overlay_logo(&mut canvas, &logo),
                Err(e) => warn!(path = %logo_path.display(), error = %e, "could not overlay logo"),
            }
        }

        debug!(aspect = %aspect, locale, w = canvas.width(), h = canvas.height(), "asset composed");
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    }

    /// Word-wrap `text` so each line fits `max_width` at `px`. Words are never
    /// split; a word wider than the limit gets a line of its own.
    pub fn wrap_text(&self, text: &str, px: u32, max_width: u32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if self.font.measure(&candidate, px).0 <= max_width {
                current = candidate;
            } else {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        if lines.is_empty() {
            lines.push(text.to_string());
        }
        lines
    }

    /// Pick a font size and wrap for an image `width` pixels wide, shrinking
    /// ~10% per step while the text needs more than three lines.
    pub fn layout(&self, text: &str, width: u32) -> TextLayout {
        let max_width = (width as f32 * WRAP_WIDTH_RATIO) as u32;
        let mut font_px = ((u64::from(self.font_size) * u64::from(width)) / 1024).max(1) as u32;
        let mut lines = self.wrap_text(text, font_px, max_width);
        while lines.len() > MAX_LINES && font_px > MIN_FONT_PX {
            font_px = (font_px * 9 / 10).max(MIN_FONT_PX);
            lines = self.wrap_text(text, font_px, max_width);
        }
        TextLayout { font_px, lines }
    }

    fn overlay_text(&self, canvas: &mut RgbaImage, text: &str, aspect: AspectRatio) {
        let (w, h) = canvas.dimensions();
        let layout = self.layout(text, w);
        let masks: Vec<GrayImage> = layout
            .lines
            .iter()
            .map(|line| self.font.render_line(line, layout.font_px))
            .collect();

        let total_height = masks.iter().map(GrayImage::height).sum::<u32>()
            + LINE_SPACING * (masks.len() as u32).saturating_sub(1);
        let max_line_width = masks.iter().map(GrayImage::width).max().unwrap_or(0);

        let placement = place_text_block((w, h), (max_line_width, total_height), aspect, self.outline_width);
        let (x1, y1, x2, y2) = placement.backing;
        shade_rect(canvas, x1, y1, x2, y2, BACKING_ALPHA);

        let (cx, cy) = (placement.center_x, placement.center_y);
        let ow = i64::from(self.outline_width);
        let mut y_offset = placement.first_line_offset;
        for mask in &masks {
            // Lines are centered on their anchor point.
            let left = cx - i64::from(mask.width() / 2);
            let top = cy + y_offset - i64::from(mask.height() / 2);
            for dy in -ow..=ow {
                for dx in -ow..=ow {
                    if dx != 0 || dy != 0 {
                        stamp_mask(canvas, mask, left + dx, top + dy, self.outline_color);
                    }
                }
            }
            stamp_mask(canvas, mask, left, top, self.text_color);
            y_offset += i64::from(mask.height() + LINE_SPACING);
        }
    }

    fn overlay_logo(&self, canvas: &mut RgbaImage, logo: &DynamicImage) {
        let (w, h) = canvas.dimensions();
        let bound = ((w as f32 * self.logo_scale) as u32).max(1);
        let logo = if logo.width() > bound || logo.height() > bound {
            logo.resize(bound, bound, FilterType::Lanczos3)
        } else {
            logo.clone()
        };
        let mut logo = logo.to_rgba8();
        if self.logo_opacity < 1.0 {
            for px in logo.pixels_mut() {
                px[3] = (f32::from(px[3]) * self.logo_opacity).round() as u8;
            }
        }

        let (x, y) = logo_origin(self.logo_position, (w, h), logo.dimensions());
        imageops::overlay(canvas, &logo, i64::from(x), i64::from(y));
    }
}

/// Top-left corner for a logo of `logo` size placed at `position`, 20px
/// from the edges.
pub fn logo_origin(position: LogoPosition, canvas: (u32, u32), logo: (u32, u32)) -> (u32, u32) {
    let right = canvas.0.saturating_sub(logo.0 + LOGO_MARGIN);
    let bottom = canvas.1.saturating_sub(logo.1 + LOGO_MARGIN);
    match position {
        LogoPosition::BottomRight => (right, bottom),
        LogoPosition::BottomLeft => (LOGO_MARGIN, bottom),
        LogoPosition::TopRight => (right, LOGO_MARGIN),
        LogoPosition::TopLeft => (LOGO_MARGIN, LOGO_MARGIN),
    }
}

/// Parse `#RRGGBB` or `#RGB`.
pub fn parse_hex_color(hex: &str) -> CampaignResult<Rgba<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(CampaignError::Config(format!("invalid color '{hex}'"))),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map_err(|_| CampaignError::Config(format!("invalid color '{hex}'")))
    };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Blend black at `alpha` over `[x1, x2) × [y1, y2)`.
fn shade_rect(canvas: &mut RgbaImage, x1: i64, y1: i64, x2: i64, y2: i64, alpha: u8) {
    let keep = 1.0 - f32::from(alpha) / 255.0;
    for y in y1.max(0)..y2.min(i64::from(canvas.height())) {
        for x in x1.max(0)..x2.min(i64::from(canvas.width())) {
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                px[c] = (f32::from(px[c]) * keep).round() as u8;
            }
        }
    }
}

/// Paint `color` through a coverage mask whose top-left lands at (`left`, `top`).
fn stamp_mask(canvas: &mut RgbaImage, mask: &GrayImage, left: i64, top: i64, color: Rgba<u8>) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (mx, my, coverage) in mask.enumerate_pixels() {
        let a = coverage[0];
        if a == 0 {
            continue;
        }
        let (x, y) = (left + i64::from(mx), top + i64::from(my));
        if x < 0 || y < 0 || x >= cw || y >= ch {
            continue;
        }
        let t = f32::from(a) / 255.0;
        let px = canvas.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            px[c] = (f32::from(px[c]) * (1.0 - t) + f32::from(color[c]) * t).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn compositor(brand_root: PathBuf) -> Compositor {
        let brand = BrandConfig {
            assets_root: brand_root,
            ..BrandConfig::default()
        };
        Compositor::with_font(&TextOverlayConfig::default(), &brand, TextFont::Bitmap).unwrap()
    }

    fn gray(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([120, 120, 120])))
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#0a0").unwrap(), Rgba([0, 170, 0, 255]));
        assert!(parse_hex_color("white").is_err());
        assert!(parse_hex_color("#GGHHII").is_err());
    }

    #[test]
    fn test_wrap_keeps_long_word_whole() {
        let c = compositor(PathBuf::from("missing"));
        // At 8px each char is 6px wide; 30px fits "aa bb" (29px) but not more.
        let lines = c.wrap_text("aa bb cc supercalifragilistic", 8, 30);
        assert_eq!(lines, vec!["aa bb", "cc", "supercalifragilistic"]);
    }

    #[test]
    fn test_layout_scales_font_with_width() {
        let c = compositor(PathBuf::from("missing"));
        assert_eq!(c.layout("Hi", 1024).font_px, 48);
        assert_eq!(c.layout("Hi", 2048).font_px, 96);
    }

    #[test]
    fn test_layout_shrinks_to_three_lines() {
        let c = compositor(PathBuf::from("missing"));
        let message = "Summer savings on every single product in the entire store today only while supplies last";
        // 50px needs four lines with the bitmap font; two 10% steps bring it to three.
        let layout = c.layout(message, 1080);
        assert_eq!(layout.font_px, 40);
        assert_eq!(layout.lines.len(), 3);
        assert_eq!(layout.lines.join(" "), message);
    }

    #[test]
    fn test_text_block_anchor_and_padding() {
        // padding = 25 + 2 * outline
        let square = place_text_block((1000, 1000), (400, 100), AspectRatio::Square, 2);
        assert_eq!((square.center_x, square.center_y), (500, 840));
        assert_eq!(square.backing, (271, 761, 729, 919));
        assert_eq!(square.first_line_offset, -50 + 17);

        let portrait = place_text_block((1000, 2000), (400, 100), AspectRatio::Vertical, 3);
        assert_eq!(portrait.center_y, 1800);
        assert_eq!(portrait.backing, (269, 1719, 731, 1881));
        assert_eq!(portrait.first_line_offset, -50 + 22);
    }

    #[test]
    fn test_text_block_backing_clamps_to_canvas() {
        let wide = place_text_block((200, 100), (300, 60), AspectRatio::Horizontal, 2);
        assert_eq!(wide.backing, (0, 26, 200, 100));
        assert_eq!(wide.first_line_offset, -30 + 12);
    }

    #[test]
    fn test_logo_origin_corners() {
        let canvas = (1000, 800);
        let logo = (100, 50);
        assert_eq!(logo_origin(LogoPosition::BottomRight, canvas, logo), (880, 730));
        assert_eq!(logo_origin(LogoPosition::BottomLeft, canvas, logo), (20, 730));
        assert_eq!(logo_origin(LogoPosition::TopRight, canvas, logo), (880, 20));
        assert_eq!(logo_origin(LogoPosition::TopLeft, canvas, logo), (20, 20));
    }

    #[test]
    fn test_compose_keeps_size_and_darkens_text_band() {
        let c = compositor(PathBuf::from("missing"));
        let out = c
            .compose(&gray(400, 400), "Fresh deals", AspectRatio::Square, "en", "camp")
            .to_rgb8();
        assert_eq!(out.dimensions(), (400, 400));
        // Top-left is outside the backing box, the box edge at the anchor row is shaded.
        assert_eq!(out.get_pixel(0, 0), &Rgb([120, 120, 120]));
        let anchor_y = (400.0 * 0.84) as u32;
        let box_left = out.get_pixel(200 - 40, anchor_y - 20);
        assert!(box_left[0] < 120);
    }

    #[test]
    fn test_compose_pastes_campaign_logo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("camp")).unwrap();
        RgbaImage::from_pixel(40, 40, Rgba([255, 0, 0, 255]))
            .save(dir.path().join("camp/logo.png"))
            .unwrap();

        let c = compositor(dir.path().to_path_buf());
        let out = c
            .compose(&gray(400, 400), "Fresh deals", AspectRatio::Square, "en", "camp")
            .to_rgb8();
        // 0.1 × 400 = 40px logo at bottom-right with a 20px margin, 90% opacity.
        let px = out.get_pixel(400 - 20 - 20, 400 - 20 - 20);
        assert!(px[0] > 200 && px[1] < 40, "logo pixel was {px:?}");

        let other = c
            .compose(&gray(400, 400), "Fresh deals", AspectRatio::Square, "en", "other")
            .to_rgb8();
        assert_eq!(other.get_pixel(360, 360), &Rgb([120, 120, 120]));
    }

    #[test]
    fn test_corrupt_logo_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("camp")).unwrap();
        std::fs::write(dir.path().join("camp/logo.png"), b"garbage").unwrap();
        let c = compositor(dir.path().to_path_buf());
        let out = c.compose(&gray(200, 200), "Fresh deals", AspectRatio::Vertical, "fr", "camp");
        assert_eq!((out.width(), out.height()), (200, 200));
    }
}

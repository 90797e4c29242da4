//! Hero → variant geometry. A square target is a plain resize; other targets
//! are center-cropped to the target aspect first so the subject stays framed.

use campaign_core::config::{AspectRatioConfig, Dimensions};
use campaign_core::{AspectRatio, CampaignError, CampaignResult};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Pixel rectangle within a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest rectangle of the target's aspect ratio that fits inside the
/// source, centered on both axes.
pub fn crop_region(source: Dimensions, target: Dimensions) -> CropRegion {
    let (sw, sh) = (u64::from(source.width), u64::from(source.height));
    let (tw, th) = (u64::from(target.width.max(1)), u64::from(target.height.max(1)));

    // Compare sw/sh against tw/th without floating point.
    let (width, height) = if sw * th > sh * tw {
        ((sh * tw / th).max(1), sh)
    } else {
        (sw, (sw * th / tw).max(1))
    };

    CropRegion {
        x: ((sw - width) / 2) as u32,
        y: ((sh - height) / 2) as u32,
        width: width as u32,
        height: height as u32,
    }
}

#[derive(Debug, Clone)]
pub struct AspectRatioTransformer {
    config: AspectRatioConfig,
}

impl AspectRatioTransformer {
    pub fn new(config: &AspectRatioConfig) -> CampaignResult<Self> {
        if config.crop_strategy != "center" {
            return Err(CampaignError::Config(format!(
                "unsupported crop strategy '{}'",
                config.crop_strategy
            )));
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn target_size(&self, ratio: AspectRatio) -> Dimensions {
        self.config.target_size(ratio)
    }

    /// Produce the variant for `ratio` from a hero image.
    pub fn derive(&self, hero: &DynamicImage, ratio: AspectRatio) -> DynamicImage {
        let target = self.target_size(ratio);
        let img = match ratio {
            AspectRatio::Square => hero.resize_exact(target.width, target.height, FilterType::Lanczos3),
            AspectRatio::Vertical | AspectRatio::Horizontal => {
                let region = crop_region(Dimensions::new(hero.width(), hero.height()), target);
                debug!(
                    ratio = %ratio,
                    x = region.x,
                    y = region.y,
                    w = region.width,
                    h = region.height,
                    "center crop"
                );
                hero.crop_imm(region.x, region.y, region.width, region.height)
                    .resize_exact(target.width, target.height, FilterType::Lanczos3)
            }
        };
        metrics::counter!("variants.derived", "ratio" => ratio.as_str()).increment(1);
        img
    }

    /// Derive every requested ratio, in order.
    pub fn derive_all(&self, hero: &DynamicImage, ratios: &[AspectRatio]) -> Vec<(AspectRatio, DynamicImage)> {
        ratios.iter().map(|&r| (r, self.derive(hero, r))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn small_config() -> AspectRatioConfig {
        AspectRatioConfig {
            square: Dimensions::new(60, 60),
            portrait: Dimensions::new(36, 64),
            landscape: Dimensions::new(64, 36),
            ..AspectRatioConfig::default()
        }
    }

    fn hero(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90])))
    }

    #[test]
    fn test_crop_region_from_square_source() {
        let src = Dimensions::new(1024, 1024);
        assert_eq!(
            crop_region(src, Dimensions::new(1080, 1920)),
            CropRegion { x: 224, y: 0, width: 576, height: 1024 }
        );
        assert_eq!(
            crop_region(src, Dimensions::new(1920, 1080)),
            CropRegion { x: 0, y: 224, width: 1024, height: 576 }
        );
    }

    #[test]
    fn test_crop_region_is_deterministic() {
        let src = Dimensions::new(1792, 1024);
        let target = Dimensions::new(1080, 1920);
        assert_eq!(crop_region(src, target), crop_region(src, target));
    }

    #[test]
    fn test_targets_hit_exact_dimensions() {
        let transformer = AspectRatioTransformer::new(&small_config()).unwrap();
        let source = hero(100, 100);
        for ratio in AspectRatio::ALL {
            let out = transformer.derive(&source, ratio);
            let expected = transformer.target_size(ratio);
            assert_eq!((out.width(), out.height()), (expected.width, expected.height), "{ratio}");
        }
    }

    #[test]
    fn test_square_never_crops() {
        // A wide hero squashed to a square keeps its left and right edges.
        let mut img = RgbImage::from_pixel(120, 60, Rgb([0, 0, 0]));
        for y in 0..60 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
                img.put_pixel(119 - x, y, Rgb([0, 0, 255]));
            }
        }
        let transformer = AspectRatioTransformer::new(&small_config()).unwrap();
        let out = transformer.derive(&DynamicImage::ImageRgb8(img), AspectRatio::Square).to_rgb8();
        assert!(out.get_pixel(0, 30)[0] > 200);
        assert!(out.get_pixel(59, 30)[2] > 200);
    }

    #[test]
    fn test_derive_is_idempotent() {
        let transformer = AspectRatioTransformer::new(&small_config()).unwrap();
        let source = hero(100, 80);
        let a = transformer.derive(&source, AspectRatio::Vertical);
        let b = transformer.derive(&source, AspectRatio::Vertical);
        assert_eq!(a.to_rgb8().as_raw(), b.to_rgb8().as_raw());
    }

    #[test]
    fn test_rejects_unknown_crop_strategy() {
        let config = AspectRatioConfig {
            crop_strategy: "smart".to_string(),
            ..AspectRatioConfig::default()
        };
        assert!(AspectRatioTransformer::new(&config).is_err());
    }

    #[test]
    fn test_derive_all_preserves_order() {
        let transformer = AspectRatioTransformer::new(&small_config()).unwrap();
        let ratios = [AspectRatio::Horizontal, AspectRatio::Square];
        let out = transformer.derive_all(&hero(50, 50), &ratios);
        assert_eq!(out.iter().map(|(r, _)| *r).collect::<Vec<_>>(), ratios.to_vec());
    }
}

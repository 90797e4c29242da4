//! Stylistic post-processing applied to hero images before variants are
//! derived: film grain, vignette, warm shift, then a light sharpen. Every
//! stage scales with `intensity`; at 0 the chain is the identity.

use campaign_core::config::PostProcessingConfig;
use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PostProcessor {
    enabled: bool,
    intensity: f32,
    seed: u64,
}

impl PostProcessor {
    pub fn new(config: &PostProcessingConfig) -> Self {
        Self {
            enabled: config.enabled,
            intensity: config.intensity.clamp(0.0, 1.0),
            seed: config.seed,
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Run the full chain. Disabled or zero-intensity processors return the
    /// input unchanged.
    pub fn process(&self, image: &DynamicImage) -> DynamicImage {
        if !self.enabled || self.intensity <= 0.0 {
            return image.clone();
        }

        let mut rgb = image.to_rgb8();
        let mut rng = StdRng::seed_from_u64(self.noise_seed(rgb.width(), rgb.height()));
        add_film_grain(&mut rgb, self.intensity, &mut rng);
        add_vignette(&mut rgb, self.intensity);
        adjust_color_temperature(&mut rgb, self.intensity);
        let rgb = adjust_sharpness(&rgb, 1.0 + 0.15 * self.intensity);

        debug!(intensity = self.intensity, w = rgb.width(), h = rgb.height(), "post-processed hero");
        DynamicImage::ImageRgb8(rgb)
    }

    /// Shift red right and blue left by `⌊2 · strength · intensity⌋` pixels,
    /// wrapping at the edges. Not part of [`process`](Self::process).
    pub fn add_chromatic_aberration(&self, image: &DynamicImage, strength: f32) -> DynamicImage {
        let shift = (2.0 * strength.max(0.0) * self.intensity).floor() as u32;
        if shift == 0 {
            return image.clone();
        }

        let src = image.to_rgb8();
        let (w, h) = src.dimensions();
        let shift = shift % w.max(1);
        let out = RgbImage::from_fn(w, h, |x, y| {
            let red_from = (x + w - shift) % w;
            let blue_from = (x + shift) % w;
            Rgb([
                src.get_pixel(red_from, y)[0],
                src.get_pixel(x, y)[1],
                src.get_pixel(blue_from, y)[2],
            ])
        });
        DynamicImage::ImageRgb8(out)
    }

    fn noise_seed(&self, width: u32, height: u32) -> u64 {
        self.seed ^ ((u64::from(width) << 32) | u64::from(height))
    }
}

/// Additive Gaussian noise, σ = 2 · intensity per channel value.
pub fn add_film_grain(img: &mut RgbImage, intensity: f32, rng: &mut StdRng) {
    if intensity <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0f32, 2.0 * intensity) else {
        return;
    };
    for px in img.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = clamp_u8(f32::from(*c) + normal.sample(rng));
        }
    }
}

/// Darken towards the corners: `1 − 0.3 · intensity · (r / r_max)²` with `r`
/// measured over a `[-1, 1]²` grid.
pub fn add_vignette(img: &mut RgbImage, intensity: f32) {
    let (w, h) = img.dimensions();
    let strength = 0.3 * intensity;
    let axis = |i: u32, n: u32| if n > 1 { -1.0 + 2.0 * i as f32 / (n - 1) as f32 } else { 0.0 };
    let x_max = if w > 1 { 1.0f32 } else { 0.0 };
    let y_max = if h > 1 { 1.0f32 } else { 0.0 };
    let r_max_sq = x_max * x_max + y_max * y_max;
    if strength <= 0.0 || r_max_sq == 0.0 {
        return;
    }

    for (x, y, px) in img.enumerate_pixels_mut() {
        let (gx, gy) = (axis(x, w), axis(y, h));
        let factor = (1.0 - strength * (gx * gx + gy * gy) / r_max_sq).clamp(0.0, 1.0);
        for c in px.0.iter_mut() {
            *c = clamp_u8(f32::from(*c) * factor);
        }
    }
}

/// Warm shift: red × (1 + 0.02 · intensity), blue × (1 − 0.01 · intensity).
pub fn adjust_color_temperature(img: &mut RgbImage, intensity: f32) {
    let warmth = 0.02 * intensity;
    if warmth <= 0.0 {
        return;
    }
    for px in img.pixels_mut() {
        px[0] = clamp_u8(f32::from(px[0]) * (1.0 + warmth));
        px[2] = clamp_u8(f32::from(px[2]) * (1.0 - warmth / 2.0));
    }
}

/// Blend against a 3×3 smoothed copy: `smooth + factor · (img − smooth)`.
/// Border pixels keep their original value. `factor` 1 is the identity.
pub fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 || factor == 1.0 {
        return img.clone();
    }

    let mut out = img.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            for c in 0..3 {
                let mut sum = 0u32;
                for dy in 0..3 {
                    for dx in 0..3 {
                        let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                        sum += weight * u32::from(img.get_pixel(x + dx - 1, y + dy - 1)[c]);
                    }
                }
                let smooth = (sum as f32 / 13.0).round();
                let original = f32::from(img.get_pixel(x, y)[c]);
                out.get_pixel_mut(x, y)[c] = clamp_u8(smooth + factor * (original - smooth));
            }
        }
    }
    out
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn processor(intensity: f32) -> PostProcessor {
        PostProcessor::new(&PostProcessingConfig {
            intensity,
            ..PostProcessingConfig::default()
        })
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let src = gradient(32, 24);
        let out = processor(0.0).process(&src);
        assert_eq!(out.to_rgb8().as_raw(), src.to_rgb8().as_raw());
    }

    #[test]
    fn test_disabled_is_identity() {
        let src = gradient(16, 16);
        let pp = PostProcessor::new(&PostProcessingConfig {
            enabled: false,
            intensity: 1.0,
            ..PostProcessingConfig::default()
        });
        assert_eq!(pp.process(&src).to_rgb8().as_raw(), src.to_rgb8().as_raw());
    }

    #[test]
    fn test_process_is_deterministic_and_keeps_size() {
        let src = gradient(40, 30);
        let pp = processor(0.5);
        let a = pp.process(&src);
        let b = pp.process(&src);
        assert_eq!((a.width(), a.height()), (40, 30));
        assert_eq!(a.to_rgb8().as_raw(), b.to_rgb8().as_raw());
        assert_ne!(a.to_rgb8().as_raw(), src.to_rgb8().as_raw());
    }

    #[test]
    fn test_vignette_darkens_corners_not_center() {
        let mut img = RgbImage::from_pixel(21, 21, Rgb([200, 200, 200]));
        add_vignette(&mut img, 1.0);
        assert_eq!(img.get_pixel(10, 10), &Rgb([200, 200, 200]));
        // r = r_max at the corner: 200 · (1 − 0.3) = 140.
        assert_eq!(img.get_pixel(0, 0), &Rgb([140, 140, 140]));
    }

    #[test]
    fn test_warm_shift() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([100, 100, 100]));
        adjust_color_temperature(&mut img, 1.0);
        assert_eq!(img.get_pixel(0, 0), &Rgb([102, 100, 99]));
    }

    #[test]
    fn test_sharpness_leaves_flat_regions_and_borders() {
        let flat = RgbImage::from_pixel(5, 5, Rgb([80, 90, 100]));
        assert_eq!(adjust_sharpness(&flat, 1.5), flat);

        let mut spot = RgbImage::from_pixel(5, 5, Rgb([100, 100, 100]));
        spot.put_pixel(2, 2, Rgb([200, 200, 200]));
        let out = adjust_sharpness(&spot, 2.0);
        assert!(out.get_pixel(2, 2)[0] > 200);
        assert_eq!(out.get_pixel(0, 0), spot.get_pixel(0, 0));
    }

    #[test]
    fn test_chromatic_aberration_rolls_channels() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_fn(6, 1, |x, _| {
            Rgb([x as u8 * 10, 50, x as u8 * 20])
        }));
        let out = processor(1.0).add_chromatic_aberration(&src, 1.0).to_rgb8();
        // shift = 2: red comes from x − 2, blue from x + 2 (wrapping).
        assert_eq!(out.get_pixel(2, 0), &Rgb([0, 50, 80]));
        assert_eq!(out.get_pixel(0, 0), &Rgb([40, 50, 40]));

        let unchanged = processor(0.2).add_chromatic_aberration(&src, 1.0);
        assert_eq!(unchanged.to_rgb8().as_raw(), src.to_rgb8().as_raw());
    }
}

// src/vision/color.rs
//
// HSV color ranges used to segment the felt and each ball.
//
// All ranges are expressed in 8-bit OpenCV HSV units: H in [0, 180],
// S and V in [0, 255]. A profile is either one range or a union of
// ranges (red hue wraps around 0/180 and needs two bands).

use crate::types::BallId;
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONVERSION
// ============================================================================

/// RGB → HSV in 8-bit OpenCV convention (H halved to fit a byte).
pub fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        v as u8,
    ]
}

/// Convert a whole image; channels of the output hold (H, S, V).
pub fn to_hsv(image: &RgbImage) -> RgbImage {
    let mut hsv = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(hsv.pixels_mut()) {
        dst.0 = rgb_to_hsv8(src[0], src[1], src[2]);
    }
    hsv
}

// ============================================================================
// RANGES & PROFILES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// A pixel matches a `Union` profile if any of its ranges matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorProfile {
    Single(HsvRange),
    Union(Vec<HsvRange>),
}

impl ColorProfile {
    pub fn ranges(&self) -> &[HsvRange] {
        match self {
            ColorProfile::Single(range) => std::slice::from_ref(range),
            ColorProfile::Union(ranges) => ranges,
        }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        self.ranges().iter().any(|r| r.contains(hsv))
    }

    /// Binary mask (255 = match) over an image already converted with `to_hsv`.
    pub fn mask(&self, hsv: &RgbImage) -> GrayImage {
        let mut mask = GrayImage::new(hsv.width(), hsv.height());
        for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
            if self.contains(src.0) {
                *dst = Luma([255]);
            }
        }
        mask
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallProfile {
    pub ball: BallId,
    pub profile: ColorProfile,
}

impl BallProfile {
    fn single(ball: BallId, lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            ball,
            profile: ColorProfile::Single(HsvRange::new(lower, upper)),
        }
    }
}

/// Default felt range: green cloth.
pub const DEFAULT_FELT_RANGE: HsvRange = HsvRange::new([35, 40, 30], [95, 255, 255]);

/// Cue ball plus the seven object balls of the house set.
pub fn default_ball_profiles() -> Vec<BallProfile> {
    vec![
        BallProfile::single(BallId::White, [0, 0, 190], [180, 40, 255]),
        BallProfile::single(BallId::Number(1), [20, 80, 80], [38, 255, 255]),
        BallProfile::single(BallId::Number(2), [95, 80, 40], [130, 255, 255]),
        BallProfile {
            ball: BallId::Number(3),
            profile: ColorProfile::Union(vec![
                HsvRange::new([0, 100, 60], [8, 255, 255]),
                HsvRange::new([170, 100, 60], [180, 255, 255]),
            ]),
        },
        BallProfile::single(BallId::Number(4), [130, 60, 40], [155, 255, 255]),
        BallProfile::single(BallId::Number(5), [9, 100, 80], [18, 255, 255]),
        BallProfile::single(BallId::Number(6), [40, 70, 50], [85, 255, 255]),
        BallProfile::single(BallId::Number(7), [0, 0, 0], [180, 255, 55]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv8(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv8(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv8(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv8(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv8(255, 255, 255), [0, 0, 255]);
    }

    #[test]
    fn test_red_union_covers_both_hue_ends() {
        let red = default_ball_profiles()
            .into_iter()
            .find(|p| p.ball == BallId::Number(3))
            .unwrap();
        assert_eq!(red.profile.ranges().len(), 2);
        // Pure red sits at H=0, a slightly magenta red wraps to H≈175
        assert!(red.profile.contains(rgb_to_hsv8(220, 20, 20)));
        assert!(red.profile.contains(rgb_to_hsv8(220, 20, 45)));
        assert!(!red.profile.contains(rgb_to_hsv8(20, 20, 220)));
    }

    #[test]
    fn test_felt_matches_green_cloth_only() {
        assert!(DEFAULT_FELT_RANGE.contains(rgb_to_hsv8(20, 120, 40)));
        assert!(!DEFAULT_FELT_RANGE.contains(rgb_to_hsv8(240, 240, 240)));
        assert!(!DEFAULT_FELT_RANGE.contains(rgb_to_hsv8(120, 60, 20)));
    }

    #[test]
    fn test_mask_marks_matching_pixels() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([20, 120, 40]));
        img.put_pixel(1, 2, Rgb([250, 250, 250]));
        let white = &default_ball_profiles()[0];
        let mask = white.profile.mask(&to_hsv(&img));
        assert_eq!(mask.get_pixel(1, 2)[0], 255);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 1);
    }

    #[test]
    fn test_profiles_deserialize_single_or_union() {
        let yaml = r#"
- ball: white
  profile: { lower: [0, 0, 190], upper: [180, 40, 255] }
- ball: "3"
  profile:
    - { lower: [0, 100, 60], upper: [8, 255, 255] }
    - { lower: [170, 100, 60], upper: [180, 255, 255] }
"#;
        let profiles: Vec<BallProfile> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(profiles[0].profile, ColorProfile::Single(_)));
        assert!(matches!(profiles[1].profile, ColorProfile::Union(ref r) if r.len() == 2));
        assert_eq!(profiles[1].ball, BallId::Number(3));
    }
}

// src/vision/ball_detector.rs
//
// Color-blob ball detection on the canonical (de-warped) table image.
//
// One pass per color profile:
//   mask(profile) ∧ inset ROI → open → close → external contours
//   → area bounds → circularity → centroid → top-N by score
//
// The inset ROI drops a margin along the cushions where rails and
// pocket jaws produce false blobs. Circularity 4π·A/P² rejects cues,
// hands and shadows.

use super::color::{BallProfile, ColorProfile};
use super::geometry::polygon_moments;
use crate::types::{BallId, Point2};
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::arc_length;
use imageproc::morphology;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallDetectorConfig {
    /// Border margin excluded from detection (canonical px)
    pub inset: u32,
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_circularity: f64,
    /// Candidates kept per color profile
    pub max_per_color: usize,
    /// L1 structuring element radius (2 → 5×5 diamond)
    pub kernel_radius: u8,
}

impl Default for BallDetectorConfig {
    fn default() -> Self {
        Self {
            inset: 18,
            min_radius: 4.0,
            max_radius: 18.0,
            min_circularity: 0.62,
            max_per_color: 1,
            kernel_radius: 2,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallObservation {
    pub center: Point2,
    pub radius: f64,
    pub circularity: f64,
    pub area: f64,
    /// circularity × area
    pub score: f64,
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct BallDetector {
    config: BallDetectorConfig,
}

impl BallDetector {
    pub fn new(config: BallDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BallDetectorConfig {
        &self.config
    }

    /// Candidates for one profile, best first. `hsv` is a canonical image
    /// already converted with `color::to_hsv`.
    pub fn detect_profile(&self, hsv: &RgbImage, profile: &ColorProfile) -> Vec<BallObservation> {
        let mut mask = profile.mask(hsv);
        self.apply_inset(&mut mask);

        let k = self.config.kernel_radius;
        let mask = morphology::close(&morphology::open(&mask, Norm::L1, k), Norm::L1, k);

        let min_area = PI * self.config.min_radius * self.config.min_radius;
        let max_area = PI * self.config.max_radius * self.config.max_radius;

        let mut found: Vec<BallObservation> = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .filter_map(|contour| {
                let points: Vec<Point2> = contour
                    .points
                    .iter()
                    .map(|p| Point2::new(p.x as f64, p.y as f64))
                    .collect();
                let (m00, m10, m01) = polygon_moments(&points);
                let area = m00.abs();
                if area < min_area || area > max_area {
                    return None;
                }

                let perimeter = arc_length(&contour.points, true);
                if perimeter <= 0.0 {
                    return None;
                }
                let circularity = 4.0 * PI * area / (perimeter * perimeter);
                if circularity < self.config.min_circularity {
                    return None;
                }

                // signed moments share the winding sign, so the ratio is orientation-free
                let center = Point2::new(m10 / m00, m01 / m00);
                Some(BallObservation {
                    center,
                    radius: (area / PI).sqrt(),
                    circularity,
                    area,
                    score: circularity * area,
                })
            })
            .collect();

        // sort_by is stable: equal scores keep contour order
        found.sort_by(|a, b| b.score.total_cmp(&a.score));
        found.truncate(self.config.max_per_color);
        found
    }

    /// Best observation(s) for every profile; profiles with nothing found
    /// are absent from the map.
    pub fn detect_all(
        &self,
        hsv: &RgbImage,
        profiles: &[BallProfile],
    ) -> BTreeMap<BallId, Vec<BallObservation>> {
        profiles
            .iter()
            .filter_map(|p| {
                let found = self.detect_profile(hsv, &p.profile);
                (!found.is_empty()).then_some((p.ball, found))
            })
            .collect()
    }

    fn apply_inset(&self, mask: &mut GrayImage) {
        let (w, h) = mask.dimensions();
        let inset = self.config.inset;
        // degenerate ROI still keeps at least one pixel, as a 1×1 window
        let x1 = inset.saturating_add(w.saturating_sub(inset * 2).max(1));
        let y1 = inset.saturating_add(h.saturating_sub(inset * 2).max(1));
        for (x, y, px) in mask.enumerate_pixels_mut() {
            if x < inset || y < inset || x >= x1 || y >= y1 {
                px.0[0] = 0;
            }
        }
    }
}

// src/vision/pockets.rs
//
// Six pockets: four corners plus the midpoints of the two long rails.
// Automatic pockets are laid out in canonical space and projected back
// through the inverse homography; manual pockets are six clicked points
// that override the automatic layout until cleared.

use super::perspective::PerspectiveNormalizer;
use crate::types::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const POCKET_COUNT: usize = 6;

/// Canonical pocket names, in layout order.
pub const POCKET_NAMES: [&str; POCKET_COUNT] = [
    "top-left",
    "top-center",
    "top-right",
    "bottom-left",
    "bottom-center",
    "bottom-right",
];

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketConfig {
    /// Canonical pocket radius = max(min_radius, round(min(W, H) · radius_factor))
    pub radius_factor: f64,
    pub min_radius: f64,
    /// Corner inset as a fraction of the pocket radius
    pub inset_factor: f64,
    /// Manual pocket radius = max(manual_min_radius, round(min(frameW, frameH) · manual_radius_factor))
    pub manual_radius_factor: f64,
    pub manual_min_radius: f64,
    /// A ball is "near" a pocket within this multiple of the pocket radius
    pub near_factor: f64,
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            radius_factor: 0.052,
            min_radius: 10.0,
            inset_factor: 0.3,
            manual_radius_factor: 0.022,
            manual_min_radius: 8.0,
            near_factor: 1.35,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pocket {
    pub name: String,
    pub center: Point2,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PocketCaptureOutcome {
    Idle,
    Rejected { collected: usize },
    Collected { collected: usize, needed: usize },
    Completed(Vec<Pocket>),
}

/// Pocket layout in a `width × height` canonical rectangle.
pub fn canonical_pockets(config: &PocketConfig, width: u32, height: u32) -> Vec<Pocket> {
    let (w, h) = (width as f64, height as f64);
    let r = (w.min(h) * config.radius_factor).round().max(config.min_radius);
    let inset = (r * config.inset_factor).round();

    let (left, right, top, bottom, mid) = (inset, w - inset, inset, h - inset, w / 2.0);
    let centers = [
        (left, top),
        (mid, top),
        (right, top),
        (left, bottom),
        (mid, bottom),
        (right, bottom),
    ];

    POCKET_NAMES
        .iter()
        .zip(centers)
        .map(|(name, (x, y))| Pocket {
            name: name.to_string(),
            center: Point2::new(x, y),
            radius: r,
        })
        .collect()
}

// ============================================================================
// POCKET LOCATOR
// ============================================================================

pub struct PocketLocator {
    config: PocketConfig,
    frame_width: u32,
    frame_height: u32,
    manual: Option<Vec<Pocket>>,
    capture: Option<Vec<Point2>>,
}

impl PocketLocator {
    pub fn new(config: PocketConfig, frame_width: u32, frame_height: u32) -> Self {
        Self {
            config,
            frame_width,
            frame_height,
            manual: None,
            capture: None,
        }
    }

    pub fn config(&self) -> &PocketConfig {
        &self.config
    }

    /// Manual pockets if set; otherwise the canonical layout projected
    /// through `normalizer`; otherwise nothing.
    pub fn locate(&self, normalizer: Option<&PerspectiveNormalizer>) -> Vec<Pocket> {
        if let Some(manual) = &self.manual {
            return manual.clone();
        }
        let Some(norm) = normalizer else {
            return Vec::new();
        };
        let (w, h) = norm.canonical_size();
        canonical_pockets(&self.config, w, h)
            .into_iter()
            .map(|p| {
                let (center, radius) = norm.circle_to_camera(p.center, p.radius);
                Pocket {
                    name: p.name,
                    center,
                    radius,
                }
            })
            .collect()
    }

    pub fn manual(&self) -> Option<&[Pocket]> {
        self.manual.as_deref()
    }

    fn manual_radius(&self) -> f64 {
        let short = self.frame_width.min(self.frame_height) as f64;
        (short * self.config.manual_radius_factor)
            .round()
            .max(self.config.manual_min_radius)
    }

    // ------------------------------------------------------------------------
    // Manual capture
    // ------------------------------------------------------------------------

    /// Start collecting six clicks; capture order defines pocket identity.
    pub fn begin_capture(&mut self) {
        self.manual = None;
        self.capture = Some(Vec::with_capacity(POCKET_COUNT));
        info!("Pocket calibration: click the 6 visible pockets");
    }

    pub fn cancel_capture(&mut self) {
        self.capture = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn captured(&self) -> usize {
        self.capture.as_ref().map_or(0, Vec::len)
    }

    pub fn capture_point(&mut self, point: Point2) -> PocketCaptureOutcome {
        let (fw, fh) = (self.frame_width as f64, self.frame_height as f64);
        let radius = self.manual_radius();
        let Some(points) = self.capture.as_mut() else {
            return PocketCaptureOutcome::Idle;
        };

        let in_frame = point.x.is_finite()
            && point.y.is_finite()
            && (0.0..=fw).contains(&point.x)
            && (0.0..=fh).contains(&point.y);
        if !in_frame || points.contains(&point) {
            debug!("Pocket point ({:.1}, {:.1}) rejected", point.x, point.y);
            return PocketCaptureOutcome::Rejected {
                collected: points.len(),
            };
        }

        points.push(point);
        if points.len() < POCKET_COUNT {
            return PocketCaptureOutcome::Collected {
                collected: points.len(),
                needed: POCKET_COUNT,
            };
        }

        let pockets: Vec<Pocket> = points
            .iter()
            .enumerate()
            .map(|(i, p)| Pocket {
                name: format!("manual-{}", i + 1),
                center: *p,
                radius,
            })
            .collect();
        self.capture = None;
        self.manual = Some(pockets.clone());
        info!("✓ Manual pocket calibration complete (r={:.0}px)", radius);
        PocketCaptureOutcome::Completed(pockets)
    }

    pub fn clear_manual(&mut self) {
        self.capture = None;
        self.manual = None;
        info!("Manual pocket calibration cleared");
    }

    pub fn reset(&mut self) {
        self.capture = None;
        self.manual = None;
    }
}

/// Balls whose center lies within `near_factor × radius` of any pocket.
pub fn count_near_pockets<'a>(
    balls: impl IntoIterator<Item = &'a Point2>,
    pockets: &[Pocket],
    near_factor: f64,
) -> usize {
    if pockets.is_empty() {
        return 0;
    }
    balls
        .into_iter()
        .filter(|b| {
            pockets
                .iter()
                .any(|p| b.distance(&p.center) <= p.radius * near_factor)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::table_calibrator::{CalibrationSource, TableCalibration};

    #[test]
    fn test_canonical_layout() {
        let pockets = canonical_pockets(&PocketConfig::default(), 960, 480);
        assert_eq!(pockets.len(), POCKET_COUNT);
        // r = max(10, round(480 * 0.052)) = 25, inset = round(7.5) = 8
        assert!(pockets.iter().all(|p| p.radius == 25.0));
        assert_eq!(pockets[0].center, Point2::new(8.0, 8.0));
        assert_eq!(pockets[1].center, Point2::new(480.0, 8.0));
        assert_eq!(pockets[5].center, Point2::new(952.0, 472.0));
        assert_eq!(pockets[4].name, "bottom-center");
    }

    #[test]
    fn test_small_canonical_uses_min_radius() {
        let pockets = canonical_pockets(&PocketConfig::default(), 100, 50);
        assert_eq!(pockets[0].radius, 10.0);
        assert_eq!(pockets[0].center, Point2::new(3.0, 3.0));
    }

    #[test]
    fn test_locate_projects_through_inverse() {
        let table = TableCalibration {
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(480.0, 0.0),
                Point2::new(480.0, 240.0),
                Point2::new(0.0, 240.0),
            ],
            source: CalibrationSource::Manual,
        };
        let norm = PerspectiveNormalizer::new(&table, 960, 480).unwrap();
        let locator = PocketLocator::new(PocketConfig::default(), 640, 360);
        let pockets = locator.locate(Some(&norm));
        assert_eq!(pockets.len(), 6);
        assert!(pockets[0].center.distance(&Point2::new(4.0, 4.0)) < 1e-6);
        assert!((pockets[0].radius - 12.5).abs() < 1e-6);
        assert!(locator.locate(None).is_empty());
    }

    #[test]
    fn test_manual_pockets_override() {
        let mut locator = PocketLocator::new(PocketConfig::default(), 640, 360);
        locator.begin_capture();
        let clicks = [(20.0, 20.0), (320.0, 15.0), (620.0, 20.0), (20.0, 340.0), (320.0, 345.0)];
        for (x, y) in clicks {
            locator.capture_point(Point2::new(x, y));
        }
        assert_eq!(
            locator.capture_point(Point2::new(20.0, 20.0)),
            PocketCaptureOutcome::Rejected { collected: 5 }
        );
        let PocketCaptureOutcome::Completed(pockets) = locator.capture_point(Point2::new(620.0, 340.0))
        else {
            panic!("capture should complete on the 6th point");
        };
        // r = max(8, round(360 * 0.022)) = 8
        assert!(pockets.iter().all(|p| p.radius == 8.0));
        assert_eq!(pockets[5].name, "manual-6");
        assert_eq!(locator.locate(None), pockets);

        locator.clear_manual();
        assert!(locator.locate(None).is_empty());
    }

    #[test]
    fn test_count_near_pockets() {
        let pockets = canonical_pockets(&PocketConfig::default(), 960, 480);
        let balls = [
            Point2::new(30.0, 30.0),   // ~31px from top-left, within 33.75
            Point2::new(480.0, 240.0), // center of table
            Point2::new(952.0, 440.0), // 32px from bottom-right
        ];
        assert_eq!(count_near_pockets(balls.iter(), &pockets, 1.35), 2);
        assert_eq!(count_near_pockets(balls.iter(), &[], 1.35), 0);
    }
}

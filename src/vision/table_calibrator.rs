// src/vision/table_calibrator.rs
//
// Locates the four corners of the playing surface.
//
// Automatic mode segments the felt color, cleans the mask with an
// opening followed by a closing, and takes the largest external contour
// covering more than `min_area_fraction` of the frame. The quad is read
// off that contour's extreme points:
//
//   top-left     = min(x + y)      bottom-right = max(x + y)
//   top-right    = max(x - y)      bottom-left  = min(x - y)
//
// which is independent of point order and stable for camera roll within
// ±45°. Manual mode collects four clicked points, orders them the same
// way and freezes the result until cleared. A manual quad always wins
// over detection.

use super::color::{to_hsv, ColorProfile, HsvRange, DEFAULT_FELT_RANGE};
use super::geometry::{is_simple_quad, polygon_area};
use crate::types::Point2;
use image::RgbImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const TABLE_CORNERS: usize = 4;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCalibratorConfig {
    pub felt: HsvRange,
    /// Half-width of the square structuring element (5 → 11×11)
    pub kernel_radius: u8,
    /// Minimum table area as a fraction of the frame area
    pub min_area_fraction: f64,
}

impl Default for TableCalibratorConfig {
    fn default() -> Self {
        Self {
            felt: DEFAULT_FELT_RANGE,
            kernel_radius: 5,
            min_area_fraction: 0.12,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    Automatic,
    Manual,
}

/// Corners in canonical order: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableCalibration {
    pub corners: [Point2; 4],
    pub source: CalibrationSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// No capture in progress; the point was ignored
    Idle,
    /// Point discarded, capture count unchanged
    Rejected { collected: usize },
    Collected { collected: usize, needed: usize },
    Completed(TableCalibration),
}

// ============================================================================
// CORNER ORDERING
// ============================================================================

/// Pick the four extreme points by the sum/difference rule.
/// Returns None for fewer than four points or when two roles land on
/// the same point.
pub fn order_corners(points: &[Point2]) -> Option<[Point2; 4]> {
    if points.len() < TABLE_CORNERS || points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }

    let sum = |p: &Point2| p.x + p.y;
    let diff = |p: &Point2| p.x - p.y;

    // First occurrence wins on ties, matching a stable sort
    let pick = |key: &dyn Fn(&Point2) -> f64, want_max: bool| -> Point2 {
        let mut best = points[0];
        for p in &points[1..] {
            let better = if want_max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };

    let top_left = pick(&sum, false);
    let bottom_right = pick(&sum, true);
    let top_right = pick(&diff, true);
    let bottom_left = pick(&diff, false);
    let quad = [top_left, top_right, bottom_right, bottom_left];

    for i in 0..4 {
        for j in (i + 1)..4 {
            if quad[i] == quad[j] {
                return None;
            }
        }
    }
    Some(quad)
}

/// Simple (non self-intersecting) and large enough.
pub fn is_valid_quad(quad: &[Point2; 4], min_area: f64) -> bool {
    is_simple_quad(quad) && polygon_area(quad) >= min_area
}

// ============================================================================
// TABLE CALIBRATOR
// ============================================================================

pub struct TableCalibrator {
    config: TableCalibratorConfig,
    frame_width: u32,
    frame_height: u32,
    manual: Option<TableCalibration>,
    capture: Option<Vec<Point2>>,
    last_auto: Option<TableCalibration>,
}

impl TableCalibrator {
    /// `frame_width`/`frame_height` describe the space detection and manual
    /// clicks happen in.
    pub fn new(config: TableCalibratorConfig, frame_width: u32, frame_height: u32) -> Self {
        Self {
            config,
            frame_width,
            frame_height,
            manual: None,
            capture: None,
            last_auto: None,
        }
    }

    fn min_area(&self) -> f64 {
        self.frame_width as f64 * self.frame_height as f64 * self.config.min_area_fraction
    }

    /// Manual quad if present, otherwise run felt detection on `image`.
    pub fn calibrate(&mut self, image: &RgbImage) -> Option<TableCalibration> {
        if let Some(manual) = self.manual {
            return Some(manual);
        }
        self.last_auto = self.detect(image);
        self.last_auto
    }

    /// Current calibration without running detection.
    pub fn current(&self) -> Option<TableCalibration> {
        self.manual.or(self.last_auto)
    }

    pub fn manual(&self) -> Option<&TableCalibration> {
        self.manual.as_ref()
    }

    /// Felt segmentation → open → close → largest external contour → quad.
    pub fn detect(&self, image: &RgbImage) -> Option<TableCalibration> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let min_area = w as f64 * h as f64 * self.config.min_area_fraction;

        let mask = ColorProfile::Single(self.config.felt).mask(&to_hsv(image));
        let k = self.config.kernel_radius;
        let mask = morphology::close(&morphology::open(&mask, Norm::LInf, k), Norm::LInf, k);

        let mut best: Option<([Point2; 4], f64)> = None;
        for contour in find_contours::<i32>(&mask) {
            if !matches!(contour.border_type, BorderType::Outer) || contour.parent.is_some() {
                continue;
            }
            let points: Vec<Point2> = contour
                .points
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect();
            let area = polygon_area(&points);
            if area <= min_area || best.as_ref().is_some_and(|(_, a)| area <= *a) {
                continue;
            }
            let Some(quad) = order_corners(&points) else {
                debug!("Felt contour rejected: duplicate corners");
                continue;
            };
            if !is_valid_quad(&quad, min_area) {
                debug!("Felt contour rejected: quad invalid or too small");
                continue;
            }
            best = Some((quad, area));
        }

        best.map(|(corners, area)| {
            debug!(
                "Table quad {:.0}px² ({:.0}% of frame)",
                area,
                area / (w as f64 * h as f64) * 100.0
            );
            TableCalibration {
                corners,
                source: CalibrationSource::Automatic,
            }
        })
    }

    // ------------------------------------------------------------------------
    // Manual capture
    // ------------------------------------------------------------------------

    /// Start collecting corner clicks. Drops any existing manual quad.
    pub fn begin_capture(&mut self) {
        self.manual = None;
        self.capture = Some(Vec::with_capacity(TABLE_CORNERS));
        info!("Table calibration: click the 4 inner corners of the table");
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

    pub fn capture_point(&mut self, point: Point2) -> CaptureOutcome {
        let min_area = self.min_area();
        let (fw, fh) = (self.frame_width as f64, self.frame_height as f64);
        let Some(points) = self.capture.as_mut() else {
            return CaptureOutcome::Idle;
        };

        let in_frame = point.x.is_finite()
            && point.y.is_finite()
            && (0.0..=fw).contains(&point.x)
            && (0.0..=fh).contains(&point.y);
        if !in_frame || points.contains(&point) {
            debug!("Corner ({:.1}, {:.1}) rejected", point.x, point.y);
            return CaptureOutcome::Rejected {
                collected: points.len(),
            };
        }

        if points.len() + 1 < TABLE_CORNERS {
            points.push(point);
            return CaptureOutcome::Collected {
                collected: points.len(),
                needed: TABLE_CORNERS,
            };
        }

        let collected = points.len();
        let mut candidate = points.clone();
        candidate.push(point);
        match order_corners(&candidate).filter(|q| is_valid_quad(q, min_area)) {
            Some(corners) => {
                let calibration = TableCalibration {
                    corners,
                    source: CalibrationSource::Manual,
                };
                self.manual = Some(calibration);
                self.capture = None;
                info!("✓ Manual table calibration complete");
                CaptureOutcome::Completed(calibration)
            }
            None => {
                debug!("Fourth corner rejected: quad invalid");
                CaptureOutcome::Rejected { collected }
            }
        }
    }

    /// Drop the manual quad; automatic detection resumes next cycle.
    pub fn clear_manual(&mut self) {
        self.capture = None;
        self.manual = None;
        info!("Manual table calibration cleared, back to automatic detection");
    }

    pub fn reset(&mut self) {
        self.capture = None;
        self.manual = None;
        self.last_auto = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const FELT: Rgb<u8> = Rgb([30, 130, 60]);
    const RAIL: Rgb<u8> = Rgb([90, 50, 25]);

    fn pts(raw: &[(f64, f64)]) -> Vec<Point2> {
        raw.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn make_table_image(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if x >= x0 && x <= x1 && y >= y0 && y <= y1 {
                FELT
            } else {
                RAIL
            }
        })
    }

    #[test]
    fn test_order_corners_is_input_order_invariant() {
        let base = pts(&[(50.0, 40.0), (590.0, 60.0), (600.0, 320.0), (40.0, 300.0)]);
        let expected = order_corners(&base).unwrap();
        assert_eq!(expected[0], Point2::new(50.0, 40.0));
        assert_eq!(expected[1], Point2::new(590.0, 60.0));
        assert_eq!(expected[2], Point2::new(600.0, 320.0));
        assert_eq!(expected[3], Point2::new(40.0, 300.0));

        let perms = [[3, 1, 0, 2], [2, 3, 1, 0], [1, 0, 3, 2], [0, 2, 1, 3]];
        for perm in perms {
            let shuffled: Vec<Point2> = perm.iter().map(|&i| base[i]).collect();
            assert_eq!(order_corners(&shuffled).unwrap(), expected);
        }
    }

    #[test]
    fn test_order_corners_under_rotation() {
        // Rectangle rotated by 30° around its center
        let (cx, cy, hw, hh) = (320.0, 180.0, 200.0, 100.0);
        let theta: f64 = 30f64.to_radians();
        let rot = |x: f64, y: f64| {
            Point2::new(
                cx + x * theta.cos() - y * theta.sin(),
                cy + x * theta.sin() + y * theta.cos(),
            )
        };
        let corners = vec![rot(-hw, -hh), rot(hw, -hh), rot(hw, hh), rot(-hw, hh)];
        let quad = order_corners(&corners).unwrap();
        assert!(is_simple_quad(&quad));
        let mut reversed = corners.clone();
        reversed.reverse();
        assert_eq!(order_corners(&reversed).unwrap(), quad);
    }

    #[test]
    fn test_duplicate_corners_rejected() {
        // A triangle: one point plays two roles
        let tri = pts(&[(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (0.0, 0.0)]);
        assert!(order_corners(&tri).is_none());
        assert!(order_corners(&pts(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])).is_none());
    }

    #[test]
    fn test_detects_felt_rectangle() {
        let img = make_table_image(640, 360, 60, 40, 580, 320);
        let cal = TableCalibrator::new(TableCalibratorConfig::default(), 640, 360);
        let table = cal.detect(&img).expect("table");
        assert_eq!(table.source, CalibrationSource::Automatic);
        let tl = table.corners[0];
        let br = table.corners[2];
        assert!((tl.x - 60.0).abs() <= 2.0 && (tl.y - 40.0).abs() <= 2.0, "{:?}", tl);
        assert!((br.x - 580.0).abs() <= 2.0 && (br.y - 320.0).abs() <= 2.0, "{:?}", br);
    }

    #[test]
    fn test_small_felt_patch_ignored() {
        let img = make_table_image(640, 360, 100, 100, 200, 180);
        let cal = TableCalibrator::new(TableCalibratorConfig::default(), 640, 360);
        assert!(cal.detect(&img).is_none());
    }

    #[test]
    fn test_manual_capture_overrides_detection() {
        let mut cal = TableCalibrator::new(TableCalibratorConfig::default(), 640, 360);
        assert_eq!(cal.capture_point(Point2::new(1.0, 1.0)), CaptureOutcome::Idle);

        cal.begin_capture();
        for p in pts(&[(600.0, 330.0), (30.0, 20.0), (610.0, 25.0)]) {
            assert!(matches!(cal.capture_point(p), CaptureOutcome::Collected { .. }));
        }
        // duplicate and out-of-frame clicks don't advance
        assert_eq!(
            cal.capture_point(Point2::new(30.0, 20.0)),
            CaptureOutcome::Rejected { collected: 3 }
        );
        assert_eq!(
            cal.capture_point(Point2::new(-5.0, 200.0)),
            CaptureOutcome::Rejected { collected: 3 }
        );
        let done = cal.capture_point(Point2::new(25.0, 340.0));
        let CaptureOutcome::Completed(table) = done else {
            panic!("expected completion, got {:?}", done);
        };
        assert_eq!(table.corners[0], Point2::new(30.0, 20.0));
        assert_eq!(table.source, CalibrationSource::Manual);
        assert!(!cal.is_capturing());

        // A blank frame still yields the manual quad
        let blank = RgbImage::new(640, 360);
        assert_eq!(cal.calibrate(&blank), Some(table));

        cal.clear_manual();
        assert!(cal.calibrate(&blank).is_none());
    }

    #[test]
    fn test_degenerate_fourth_corner_rejected() {
        let mut cal = TableCalibrator::new(TableCalibratorConfig::default(), 640, 360);
        cal.begin_capture();
        for p in pts(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)]) {
            cal.capture_point(p);
        }
        // Valid ordering but far below the minimum area
        assert_eq!(
            cal.capture_point(Point2::new(10.0, 20.0)),
            CaptureOutcome::Rejected { collected: 3 }
        );
        assert!(cal.is_capturing());
        assert!(cal.manual().is_none());
    }
}

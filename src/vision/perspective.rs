// src/vision/perspective.rs
//
// Planar homography between the calibrated table quad (camera space)
// and a fixed canonical rectangle. Ball detection and pocket layout run
// in canonical space; results go back through the inverse.

use super::table_calibrator::TableCalibration;
use crate::types::Point2;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// 3×3 projective transform, `dst ~ H · [x, y, 1]ᵀ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    /// Exact solve from four correspondences (h33 fixed to 1).
    /// None when the points are degenerate (three collinear, repeats).
    pub fn from_correspondences(src: &[Point2; 4], dst: &[Point2; 4]) -> Option<Self> {
        if has_collinear_triple(src) || has_collinear_triple(dst) {
            return None;
        }
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);
            let r = 2 * i;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self(Matrix3::new(
            h[0], h[1], h[2], //
            h[3], h[4], h[5], //
            h[6], h[7], 1.0,
        )))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Project a point. A zero or non-finite denominator maps to the origin.
    pub fn project(&self, p: Point2) -> Point2 {
        let q = self.0 * Vector3::new(p.x, p.y, 1.0);
        let den = q[2];
        if den == 0.0 || !den.is_finite() {
            return Point2::ORIGIN;
        }
        Point2::new(q[0] / den, q[1] / den)
    }
}

/// Forward (camera → canonical) and inverse transforms for one table quad.
#[derive(Debug, Clone)]
pub struct PerspectiveNormalizer {
    forward: Homography,
    inverse: Homography,
    width: u32,
    height: u32,
}

impl PerspectiveNormalizer {
    /// Map the calibrated corners (TL, TR, BR, BL) onto `width × height`.
    pub fn new(table: &TableCalibration, width: u32, height: u32) -> Option<Self> {
        let (w, h) = (width as f64, height as f64);
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        let forward = Homography::from_correspondences(&table.corners, &canonical)?;
        let inverse = Homography::from_correspondences(&canonical, &table.corners)
            .or_else(|| forward.inverse())?;
        Some(Self {
            forward,
            inverse,
            width,
            height,
        })
    }

    pub fn canonical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn to_canonical(&self, p: Point2) -> Point2 {
        self.forward.project(p)
    }

    pub fn to_camera(&self, p: Point2) -> Point2 {
        self.inverse.project(p)
    }

    /// Project a canonical-space circle back to camera space. The radius
    /// is the distance between the projected center and the projected
    /// point `center + (r, 0)`, floored at 2px.
    pub fn circle_to_camera(&self, center: Point2, radius: f64) -> (Point2, f64) {
        let c = self.to_camera(center);
        let edge = self.to_camera(Point2::new(center.x + radius, center.y));
        (c, c.distance(&edge).max(2.0))
    }

    /// Resample the camera image into the canonical rectangle. Bilinear,
    /// with out-of-image samples clamped to the nearest edge pixel.
    pub fn warp(&self, image: &RgbImage) -> RgbImage {
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 {
            return RgbImage::new(self.width, self.height);
        }
        let max_x = (iw - 1) as f64;
        let max_y = (ih - 1) as f64;

        RgbImage::from_fn(self.width, self.height, |x, y| {
            // sample at pixel centers
            let src = self.to_camera(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            let sx = (src.x - 0.5).clamp(0.0, max_x);
            let sy = (src.y - 0.5).clamp(0.0, max_y);
            bilinear(image, sx, sy)
        })
    }
}

fn has_collinear_triple(pts: &[Point2; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(i, j, k)| {
        let (a, b, c) = (pts[i], pts[j], pts[k]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        cross.abs() < 1e-9
    })
}

fn bilinear(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::geometry::{convex_hull, min_area_rect};
use imageproc::point::Point;

use super::threshold::{BACKGROUND, BinaryMask, FOREGROUND};
use crate::models::{BoundingBox, Orientation, Region, ShapeFeatureVector};

/// Added inside the log so a zero invariant stays finite
const LOG_EPSILON: f64 = 1e-10;

/// Raw and central moments of a binary region up to third order
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
    pub mu30: f64,
    pub mu21: f64,
    pub mu12: f64,
    pub mu03: f64,
}

impl Moments {
    /// Moments of the foreground pixels inside `bbox`.
    ///
    /// Coordinates are taken relative to the box origin; central moments and
    /// everything derived from them do not depend on that choice.
    pub fn of_region(mask: &BinaryMask, bbox: &BoundingBox) -> Self {
        let mut m = Moments::default();

        for y in bbox.y..bbox.bottom().min(mask.height()) {
            for x in bbox.x..bbox.right().min(mask.width()) {
                if !mask.is_foreground(x, y) {
                    continue;
                }
                let px = (x - bbox.x) as f64;
                let py = (y - bbox.y) as f64;
                m.m00 += 1.0;
                m.m10 += px;
                m.m01 += py;
                m.m20 += px * px;
                m.m11 += px * py;
                m.m02 += py * py;
                m.m30 += px * px * px;
                m.m21 += px * px * py;
                m.m12 += px * py * py;
                m.m03 += py * py * py;
            }
        }

        if m.m00 == 0.0 {
            return m;
        }

        let xb = m.m10 / m.m00;
        let yb = m.m01 / m.m00;
        m.mu20 = m.m20 - xb * m.m10;
        m.mu11 = m.m11 - xb * m.m01;
        m.mu02 = m.m02 - yb * m.m01;
        m.mu30 = m.m30 - 3.0 * xb * m.m20 + 2.0 * xb * xb * m.m10;
        m.mu21 = m.m21 - 2.0 * xb * m.m11 - yb * m.m20 + 2.0 * xb * xb * m.m01;
        m.mu12 = m.m12 - 2.0 * yb * m.m11 - xb * m.m02 + 2.0 * yb * yb * m.m10;
        m.mu03 = m.m03 - 3.0 * yb * m.m02 + 2.0 * yb * yb * m.m01;
        m
    }

    /// Principal axis angle in (-pi/2, pi/2]
    pub fn orientation(&self) -> f64 {
        let mu20 = self.mu20 / self.m00;
        let mu02 = self.mu02 / self.m00;
        let mu11 = self.mu11 / self.m00;
        0.5 * (2.0 * mu11).atan2(mu20 - mu02)
    }

    /// The seven Hu invariants
    pub fn hu_moments(&self) -> [f64; 7] {
        if self.m00 == 0.0 {
            return [0.0; 7];
        }

        let s2 = self.m00 * self.m00;
        let s3 = s2 * self.m00.sqrt();
        let n20 = self.mu20 / s2;
        let n11 = self.mu11 / s2;
        let n02 = self.mu02 / s2;
        let n30 = self.mu30 / s3;
        let n21 = self.mu21 / s3;
        let n12 = self.mu12 / s3;
        let n03 = self.mu03 / s3;

        let t0 = n30 + n12;
        let t1 = n21 + n03;
        let q0 = t0 * t0;
        let q1 = t1 * t1;
        let n4 = 4.0 * n11;
        let s = n20 + n02;
        let d = n20 - n02;

        let a = n30 - 3.0 * n12;
        let b = 3.0 * n21 - n03;

        [
            s,
            d * d + n4 * n11,
            a * a + b * b,
            q0 + q1,
            a * t0 * (q0 - 3.0 * q1) + b * t1 * (3.0 * q0 - q1),
            d * (q0 - q1) + n4 * t0 * t1,
            b * t0 * (q0 - 3.0 * q1) - a * t1 * (3.0 * q0 - q1),
        ]
    }
}

/// Compress an invariant's dynamic range; sign-stable near zero
pub fn log_scale(value: f64) -> f64 {
    -value.signum() * (value.abs() + LOG_EPSILON).log10()
}

/// Everything feature extraction learns about one region
#[derive(Debug, Clone)]
pub struct FeatureExtraction {
    pub features: ShapeFeatureVector,
    /// The input region, with orientation filled in unless it was degenerate
    pub region: Region,
    /// Corners of the minimum-area rectangle around the external contours
    pub oriented_box: Option<[Point<i32>; 4]>,
}

/// External contour points of the region's bounding-box sub-mask, in image coordinates.
///
/// The sub-mask gets a one-pixel background frame so foreground on the box edge
/// still has an outer border to trace.
fn external_contour_points(mask: &BinaryMask, bbox: &BoundingBox) -> Vec<Point<i32>> {
    let width = bbox.width.min(mask.width().saturating_sub(bbox.x));
    let height = bbox.height.min(mask.height().saturating_sub(bbox.y));
    let framed = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= width && y <= height;
        let on = inside && mask.is_foreground(bbox.x + x - 1, bbox.y + y - 1);
        Luma([if on { FOREGROUND } else { BACKGROUND }])
    });

    let (dx, dy) = (bbox.x as i32 - 1, bbox.y as i32 - 1);
    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .flat_map(|c| c.points)
        .map(|p| Point::new(p.x + dx, p.y + dy))
        .collect()
}

/// Short/long side ratio of the minimum-area rectangle around a convex hull.
///
/// One side of that rectangle is collinear with a hull edge, so every edge
/// direction is tried; sides are measured in floating point.
fn min_rect_side_ratio(hull: &[Point<i32>]) -> f64 {
    let points: Vec<(f64, f64)> = hull.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let n = points.len();
    let mut best: Option<(f64, f64, f64)> = None;

    for i in 0..n {
        let (ax, ay) = points[i];
        let (bx, by) = points[(i + 1) % n];
        let len = (bx - ax).hypot(by - ay);
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = ((bx - ax) / len, (by - ay) / len);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(px, py) in &points {
            let u = px * ux + py * uy;
            let v = py * ux - px * uy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let (w, h) = (max_u - min_u, max_v - min_v);
        if best.is_none_or(|(area, _, _)| w * h < area) {
            best = Some((w * h, w, h));
        }
    }

    match best {
        Some((_, w, h)) if w > 0.0 && h > 0.0 => w.min(h) / w.max(h),
        _ => 1.0,
    }
}

/// Minimum-area rotated rectangle corners (for drawing) and its short/long side ratio
fn oriented_box(points: &[Point<i32>]) -> (Option<[Point<i32>; 4]>, f64) {
    if points.is_empty() {
        return (None, 1.0);
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        // collinear points: one side of the rectangle is zero
        return (None, 1.0);
    }

    (Some(min_area_rect(hull.as_slice())), min_rect_side_ratio(&hull))
}

/// Signed extents of `points` along the axis at `theta` through `centroid`
/// and along its perpendicular (positive pointing up in the image)
fn axis_extents(points: &[Point<i32>], centroid: (f64, f64), theta: f64) -> Orientation {
    let (sin_t, cos_t) = theta.sin_cos();
    let mut extents = Orientation {
        theta,
        min_e1: f64::INFINITY,
        max_e1: f64::NEG_INFINITY,
        min_e2: f64::INFINITY,
        max_e2: f64::NEG_INFINITY,
    };

    for p in points {
        let dx = p.x as f64 - centroid.0;
        let dy = p.y as f64 - centroid.1;
        let e1 = dx * cos_t + dy * sin_t;
        let e2 = dx * sin_t - dy * cos_t;
        extents.min_e1 = extents.min_e1.min(e1);
        extents.max_e1 = extents.max_e1.max(e1);
        extents.min_e2 = extents.min_e2.min(e2);
        extents.max_e2 = extents.max_e2.max(e2);
    }

    if points.is_empty() {
        extents.min_e1 = 0.0;
        extents.max_e1 = 0.0;
        extents.min_e2 = 0.0;
        extents.max_e2 = 0.0;
    }
    extents
}

/// Compute the shape features of `region` and return it with its orientation set.
///
/// A region with no foreground pixels inside its bounding box yields the
/// all-zero feature vector and is returned unchanged.
pub fn extract_features(mask: &BinaryMask, region: Region) -> FeatureExtraction {
    let moments = Moments::of_region(mask, &region.bbox);
    if moments.m00 == 0.0 {
        log::debug!("Region {} has no foreground pixels", region.label);
        return FeatureExtraction {
            features: ShapeFeatureVector::default(),
            region,
            oriented_box: None,
        };
    }

    let theta = moments.orientation();
    let hu = moments.hu_moments();

    let points = external_contour_points(mask, &region.bbox);
    let (corners, hw_ratio) = oriented_box(&points);
    let orientation = axis_extents(&points, region.centroid, theta);

    let features = ShapeFeatureVector {
        percent_filled: region.percent_filled(),
        hw_ratio,
        hu1: log_scale(hu[0]),
        hu2: log_scale(hu[1]),
        hu3: log_scale(hu[2]),
    };
    log::debug!("Region {}: {} theta={:.3}", region.label, features, theta);

    FeatureExtraction {
        features,
        region: region.with_orientation(orientation),
        oriented_box: corners,
    }
}

/// Mask rendered in color with the oriented box (green), principal axis (red)
/// and centroid (blue) drawn on top
pub fn annotate(mask: &BinaryMask, extraction: &FeatureExtraction) -> RgbImage {
    let mut canvas = RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.as_gray().get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    if let Some(corners) = extraction.oriented_box {
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                Rgb([0, 255, 0]),
            );
        }
    }

    let region = &extraction.region;
    let (cx, cy) = region.centroid;
    if let Some(orientation) = region.orientation {
        let half_len = region.bbox.width.max(region.bbox.height) as f64 / 2.0;
        let (sin_t, cos_t) = orientation.theta.sin_cos();
        draw_line_segment_mut(
            &mut canvas,
            ((cx + half_len * cos_t) as f32, (cy + half_len * sin_t) as f32),
            ((cx - half_len * cos_t) as f32, (cy - half_len * sin_t) as f32),
            Rgb([255, 0, 0]),
        );
    }
    let center = (cx.round() as i32, cy.round() as i32);
    draw_filled_circle_mut(&mut canvas, center, 5, Rgb([0, 0, 255]));

    canvas
}

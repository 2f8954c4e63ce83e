//! Seed curves for cable construction.
//!
//! A [`CurveProvider`] is any parametric curve on `t ∈ [0, 1]`. The cable
//! samples it at `resolution + 1` evenly spaced parameters and uses the
//! polyline's length to derive the rest distance.

use nalgebra::Point3;

/// Parametric curve on `t ∈ [0, 1]`.
pub trait CurveProvider {
    /// Point at parameter `t`; values outside `[0, 1]` are clamped.
    fn point_at(&self, t: f64) -> Point3<f64>;

    /// `resolution + 1` points at evenly spaced parameters, ends included.
    fn sample(&self, resolution: usize) -> Vec<Point3<f64>> {
        if resolution == 0 {
            return vec![self.point_at(0.0)];
        }
        (0..=resolution)
            .map(|i| self.point_at(i as f64 / resolution as f64))
            .collect()
    }
}

/// Straight segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    /// Point at `t = 0`.
    pub start: Point3<f64>,
    /// Point at `t = 1`.
    pub end: Point3<f64>,
}

impl LineSegment {
    /// Create a segment.
    #[must_use]
    pub const fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }
}

impl CurveProvider for LineSegment {
    fn point_at(&self, t: f64) -> Point3<f64> {
        self.start + (self.end - self.start) * t.clamp(0.0, 1.0)
    }
}

/// Piecewise-linear curve. Each segment covers an equal share of the
/// parameter range regardless of its length.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    points: Vec<Point3<f64>>,
}

impl Polyline {
    /// Create from control points.
    #[must_use]
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Control points.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Total length.
    #[must_use]
    pub fn length(&self) -> f64 {
        arc_length(&self.points)
    }
}

impl CurveProvider for Polyline {
    fn point_at(&self, t: f64) -> Point3<f64> {
        match self.points.as_slice() {
            [] => Point3::origin(),
            [only] => *only,
            points => {
                let segments = points.len() - 1;
                let scaled = t.clamp(0.0, 1.0) * segments as f64;
                let index = (scaled.floor() as usize).min(segments - 1);
                let local = scaled - index as f64;
                points[index] + (points[index + 1] - points[index]) * local
            }
        }
    }
}

/// Sum of distances between consecutive points.
#[must_use]
pub fn arc_length(points: &[Point3<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_sampling() {
        let line = LineSegment::new(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        let points = line.sample(10);
        assert_eq!(points.len(), 11);
        for (i, p) in points.iter().enumerate() {
            assert_relative_eq!(p.x, i as f64, epsilon = 1e-12);
        }
        assert_relative_eq!(arc_length(&points), 10.0, epsilon = 1e-12);
        assert_eq!(line.sample(0), vec![Point3::origin()]);
    }

    #[test]
    fn test_polyline_point_at() {
        let poly = Polyline::new(vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
        ]);
        assert_relative_eq!(poly.length(), 4.0);
        assert_eq!(poly.point_at(0.0), Point3::origin());
        assert_eq!(poly.point_at(1.0), Point3::new(1.0, 3.0, 0.0));
        // Equal parameter share per segment.
        assert_relative_eq!(poly.point_at(0.25), Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(poly.point_at(0.75), Point3::new(1.0, 1.5, 0.0), epsilon = 1e-12);
        assert_eq!(poly.point_at(7.0), Point3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn test_degenerate_polylines() {
        assert_eq!(Polyline::new(vec![]).point_at(0.5), Point3::origin());
        let single = Polyline::new(vec![Point3::new(1.0, 2.0, 3.0)]);
        assert_eq!(single.sample(3), vec![Point3::new(1.0, 2.0, 3.0); 4]);
        assert_relative_eq!(single.length(), 0.0);
    }
}

//! Constraint functions used by the cable schedule.

use nalgebra::Point3;

use crate::constraint::{ConstraintFunction, WindowContext};
use crate::particles::ParticleBuffer;

/// Distance between the ends of a window of `stride + 1` particles, minus
/// `stride` rest segments.
///
/// Stride 1 keeps neighbours at rest distance, stride 2 resists folding and
/// longer strides add bending stiffness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchFunction {
    stride: usize,
    rest_length: f64,
}

impl StretchFunction {
    /// Stretch function for `stride` segments of `rest_distance` each.
    #[must_use]
    pub fn new(stride: usize, rest_distance: f64) -> Self {
        Self {
            stride,
            rest_length: stride as f64 * rest_distance,
        }
    }

    /// Number of segments spanned.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Window size.
    #[must_use]
    pub const fn cardinality(&self) -> usize {
        self.stride + 1
    }

    /// Target end-to-end distance.
    #[must_use]
    pub const fn rest_length(&self) -> f64 {
        self.rest_length
    }
}

impl ConstraintFunction for StretchFunction {
    fn evaluate(&self, _ctx: &WindowContext<'_>, window: &[Point3<f64>]) -> f64 {
        match (window.first(), window.get(self.stride)) {
            (Some(a), Some(b)) => (b - a).norm() - self.rest_length,
            _ => 0.0,
        }
    }
}

/// Pulls a pinned particle toward its target: `|p - target|`, or 0 when
/// free. Soft pins dragged further than `break_magnitude` are released
/// before projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinFunction {
    break_magnitude: f64,
}

impl PinFunction {
    /// Pin function with the given break distance for soft pins.
    #[must_use]
    pub const fn new(break_magnitude: f64) -> Self {
        Self { break_magnitude }
    }

    /// Break distance for soft pins.
    #[must_use]
    pub const fn break_magnitude(&self) -> f64 {
        self.break_magnitude
    }
}

impl ConstraintFunction for PinFunction {
    fn evaluate(&self, ctx: &WindowContext<'_>, window: &[Point3<f64>]) -> f64 {
        if !ctx.particles.pin(ctx.start).is_pinned() {
            return 0.0;
        }
        match (window.first(), ctx.particles.target(ctx.start)) {
            (Some(p), Some(target)) => (p - target).norm(),
            _ => 0.0,
        }
    }

    fn prepare(&self, start: usize, particles: &mut ParticleBuffer) {
        particles.release_if_stretched(start, self.break_magnitude);
    }
}

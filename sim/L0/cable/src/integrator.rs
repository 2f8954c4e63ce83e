//! Position Verlet integration.
//!
//! ```text
//! x' = x·(2 - d) - x_prev·(1 - d) + a·dt²
//! x_prev' = x
//! ```
//!
//! which is `x + (1 - d)·(x - x_prev) + a·dt²`: the implicit velocity is
//! scaled by `1 - d` every step. Pinned particles receive no gravity.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::particles::ParticleBuffer;

/// Position Verlet integrator with uniform gravity and velocity damping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VerletIntegrator {
    /// Gravitational acceleration (m/s²).
    pub gravity: Vector3<f64>,
    /// Per-step velocity damping, typically in `[0, 0.05]`.
    pub damping: f64,
}

impl Default for VerletIntegrator {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            damping: 0.0,
        }
    }
}

impl VerletIntegrator {
    /// Create an integrator.
    #[must_use]
    pub const fn new(gravity: Vector3<f64>, damping: f64) -> Self {
        Self { gravity, damping }
    }

    /// Advance every particle by one step of length `dt`.
    pub fn integrate(&self, particles: &mut ParticleBuffer, dt: f64) {
        let dt2 = dt * dt;
        let keep = 1.0 - self.damping;
        let (current, previous, pins) = particles.state_mut();

        for ((x, x_prev), pin) in current.iter_mut().zip(previous.iter_mut()).zip(pins) {
            let accel = if pin.is_pinned() { Vector3::zeros() } else { self.gravity };
            let old = *x;
            *x += (old - *x_prev) * keep + accel * dt2;
            *x_prev = old;
        }
    }
}

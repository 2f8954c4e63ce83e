//! Cable configuration.
//!
//! Everything here is fixed at construction except stiffness, solver
//! iterations and max velocity, which the cable also exposes as live setters.

use nalgebra::Vector3;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::collision::Friction;
use crate::constraint::{ComplianceRange, SolveMode};
use crate::derivative::DEFAULT_EPSILON;
use crate::error::{CableError, Result};
use crate::types::CollisionLayers;

/// Iteration count used when `solver_iterations` is 0.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 6;

/// Damping above this is accepted but unusually lossy.
const DAMPING_WARN_THRESHOLD: f64 = 0.05;

/// Largest accepted finite-difference step.
const MAX_PRECISION: f64 = 1e-2;

/// Configuration for a [`Cable`](crate::Cable).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CableConfig {
    /// Number of segments; the cable has `resolution + 1` particles.
    pub resolution: usize,
    /// Collision radius of the cable.
    pub radius: f64,
    /// Per-step velocity damping, typically in `[0, 0.05]`.
    pub damping: f64,
    /// Gravitational acceleration (m/s²).
    pub gravity: Vector3<f64>,
    /// Stiffness blend in `[0, 1]` shared by all constraints.
    pub stiffness: f64,
    /// XPBD when set, plain PBD otherwise.
    pub extended: bool,
    /// Range the stiffness blend maps onto.
    pub compliance: ComplianceRange,
    /// Finite-difference step of the numeric gradients.
    pub precision: f64,
    /// Solver iterations per step; 0 selects [`DEFAULT_SOLVER_ITERATIONS`].
    pub solver_iterations: u32,
    /// Maximum displacement per step; 0 disables the clamp.
    pub max_velocity: f64,
    /// Distance at which a soft pin lets go.
    pub break_magnitude: f64,
    /// Contact friction.
    pub friction: Friction,
    /// Layers the cable collides with.
    pub collision_mask: CollisionLayers,
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            radius: 0.25,
            damping: 0.0,
            gravity: Vector3::new(0.0, -9.81, 0.0),
            stiffness: 0.5,
            extended: true,
            compliance: ComplianceRange::default(),
            precision: DEFAULT_EPSILON,
            solver_iterations: 0,
            max_velocity: 0.0,
            break_magnitude: 1.0,
            friction: Friction::default(),
            collision_mask: CollisionLayers::cable_default(),
        }
    }
}

impl CableConfig {
    /// Thin, floppy rope.
    #[must_use]
    pub fn rope() -> Self {
        Self {
            resolution: 20,
            radius: 0.05,
            damping: 0.01,
            stiffness: 0.1,
            solver_iterations: 10,
            ..Self::default()
        }
    }

    /// Cable that resists bending.
    #[must_use]
    pub fn stiff() -> Self {
        Self {
            damping: 0.01,
            stiffness: 0.9,
            solver_iterations: 20,
            ..Self::default()
        }
    }

    /// Soft, stretchy cable.
    #[must_use]
    pub fn soft() -> Self {
        Self {
            damping: 0.02,
            stiffness: 0.0,
            solver_iterations: 8,
            ..Self::default()
        }
    }

    /// Cheap settings for interactive use.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            resolution: 8,
            damping: 0.02,
            solver_iterations: 4,
            max_velocity: 1.0,
            ..Self::default()
        }
    }

    /// Set the number of segments.
    #[must_use]
    pub const fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the collision radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set damping.
    #[must_use]
    pub const fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set gravity.
    #[must_use]
    pub const fn with_gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set stiffness.
    #[must_use]
    pub const fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Choose between XPBD (`true`) and PBD.
    #[must_use]
    pub const fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Set solver iterations per step.
    #[must_use]
    pub const fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Set the max velocity clamp.
    #[must_use]
    pub const fn with_max_velocity(mut self, max_velocity: f64) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    /// Set friction.
    #[must_use]
    pub const fn with_friction(mut self, friction: Friction) -> Self {
        self.friction = friction;
        self
    }

    /// Solve mode implied by `extended`.
    #[must_use]
    pub const fn solve_mode(&self) -> SolveMode {
        SolveMode::from_extended(self.extended)
    }

    /// Iterations actually run per step.
    #[must_use]
    pub const fn effective_iterations(&self) -> u32 {
        if self.solver_iterations == 0 {
            DEFAULT_SOLVER_ITERATIONS
        } else {
            self.solver_iterations
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<()> {
        if self.resolution < 1 {
            return Err(CableError::TooFewParticles(self.resolution + 1));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(CableError::InvalidRadius(self.radius));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(CableError::InvalidDamping(self.damping));
        }
        if self.damping > DAMPING_WARN_THRESHOLD {
            warn!(damping = self.damping, "Damping above 0.05 dissipates energy quickly");
        }
        if !(0.0..=1.0).contains(&self.stiffness) {
            return Err(CableError::InvalidStiffness(self.stiffness));
        }
        self.compliance.validate()?;
        if !(self.precision.is_finite() && self.precision > 0.0 && self.precision <= MAX_PRECISION) {
            return Err(CableError::InvalidEpsilon(self.precision));
        }
        check_non_negative("max_velocity", self.max_velocity)?;
        check_non_negative("break_magnitude", self.break_magnitude)?;
        check_non_negative("sliding_friction", self.friction.sliding)?;
        check_non_negative("static_friction", self.friction.static_threshold)?;
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(CableError::InvalidParameter {
                name: "gravity",
                value: self.gravity.norm(),
            });
        }
        Ok(())
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CableError::InvalidParameter { name, value })
    }
}

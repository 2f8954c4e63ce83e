//! Position-based cable simulation.
//!
//! This crate simulates a flexible cable as a chain of particles held
//! together by constraints that are solved every step by Gauss-Seidel
//! position projection:
//!
//! - **Verlet integration**: Velocity lives implicitly in the difference
//!   between current and previous positions
//! - **Generic constraints**: Any scalar function of a few consecutive
//!   particles, with gradients by central finite differences
//! - **PBD / XPBD**: Stiffness either scales each correction directly, or
//!   maps to a compliance with accumulated Lagrange multipliers so the
//!   result does not depend on the iteration count
//! - **Grab and pin**: Hard pins, and soft pins that break when dragged too
//!   far
//! - **Collision response**: Segments are pushed out of colliders reported
//!   by an external [`CollisionQuery`], with position-only friction
//!
//! # Constraint Model
//!
//! ```text
//!   x₀ ──── x₁ ──── x₂ ──── x₃ ──── x₄
//!   └─ stretch(1) ┘
//!   └────── stretch(2) ─────┘
//!   └──────────── stretch(stiffness · resolution) ───┘
//! ```
//!
//! A constraint of cardinality `k` is applied to every window
//! `[i, i + k)` that fits in the buffer. Windows that do not fit are skipped.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use nalgebra::{Point3, Vector3};
//! use sim_cable::{Cable, CableBody, CableConfig, ColliderSet, LineSegment};
//!
//! // A rope lying across a sphere.
//! let world = ColliderSet::new().with_sphere(Point3::new(5.0, -2.0, 0.0), 1.5);
//! let curve = LineSegment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
//! let mut cable = Cable::new(&curve, CableConfig::rope(), Arc::new(world)).unwrap();
//!
//! for _ in 0..50 {
//!     cable.step(1.0 / 60.0);
//! }
//! assert_eq!(cable.num_particles(), 21);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. Collision
//! geometry and the seed curve come in through the [`CollisionQuery`] and
//! [`CurveProvider`] traits.

#![doc(html_root_url = "https://docs.rs/sim-cable/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::suboptimal_flops,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod cable;
pub mod collision;
pub mod config;
pub mod constraint;
pub mod curve;
pub mod derivative;
pub mod error;
pub mod functions;
pub mod integrator;
pub mod particles;
pub mod schedule;
pub mod types;

use nalgebra::Point3;

// Re-export main types at crate root
pub use cable::Cable;
pub use collision::{
    Capsule, Collider, ColliderId, ColliderSet, ColliderShape, CollisionQuery, CollisionResponse,
    Friction, NoCollisions, Penetration,
};
pub use config::{CableConfig, DEFAULT_SOLVER_ITERATIONS};
pub use constraint::{
    ComplianceRange, Constraint, ConstraintFunction, ConstraintKind, ConstraintSatisfier,
    DEFAULT_MAX_COMPLIANCE, FnConstraint, SolveMode, WindowContext,
};
pub use curve::{CurveProvider, LineSegment, Polyline, arc_length};
pub use derivative::{DEFAULT_EPSILON, Gradient, PartialDerivative, gradient, partial_derivative};
pub use error::{CableError, Result};
pub use functions::{PinFunction, StretchFunction};
pub use integrator::VerletIntegrator;
pub use particles::ParticleBuffer;
pub use schedule::{ConstraintSchedule, StepStats, stiffness_stride};
pub use types::{CollisionLayers, PinState};

/// What a cable exposes to renderers and grab controllers.
///
/// Grab operations only change pin state. The pin constraint moves the
/// particle during the following steps.
pub trait CableBody {
    /// Current particle positions.
    fn particles(&self) -> &[Point3<f64>];

    /// Number of particles.
    fn num_particles(&self) -> usize;

    /// Collision radius.
    fn radius(&self) -> f64;

    /// Limit per-step particle displacement; 0 disables the limit.
    fn set_max_velocity(&mut self, max_velocity: f64);

    /// Pin particle `index` to `target`. Soft pins break when dragged past
    /// the cable's break magnitude.
    fn set_grab(&mut self, index: usize, target: Point3<f64>, soft: bool) -> Result<()>;

    /// Release particle `index`.
    fn end_grab(&mut self, index: usize) -> Result<()>;

    /// Whether particle `index` is pinned.
    fn is_grabbed(&self, index: usize) -> bool;
}

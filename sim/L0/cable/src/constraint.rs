//! Generic window constraints solved by PBD or XPBD projection.
//!
//! A [`Constraint`] reads and writes `cardinality` consecutive particles. Its
//! [`ConstraintFunction`] maps the window to a scalar violation, zero when
//! satisfied. Unless a custom [`ConstraintSatisfier`] is attached, the
//! correction follows the numeric gradient of that function:
//!
//! ```text
//! ∇ₖ   = ∂C/∂xₖ                     (central differences)
//! sum  = Σ |∇ₖ|²
//! PBD:  s = -k · C / sum
//! XPBD: α̃ = 1 / (dt² · (min + k · (max - min)))
//!       s = (-C - α̃ · λᵢ) / (sum + α̃),   λᵢ += s
//! xₖ  += s · ∇ₖ
//! ```
//!
//! `λᵢ` is one accumulator per window start `i`. It grows over the solver
//! iterations of a frame and is cleared by [`Constraint::reset_lambda`] at
//! frame end, which is what makes XPBD stiffness independent of the
//! iteration count and timestep.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::derivative::{DEFAULT_EPSILON, Gradient};
use crate::error::{CableError, Result};
use crate::particles::ParticleBuffer;

/// Gradient norms below this are treated as zero.
const DEGENERATE_GRADIENT: f64 = 1e-12;

/// Default upper bound of the stiffness term.
pub const DEFAULT_MAX_COMPLIANCE: f64 = 5.0e4;

/// Whether a constraint holds as `C = 0` or `C ≤ 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Always projected.
    #[default]
    Equality,
    /// Skipped while the function is negative.
    Inequality,
}

/// Projection scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolveMode {
    /// Plain position-based dynamics; stiffness scales each correction.
    Pbd,
    /// Extended PBD with per-window Lagrange multipliers.
    #[default]
    Xpbd,
}

impl SolveMode {
    /// `Xpbd` when `extended` is set, otherwise `Pbd`.
    #[must_use]
    pub const fn from_extended(extended: bool) -> Self {
        if extended { Self::Xpbd } else { Self::Pbd }
    }
}

/// Range of the XPBD stiffness term that `stiffness ∈ [0, 1]` blends over.
///
/// Stiffness 0 maps to `min` (softest), 1 to `max` (stiffest). `min` is kept
/// positive so `α̃` stays finite.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComplianceRange {
    /// Stiffness term at stiffness 0.
    pub min: f64,
    /// Stiffness term at stiffness 1.
    pub max: f64,
}

impl Default for ComplianceRange {
    fn default() -> Self {
        Self::from_max(DEFAULT_MAX_COMPLIANCE)
    }
}

impl ComplianceRange {
    /// Range `[max / 100, max]`.
    #[must_use]
    pub fn from_max(max: f64) -> Self {
        Self { min: max / 100.0, max }
    }

    /// Check `0 < min <= max`, both finite.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidCompliance`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max {
            Ok(())
        } else {
            Err(CableError::InvalidCompliance {
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Stiffness term for a blend factor.
    #[must_use]
    pub fn term(&self, stiffness: f64) -> f64 {
        self.min + stiffness * (self.max - self.min)
    }

    /// Time-scaled compliance `α̃` for a blend factor and step.
    #[must_use]
    pub fn alpha_tilde(&self, stiffness: f64, dt: f64) -> f64 {
        1.0 / (dt * dt * self.term(stiffness))
    }
}

/// Read-only view of the particle state handed to constraint functions.
///
/// Positions are passed separately as the window slice, which may be a
/// perturbed copy during differentiation. Functions read only non-position
/// state (pins, targets, history) from here.
#[derive(Debug, Clone, Copy)]
pub struct WindowContext<'a> {
    /// Index of the first particle of the window.
    pub start: usize,
    /// The whole particle buffer.
    pub particles: &'a ParticleBuffer,
}

/// Scalar function of a particle window. Zero means satisfied.
pub trait ConstraintFunction: Send + Sync {
    /// Violation of the window.
    fn evaluate(&self, ctx: &WindowContext<'_>, window: &[Point3<f64>]) -> f64;

    /// Hook run before the window at `start` is projected.
    fn prepare(&self, _start: usize, _particles: &mut ParticleBuffer) {}
}

/// Closure adapter for [`ConstraintFunction`].
pub struct FnConstraint<F>(pub F);

impl<F> ConstraintFunction for FnConstraint<F>
where
    F: Fn(&[Point3<f64>]) -> f64 + Send + Sync,
{
    fn evaluate(&self, _ctx: &WindowContext<'_>, window: &[Point3<f64>]) -> f64 {
        (self.0)(window)
    }
}

/// Direct position correction, replacing the gradient projection.
pub trait ConstraintSatisfier: Send + Sync {
    /// Correct `window` in place. `previous` is the matching slice of
    /// previous positions.
    fn satisfy(&self, start: usize, window: &mut [Point3<f64>], previous: &mut [Point3<f64>]);
}

enum Projection {
    Gradient(Gradient),
    Custom(Box<dyn ConstraintSatisfier>),
}

/// A constraint over every window of `cardinality` consecutive particles.
pub struct Constraint {
    cardinality: usize,
    kind: ConstraintKind,
    mode: SolveMode,
    stiffness: f64,
    compliance: ComplianceRange,
    lambda: Vec<f64>,
    function: Box<dyn ConstraintFunction>,
    projection: Projection,
    window: Vec<Point3<f64>>,
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("cardinality", &self.cardinality)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("stiffness", &self.stiffness)
            .field("windows", &self.lambda.len())
            .finish_non_exhaustive()
    }
}

impl Constraint {
    /// Create an XPBD equality constraint with stiffness 1 for a buffer of
    /// `particle_count` particles.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidArity`] when `cardinality` is zero.
    pub fn new(
        cardinality: usize,
        particle_count: usize,
        function: impl ConstraintFunction + 'static,
    ) -> Result<Self> {
        let gradient = Gradient::new(cardinality, DEFAULT_EPSILON)?;
        let windows = (particle_count + 1).saturating_sub(cardinality);
        Ok(Self {
            cardinality,
            kind: ConstraintKind::Equality,
            mode: SolveMode::Xpbd,
            stiffness: 1.0,
            compliance: ComplianceRange::default(),
            lambda: vec![0.0; windows],
            function: Box::new(function),
            projection: Projection::Gradient(gradient),
            window: Vec::with_capacity(cardinality),
        })
    }

    /// Constraint from a plain closure over the window.
    ///
    /// # Errors
    ///
    /// See [`Constraint::new`].
    pub fn from_fn<F>(cardinality: usize, particle_count: usize, f: F) -> Result<Self>
    where
        F: Fn(&[Point3<f64>]) -> f64 + Send + Sync + 'static,
    {
        Self::new(cardinality, particle_count, FnConstraint(f))
    }

    /// Set the constraint kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ConstraintKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the solve mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SolveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set stiffness.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidStiffness`] outside `[0, 1]`.
    pub fn with_stiffness(mut self, stiffness: f64) -> Result<Self> {
        self.set_stiffness(stiffness)?;
        Ok(self)
    }

    /// Set the compliance range.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidCompliance`] for a bad range.
    pub fn with_compliance(mut self, compliance: ComplianceRange) -> Result<Self> {
        compliance.validate()?;
        self.compliance = compliance;
        Ok(self)
    }

    /// Set the finite-difference step of the numeric gradient. Has no effect
    /// on constraints with a custom satisfier.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidEpsilon`] for a bad step.
    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self> {
        if let Projection::Gradient(gradient) = &mut self.projection {
            *gradient = Gradient::new(self.cardinality, epsilon)?;
        }
        Ok(self)
    }

    /// Replace the gradient projection with a direct satisfier.
    #[must_use]
    pub fn with_satisfier(mut self, satisfier: impl ConstraintSatisfier + 'static) -> Self {
        self.projection = Projection::Custom(Box::new(satisfier));
        self
    }

    /// Number of consecutive particles per window.
    #[must_use]
    pub const fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Constraint kind.
    #[must_use]
    pub const fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// Solve mode.
    #[must_use]
    pub const fn mode(&self) -> SolveMode {
        self.mode
    }

    /// Current stiffness.
    #[must_use]
    pub const fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Change stiffness between steps.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidStiffness`] outside `[0, 1]`.
    pub fn set_stiffness(&mut self, stiffness: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&stiffness) {
            return Err(CableError::InvalidStiffness(stiffness));
        }
        self.stiffness = stiffness;
        Ok(())
    }

    /// Accumulated multipliers, one per window start.
    #[must_use]
    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    /// Clear the multipliers; called once per frame.
    pub fn reset_lambda(&mut self) {
        self.lambda.fill(0.0);
    }

    /// Project the window starting at `start`.
    ///
    /// Returns `|C|` measured before the correction, or 0 when the window
    /// lies outside the buffer or an inequality is already satisfied.
    pub fn project(&mut self, start: usize, particles: &mut ParticleBuffer, dt: f64) -> f64 {
        let Some(end) = start.checked_add(self.cardinality) else {
            return 0.0;
        };
        if end > particles.len() {
            return 0.0;
        }

        self.function.prepare(start, particles);

        let Self {
            kind,
            mode,
            stiffness,
            compliance,
            lambda,
            function,
            projection,
            window,
            ..
        } = self;

        window.clear();
        window.extend_from_slice(&particles.current()[start..end]);

        let ctx = WindowContext { start, particles };
        let value = function.evaluate(&ctx, window);
        if *kind == ConstraintKind::Inequality && value < 0.0 {
            return 0.0;
        }

        match projection {
            Projection::Gradient(gradient) => {
                let grads = gradient.evaluate(|w| function.evaluate(&ctx, w), window);
                let sum: f64 = grads.iter().map(Vector3::norm_squared).sum();
                if sum < DEGENERATE_GRADIENT {
                    return value.abs();
                }

                let s = match mode {
                    SolveMode::Pbd => -*stiffness * value / sum,
                    SolveMode::Xpbd => {
                        let alpha = compliance.alpha_tilde(*stiffness, dt);
                        let Some(acc) = lambda.get_mut(start) else {
                            return value.abs();
                        };
                        let s = (-value - alpha * *acc) / (sum + alpha);
                        *acc += s;
                        s
                    }
                };

                for (p, g) in window.iter_mut().zip(&grads) {
                    *p += g * s;
                }
            }
            Projection::Custom(satisfier) => {
                let previous = &mut particles.previous_mut()[start..end];
                satisfier.satisfy(start, window, previous);
            }
        }

        particles.current_mut()[start..end].copy_from_slice(window);
        value.abs()
    }
}

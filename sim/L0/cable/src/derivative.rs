//! Numeric differentiation of scalar functions over particle windows.
//!
//! Constraint functions map a short window of points to a scalar. Their
//! gradient is approximated by centered finite differences: each of the
//! `3 * arity` coordinates is perturbed by `±epsilon` on a private copy of
//! the window,
//!
//! ```text
//! ∂f/∂x_c ≈ (f(x + ε·e_c) - f(x - ε·e_c)) / 2ε
//! ```
//!
//! so the window passed in is never modified. The cost is `6 * arity`
//! function evaluations per gradient.

use nalgebra::{Point3, Vector3};

use crate::error::{CableError, Result};

/// Default finite-difference step.
pub const DEFAULT_EPSILON: f64 = 1e-4;

fn check_epsilon(epsilon: f64) -> Result<f64> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(epsilon)
    } else {
        Err(CableError::InvalidEpsilon(epsilon))
    }
}

/// Partial derivative with respect to one scalar coordinate of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialDerivative {
    particle: usize,
    axis: usize,
    epsilon: f64,
}

impl PartialDerivative {
    /// Build from a flat coordinate index (`particle * 3 + axis`).
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidEpsilon`] for a non-positive or
    /// non-finite step.
    pub fn new(coordinate: usize, epsilon: f64) -> Result<Self> {
        Ok(Self {
            particle: coordinate / 3,
            axis: coordinate % 3,
            epsilon: check_epsilon(epsilon)?,
        })
    }

    /// Window index of the perturbed particle.
    #[must_use]
    pub const fn particle(&self) -> usize {
        self.particle
    }

    /// Perturbed axis (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub const fn axis(&self) -> usize {
        self.axis
    }

    /// Evaluate the derivative of `f` at `window`.
    ///
    /// A coordinate outside the window contributes zero.
    pub fn evaluate<F>(&self, f: F, window: &[Point3<f64>]) -> f64
    where
        F: Fn(&[Point3<f64>]) -> f64,
    {
        let mut probe = window.to_vec();
        self.evaluate_with(&f, window, &mut probe)
    }

    /// Like [`evaluate`](Self::evaluate), reusing `probe` as scratch space.
    /// `probe` must hold a copy of `window` and is restored on return.
    fn evaluate_with<F>(&self, f: &F, window: &[Point3<f64>], probe: &mut [Point3<f64>]) -> f64
    where
        F: Fn(&[Point3<f64>]) -> f64,
    {
        let Some(base) = window.get(self.particle).map(|p| p[self.axis]) else {
            return 0.0;
        };

        probe[self.particle][self.axis] = base + self.epsilon;
        let forward = f(probe);
        probe[self.particle][self.axis] = base - self.epsilon;
        let backward = f(probe);
        probe[self.particle][self.axis] = base;

        (forward - backward) / (2.0 * self.epsilon)
    }
}

/// Gradient of a window function, one 3D vector per window particle.
///
/// The partial derivatives are built once and reused for every evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    arity: usize,
    epsilon: f64,
    partials: Vec<PartialDerivative>,
}

impl Gradient {
    /// Gradient over a window of `arity` particles.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidArity`] when `arity` is zero and
    /// [`CableError::InvalidEpsilon`] for a bad step.
    pub fn new(arity: usize, epsilon: f64) -> Result<Self> {
        if arity == 0 {
            return Err(CableError::InvalidArity(arity));
        }
        let partials = (0..arity * 3)
            .map(|c| PartialDerivative::new(c, epsilon))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            arity,
            epsilon,
            partials,
        })
    }

    /// Number of particles the gradient covers.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    /// Finite-difference step.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Evaluate the gradient of `f` at `window`.
    ///
    /// The result always has `arity` entries; particles missing from a
    /// short window get a zero vector.
    pub fn evaluate<F>(&self, f: F, window: &[Point3<f64>]) -> Vec<Vector3<f64>>
    where
        F: Fn(&[Point3<f64>]) -> f64,
    {
        let mut probe = window.to_vec();
        let mut out = vec![Vector3::zeros(); self.arity];
        for partial in &self.partials {
            out[partial.particle][partial.axis] = partial.evaluate_with(&f, window, &mut probe);
        }
        out
    }
}

/// Partial derivative of `f` with respect to flat coordinate `coordinate`.
///
/// # Errors
///
/// Returns [`CableError::InvalidEpsilon`] for a bad step.
pub fn partial_derivative<F>(
    f: F,
    coordinate: usize,
    epsilon: f64,
) -> Result<impl Fn(&[Point3<f64>]) -> f64>
where
    F: Fn(&[Point3<f64>]) -> f64,
{
    let partial = PartialDerivative::new(coordinate, epsilon)?;
    Ok(move |window: &[Point3<f64>]| partial.evaluate(&f, window))
}

/// Gradient of `f` over windows of `arity` particles.
///
/// # Errors
///
/// See [`Gradient::new`].
pub fn gradient<F>(
    f: F,
    arity: usize,
    epsilon: f64,
) -> Result<impl Fn(&[Point3<f64>]) -> Vec<Vector3<f64>>>
where
    F: Fn(&[Point3<f64>]) -> f64,
{
    let gradient = Gradient::new(arity, epsilon)?;
    Ok(move |window: &[Point3<f64>]| gradient.evaluate(&f, window))
}

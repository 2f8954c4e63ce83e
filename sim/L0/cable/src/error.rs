//! Error types for cable construction and configuration.
//!
//! Only construction and the grab API can fail. The per-step solver never
//! returns an error: degenerate numerics are skipped locally and windows that
//! fall outside the particle buffer are ignored.

/// Errors that can occur while building or configuring a cable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CableError {
    /// A constraint or gradient must read at least one particle.
    #[error("arity must be at least 1, got {0}")]
    InvalidArity(usize),

    /// Finite-difference step must be finite and positive.
    #[error("finite-difference epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),

    /// Stiffness is a blend factor in `[0, 1]`.
    #[error("stiffness must be in [0, 1], got {0}")]
    InvalidStiffness(f64),

    /// Damping must lie in `[0, 1)`.
    #[error("damping must be in [0, 1), got {0}")]
    InvalidDamping(f64),

    /// Compliance bounds must satisfy `0 < min <= max`.
    #[error("invalid compliance range: min={min}, max={max}")]
    InvalidCompliance {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Cable radius must be finite and non-negative.
    #[error("radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),

    /// A named scalar parameter is out of its accepted range.
    #[error("invalid {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A cable needs at least two particles.
    #[error("a cable needs at least 2 particles, got {0}")]
    TooFewParticles(usize),

    /// Current and previous buffers must have equal length.
    #[error("buffer length mismatch: current={current}, previous={previous}")]
    LengthMismatch {
        /// Length of the current-position buffer.
        current: usize,
        /// Length of the previous-position buffer.
        previous: usize,
    },

    /// The seed curve has zero arc length.
    #[error("seed curve has zero length")]
    DegenerateCurve,

    /// A particle index is outside the buffer.
    #[error("particle {index} out of bounds (cable has {count} particles)")]
    ParticleOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of particles.
        count: usize,
    },
}

/// Result alias for cable operations.
pub type Result<T> = std::result::Result<T, CableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CableError::ParticleOutOfBounds { index: 12, count: 11 };
        assert_eq!(
            err.to_string(),
            "particle 12 out of bounds (cable has 11 particles)"
        );

        let err = CableError::InvalidArity(0);
        assert!(err.to_string().contains("at least 1"));
    }
}

//! The cable simulation object.
//!
//! A [`Cable`] owns its particles, integrator and constraint schedule. The
//! host calls [`Cable::step`] once per fixed timestep:
//!
//! ```text
//! integrate(dt)
//! repeat solver_iterations:
//!     for i in 0..N:
//!         pin, stretch(1), stretch(2), stretch(stiffness stride), collision
//!         clamp velocity
//! reset multipliers
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nalgebra::Point3;
//! use sim_cable::{Cable, CableBody, CableConfig, LineSegment, NoCollisions};
//!
//! let curve = LineSegment::new(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
//! let mut cable = Cable::new(&curve, CableConfig::default(), Arc::new(NoCollisions)).unwrap();
//!
//! cable.set_grab(0, Point3::origin(), false).unwrap();
//! for _ in 0..10 {
//!     cable.step(0.02);
//! }
//! assert_eq!(cable.num_particles(), 11);
//! ```

use std::sync::Arc;

use nalgebra::Point3;
use tracing::{debug, trace, warn};

use crate::CableBody;
use crate::collision::{CollisionQuery, CollisionResponse};
use crate::config::CableConfig;
use crate::curve::{CurveProvider, arc_length};
use crate::error::{CableError, Result};
use crate::integrator::VerletIntegrator;
use crate::particles::ParticleBuffer;
use crate::schedule::{ConstraintSchedule, StepStats};

/// Smallest timestep accepted by [`Cable::step`].
const MIN_TIMESTEP: f64 = 1e-10;

/// Seed curves shorter than this are rejected.
const MIN_CURVE_LENGTH: f64 = 1e-9;

/// A simulated cable.
#[derive(Debug)]
pub struct Cable {
    config: CableConfig,
    particles: ParticleBuffer,
    integrator: VerletIntegrator,
    schedule: ConstraintSchedule,
    rest_distance: f64,
    stats: StepStats,
}

impl Cable {
    /// Create a cable by sampling `curve` at `config.resolution` segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the curve has
    /// zero length.
    pub fn new(
        curve: &impl CurveProvider,
        config: CableConfig,
        collision: Arc<dyn CollisionQuery>,
    ) -> Result<Self> {
        let points = curve.sample(config.resolution);
        Self::from_points(points, config, collision)
    }

    /// Create a cable with one particle per point. `config.resolution` is
    /// replaced by `points.len() - 1`.
    ///
    /// # Errors
    ///
    /// Returns an error for fewer than two points, a zero-length polyline or
    /// an invalid configuration.
    pub fn from_points(
        points: Vec<Point3<f64>>,
        config: CableConfig,
        collision: Arc<dyn CollisionQuery>,
    ) -> Result<Self> {
        let count = points.len();
        if count < 2 {
            return Err(CableError::TooFewParticles(count));
        }
        let config = config.with_resolution(count - 1);
        config.validate()?;

        let length = arc_length(&points);
        if length < MIN_CURVE_LENGTH {
            return Err(CableError::DegenerateCurve);
        }
        let rest_distance = length / config.resolution as f64;

        let response = CollisionResponse::new(
            collision,
            config.radius,
            config.collision_mask,
            config.friction,
        );
        let schedule = ConstraintSchedule::new(count, rest_distance, &config, response)?;

        debug!(
            particles = count,
            rest_distance,
            stiffness = config.stiffness,
            extended = config.extended,
            constraints = schedule.len(),
            "Created cable"
        );

        Ok(Self {
            integrator: VerletIntegrator::new(config.gravity, config.damping),
            particles: ParticleBuffer::new(points),
            schedule,
            rest_distance,
            stats: StepStats::default(),
            config,
        })
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> &StepStats {
        let dt = dt.max(MIN_TIMESTEP);

        self.integrator.integrate(&mut self.particles, dt);
        self.stats = self.schedule.solve(
            &mut self.particles,
            self.config.effective_iterations(),
            dt,
            self.config.max_velocity,
        );

        trace!(
            iterations = self.stats.iterations,
            corrections = self.stats.corrections,
            max_violation = self.stats.max_violation,
            released_pins = self.stats.released_pins,
            "Cable step"
        );
        &self.stats
    }

    /// Configuration, including live changes.
    #[must_use]
    pub const fn config(&self) -> &CableConfig {
        &self.config
    }

    /// Particle state.
    #[must_use]
    pub const fn particle_buffer(&self) -> &ParticleBuffer {
        &self.particles
    }

    /// Statistics from the last step.
    #[must_use]
    pub const fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// Rest distance between neighbouring particles.
    #[must_use]
    pub const fn rest_distance(&self) -> f64 {
        self.rest_distance
    }

    /// Total rest length.
    #[must_use]
    pub fn rest_length(&self) -> f64 {
        self.rest_distance * self.config.resolution as f64
    }

    /// Current length along the particles.
    #[must_use]
    pub fn current_length(&self) -> f64 {
        self.particles.polyline_length()
    }

    /// Current stiffness.
    #[must_use]
    pub const fn stiffness(&self) -> f64 {
        self.config.stiffness
    }

    /// Change stiffness for the next step. Values outside `[0, 1]` are
    /// clamped; non-finite values are ignored.
    ///
    /// # Errors
    ///
    /// Propagates errors from rebuilding the stiffness constraint. On error
    /// neither the configuration nor any constraint has changed.
    pub fn set_stiffness(&mut self, stiffness: f64) -> Result<()> {
        if !stiffness.is_finite() {
            warn!(stiffness, "Ignoring non-finite stiffness");
            return Ok(());
        }
        let clamped = stiffness.clamp(0.0, 1.0);
        if clamped != stiffness {
            warn!(requested = stiffness, clamped, "Stiffness clamped to [0, 1]");
        }
        self.schedule.set_stiffness(clamped)?;
        self.config.stiffness = clamped;
        Ok(())
    }

    /// Solver iterations per step; 0 selects the default.
    pub fn set_solver_iterations(&mut self, iterations: u32) {
        self.config.solver_iterations = iterations;
    }

    /// Iterations the next step will run.
    #[must_use]
    pub const fn solver_iterations(&self) -> u32 {
        self.config.effective_iterations()
    }

    /// Stride of the stiffness constraint, if active.
    #[must_use]
    pub fn bend_stride(&self) -> Option<usize> {
        self.schedule.bend_stride()
    }
}

impl CableBody for Cable {
    fn particles(&self) -> &[Point3<f64>] {
        self.particles.current()
    }

    fn num_particles(&self) -> usize {
        self.particles.len()
    }

    fn radius(&self) -> f64 {
        self.config.radius
    }

    fn set_max_velocity(&mut self, max_velocity: f64) {
        self.config.max_velocity = max_velocity.max(0.0);
    }

    fn set_grab(&mut self, index: usize, target: Point3<f64>, soft: bool) -> Result<()> {
        self.particles.set_grab(index, target, soft)
    }

    fn end_grab(&mut self, index: usize) -> Result<()> {
        self.particles.end_grab(index)
    }

    fn is_grabbed(&self, index: usize) -> bool {
        self.particles.is_grabbed(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::NoCollisions;
    use crate::curve::{LineSegment, Polyline};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn line(length: f64) -> LineSegment {
        LineSegment::new(Point3::origin(), Point3::new(length, 0.0, 0.0))
    }

    fn cable(config: CableConfig) -> Cable {
        Cable::new(&line(10.0), config, Arc::new(NoCollisions)).unwrap()
    }

    #[test]
    fn test_construction() {
        let cable = cable(CableConfig::default());
        assert_eq!(cable.num_particles(), 11);
        assert_relative_eq!(cable.rest_distance(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cable.rest_length(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(cable.current_length(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(cable.radius(), 0.25);
        assert_eq!(cable.bend_stride(), Some(5));
        assert_eq!(cable.solver_iterations(), 6);
    }

    #[test]
    fn test_rest_distance_from_polyline() {
        let curve = Polyline::new(vec![
            Point3::origin(),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
        ]);
        let config = CableConfig::default().with_resolution(6);
        let cable = Cable::new(&curve, config, Arc::new(NoCollisions)).unwrap();
        assert_relative_eq!(cable.rest_distance(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_construction_errors() {
        let points = vec![Point3::origin()];
        let err = Cable::from_points(points, CableConfig::default(), Arc::new(NoCollisions))
            .unwrap_err();
        assert_eq!(err, CableError::TooFewParticles(1));

        let points = vec![Point3::origin(); 3];
        let err = Cable::from_points(points, CableConfig::default(), Arc::new(NoCollisions))
            .unwrap_err();
        assert_eq!(err, CableError::DegenerateCurve);

        let config = CableConfig::default().with_damping(-0.1);
        assert!(Cable::new(&line(1.0), config, Arc::new(NoCollisions)).is_err());
    }

    #[test]
    fn test_free_fall_keeps_shape() {
        let mut cable = cable(CableConfig::default());
        for _ in 0..10 {
            cable.step(0.02);
        }
        let first = cable.particles()[0];
        assert!(first.y < 0.0);
        for p in cable.particles() {
            assert_relative_eq!(p.y, first.y, epsilon = 1e-9);
        }
        assert_relative_eq!(cable.current_length(), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_grab_api() {
        let mut cable = cable(CableConfig::default());
        cable.set_grab(3, Point3::new(3.0, 1.0, 0.0), true).unwrap();
        assert!(cable.is_grabbed(3));
        assert!(!cable.is_grabbed(4));
        cable.end_grab(3).unwrap();
        assert!(!cable.is_grabbed(3));

        assert_eq!(
            cable.set_grab(11, Point3::origin(), false),
            Err(CableError::ParticleOutOfBounds {
                index: 11,
                count: 11
            })
        );
    }

    #[test]
    fn test_live_settings() {
        let mut cable = cable(CableConfig::default());

        cable.set_stiffness(0.8).unwrap();
        assert_relative_eq!(cable.stiffness(), 0.8);
        assert_eq!(cable.bend_stride(), Some(8));

        cable.set_stiffness(3.0).unwrap();
        assert_relative_eq!(cable.stiffness(), 1.0);
        assert_eq!(cable.bend_stride(), Some(10));
        cable.set_stiffness(f64::NAN).unwrap();
        assert_relative_eq!(cable.stiffness(), 1.0);

        cable.set_solver_iterations(15);
        assert_eq!(cable.solver_iterations(), 15);
        cable.set_solver_iterations(0);
        assert_eq!(cable.solver_iterations(), 6);

        cable.set_max_velocity(-1.0);
        assert_relative_eq!(cable.config().max_velocity, 0.0);
    }

    #[test]
    fn test_max_velocity_limits_fall() {
        let config = CableConfig::default().with_gravity(Vector3::new(0.0, -100.0, 0.0));
        let mut cable = cable(config);
        cable.set_max_velocity(0.01);

        for _ in 0..20 {
            cable.step(0.02);
        }
        for i in 0..cable.num_particles() {
            let v = cable.particle_buffer().displacement(i).unwrap();
            assert!(v.norm() <= 0.01 + 1e-9);
        }
    }

    #[test]
    fn test_zero_timestep_is_harmless() {
        let mut cable = cable(CableConfig::default());
        let before = cable.particles().to_vec();
        cable.step(0.0);
        cable.step(-1.0);
        for (a, b) in cable.particles().iter().zip(&before) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}

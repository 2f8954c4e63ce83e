//! The fixed constraint set of a cable and its Gauss-Seidel solve loop.
//!
//! # Order
//!
//! Every solver iteration walks the particles in ascending order and, at each
//! index, projects:
//!
//! 1. pin / grab
//! 2. stretch, stride 1
//! 3. stretch, stride 2 (anti-folding)
//! 4. stretch, stride `round(stiffness · resolution)` when that is ≥ 2
//! 5. collision response
//!
//! followed by the velocity clamp when enabled. Positions updated by one
//! projection are seen by the next one immediately.

use crate::collision::CollisionResponse;
use crate::config::CableConfig;
use crate::constraint::{ComplianceRange, Constraint, ConstraintFunction, SolveMode};
use crate::error::{CableError, Result};
use crate::functions::{PinFunction, StretchFunction};
use crate::particles::ParticleBuffer;

/// Statistics from the last step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    /// Solver iterations run.
    pub iterations: u32,
    /// Window projections that found a non-zero violation.
    pub corrections: usize,
    /// Largest violation seen before correction.
    pub max_violation: f64,
    /// Soft pins released during the step.
    pub released_pins: usize,
}

#[derive(Debug, Clone, Copy)]
struct Template {
    particle_count: usize,
    rest_distance: f64,
    mode: SolveMode,
    compliance: ComplianceRange,
    precision: f64,
}

impl Template {
    fn build(
        &self,
        cardinality: usize,
        stiffness: f64,
        function: impl ConstraintFunction + 'static,
    ) -> Result<Constraint> {
        Constraint::new(cardinality, self.particle_count, function)?
            .with_mode(self.mode)
            .with_compliance(self.compliance)?
            .with_epsilon(self.precision)?
            .with_stiffness(stiffness)
    }

    fn stretch(&self, stride: usize, stiffness: f64) -> Result<Constraint> {
        let function = StretchFunction::new(stride, self.rest_distance);
        self.build(function.cardinality(), stiffness, function)
    }
}

/// Stride of the stiffness stretch constraint.
#[must_use]
pub fn stiffness_stride(stiffness: f64, resolution: usize) -> usize {
    (stiffness * resolution as f64).round().max(0.0) as usize
}

/// Ordered constraints of one cable.
#[derive(Debug)]
pub struct ConstraintSchedule {
    template: Template,
    resolution: usize,
    pin: Constraint,
    stretch: Constraint,
    fold: Constraint,
    bend: Option<(usize, Constraint)>,
    collision: Constraint,
}

impl ConstraintSchedule {
    /// Build the schedule for `particle_count` particles.
    ///
    /// # Errors
    ///
    /// Propagates constraint construction errors for invalid stiffness,
    /// compliance or precision.
    pub fn new(
        particle_count: usize,
        rest_distance: f64,
        config: &CableConfig,
        collision: CollisionResponse,
    ) -> Result<Self> {
        let template = Template {
            particle_count,
            rest_distance,
            mode: config.solve_mode(),
            compliance: config.compliance,
            precision: config.precision,
        };
        let stiffness = config.stiffness;
        let resolution = particle_count.saturating_sub(1);

        let pin = template.build(1, stiffness, PinFunction::new(config.break_magnitude))?;
        let collision = collision
            .into_constraint(particle_count)?
            .with_mode(template.mode)
            .with_compliance(template.compliance)?
            .with_stiffness(stiffness)?;

        let mut schedule = Self {
            pin,
            stretch: template.stretch(1, stiffness)?,
            fold: template.stretch(2, stiffness)?,
            bend: None,
            collision,
            template,
            resolution,
        };
        schedule.set_stiffness(stiffness)?;
        Ok(schedule)
    }

    /// Stride of the stiffness constraint, if present.
    #[must_use]
    pub fn bend_stride(&self) -> Option<usize> {
        self.bend.as_ref().map(|(stride, _)| *stride)
    }

    /// Change stiffness on every constraint, rebuilding the stiffness
    /// constraint when its stride changes.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::InvalidStiffness`](crate::CableError::InvalidStiffness)
    /// outside `[0, 1]`, leaving the schedule unchanged.
    pub fn set_stiffness(&mut self, stiffness: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&stiffness) {
            return Err(CableError::InvalidStiffness(stiffness));
        }

        let stride = stiffness_stride(stiffness, self.resolution);
        let unchanged = matches!(&self.bend, Some((current, _)) if *current == stride);
        if !unchanged {
            // Nothing is mutated until the replacement exists.
            let bend = if stride < 2 {
                None
            } else {
                Some((stride, self.template.stretch(stride, stiffness)?))
            };
            self.bend = bend;
        }

        for constraint in self.iter_mut() {
            constraint.set_stiffness(stiffness)?;
        }
        Ok(())
    }

    /// Constraints in projection order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Constraint> {
        [&mut self.pin, &mut self.stretch, &mut self.fold]
            .into_iter()
            .chain(self.bend.as_mut().map(|(_, c)| c))
            .chain(std::iter::once(&mut self.collision))
    }

    /// Number of active constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        4 + usize::from(self.bend.is_some())
    }

    /// Always false; a schedule has at least four constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Run `iterations` Gauss-Seidel sweeps, then clear the multipliers.
    pub fn solve(
        &mut self,
        particles: &mut ParticleBuffer,
        iterations: u32,
        dt: f64,
        max_velocity: f64,
    ) -> StepStats {
        let mut stats = StepStats {
            iterations,
            ..StepStats::default()
        };

        for _ in 0..iterations {
            for i in 0..particles.len() {
                for constraint in self.iter_mut() {
                    let violation = constraint.project(i, particles, dt);
                    if violation > 0.0 {
                        stats.corrections += 1;
                        stats.max_violation = stats.max_violation.max(violation);
                    }
                }
                if max_velocity > 0.0 {
                    particles.clamp_velocity(i, max_velocity);
                }
            }
        }

        for constraint in self.iter_mut() {
            constraint.reset_lambda();
        }
        stats.released_pins = particles.take_released();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionResponse, Friction, NoCollisions};
    use crate::types::CollisionLayers;
    use nalgebra::Point3;
    use std::sync::Arc;

    fn response() -> CollisionResponse {
        CollisionResponse::new(
            Arc::new(NoCollisions),
            0.25,
            CollisionLayers::default(),
            Friction::default(),
        )
    }

    #[test]
    fn test_stiffness_stride() {
        assert_eq!(stiffness_stride(0.5, 10), 5);
        assert_eq!(stiffness_stride(0.1, 10), 1);
        assert_eq!(stiffness_stride(0.26, 10), 3);
        assert_eq!(stiffness_stride(1.0, 10), 10);
        assert_eq!(stiffness_stride(0.0, 10), 0);
    }

    #[test]
    fn test_schedule_layout() {
        let config = CableConfig::default();
        let schedule = ConstraintSchedule::new(11, 1.0, &config, response()).unwrap();
        assert_eq!(schedule.bend_stride(), Some(5));
        assert_eq!(schedule.len(), 5);

        let config = config.with_stiffness(0.1);
        let mut schedule = ConstraintSchedule::new(11, 1.0, &config, response()).unwrap();
        assert_eq!(schedule.bend_stride(), None);
        let cardinalities: Vec<_> = schedule.iter_mut().map(|c| c.cardinality()).collect();
        assert_eq!(cardinalities, vec![1, 2, 3, 2]);
    }

    #[test]
    fn test_live_stiffness_rebuilds_bend() {
        let config = CableConfig::default().with_stiffness(0.1);
        let mut schedule = ConstraintSchedule::new(11, 1.0, &config, response()).unwrap();

        schedule.set_stiffness(0.8).unwrap();
        assert_eq!(schedule.bend_stride(), Some(8));
        let bend = schedule.iter_mut().nth(3).unwrap();
        assert_eq!(bend.cardinality(), 9);
        assert_eq!(bend.lambda().len(), 3);
        assert!((bend.stiffness() - 0.8).abs() < 1e-12);

        schedule.set_stiffness(0.05).unwrap();
        assert_eq!(schedule.bend_stride(), None);
        assert!(schedule.set_stiffness(2.0).is_err());
    }

    #[test]
    fn test_rejected_stiffness_leaves_schedule_untouched() {
        let config = CableConfig::default().with_stiffness(0.3);
        let mut schedule = ConstraintSchedule::new(11, 1.0, &config, response()).unwrap();

        assert_eq!(
            schedule.set_stiffness(1.5),
            Err(CableError::InvalidStiffness(1.5))
        );
        assert_eq!(schedule.bend_stride(), Some(3));
        for constraint in schedule.iter_mut() {
            assert!((constraint.stiffness() - 0.3).abs() < 1e-12);
        }
    }

    #[test]
    fn test_solve_straightens_line() {
        let config = CableConfig::default()
            .with_stiffness(1.0)
            .with_extended(false);
        let points: Vec<_> = [0.0, 0.5, 2.5, 3.0]
            .iter()
            .map(|x| Point3::new(*x, 0.0, 0.0))
            .collect();
        let mut particles = ParticleBuffer::new(points);
        let mut schedule = ConstraintSchedule::new(4, 1.0, &config, response()).unwrap();

        let stats = schedule.solve(&mut particles, 50, 0.02, 0.0);
        assert_eq!(stats.iterations, 50);
        assert!(stats.corrections > 0);
        // The fold constraint at i = 0 shrinks the wide gap before stride 1 reaches it.
        assert!((stats.max_violation - 0.75).abs() < 1e-9);

        for w in particles.current().windows(2) {
            assert!(((w[1] - w[0]).norm() - 1.0).abs() < 1e-3);
        }
    }
}

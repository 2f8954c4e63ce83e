//! Particle state: current and previous positions plus pin state.
//!
//! Velocity is never stored. It is implied by `current - previous`, which is
//! what the Verlet integrator advances and what friction and the velocity
//! clamp edit.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{CableError, Result};
use crate::types::PinState;

/// Fixed-size particle buffer owned by a single cable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBuffer {
    current: Vec<Point3<f64>>,
    previous: Vec<Point3<f64>>,
    pins: Vec<PinState>,
    targets: Vec<Point3<f64>>,
    released: usize,
}

impl ParticleBuffer {
    /// Create a buffer at rest at `points`.
    #[must_use]
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        let previous = points.clone();
        Self::assemble(points, previous)
    }

    /// Create a buffer with explicit previous positions (i.e. an initial
    /// velocity).
    ///
    /// # Errors
    ///
    /// Returns [`CableError::LengthMismatch`] if the buffers differ in
    /// length.
    pub fn from_parts(current: Vec<Point3<f64>>, previous: Vec<Point3<f64>>) -> Result<Self> {
        if current.len() != previous.len() {
            return Err(CableError::LengthMismatch {
                current: current.len(),
                previous: previous.len(),
            });
        }
        Ok(Self::assemble(current, previous))
    }

    fn assemble(current: Vec<Point3<f64>>, previous: Vec<Point3<f64>>) -> Self {
        let n = current.len();
        Self {
            targets: current.clone(),
            pins: vec![PinState::Free; n],
            current,
            previous,
            released: 0,
        }
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Current positions.
    #[must_use]
    pub fn current(&self) -> &[Point3<f64>] {
        &self.current
    }

    /// Positions one integration step ago.
    #[must_use]
    pub fn previous(&self) -> &[Point3<f64>] {
        &self.previous
    }

    /// Mutable current positions.
    pub fn current_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.current
    }

    /// Mutable previous positions.
    pub fn previous_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.previous
    }

    /// Both position buffers together with the pin states.
    pub fn state_mut(&mut self) -> (&mut [Point3<f64>], &mut [Point3<f64>], &[PinState]) {
        (&mut self.current, &mut self.previous, &self.pins)
    }

    /// Implicit velocity of particle `i` (displacement per step).
    #[must_use]
    pub fn displacement(&self, i: usize) -> Option<Vector3<f64>> {
        Some(self.current.get(i)? - self.previous.get(i)?)
    }

    /// Pin state of particle `i`; out-of-range particles read as free.
    #[must_use]
    pub fn pin(&self, i: usize) -> PinState {
        self.pins.get(i).copied().unwrap_or_default()
    }

    /// Pin target of particle `i`.
    #[must_use]
    pub fn target(&self, i: usize) -> Option<Point3<f64>> {
        self.targets.get(i).copied()
    }

    /// Pin states for all particles.
    #[must_use]
    pub fn pins(&self) -> &[PinState] {
        &self.pins
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(CableError::ParticleOutOfBounds {
                index,
                count: self.len(),
            })
        }
    }

    /// Pin particle `index` to `target`. Positions are not touched; the pin
    /// constraint pulls the particle over the following steps.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::ParticleOutOfBounds`] for a bad index.
    pub fn set_grab(&mut self, index: usize, target: Point3<f64>, soft: bool) -> Result<()> {
        self.check_index(index)?;
        self.pins[index] = PinState::from_soft(soft);
        self.targets[index] = target;
        Ok(())
    }

    /// Release particle `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::ParticleOutOfBounds`] for a bad index.
    pub fn end_grab(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.pins[index] = PinState::Free;
        Ok(())
    }

    /// Whether particle `index` is held by a pin.
    #[must_use]
    pub fn is_grabbed(&self, index: usize) -> bool {
        self.pin(index).is_pinned()
    }

    /// Release a soft pin that has been dragged further than
    /// `break_magnitude` from its target. Returns `true` if it broke.
    pub fn release_if_stretched(&mut self, index: usize, break_magnitude: f64) -> bool {
        if self.pin(index) != PinState::SoftPinned {
            return false;
        }
        let distance = (self.current[index] - self.targets[index]).norm();
        if distance <= break_magnitude {
            return false;
        }
        self.pins[index] = PinState::Free;
        self.released += 1;
        debug!(particle = index, distance, break_magnitude, "Soft pin released");
        true
    }

    /// Number of pins released since the last call.
    pub fn take_released(&mut self) -> usize {
        std::mem::take(&mut self.released)
    }

    /// Limit the implicit velocity of particle `index` to `max` per step by
    /// moving its previous position.
    pub fn clamp_velocity(&mut self, index: usize, max: f64) {
        let Some(displacement) = self.displacement(index) else {
            return;
        };
        let speed = displacement.norm();
        if speed > max && speed > 0.0 {
            self.previous[index] = self.current[index] - displacement * (max / speed);
        }
    }

    /// Sum of distances between consecutive particles.
    #[must_use]
    pub fn polyline_length(&self) -> f64 {
        self.current.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }
}

//! Collision queries and the collision response constraint.
//!
//! The cable does not own any collision geometry. It asks a
//! [`CollisionQuery`] which colliders overlap the capsule swept by a cable
//! segment and how deep it penetrates each of them, then pushes the segment
//! out along the summed correction.
//!
//! [`ColliderSet`] is a small static world of spheres and half-spaces that
//! implements the query; [`NoCollisions`] is the empty world.
//!
//! # Friction
//!
//! Friction only edits previous positions. With `t` the tangential part of
//! the implicit velocity relative to the contact direction:
//!
//! ```text
//! |t| < static_threshold  →  x_prev = x            (stick)
//! otherwise               →  x_prev += t̂ · min(μ·depth, |t|)   (slide)
//! ```

use std::sync::Arc;

use nalgebra::{Point3, Unit, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraint::{
    Constraint, ConstraintFunction, ConstraintKind, ConstraintSatisfier, WindowContext,
};
use crate::error::Result;
use crate::types::CollisionLayers;

/// Squared lengths below this are treated as degenerate.
const GEOM_EPSILON: f64 = 1e-10;

/// Opaque handle to a collider owned by a [`CollisionQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColliderId(pub usize);

/// Segment with a radius, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capsule {
    /// First end point.
    pub start: Point3<f64>,
    /// Second end point.
    pub end: Point3<f64>,
    /// Radius.
    pub radius: f64,
}

impl Capsule {
    /// Create a capsule.
    #[must_use]
    pub const fn new(start: Point3<f64>, end: Point3<f64>, radius: f64) -> Self {
        Self { start, end, radius }
    }

    /// Closest point on the capsule axis to `p`.
    #[must_use]
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let ab = self.end - self.start;
        let len_sq = ab.norm_squared();
        if len_sq < GEOM_EPSILON {
            return self.start;
        }
        let t = ((p - self.start).dot(&ab) / len_sq).clamp(0.0, 1.0);
        self.start + ab * t
    }
}

/// How far, and in which direction, a capsule must move to stop overlapping
/// a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Penetration {
    /// Direction that separates the capsule from the collider.
    pub direction: Unit<Vector3<f64>>,
    /// Depth along `direction` (≥ 0).
    pub distance: f64,
}

impl Penetration {
    /// Translation that resolves this penetration.
    #[must_use]
    pub fn correction(&self) -> Vector3<f64> {
        self.direction.into_inner() * self.distance
    }
}

/// Collision capability consumed by the cable.
pub trait CollisionQuery: Send + Sync {
    /// Colliders on `mask` layers that overlap `capsule`.
    fn overlap_capsule(&self, capsule: &Capsule, mask: CollisionLayers) -> Vec<ColliderId>;

    /// Penetration of `capsule` into `collider`, or `None` when they do not
    /// overlap.
    fn compute_penetration(&self, capsule: &Capsule, collider: ColliderId) -> Option<Penetration>;
}

/// A world with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollisions;

impl CollisionQuery for NoCollisions {
    fn overlap_capsule(&self, _capsule: &Capsule, _mask: CollisionLayers) -> Vec<ColliderId> {
        Vec::new()
    }

    fn compute_penetration(&self, _capsule: &Capsule, _collider: ColliderId) -> Option<Penetration> {
        None
    }
}

/// Shape of a [`ColliderSet`] entry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColliderShape {
    /// Solid sphere.
    Sphere {
        /// Center.
        center: Point3<f64>,
        /// Radius.
        radius: f64,
    },
    /// Everything below the plane `normal · p = offset`.
    HalfSpace {
        /// Outward plane normal.
        normal: Unit<Vector3<f64>>,
        /// Plane offset along the normal.
        offset: f64,
    },
}

impl ColliderShape {
    /// Penetration of `capsule` into this shape.
    #[must_use]
    pub fn penetration(&self, capsule: &Capsule) -> Option<Penetration> {
        match *self {
            Self::Sphere { center, radius } => {
                let closest = capsule.closest_point(&center);
                let diff = closest - center;
                let dist = diff.norm();
                let depth = radius + capsule.radius - dist;
                if depth <= 0.0 {
                    return None;
                }
                // Center on the capsule axis: push up.
                let direction = if dist > GEOM_EPSILON {
                    Unit::new_unchecked(diff / dist)
                } else {
                    Vector3::y_axis()
                };
                Some(Penetration {
                    direction,
                    distance: depth,
                })
            }
            Self::HalfSpace { normal, offset } => {
                let lowest = normal
                    .dot(&capsule.start.coords)
                    .min(normal.dot(&capsule.end.coords));
                let depth = capsule.radius - (lowest - offset);
                (depth > 0.0).then_some(Penetration {
                    direction: normal,
                    distance: depth,
                })
            }
        }
    }
}

/// Collider entry: a shape and the layers it lives on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Collider {
    /// Geometry.
    pub shape: ColliderShape,
    /// Layers the collider belongs to.
    pub layers: CollisionLayers,
}

/// Static set of analytic colliders.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColliderSet {
    colliders: Vec<Collider>,
}

impl ColliderSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collider and return its handle.
    pub fn insert(&mut self, shape: ColliderShape, layers: CollisionLayers) -> ColliderId {
        self.colliders.push(Collider { shape, layers });
        ColliderId(self.colliders.len() - 1)
    }

    /// Add a static sphere.
    #[must_use]
    pub fn with_sphere(mut self, center: Point3<f64>, radius: f64) -> Self {
        self.insert(
            ColliderShape::Sphere { center, radius },
            CollisionLayers::STATIC,
        );
        self
    }

    /// Add a static ground half-space.
    #[must_use]
    pub fn with_half_space(mut self, normal: Unit<Vector3<f64>>, offset: f64) -> Self {
        self.insert(
            ColliderShape::HalfSpace { normal, offset },
            CollisionLayers::STATIC,
        );
        self
    }

    /// Collider by handle.
    #[must_use]
    pub fn get(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(id.0)
    }

    /// Number of colliders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl CollisionQuery for ColliderSet {
    fn overlap_capsule(&self, capsule: &Capsule, mask: CollisionLayers) -> Vec<ColliderId> {
        self.colliders
            .iter()
            .enumerate()
            .filter(|(_, c)| c.layers.intersects(mask) && c.shape.penetration(capsule).is_some())
            .map(|(i, _)| ColliderId(i))
            .collect()
    }

    fn compute_penetration(&self, capsule: &Capsule, collider: ColliderId) -> Option<Penetration> {
        self.get(collider)?.shape.penetration(capsule)
    }
}

/// Position-only friction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Friction {
    /// Tangential slowdown per unit of penetration depth.
    pub sliding: f64,
    /// Tangential displacement per step below which a contact sticks.
    pub static_threshold: f64,
}

impl Default for Friction {
    fn default() -> Self {
        Self {
            sliding: 0.25,
            static_threshold: 0.01,
        }
    }
}

impl Friction {
    /// Apply friction for one contact to a particle's previous position.
    pub fn apply(&self, current: &Point3<f64>, previous: &mut Point3<f64>, contact: &Penetration) {
        let velocity = current - *previous;
        let normal = contact.direction.into_inner();
        let tangent = velocity - normal * normal.dot(&velocity);
        let speed = tangent.norm();

        if speed < self.static_threshold {
            *previous = *current;
        } else {
            let slowdown = (self.sliding * contact.distance).min(speed);
            *previous += tangent * (slowdown / speed);
        }
    }
}

/// Collision response for cable segments.
///
/// Used both as the constraint function (summed correction magnitude) and as
/// the satisfier that applies the correction and friction.
#[derive(Clone)]
pub struct CollisionResponse {
    query: Arc<dyn CollisionQuery>,
    radius: f64,
    mask: CollisionLayers,
    friction: Friction,
}

impl std::fmt::Debug for CollisionResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionResponse")
            .field("radius", &self.radius)
            .field("mask", &self.mask)
            .field("friction", &self.friction)
            .finish_non_exhaustive()
    }
}

impl CollisionResponse {
    /// Response for segments of the given radius.
    #[must_use]
    pub fn new(
        query: Arc<dyn CollisionQuery>,
        radius: f64,
        mask: CollisionLayers,
        friction: Friction,
    ) -> Self {
        Self {
            query,
            radius,
            mask,
            friction,
        }
    }

    /// Inequality constraint over segment windows using this response for
    /// both evaluation and correction.
    ///
    /// # Errors
    ///
    /// Propagates constraint construction errors.
    pub fn into_constraint(self, particle_count: usize) -> Result<Constraint> {
        Ok(Constraint::new(2, particle_count, self.clone())?
            .with_kind(ConstraintKind::Inequality)
            .with_satisfier(self))
    }

    fn capsule(&self, window: &[Point3<f64>]) -> Option<Capsule> {
        Some(Capsule::new(*window.first()?, *window.last()?, self.radius))
    }

    /// Penetrations of the capsule spanned by `window`.
    #[must_use]
    pub fn penetrations(&self, window: &[Point3<f64>]) -> Vec<Penetration> {
        let Some(capsule) = self.capsule(window) else {
            return Vec::new();
        };
        self.query
            .overlap_capsule(&capsule, self.mask)
            .into_iter()
            .filter_map(|id| self.query.compute_penetration(&capsule, id))
            .collect()
    }
}

impl ConstraintFunction for CollisionResponse {
    fn evaluate(&self, _ctx: &WindowContext<'_>, window: &[Point3<f64>]) -> f64 {
        self.penetrations(window)
            .iter()
            .map(Penetration::correction)
            .sum::<Vector3<f64>>()
            .norm()
    }
}

impl ConstraintSatisfier for CollisionResponse {
    fn satisfy(&self, _start: usize, window: &mut [Point3<f64>], previous: &mut [Point3<f64>]) {
        let contacts = self.penetrations(window);
        if contacts.is_empty() {
            return;
        }

        let correction: Vector3<f64> = contacts.iter().map(Penetration::correction).sum();
        for p in window.iter_mut() {
            *p += correction;
        }

        for (p, q) in window.iter().zip(previous.iter_mut()) {
            for contact in &contacts {
                self.friction.apply(p, q, contact);
            }
        }
    }
}

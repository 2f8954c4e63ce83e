//! Small shared types.
//!
//! - [`PinState`] - Grab/pin state of a particle
//! - [`CollisionLayers`] - Layer mask used to filter collision queries

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a particle is held by a grab controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PinState {
    /// Not held.
    #[default]
    Free,
    /// Held, but released once dragged past the break magnitude.
    SoftPinned,
    /// Held until explicitly released.
    HardPinned,
}

impl PinState {
    /// Whether the particle is held by either kind of pin.
    #[must_use]
    pub const fn is_pinned(self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Pin state for a grab request.
    #[must_use]
    pub const fn from_soft(soft: bool) -> Self {
        if soft { Self::SoftPinned } else { Self::HardPinned }
    }
}

bitflags::bitflags! {
    /// Collision layers. A collider is considered by a query when its
    /// layers intersect the query mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct CollisionLayers: u32 {
        /// Static world geometry.
        const STATIC = 0b0000_0001;
        /// Moving bodies.
        const DYNAMIC = 0b0000_0010;
        /// Other cables.
        const CABLE = 0b0000_0100;
        /// Colliders that cables never touch.
        const IGNORE = 0b1000_0000;
    }
}

impl CollisionLayers {
    /// Every layer except [`CollisionLayers::IGNORE`].
    #[must_use]
    pub const fn cable_default() -> Self {
        Self::all().difference(Self::IGNORE)
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::cable_default()
    }
}

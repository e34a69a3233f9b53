//! Collision filtering.
//!
//! Every body carries a `(group, mask)` bitmask pair: `group` says what the
//! body is, `mask` says what it interacts with. The registry is a pure
//! lookup consulted once at character creation and by ray queries; it never
//! fails; an unteamed character simply resolves through [`Team::None`].

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Collision categories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Layer: u32 {
        /// Static and kinematic level geometry.
        const WORLD = 1 << 0;
        /// Any character body.
        const CHARACTER = 1 << 1;
        /// Marker for characters without a team.
        const NO_TEAM = 1 << 2;
        /// Team Alpha marker.
        const TEAM_A = 1 << 3;
        /// Team Bravo marker.
        const TEAM_B = 1 << 4;
    }
}

/// Team affiliation. `None` is the fallback for anything unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Team {
    #[default]
    None,
    Alpha,
    Bravo,
}

impl Team {
    fn marker(self) -> Layer {
        match self {
            Team::None => Layer::NO_TEAM,
            Team::Alpha => Layer::TEAM_A,
            Team::Bravo => Layer::TEAM_B,
        }
    }
}

/// An immutable (group, mask) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: Layer,
    pub mask: Layer,
}

impl CollisionFilter {
    /// True when two filters agree to interact (both directions).
    pub fn interacts_with(self, other: CollisionFilter) -> bool {
        self.mask.intersects(other.group) && other.mask.intersects(self.group)
    }
}

/// Resolves the filter for a character of `team`.
///
/// The `is_self` variant collapses the mask to WORLD only; it is used for
/// objects a character emits (grenades, dropped items) so they do not
/// immediately re-collide with their emitter.
pub fn resolve(team: Team, is_self: bool) -> CollisionFilter {
    let group = Layer::CHARACTER | team.marker();
    let mask = if is_self {
        Layer::WORLD
    } else {
        Layer::WORLD | Layer::CHARACTER | Layer::NO_TEAM | Layer::TEAM_A | Layer::TEAM_B
    };
    CollisionFilter { group, mask }
}

/// Filter for level geometry bodies: WORLD group, interacts with everything.
pub fn world_geometry() -> CollisionFilter {
    CollisionFilter {
        group: Layer::WORLD,
        mask: Layer::all(),
    }
}

/// Query filter for ground/ceiling probes: hits WORLD geometry only, so
/// probes pass through other characters and projectiles.
pub fn world_probe() -> CollisionFilter {
    CollisionFilter {
        group: Layer::CHARACTER,
        mask: Layer::WORLD,
    }
}

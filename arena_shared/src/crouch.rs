//! Crouch state machine.
//!
//! Crouching is continuous: the body collider's vertical half-extent walks
//! toward the stance target by a fixed step each tick. The shape offset is
//! always recomputed as the negative half-extent, anchoring the collider's
//! top edge at the neck origin, so the bottom edge is what extends and
//! retracts (and it moves by twice the step, since the offset compensates).

use crate::character::Character;
use crate::math::Vec3;
use crate::physics::{PhysicsWorld, ShapeDesc};
use crate::probe;

/// Half-extent change per tick.
pub const CROUCH_STEP: f32 = 0.05;

/// Advances the crouch interpolation one tick.
///
/// Holding crouch always targets the crouched height. Releasing it only
/// targets standing height once the ceiling probe reports clearance; any
/// obstruction keeps the character crouched at full crouch depth.
pub fn update(ch: &mut Character, physics: &mut dyn PhysicsWorld, crouch_held: bool) {
    let stand_half = ch.config.body_height * 0.5;
    let crouch_half = ch.config.crouch_height * 0.5;

    let target = if crouch_held {
        ch.crouched = true;
        crouch_half
    } else if ch.crouched && probe::ceiling_blocked(ch, physics) {
        crouch_half
    } else {
        stand_half
    };

    if ch.half_height < target {
        ch.half_height = (ch.half_height + CROUCH_STEP).min(target);
    } else if ch.half_height > target {
        ch.half_height = (ch.half_height - CROUCH_STEP).max(target);
    }

    if target == stand_half && ch.half_height == stand_half {
        ch.crouched = false;
    }

    let half_w = ch.config.body_width * 0.5;
    physics.set_shape(
        ch.body,
        ch.body_shape,
        ShapeDesc {
            half_extents: Vec3::new(half_w, half_w, ch.half_height),
            offset: Vec3::new(0.0, 0.0, -ch.half_height),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterConfig, CharacterId};
    use crate::filter::Team;
    use crate::physics::FlatWorld;

    fn spawn_standing(world: &mut FlatWorld) -> Character {
        world.add_ground_plane(0.0);
        Character::spawn(
            CharacterId(1),
            None,
            Team::None,
            CharacterConfig::default(),
            world,
            Vec3::new(0.0, 0.0, 0.9),
            Vec::new(),
        )
    }

    #[test]
    fn holding_crouch_shrinks_monotonically_to_the_crouch_bound() {
        let mut world = FlatWorld::new();
        let mut ch = spawn_standing(&mut world);
        let crouch_half = ch.config.crouch_height * 0.5;
        let stand_half = ch.config.body_height * 0.5;

        let mut prev = ch.half_height;
        for _ in 0..100 {
            update(&mut ch, &mut world, true);
            assert!(ch.half_height <= prev, "shrink must be monotonic");
            assert!(ch.half_height >= crouch_half - 1e-6);
            assert!(ch.half_height <= stand_half + 1e-6);
            prev = ch.half_height;
        }
        assert_eq!(ch.half_height, crouch_half);
        assert!(ch.crouched);
    }

    #[test]
    fn releasing_crouch_grows_back_and_clears_the_flag() {
        let mut world = FlatWorld::new();
        let mut ch = spawn_standing(&mut world);
        for _ in 0..100 {
            update(&mut ch, &mut world, true);
        }
        assert!(ch.crouched);

        let mut prev = ch.half_height;
        for _ in 0..100 {
            update(&mut ch, &mut world, false);
            assert!(ch.half_height >= prev, "growth must be monotonic");
            prev = ch.half_height;
        }
        assert_eq!(ch.half_height, ch.config.body_height * 0.5);
        assert!(!ch.crouched);
    }

    #[test]
    fn crouch_flag_sets_immediately_on_hold() {
        let mut world = FlatWorld::new();
        let mut ch = spawn_standing(&mut world);
        update(&mut ch, &mut world, true);
        assert!(ch.crouched);
        // still interpolating, nowhere near the bound yet
        assert!(ch.half_height > ch.config.crouch_height * 0.5);
    }

    #[test]
    fn obstructed_ceiling_keeps_the_character_crouched() {
        let mut world = FlatWorld::new();
        let mut ch = spawn_standing(&mut world);
        for _ in 0..100 {
            update(&mut ch, &mut world, true);
        }

        // a slab right above the head blocks standing
        let pos = world.position(ch.body);
        world.add_block(
            Vec3::new(pos.x, pos.y, pos.z + ch.config.head_size + 0.1),
            Vec3::new(2.0, 2.0, 0.05),
        );

        for _ in 0..20 {
            update(&mut ch, &mut world, false);
        }
        assert!(ch.crouched);
        assert_eq!(ch.half_height, ch.config.crouch_height * 0.5);
    }

    #[test]
    fn collider_top_stays_anchored_while_resizing() {
        let mut world = FlatWorld::new();
        let mut ch = spawn_standing(&mut world);
        for _ in 0..3 {
            update(&mut ch, &mut world, true);
        }
        // offset compensates the half-extent exactly: top = origin
        // (observable through the character's own bookkeeping)
        assert!(ch.half_height < ch.config.body_height * 0.5);
        // the collider base rose by twice the shrink of the half-extent
        let base = world.position(ch.body).z - 2.0 * ch.half_height;
        let expected = world.position(ch.body).z - ch.config.body_height + 2.0 * 3.0 * CROUCH_STEP;
        assert!((base - expected).abs() < 1e-5);
    }
}

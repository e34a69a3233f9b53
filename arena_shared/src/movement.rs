//! Movement integration.
//!
//! Converts the per-tick movement axis and jump flag into rigid-body
//! velocity. The axis is clamped to unit length before scaling so diagonal
//! input can never exceed the configured speed. Vertical velocity carries
//! over from the previous tick unless a jump fires. While airborne, the new
//! horizontal velocity is averaged with the previous tick's, which smooths
//! mid-air direction changes and blunts instant strafing.

use crate::character::{Character, JUMP_WINDOW_TICKS};
use crate::math::{Vec2, Vec3};
use crate::physics::PhysicsWorld;

/// Integrates one tick of movement input into the body's velocity.
pub fn integrate(ch: &mut Character, physics: &mut dyn PhysicsWorld, axis: Vec2, jump: bool) {
    if jump {
        ch.jump_timer = JUMP_WINDOW_TICKS;
    }

    let mut axis = axis;
    let len_sq = axis.len_sq();
    if len_sq > 1.0 {
        let len = len_sq.sqrt();
        axis.x /= len;
        axis.y /= len;
    }

    // rotate the local axis into world space about +Z
    let (sin, cos) = ch.orientation.yaw.sin_cos();
    let speed = ch.speed();
    let mut vx = (axis.x * cos - axis.y * sin) * speed;
    let mut vy = (axis.x * sin + axis.y * cos) * speed;

    let prev = physics.velocity(ch.body);
    let mut vz = prev.z;

    if ch.grounded && ch.jump_timer > 0 {
        vz = ch.config.jump_force;
        ch.jump_timer = 0;
    } else {
        ch.jump_timer = ch.jump_timer.saturating_sub(1);
        if !ch.grounded {
            vx = (vx + prev.x) * 0.5;
            vy = (vy + prev.y) * 0.5;
        }
    }

    physics.set_velocity(ch.body, Vec3::new(vx, vy, vz));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterConfig, CharacterId};
    use crate::filter::Team;
    use crate::physics::FlatWorld;

    fn spawn(world: &mut FlatWorld) -> Character {
        Character::spawn(
            CharacterId(1),
            None,
            Team::None,
            CharacterConfig::default(),
            world,
            Vec3::ZERO,
            Vec::new(),
        )
    }

    #[test]
    fn oversized_axis_is_clamped_to_unit_speed() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;

        integrate(&mut ch, &mut world, Vec2::new(1.0, 1.0), false);
        let v = world.velocity(ch.body);
        let speed = (v.x * v.x + v.y * v.y).sqrt();
        assert!((speed - ch.config.walk_speed).abs() < 1e-4);
    }

    #[test]
    fn unit_or_smaller_axis_is_unchanged() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;

        integrate(&mut ch, &mut world, Vec2::new(0.5, 0.0), false);
        let v = world.velocity(ch.body);
        assert!((v.x - 0.5 * ch.config.walk_speed).abs() < 1e-4);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn yaw_rotates_axis_into_world_space() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;
        ch.orientation.yaw = std::f32::consts::FRAC_PI_2;

        integrate(&mut ch, &mut world, Vec2::new(1.0, 0.0), false);
        let v = world.velocity(ch.body);
        assert!(v.x.abs() < 1e-4);
        assert!((v.y - ch.config.walk_speed).abs() < 1e-4);
    }

    #[test]
    fn crouched_characters_move_at_crouch_speed() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;
        ch.crouched = true;

        integrate(&mut ch, &mut world, Vec2::new(1.0, 0.0), false);
        let v = world.velocity(ch.body);
        assert!((v.x - ch.config.crouch_speed).abs() < 1e-4);
    }

    #[test]
    fn jump_fires_once_per_press() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;
        ch.jump_timer = 1;

        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        assert_eq!(world.velocity(ch.body).z, ch.config.jump_force);
        assert_eq!(ch.jump_timer, 0);

        // next tick, no new press: still grounded, timer exhausted
        world.set_velocity(ch.body, Vec3::ZERO);
        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        assert_eq!(world.velocity(ch.body).z, 0.0);
    }

    #[test]
    fn jump_press_waits_for_ground_within_window() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = false;

        integrate(&mut ch, &mut world, Vec2::ZERO, true);
        assert_eq!(ch.jump_timer, JUMP_WINDOW_TICKS - 1);
        assert_eq!(world.velocity(ch.body).z, 0.0);

        // lands three ticks later, press still inside the window
        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        ch.grounded = true;
        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        assert_eq!(world.velocity(ch.body).z, ch.config.jump_force);
        assert_eq!(ch.jump_timer, 0);
    }

    #[test]
    fn jump_timer_never_underflows() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        for _ in 0..20 {
            integrate(&mut ch, &mut world, Vec2::ZERO, false);
        }
        assert_eq!(ch.jump_timer, 0);
    }

    #[test]
    fn airborne_horizontal_velocity_is_blended() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = false;
        world.set_velocity(ch.body, Vec3::new(4.0, 0.0, -1.0));

        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        let v = world.velocity(ch.body);
        // zero wish input averages against the carried velocity
        assert!((v.x - 2.0).abs() < 1e-4);
        assert_eq!(v.z, -1.0);
    }

    #[test]
    fn grounded_horizontal_velocity_is_replaced() {
        let mut world = FlatWorld::new();
        let mut ch = spawn(&mut world);
        ch.grounded = true;
        world.set_velocity(ch.body, Vec3::new(4.0, 4.0, 0.0));

        integrate(&mut ch, &mut world, Vec2::ZERO, false);
        let v = world.velocity(ch.body);
        assert_eq!(v.x, 0.0);
        assert_eq!(v.y, 0.0);
    }
}

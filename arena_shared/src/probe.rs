//! Ground and ceiling probing.
//!
//! Five footprint points sample support under the collider base and
//! clearance above the head. Ground probing is short-circuit: the first
//! walkable contact wins, in a fixed order (center, then corners), so the
//! result is deterministic across client and server. Ceiling probing has
//! the opposite shape: every point is evaluated, because any single
//! obstruction is enough to keep a character crouched.

use crate::character::Character;
use crate::filter;
use crate::math::Vec3;
use crate::physics::{BodyKind, PhysicsWorld};
use crate::platform::PlatformAttachment;

/// Ray length below the collider base / above the head top.
pub const PROBE_PADDING: f32 = 0.2;

/// Maximum surface-normal angle from vertical still considered walkable.
pub const WALKABLE_SLOPE_DEG: f32 = 50.0;

/// Re-evaluates ground support and platform attachment.
///
/// Runs after the physics step. Updates `grounded` and creates, keeps, or
/// clears the platform attachment depending on what the winning probe hit.
pub fn ground_check(ch: &mut Character, physics: &mut dyn PhysicsWorld) {
    let pos = physics.position(ch.body);
    let base = pos.z - 2.0 * ch.half_height;
    let cos_limit = WALKABLE_SLOPE_DEG.to_radians().cos();
    let probe_filter = filter::world_probe();

    for offset in ch.probe_offsets {
        let origin = Vec3::new(pos.x + offset.x, pos.y + offset.y, base);
        let Some(hit) = physics.cast_ray(origin, -Vec3::UP, PROBE_PADDING, probe_filter) else {
            continue;
        };
        if hit.normal.dot(Vec3::UP) < cos_limit {
            // too steep to stand on; keep scanning the remaining probes
            continue;
        }

        ch.grounded = true;
        if physics.body_kind(hit.body) == BodyKind::Kinematic {
            let changed = ch.platform.as_ref().map_or(true, |a| a.platform != hit.body);
            if changed {
                ch.platform = Some(PlatformAttachment::record(hit.body, physics));
            }
        } else {
            ch.platform = None;
        }
        return;
    }

    ch.grounded = false;
    ch.platform = None;
}

/// True when anything above the head blocks standing up.
///
/// All five probes are cast; a single hit anywhere disqualifies.
pub fn ceiling_blocked(ch: &Character, physics: &mut dyn PhysicsWorld) -> bool {
    let pos = physics.position(ch.body);
    let top = pos.z + ch.config.head_size;
    let probe_filter = filter::world_probe();

    let mut blocked = false;
    for offset in ch.probe_offsets {
        let origin = Vec3::new(pos.x + offset.x, pos.y + offset.y, top);
        if physics
            .cast_ray(origin, Vec3::UP, PROBE_PADDING, probe_filter)
            .is_some()
        {
            blocked = true;
        }
    }
    blocked
}

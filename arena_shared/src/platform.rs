//! Moving-platform reconciliation.
//!
//! The physics step advances kinematic platforms but knows nothing about
//! riders: the character's body is a free dynamic body. The tracker closes
//! that gap in two phases. [`PlatformAttachment::record`] captures the
//! platform's transform at the moment of attachment; [`apply_drift`] runs
//! strictly after the physics step, reprojects the character through the
//! platform's new transform, adds the yaw delta to the character's logical
//! orientation (the body itself stays rotation-locked), and refreshes the
//! record for the next tick.

use crate::character::Character;
use crate::math::{rotate_yaw, wrap_angle};
use crate::physics::{BodyHandle, PhysicsWorld};

/// Pose of a platform at the last reconcile, used to derive per-tick drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformAttachment {
    pub platform: BodyHandle,
    platform_pos: crate::math::Vec3,
    platform_yaw: f32,
}

impl PlatformAttachment {
    /// Captures the platform's current transform.
    pub fn record(platform: BodyHandle, physics: &dyn PhysicsWorld) -> Self {
        Self {
            platform,
            platform_pos: physics.position(platform),
            platform_yaw: physics.yaw(platform),
        }
    }
}

/// Applies the platform's motion since the last reconcile to the character.
///
/// No-op when the character is not attached to a platform. The character's
/// offset from the platform is carried through the platform's translation
/// and yaw change, so riders orbit with rotating platforms instead of
/// sliding off, and a character walking across the platform keeps its own
/// motion.
pub fn apply_drift(ch: &mut Character, physics: &mut dyn PhysicsWorld) {
    let Some(att) = ch.platform.as_mut() else {
        return;
    };

    let now_pos = physics.position(att.platform);
    let now_yaw = physics.yaw(att.platform);
    let yaw_delta = now_yaw - att.platform_yaw;

    let ch_pos = physics.position(ch.body);
    let local = rotate_yaw(ch_pos - att.platform_pos, -att.platform_yaw);
    let new_pos = now_pos + rotate_yaw(local, now_yaw);

    physics.set_position(ch.body, new_pos);
    ch.orientation.yaw = wrap_angle(ch.orientation.yaw + yaw_delta);

    att.platform_pos = now_pos;
    att.platform_yaw = now_yaw;
}

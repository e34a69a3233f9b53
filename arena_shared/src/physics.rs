//! Physics world capability.
//!
//! The simulation treats physics as an external capability: rigid-body
//! creation, shape attachment, velocity/position mutation, and closest-hit
//! ray queries. Everything behind [`PhysicsWorld`] is replaceable.
//!
//! [`FlatWorld`] is the reference implementation used by the server, the
//! parity runner, and the tests. It is deliberately not a rigid-body solver:
//! it integrates gravity, advances scripted kinematic platforms, offers
//! vertical ground support, and answers ray queries against planes and
//! axis-aligned boxes. That is exactly the surface the simulation core
//! consumes; there is no lateral collision response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filter::{self, CollisionFilter};
use crate::math::Vec3;

/// Opaque rigid-body handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// How a body participates in the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable level geometry.
    Static,
    /// Gravity-affected, velocity-driven.
    Dynamic,
    /// Script-driven movers (platforms). Not affected by gravity.
    Kinematic,
}

/// Parameters for body creation.
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub mass: f32,
    pub position: Vec3,
    /// Locks the body's rotation; required for characters so they never tumble.
    pub rotation_locked: bool,
    pub filter: CollisionFilter,
}

/// A box volume attached to a body at a local offset.
#[derive(Debug, Clone, Copy)]
pub struct ShapeDesc {
    pub half_extents: Vec3,
    pub offset: Vec3,
}

/// Closest-hit ray query result.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub body: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
    pub toi: f32,
}

/// The capability surface the simulation core consumes.
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;
    /// Attaches a shape and returns its index on the body.
    fn add_shape(&mut self, body: BodyHandle, shape: ShapeDesc) -> usize;
    fn remove_body(&mut self, body: BodyHandle);
    fn contains(&self, body: BodyHandle) -> bool;
    /// Missing bodies read as `Static`.
    fn body_kind(&self, body: BodyHandle) -> BodyKind;
    fn position(&self, body: BodyHandle) -> Vec3;
    fn set_position(&mut self, body: BodyHandle, position: Vec3);
    fn velocity(&self, body: BodyHandle) -> Vec3;
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3);
    fn yaw(&self, body: BodyHandle) -> f32;
    /// Replaces a previously attached shape (crouch resizing).
    fn set_shape(&mut self, body: BodyHandle, index: usize, shape: ShapeDesc);
    /// Closest hit along `dir` within `max_len`, honoring both filters.
    fn cast_ray(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        max_len: f32,
        filter: CollisionFilter,
    ) -> Option<RayHit>;
    /// Advances dynamic integration and kinematic scripts by `dt` seconds.
    fn step(&mut self, dt: f32);
}

/// An infinite plane belonging to a body.
#[derive(Debug, Clone, Copy)]
struct Plane {
    point: Vec3,
    normal: Vec3,
}

#[derive(Debug)]
struct Body {
    kind: BodyKind,
    #[allow(dead_code)]
    mass: f32,
    position: Vec3,
    yaw: f32,
    velocity: Vec3,
    /// Scripted yaw rate for kinematic bodies (rad/s).
    yaw_rate: f32,
    filter: CollisionFilter,
    shapes: Vec<ShapeDesc>,
    planes: Vec<Plane>,
}

/// Reference world: planes, boxes, gravity, scripted platforms.
pub struct FlatWorld {
    gravity: f32,
    bodies: BTreeMap<u32, Body>,
    next: u32,
    ray_casts: u64,
}

/// Skin distance used when snapping a falling body onto support.
const SUPPORT_SKIN: f32 = 0.02;

impl FlatWorld {
    pub fn new() -> Self {
        Self {
            gravity: 9.81,
            bodies: BTreeMap::new(),
            next: 1,
            ray_casts: 0,
        }
    }

    /// Number of ray queries issued so far. Used by probe tests to observe
    /// short-circuit behavior.
    pub fn ray_casts(&self) -> u64 {
        self.ray_casts
    }

    fn insert(&mut self, body: Body) -> BodyHandle {
        let id = self.next;
        self.next += 1;
        self.bodies.insert(id, body);
        BodyHandle(id)
    }

    /// Adds an infinite horizontal ground plane at `height`.
    pub fn add_ground_plane(&mut self, height: f32) -> BodyHandle {
        self.add_surface(Vec3::new(0.0, 0.0, height), Vec3::UP)
    }

    /// Adds an infinite static surface with an arbitrary unit normal.
    pub fn add_surface(&mut self, point: Vec3, normal: Vec3) -> BodyHandle {
        self.insert(Body {
            kind: BodyKind::Static,
            mass: 0.0,
            position: point,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            yaw_rate: 0.0,
            filter: filter::world_geometry(),
            shapes: Vec::new(),
            planes: vec![Plane {
                point,
                normal: normal.normalize_or_zero(),
            }],
        })
    }

    /// Adds a static axis-aligned block.
    pub fn add_block(&mut self, center: Vec3, half_extents: Vec3) -> BodyHandle {
        self.insert(Body {
            kind: BodyKind::Static,
            mass: 0.0,
            position: center,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            yaw_rate: 0.0,
            filter: filter::world_geometry(),
            shapes: vec![ShapeDesc {
                half_extents,
                offset: Vec3::ZERO,
            }],
            planes: Vec::new(),
        })
    }

    /// Adds a kinematic platform with scripted linear velocity and yaw rate.
    pub fn add_platform(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        velocity: Vec3,
        yaw_rate: f32,
    ) -> BodyHandle {
        self.insert(Body {
            kind: BodyKind::Kinematic,
            mass: 0.0,
            position: center,
            yaw: 0.0,
            velocity,
            yaw_rate,
            filter: filter::world_geometry(),
            shapes: vec![ShapeDesc {
                half_extents,
                offset: Vec3::ZERO,
            }],
            planes: Vec::new(),
        })
    }

    /// Rewrites a kinematic platform's script.
    pub fn set_platform_motion(&mut self, body: BodyHandle, velocity: Vec3, yaw_rate: f32) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.velocity = velocity;
            b.yaw_rate = yaw_rate;
        }
    }

    fn cast_ray_excluding(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        max_len: f32,
        filter: CollisionFilter,
        exclude: Option<u32>,
    ) -> Option<RayHit> {
        self.ray_casts += 1;
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let mut best: Option<RayHit> = None;
        for (&id, body) in &self.bodies {
            if Some(id) == exclude || !filter.interacts_with(body.filter) {
                continue;
            }
            for plane in &body.planes {
                if let Some((t, normal)) = ray_plane(origin, dir, plane.point, plane.normal) {
                    if t <= max_len && best.map_or(true, |b| t < b.toi) {
                        best = Some(RayHit {
                            body: BodyHandle(id),
                            point: origin + dir * t,
                            normal,
                            toi: t,
                        });
                    }
                }
            }
            for shape in &body.shapes {
                let center = body.position + shape.offset;
                let min = center - shape.half_extents;
                let max = center + shape.half_extents;
                if let Some((t, normal)) = ray_aabb(origin, dir, min, max) {
                    if t <= max_len && best.map_or(true, |b| t < b.toi) {
                        best = Some(RayHit {
                            body: BodyHandle(id),
                            point: origin + dir * t,
                            normal,
                            toi: t,
                        });
                    }
                }
            }
        }
        best
    }

    /// Lowest local z over the body's shapes; zero for shapeless bodies.
    fn bottom_offset(body: &Body) -> f32 {
        body.shapes
            .iter()
            .map(|s| s.offset.z - s.half_extents.z)
            .fold(0.0f32, f32::min)
    }
}

impl Default for FlatWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for FlatWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        self.insert(Body {
            kind: desc.kind,
            mass: desc.mass,
            position: desc.position,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            yaw_rate: 0.0,
            filter: desc.filter,
            shapes: Vec::new(),
            planes: Vec::new(),
        })
    }

    fn add_shape(&mut self, body: BodyHandle, shape: ShapeDesc) -> usize {
        match self.bodies.get_mut(&body.0) {
            Some(b) => {
                b.shapes.push(shape);
                b.shapes.len() - 1
            }
            None => 0,
        }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body.0);
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body.0)
    }

    fn body_kind(&self, body: BodyHandle) -> BodyKind {
        self.bodies
            .get(&body.0)
            .map_or(BodyKind::Static, |b| b.kind)
    }

    fn position(&self, body: BodyHandle) -> Vec3 {
        self.bodies.get(&body.0).map_or(Vec3::ZERO, |b| b.position)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.position = position;
        }
    }

    fn velocity(&self, body: BodyHandle) -> Vec3 {
        self.bodies.get(&body.0).map_or(Vec3::ZERO, |b| b.velocity)
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.velocity = velocity;
        }
    }

    fn yaw(&self, body: BodyHandle) -> f32 {
        self.bodies.get(&body.0).map_or(0.0, |b| b.yaw)
    }

    fn set_shape(&mut self, body: BodyHandle, index: usize, shape: ShapeDesc) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            if let Some(s) = b.shapes.get_mut(index) {
                *s = shape;
            }
        }
    }

    fn cast_ray(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        max_len: f32,
        filter: CollisionFilter,
    ) -> Option<RayHit> {
        self.cast_ray_excluding(origin, dir, max_len, filter, None)
    }

    fn step(&mut self, dt: f32) {
        let ids: Vec<u32> = self.bodies.keys().copied().collect();
        for id in ids {
            let Some(body) = self.bodies.get(&id) else {
                continue;
            };
            match body.kind {
                BodyKind::Static => {}
                BodyKind::Kinematic => {
                    let Some(b) = self.bodies.get_mut(&id) else {
                        continue;
                    };
                    b.position = b.position + b.velocity * dt;
                    b.yaw += b.yaw_rate * dt;
                }
                BodyKind::Dynamic => {
                    let mut velocity = body.velocity;
                    velocity.z -= self.gravity * dt;
                    let old = body.position;
                    let bottom = Self::bottom_offset(body);
                    let filter = body.filter;
                    let mut candidate = old + velocity * dt;

                    // Vertical support only: snap a falling body onto the
                    // first surface its footprint center would pass through.
                    if velocity.z <= 0.0 {
                        let origin = Vec3::new(old.x, old.y, old.z + bottom);
                        let dist = (old.z - candidate.z) + SUPPORT_SKIN;
                        if let Some(hit) = self.cast_ray_excluding(
                            origin,
                            -Vec3::UP,
                            dist,
                            filter,
                            Some(id),
                        ) {
                            if hit.normal.z > 0.01 {
                                candidate.z = hit.point.z - bottom;
                                velocity.z = 0.0;
                            }
                        }
                    }

                    let Some(b) = self.bodies.get_mut(&id) else {
                        continue;
                    };
                    b.position = candidate;
                    b.velocity = velocity;
                }
            }
        }
    }
}

/// Builds the reference arena used by the server and by client prediction:
/// a floor, two cover blocks, and a slow elevator platform. Both sides must
/// construct identical geometry or predictions will diverge. Returns the
/// body-center spawn points, half a body above the floor.
pub fn demo_arena(world: &mut FlatWorld) -> Vec<Vec3> {
    world.add_ground_plane(0.0);
    world.add_block(Vec3::new(6.0, 0.0, 0.5), Vec3::new(1.0, 1.0, 0.5));
    world.add_block(Vec3::new(-6.0, 4.0, 0.5), Vec3::new(1.0, 1.0, 0.5));
    world.add_platform(
        Vec3::new(0.0, 10.0, 0.25),
        Vec3::new(2.0, 2.0, 0.25),
        Vec3::new(0.0, 0.0, 0.5),
        0.0,
    );

    vec![
        Vec3::new(-10.0, -10.0, 0.9),
        Vec3::new(10.0, -10.0, 0.9),
        Vec3::new(-10.0, 10.0, 0.9),
        Vec3::new(10.0, 10.0, 0.9),
    ]
}

/// Ray/plane intersection. Returns `(t, facing_normal)` with `t >= 0`.
fn ray_plane(origin: Vec3, dir: Vec3, point: Vec3, normal: Vec3) -> Option<(f32, Vec3)> {
    let denom = dir.dot(normal);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (point - origin).dot(normal) / denom;
    if t < 0.0 {
        return None;
    }
    let facing = if denom < 0.0 { normal } else { -normal };
    Some((t, facing))
}

/// Slab-method ray/AABB intersection. Returns the entry `(t, face_normal)`;
/// rays starting inside the box miss.
fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let o = [origin.x, origin.y, origin.z];
    let d = [dir.x, dir.y, dir.z];
    let lo = [min.x, min.y, min.z];
    let hi = [max.x, max.y, max.z];

    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        if d[axis].abs() < 1e-9 {
            if o[axis] < lo[axis] || o[axis] > hi[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut t0 = (lo[axis] - o[axis]) * inv;
        let mut t1 = (hi[axis] - o[axis]) * inv;
        let face = -d[axis].signum();
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > tmin {
            tmin = t0;
            normal = match axis {
                0 => Vec3::new(face, 0.0, 0.0),
                1 => Vec3::new(0.0, face, 0.0),
                _ => Vec3::new(0.0, 0.0, face),
            };
        }
        tmax = tmax.min(t1);
        if tmin > tmax {
            return None;
        }
    }

    if tmin < 0.0 || normal == Vec3::ZERO {
        return None;
    }
    Some((tmin, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{resolve, world_probe, Team};

    #[test]
    fn ray_hits_ground_plane_with_up_normal() {
        let mut world = FlatWorld::new();
        world.add_ground_plane(0.0);
        let hit = world
            .cast_ray(Vec3::new(0.0, 0.0, 1.0), -Vec3::UP, 2.0, world_probe())
            .expect("plane hit");
        assert!((hit.point.z - 0.0).abs() < 1e-6);
        assert_eq!(hit.normal, Vec3::UP);
        assert!((hit.toi - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ray_respects_collision_masks() {
        let mut world = FlatWorld::new();
        // A character body: probes must pass straight through it.
        let enemy = world.create_body(BodyDesc {
            kind: BodyKind::Dynamic,
            mass: 80.0,
            position: Vec3::new(0.0, 0.0, 0.5),
            rotation_locked: true,
            filter: resolve(Team::Bravo, false),
        });
        world.add_shape(
            enemy,
            ShapeDesc {
                half_extents: Vec3::new(0.5, 0.5, 0.5),
                offset: Vec3::ZERO,
            },
        );
        let miss = world.cast_ray(Vec3::new(0.0, 0.0, 2.0), -Vec3::UP, 5.0, world_probe());
        assert!(miss.is_none());
    }

    #[test]
    fn ray_hits_block_top_face() {
        let mut world = FlatWorld::new();
        world.add_block(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 1.0));
        let hit = world
            .cast_ray(Vec3::new(0.5, 0.5, 5.0), -Vec3::UP, 10.0, world_probe())
            .expect("block hit");
        assert_eq!(hit.normal, Vec3::UP);
        assert!((hit.point.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn kinematic_platform_follows_script() {
        let mut world = FlatWorld::new();
        let platform = world.add_platform(
            Vec3::ZERO,
            Vec3::new(2.0, 2.0, 0.25),
            Vec3::new(1.0, 0.0, 0.0),
            0.5,
        );
        for _ in 0..10 {
            world.step(0.1);
        }
        let pos = world.position(platform);
        assert!((pos.x - 1.0).abs() < 1e-4);
        assert!((world.yaw(platform) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn dynamic_body_falls_and_lands() {
        let mut world = FlatWorld::new();
        world.add_ground_plane(0.0);
        let body = world.create_body(BodyDesc {
            kind: BodyKind::Dynamic,
            mass: 80.0,
            position: Vec3::new(0.0, 0.0, 3.0),
            rotation_locked: true,
            filter: resolve(Team::None, false),
        });
        world.add_shape(
            body,
            ShapeDesc {
                half_extents: Vec3::new(0.3, 0.3, 0.9),
                offset: Vec3::new(0.0, 0.0, -0.9),
            },
        );
        for _ in 0..200 {
            world.step(1.0 / 64.0);
        }
        let pos = world.position(body);
        // bottom offset is -1.8, so the center rests 1.8 above the plane
        assert!((pos.z - 1.8).abs() < 1e-3);
        assert_eq!(world.velocity(body).z, 0.0);
    }
}

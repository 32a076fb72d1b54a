// Core ECS components for simulated agents.

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Position of an entity in 3D space.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }
}

/// Force-driven kinematic state of an agent.
///
/// Forces accumulate into acceleration over a step (`apply_force`), then
/// `integrate` folds them into velocity and position exactly once and
/// clears the accumulator. Orientation is derived from velocity and keeps
/// its last value while the agent is standing still.
#[derive(Component, Debug, Clone)]
pub struct Vehicle {
    pub velocity: Vec3,
    acceleration: Vec3,
    direction: Vec3,
    pub mass: f32,
    pub max_speed: f32,
    pub max_force: f32,
    /// Agents moving on the ground plane ignore the vertical component of
    /// every applied force.
    pub planar: bool,
    /// Noise-phase offset so each agent wanders independently.
    pub wander_offset: f32,
}

impl Vehicle {
    /// # Panics
    /// Panics when `mass <= 0` or either limit is negative; a vehicle with
    /// those parameters cannot be meaningfully simulated.
    pub fn new(mass: f32, max_speed: f32, max_force: f32) -> Self {
        assert!(mass > 0.0, "vehicle mass must be positive, got {mass}");
        assert!(max_speed >= 0.0, "max_speed must be non-negative, got {max_speed}");
        assert!(max_force >= 0.0, "max_force must be non-negative, got {max_force}");
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            direction: Vec3::Z,
            mass,
            max_speed,
            max_force,
            planar: true,
            wander_offset: 0.0,
        }
    }

    pub fn with_planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    pub fn with_wander_offset(mut self, offset: f32) -> Self {
        self.wander_offset = offset;
        self
    }

    /// Accumulate a force for this step. Divides by mass; on planar agents
    /// the vertical component is discarded first.
    pub fn apply_force(&mut self, mut force: Vec3) {
        if self.planar {
            force.y = 0.0;
        }
        self.acceleration += force / self.mass;
    }

    /// Fold the accumulated acceleration into velocity and position, update
    /// the facing direction, and clear the accumulator. Called exactly once
    /// per simulation step.
    pub fn integrate(&mut self, transform: &mut Transform, dt: f32) {
        self.velocity += self.acceleration * dt;
        transform.position += self.velocity * dt;
        if let Some(dir) = self.velocity.try_normalize() {
            self.direction = dir;
        }
        self.acceleration = Vec3::ZERO;
    }

    pub fn forward(&self) -> Vec3 {
        self.direction
    }

    /// Lateral axis on the ground plane.
    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.direction).normalize_or_zero()
    }

    #[cfg(test)]
    pub(crate) fn acceleration(&self) -> Vec3 {
        self.acceleration
    }
}

/// Which pairwise test the collision engine runs for a pair; resolved from
/// the first agent of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionMethod {
    Aabb,
    #[default]
    BoundingCircle,
}

/// Collision footprint of an agent: box half-extents plus the derived
/// bounding radii. The extents come from whatever geometry system owns the
/// agent's visual footprint; radii are cached here and only recomputed when
/// the footprint actually changes, not per query.
#[derive(Component, Debug, Clone, Copy)]
pub struct BoundingVolume {
    half_extents: Vec3,
    outer_radius: f32,
    inner_radius: f32,
    pub method: CollisionMethod,
}

impl BoundingVolume {
    pub fn new(half_extents: Vec3, method: CollisionMethod) -> Self {
        let mut volume = Self {
            half_extents: Vec3::ZERO,
            outer_radius: 0.0,
            inner_radius: 0.0,
            method,
        };
        volume.set_extents(half_extents);
        volume
    }

    /// Replace the footprint and refresh the derived radii.
    pub fn set_extents(&mut self, half_extents: Vec3) {
        let half_extents = half_extents.abs();
        self.half_extents = half_extents;
        self.outer_radius = half_extents.max_element();
        self.inner_radius = half_extents.min_element();
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// Radius of a sphere encapsulating the footprint.
    pub fn outer_radius(&self) -> f32 {
        self.outer_radius
    }

    /// Radius of a sphere contained in the footprint.
    pub fn inner_radius(&self) -> f32 {
        self.inner_radius
    }
}

/// Assigns an entity to a movement group. The id indexes into the groups
/// list owned by the simulation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_id: u32,
}

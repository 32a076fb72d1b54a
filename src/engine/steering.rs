// Steering-force library.
//
// Every function here is stateless: it reads the acting agent's kinematic
// snapshot plus behavior parameters and returns a force that has NOT been
// applied yet. Callers sum the forces they want, clamp the sum to the
// vehicle's max_force, and hand it to Vehicle::apply_force.
//
// Degenerate inputs (zero-length offsets, empty neighbor sets, lookups
// outside a field) degrade to a zero force; a steering call never fails a
// step.

use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

use super::bounds::Aabb;
use super::components::{Transform, Vehicle};
use super::flow_field::FlowField;
use super::path::Path;

// ============================================================================
// KINEMATIC SNAPSHOT
// ============================================================================

/// Read-only view of the acting agent, detached from the ECS so steering
/// math can run while the world is borrowed elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub max_speed: f32,
}

impl Kinematics {
    pub fn from_parts(transform: &Transform, vehicle: &Vehicle) -> Self {
        Self {
            position: transform.position,
            velocity: vehicle.velocity,
            forward: vehicle.forward(),
            max_speed: vehicle.max_speed,
        }
    }

    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward).normalize_or_zero()
    }
}

// ============================================================================
// TUNING RECORDS
// ============================================================================
// Plain value structs read by the behavior layer; they carry no logic.

#[derive(Debug, Clone, Copy)]
pub struct PathFollowInfo {
    pub weight: f32,
    /// Deviations below this are "on the path" and produce no force.
    pub accept_radius: f32,
    /// How far into the future the agent's position is predicted.
    pub seconds_ahead: f32,
    /// How far past the projection the chased target sits.
    pub dist_ahead: f32,
}

impl Default for PathFollowInfo {
    fn default() -> Self {
        Self {
            weight: 1.0,
            accept_radius: 1.5,
            seconds_ahead: 0.5,
            dist_ahead: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlowFieldInfo {
    pub weight: f32,
    pub seconds_ahead: f32,
}

impl Default for FlowFieldInfo {
    fn default() -> Self {
        Self {
            weight: 1.0,
            seconds_ahead: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PursuitInfo {
    pub weight: f32,
    pub seconds_ahead: f32,
}

impl Default for PursuitInfo {
    fn default() -> Self {
        Self {
            weight: 1.0,
            seconds_ahead: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WanderInfo {
    pub weight: f32,
    pub radius: f32,
    pub units_ahead: f32,
}

impl Default for WanderInfo {
    fn default() -> Self {
        Self {
            weight: 1.0,
            radius: 2.0,
            units_ahead: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlockInfo {
    pub separation_weight: f32,
    pub separation_radius: f32,
    pub align_weight: f32,
    pub cohere_weight: f32,
}

impl Default for FlockInfo {
    fn default() -> Self {
        Self {
            separation_weight: 2.0,
            separation_radius: 3.0,
            align_weight: 1.0,
            cohere_weight: 1.0,
        }
    }
}

/// An obstacle candidate for `avoid`.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub position: Vec3,
    pub inner_radius: f32,
}

// ============================================================================
// CORE FORCES
// ============================================================================

/// Head toward `target` at full speed. At the target itself the desired
/// velocity collapses to zero and the result is pure braking (-velocity).
pub fn seek(k: &Kinematics, target: Vec3) -> Vec3 {
    let desired = (target - k.position).normalize_or_zero() * k.max_speed;
    desired - k.velocity
}

/// Mirror of `seek`: head away from `target` at full speed.
pub fn flee(k: &Kinematics, target: Vec3) -> Vec3 {
    let desired = (k.position - target).normalize_or_zero() * k.max_speed;
    desired - k.velocity
}

/// Seek where the target will be `seconds_ahead` from now.
pub fn pursue(k: &Kinematics, target_pos: Vec3, target_vel: Vec3, seconds_ahead: f32) -> Vec3 {
    seek(k, target_pos + target_vel * seconds_ahead)
}

/// Flee where the target will be `seconds_ahead` from now. When the agent
/// sits between the target and that prediction, fleeing the prediction
/// would steer it straight through the target, so it flees the target's
/// current position instead.
pub fn evade(k: &Kinematics, target_pos: Vec3, target_vel: Vec3, seconds_ahead: f32) -> Vec3 {
    let predicted = target_pos + target_vel * seconds_ahead;
    let span_sq = target_pos.distance_squared(predicted);
    let caught_between = k.position.distance_squared(target_pos) <= span_sq
        && k.position.distance_squared(predicted) <= span_sq;
    if caught_between {
        flee(k, target_pos)
    } else {
        flee(k, predicted)
    }
}

/// Seek that brakes smoothly: inside `radius` the desired speed scales
/// linearly with remaining distance. At or beyond the radius this is
/// exactly `seek`.
pub fn arrive(k: &Kinematics, target: Vec3, radius: f32) -> Vec3 {
    let offset = target - k.position;
    let dist = offset.length();
    if dist < radius {
        let desired = offset.normalize_or_zero() * k.max_speed * (dist / radius);
        desired - k.velocity
    } else {
        seek(k, target)
    }
}

/// Seek a point on a circle projected ahead of the agent, with the point
/// picked by smoothed noise so consecutive steps drift rather than jitter.
/// Deterministic for a fixed (time, offset) pair; distinct offsets give
/// each agent its own track through the noise.
pub fn wander(k: &Kinematics, time: f32, offset: f32, units_ahead: f32, radius: f32) -> Vec3 {
    let normalized = value_noise(time + offset);
    // Map [0, 1] onto [-90deg, +90deg] of heading swing.
    let angle = -FRAC_PI_2 + normalized * (FRAC_PI_2 * 2.0);
    let swung = Quat::from_rotation_y(angle) * (k.forward * radius);
    let target = k.position + k.forward * (units_ahead + radius) + swung;
    seek(k, target)
}

/// Push away from each neighbor inside `radius`, weighted by inverse
/// squared distance so the closest neighbors dominate. Zero-distance
/// entries (including the agent itself) are skipped; if nothing
/// contributes the force is zero.
pub fn separate<I>(k: &Kinematics, neighbors: I, radius: f32) -> Vec3
where
    I: IntoIterator<Item = Vec3>,
{
    let radius_sq = radius * radius;
    let mut net = Vec3::ZERO;
    for neighbor in neighbors {
        let to_me = k.position - neighbor;
        let dist_sq = to_me.length_squared();
        if dist_sq == 0.0 || dist_sq >= radius_sq {
            continue;
        }
        net += to_me.normalize() / dist_sq;
    }
    if net == Vec3::ZERO {
        Vec3::ZERO
    } else {
        seek(k, k.position + net)
    }
}

/// Match a heading by seeking one unit ahead along it.
pub fn align(k: &Kinematics, direction: Vec3) -> Vec3 {
    seek(k, k.position + direction)
}

/// Head for a group's center point.
pub fn cohere(k: &Kinematics, center: Vec3) -> Vec3 {
    seek(k, center)
}

/// Dodge the single most threatening obstacle: the nearest one ahead of
/// the agent whose combined radii it would clip. The dodge is a sideways
/// seek away from the threat; with no threat the force is zero.
pub fn avoid(k: &Kinematics, outer_radius: f32, obstacles: &[Obstacle], planar: bool) -> Vec3 {
    let right = k.right();
    let mut nearest = f32::MAX;
    let mut dodge = Vec3::ZERO;

    for obstacle in obstacles {
        let mut local = obstacle.position - k.position;
        if planar {
            local.y = 0.0;
        }
        // Behind us: not a threat.
        let forward_proj = k.forward.dot(local);
        if forward_proj < 0.0 {
            continue;
        }
        // Too far away to matter.
        let rad_sum = outer_radius + obstacle.inner_radius;
        if local.length_squared() > rad_sum * rad_sum {
            continue;
        }
        // Laterally clear of our swept lane.
        let right_proj = right.dot(local);
        if right_proj.abs() > rad_sum {
            continue;
        }
        if forward_proj < nearest {
            nearest = forward_proj;
            dodge = right * -right_proj.signum();
        }
    }

    if dodge == Vec3::ZERO {
        Vec3::ZERO
    } else {
        seek(k, k.position + dodge)
    }
}

/// Zero force while inside `bounds` on the ground plane; once outside on X
/// or Z, seek the bounds center at the agent's own height.
pub fn constrain_to(k: &Kinematics, bounds: &Aabb) -> Vec3 {
    if bounds.contains_xz(k.position) {
        Vec3::ZERO
    } else {
        seek(
            k,
            Vec3::new(bounds.center.x, k.position.y, bounds.center.z),
        )
    }
}

/// Align with the flow sampled at `sample_pos`; zero when the sample point
/// is outside the field.
pub fn follow_flow_field(k: &Kinematics, field: &FlowField, sample_pos: Vec3) -> Vec3 {
    match field.sample(sample_pos) {
        Some(direction) => align(k, direction),
        None => Vec3::ZERO,
    }
}

/// Chase a lookahead point on the nearest path segment. While the
/// predicted position stays within `accept_radius` of the path the agent
/// is already where it should be and the force is zero.
pub fn follow_path(k: &Kinematics, path: &Path, info: &PathFollowInfo) -> Vec3 {
    let future = k.position + k.velocity * info.seconds_ahead;
    match path.project(future, k.position, k.velocity, info.dist_ahead) {
        Some(hit) if hit.normal_dist > info.accept_radius => seek(k, hit.target),
        _ => Vec3::ZERO,
    }
}

/// Clamp an accumulated net force to a vehicle's force budget.
pub fn clamp_force(force: Vec3, max_force: f32) -> Vec3 {
    force.clamp_length_max(max_force)
}

// ============================================================================
// NOISE
// ============================================================================

/// 1-D value noise in [0, 1]: hashed lattice values blended with a
/// smoothstep, so it is continuous in `t` and repeatable for the same `t`.
fn value_noise(t: f32) -> f32 {
    let cell = t.floor();
    let frac = t - cell;
    let a = lattice(cell as i64);
    let b = lattice(cell as i64 + 1);
    let u = frac * frac * (3.0 - 2.0 * frac);
    a + (b - a) * u
}

fn lattice(n: i64) -> f32 {
    // SplitMix64 finalizer; cheap and well distributed.
    let mut x = (n as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 29;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 32;
    (x & 0x00FF_FFFF) as f32 / 16_777_216.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn moving(position: Vec3, velocity: Vec3) -> Kinematics {
        Kinematics {
            position,
            velocity,
            forward: velocity.normalize_or_zero(),
            max_speed: 5.0,
        }
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn seek_scales_to_max_speed() {
        let k = moving(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let force = seek(&k, Vec3::new(10.0, 0.0, 0.0));
        assert_vec_eq(force, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn seek_at_target_is_full_braking() {
        let velocity = Vec3::new(2.0, 0.0, -1.0);
        let k = moving(Vec3::new(3.0, 0.0, 3.0), velocity);
        assert_vec_eq(seek(&k, k.position), -velocity);
    }

    #[test]
    fn flee_mirrors_seek() {
        let k = moving(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let target = Vec3::new(0.0, 0.0, 8.0);
        assert_vec_eq(flee(&k, target), -seek(&k, target) - 2.0 * k.velocity);
    }

    #[test]
    fn arrive_outside_radius_matches_seek() {
        let k = moving(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
        let target = Vec3::new(6.0, 0.0, 0.0);
        assert_vec_eq(arrive(&k, target, 6.0), seek(&k, target));
        assert_vec_eq(arrive(&k, target, 5.9), seek(&k, target));
    }

    #[test]
    fn arrive_inside_radius_slows_linearly() {
        let k = moving(Vec3::ZERO, Vec3::ZERO);
        let force = arrive(&k, Vec3::new(2.0, 0.0, 0.0), 4.0);
        // Desired speed is max_speed * (2/4) = 2.5 toward +X.
        assert_vec_eq(force, Vec3::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn pursue_leads_the_target() {
        let k = moving(Vec3::ZERO, Vec3::ZERO);
        let info = PursuitInfo {
            seconds_ahead: 2.0,
            ..Default::default()
        };
        let force = pursue(
            &k,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(2.0, 0.0, 0.0),
            info.seconds_ahead,
        );
        assert_vec_eq(force, seek(&k, Vec3::new(4.0, 0.0, 10.0)));
    }

    #[test]
    fn evade_flees_prediction_when_clear() {
        let k = moving(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO);
        let force = evade(&k, Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, 1.0), 2.0);
        assert_vec_eq(force, flee(&k, Vec3::new(0.0, 0.0, 12.0)));
    }

    #[test]
    fn evade_caught_between_flees_current_position() {
        // Target at z=0 moving +Z; prediction lands at z=10; we stand at
        // z=5, squarely inside the span.
        let k = moving(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let target = Vec3::ZERO;
        let force = evade(&k, target, Vec3::new(0.0, 0.0, 5.0), 2.0);
        assert_vec_eq(force, flee(&k, target));
    }

    #[test]
    fn wander_is_deterministic_for_fixed_inputs() {
        let k = moving(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let info = WanderInfo::default();
        let a = wander(&k, 12.75, 3.5, info.units_ahead, info.radius);
        let b = wander(&k, 12.75, 3.5, info.units_ahead, info.radius);
        assert_eq!(a, b);

        // A different per-agent offset lands elsewhere in the noise.
        let c = wander(&k, 12.75, 7.25, info.units_ahead, info.radius);
        assert!(a.distance(c) > 1e-6);
    }

    #[test]
    fn wander_drifts_smoothly_over_time() {
        let k = moving(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let a = wander(&k, 1.000, 0.0, 4.0, 2.0);
        let b = wander(&k, 1.016, 0.0, 4.0, 2.0);
        assert!(a.distance(b) < 0.5, "adjacent steps should not jump: {a} vs {b}");
    }

    #[test]
    fn separate_weights_near_neighbors_harder() {
        let k = moving(Vec3::ZERO, Vec3::ZERO);
        let near = Vec3::new(0.5, 0.0, 0.0);
        let far = Vec3::new(0.0, 0.0, 2.0);
        let force = separate(&k, [near, far], 5.0);
        // Both push, but the near neighbor dominates: the -X component
        // must outweigh the -Z component.
        assert!(force.x < 0.0 && force.z < 0.0);
        assert!(force.x.abs() > force.z.abs());
    }

    #[test]
    fn separate_skips_self_and_empty_sets() {
        let k = moving(Vec3::new(1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(separate(&k, [k.position], 5.0), Vec3::ZERO);
        assert_eq!(separate(&k, [], 5.0), Vec3::ZERO);
        // Out of radius contributes nothing either.
        assert_eq!(
            separate(&k, [Vec3::new(100.0, 0.0, 0.0)], 5.0),
            Vec3::ZERO
        );
    }

    #[test]
    fn avoid_dodges_nearest_forward_threat() {
        let k = Kinematics {
            position: Vec3::ZERO,
            velocity: Vec3::new(0.0, 0.0, 2.0),
            forward: Vec3::Z,
            max_speed: 5.0,
        };
        // right() for forward=+Z is +X, so a threat slightly right of the
        // lane should push the dodge left (-X).
        let threats = [
            Obstacle {
                position: Vec3::new(0.3, 0.0, 1.5),
                inner_radius: 1.0,
            },
            Obstacle {
                position: Vec3::new(0.0, 0.0, -3.0), // behind, ignored
                inner_radius: 1.0,
            },
        ];
        let force = avoid(&k, 1.0, &threats, true);
        assert!(force.x < 0.0, "expected a leftward dodge, got {force}");
    }

    #[test]
    fn avoid_with_no_threats_is_zero() {
        let k = moving(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let clear = [Obstacle {
            position: Vec3::new(0.0, 0.0, 50.0),
            inner_radius: 1.0,
        }];
        assert_eq!(avoid(&k, 1.0, &clear, true), Vec3::ZERO);
        assert_eq!(avoid(&k, 1.0, &[], true), Vec3::ZERO);
    }

    #[test]
    fn constrain_is_idle_inside_bounds() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(10.0, 1.0, 10.0));
        let inside = moving(Vec3::new(3.0, 0.0, -4.0), Vec3::X);
        assert_eq!(constrain_to(&inside, &bounds), Vec3::ZERO);

        let outside = moving(Vec3::new(12.0, 2.0, 0.0), Vec3::X);
        let force = constrain_to(&outside, &bounds);
        assert_vec_eq(force, seek(&outside, Vec3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn flow_field_outside_is_zero_force() {
        let field = FlowField::new(
            Aabb::new(Vec3::ZERO, Vec3::new(5.0, 1.0, 5.0)),
            1.0,
            |_, _| Vec3::Z,
        );
        let k = moving(Vec3::new(50.0, 0.0, 0.0), Vec3::X);
        assert_eq!(follow_flow_field(&k, &field, k.position), Vec3::ZERO);

        let k_inside = moving(Vec3::ZERO, Vec3::X);
        let force = follow_flow_field(&k_inside, &field, k_inside.position);
        assert_vec_eq(force, align(&k_inside, Vec3::Z));
    }

    #[test]
    fn follow_path_on_path_is_zero() {
        let path = Path::new(vec![Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0)], false);
        let info = PathFollowInfo::default();
        let on_path = moving(Vec3::new(5.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(follow_path(&on_path, &path, &info), Vec3::ZERO);

        let drifted = moving(Vec3::new(5.0, 0.0, 4.0), Vec3::new(2.0, 0.0, 0.0));
        let force = follow_path(&drifted, &path, &info);
        assert!(force.z < 0.0, "should pull back toward the path: {force}");
    }

    #[test]
    fn clamp_respects_budget() {
        let force = Vec3::new(30.0, 0.0, 40.0);
        let clamped = clamp_force(force, 10.0);
        assert_relative_eq!(clamped.length(), 10.0, epsilon = 1e-5);
        assert_vec_eq(clamped, Vec3::new(6.0, 0.0, 8.0));
        // Under budget passes through untouched.
        assert_eq!(clamp_force(Vec3::new(1.0, 0.0, 0.0), 10.0), Vec3::new(1.0, 0.0, 0.0));
    }
}

// Pairwise collision engine.
//
// Tracks an explicit set of active agents, tests every unordered pair once
// per step (O(n^2), which is fine at the scales this runs at), and turns
// overlap transitions into typed begin/continue/end events. The per-agent
// overlap
// map is the single source of truth for those transitions and stays
// symmetric at all times.
//
// Registration and removal are deferred: structural changes queue up and
// are drained at the fixed point before the next scan, so nothing ever
// mutates the active list mid-iteration.

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::trace;
use std::collections::{HashMap, HashSet};

use super::bounds::Aabb;
use super::components::{BoundingVolume, CollisionMethod, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// The pair started overlapping this step.
    Started,
    /// The pair overlaps this step (fires on the start step too).
    Occurring,
    /// The pair stopped overlapping this step.
    Ended,
}

/// One notification, addressed to `agent`. Every transition produces a
/// mirrored pair of these, one per participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub agent: Entity,
    pub other: Entity,
    pub kind: ContactKind,
}

/// Per-agent snapshot taken at the top of a scan so the pair loop never
/// touches the ECS world.
struct Probe {
    entity: Entity,
    position: Vec3,
    method: CollisionMethod,
    outer_radius: f32,
    half_extents: Vec3,
    enabled: bool,
}

#[derive(Default)]
pub struct CollisionWorld {
    active: Vec<Entity>,
    overlaps: HashMap<Entity, HashSet<Entity>>,
    disabled: HashSet<Entity>,
    pending_add: Vec<Entity>,
    pending_remove: Vec<Entity>,
    pairs_tested: usize,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an agent for inclusion in the next scan. Safe to call at any
    /// point in a step; the active list only changes between scans.
    pub fn register(&mut self, agent: Entity) {
        self.pending_add.push(agent);
    }

    /// Queue an agent for removal before the next scan. Its overlap records
    /// are purged from every partner at the same time, without emitting
    /// `Ended` events.
    pub fn unregister(&mut self, agent: Entity) {
        self.pending_remove.push(agent);
    }

    /// A disabled agent keeps its registration and overlap records but all
    /// pairs involving it are skipped: no tests, no events, no transitions,
    /// for either participant, until it is re-enabled.
    pub fn set_enabled(&mut self, agent: Entity, enabled: bool) {
        if enabled {
            self.disabled.remove(&agent);
        } else {
            self.disabled.insert(agent);
        }
    }

    pub fn contains(&self, agent: Entity) -> bool {
        self.active.contains(&agent)
    }

    pub fn agent_count(&self) -> usize {
        self.active.len()
    }

    /// Agents currently overlapping `agent`.
    pub fn overlapping(&self, agent: Entity) -> impl Iterator<Item = Entity> + '_ {
        self.overlaps.get(&agent).into_iter().flatten().copied()
    }

    /// Unordered pairs actually tested by the last scan.
    pub fn pairs_tested(&self) -> usize {
        self.pairs_tested
    }

    /// Run one collision step: drain the structural queues, test every
    /// unordered pair of active agents once, and return the step's events.
    ///
    /// Agents whose entity has lost its `Transform` or `BoundingVolume`
    /// (e.g. despawned without unregistering yet) are skipped; their queued
    /// removal cleans the records up at the next fixed point.
    pub fn step(&mut self, world: &World) -> Vec<CollisionEvent> {
        self.apply_pending();

        let probes: Vec<Probe> = self
            .active
            .iter()
            .filter_map(|&entity| {
                let transform = world.get::<Transform>(entity)?;
                let volume = world.get::<BoundingVolume>(entity)?;
                Some(Probe {
                    entity,
                    position: transform.position,
                    method: volume.method,
                    outer_radius: volume.outer_radius(),
                    half_extents: volume.half_extents(),
                    enabled: !self.disabled.contains(&entity),
                })
            })
            .collect();

        self.pairs_tested = 0;
        let mut events = Vec::new();

        for i in 0..probes.len() {
            for j in (i + 1)..probes.len() {
                let (a, b) = (&probes[i], &probes[j]);
                if !a.enabled || !b.enabled {
                    continue;
                }
                self.pairs_tested += 1;

                // The first agent of the pair decides which test runs.
                let overlapping = match a.method {
                    CollisionMethod::Aabb => Aabb::new(a.position, a.half_extents)
                        .overlaps_xz(&Aabb::new(b.position, b.half_extents)),
                    CollisionMethod::BoundingCircle => {
                        let rad_sum = a.outer_radius + b.outer_radius;
                        a.position.distance_squared(b.position) < rad_sum * rad_sum
                    }
                };
                let was_overlapping = self
                    .overlaps
                    .get(&a.entity)
                    .is_some_and(|set| set.contains(&b.entity));

                match (overlapping, was_overlapping) {
                    (true, false) => {
                        self.overlaps.entry(a.entity).or_default().insert(b.entity);
                        self.overlaps.entry(b.entity).or_default().insert(a.entity);
                        trace!("contact started: {:?} <-> {:?}", a.entity, b.entity);
                        push_mirrored(&mut events, a.entity, b.entity, ContactKind::Started);
                        push_mirrored(&mut events, a.entity, b.entity, ContactKind::Occurring);
                    }
                    (true, true) => {
                        push_mirrored(&mut events, a.entity, b.entity, ContactKind::Occurring);
                    }
                    (false, true) => {
                        if let Some(set) = self.overlaps.get_mut(&a.entity) {
                            set.remove(&b.entity);
                        }
                        if let Some(set) = self.overlaps.get_mut(&b.entity) {
                            set.remove(&a.entity);
                        }
                        trace!("contact ended: {:?} <-> {:?}", a.entity, b.entity);
                        push_mirrored(&mut events, a.entity, b.entity, ContactKind::Ended);
                    }
                    (false, false) => {}
                }
            }
        }

        events
    }

    /// Drain the structural queues. Runs at the fixed point between scans;
    /// additions first so a register-then-unregister within one step nets
    /// out to nothing.
    fn apply_pending(&mut self) {
        for agent in std::mem::take(&mut self.pending_add) {
            if !self.active.contains(&agent) {
                self.active.push(agent);
            }
        }
        for agent in std::mem::take(&mut self.pending_remove) {
            self.active.retain(|&a| a != agent);
            self.disabled.remove(&agent);
            if let Some(partners) = self.overlaps.remove(&agent) {
                for partner in partners {
                    if let Some(set) = self.overlaps.get_mut(&partner) {
                        set.remove(&agent);
                    }
                }
            }
        }
    }
}

fn push_mirrored(events: &mut Vec<CollisionEvent>, a: Entity, b: Entity, kind: ContactKind) {
    events.push(CollisionEvent {
        agent: a,
        other: b,
        kind,
    });
    events.push(CollisionEvent {
        agent: b,
        other: a,
        kind,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(world: &mut World, position: Vec3, radius: f32) -> Entity {
        world
            .spawn((
                Transform::from_position(position),
                BoundingVolume::new(Vec3::splat(radius), CollisionMethod::BoundingCircle),
            ))
            .id()
    }

    fn boxy(world: &mut World, position: Vec3, half_extents: Vec3) -> Entity {
        world
            .spawn((
                Transform::from_position(position),
                BoundingVolume::new(half_extents, CollisionMethod::Aabb),
            ))
            .id()
    }

    fn kinds_for(events: &[CollisionEvent], agent: Entity) -> Vec<ContactKind> {
        events
            .iter()
            .filter(|e| e.agent == agent)
            .map(|e| e.kind)
            .collect()
    }

    fn move_to(world: &mut World, agent: Entity, position: Vec3) {
        world.get_mut::<Transform>(agent).unwrap().position = position;
    }

    #[test]
    fn started_then_occurring_then_ended() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(1.5, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        collisions.register(a);
        collisions.register(b);

        // Distance 1.5 < radius sum 2.0: contact begins, and Occurring
        // accompanies Started on the first step.
        let events = collisions.step(&world);
        assert_eq!(
            kinds_for(&events, a),
            vec![ContactKind::Started, ContactKind::Occurring]
        );
        assert_eq!(
            kinds_for(&events, b),
            vec![ContactKind::Started, ContactKind::Occurring]
        );

        // Still overlapping: Occurring only.
        let events = collisions.step(&world);
        assert_eq!(kinds_for(&events, a), vec![ContactKind::Occurring]);

        // Move B out of range: exactly one Ended per participant.
        move_to(&mut world, b, Vec3::new(3.0, 0.0, 0.0));
        let events = collisions.step(&world);
        assert_eq!(kinds_for(&events, a), vec![ContactKind::Ended]);
        assert_eq!(kinds_for(&events, b), vec![ContactKind::Ended]);

        // And nothing after that.
        assert!(collisions.step(&world).is_empty());
    }

    #[test]
    fn overlap_map_stays_symmetric() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(0.5, 0.0, 0.0), 1.0);
        let c = agent(&mut world, Vec3::new(100.0, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        for e in [a, b, c] {
            collisions.register(e);
        }
        collisions.step(&world);

        for (x, y) in [(a, b), (a, c), (b, c)] {
            let xy = collisions.overlapping(x).any(|o| o == y);
            let yx = collisions.overlapping(y).any(|o| o == x);
            assert_eq!(xy, yx, "overlap map must be symmetric");
        }
        assert!(collisions.overlapping(a).any(|o| o == b));
        assert!(!collisions.overlapping(a).any(|o| o == c));
    }

    #[test]
    fn every_pair_tested_exactly_once() {
        let mut world = World::new();
        let mut collisions = CollisionWorld::new();
        for i in 0..7 {
            let e = agent(&mut world, Vec3::new(i as f32 * 10.0, 0.0, 0.0), 1.0);
            collisions.register(e);
        }
        collisions.step(&world);
        assert_eq!(collisions.pairs_tested(), 7 * 6 / 2);
    }

    #[test]
    fn aabb_test_uses_ground_plane_only() {
        let mut world = World::new();
        let a = boxy(&mut world, Vec3::ZERO, Vec3::ONE);
        // Far above, but overlapping in X and Z.
        let b = boxy(&mut world, Vec3::new(1.0, 40.0, 1.0), Vec3::ONE);

        let mut collisions = CollisionWorld::new();
        collisions.register(a);
        collisions.register(b);
        let events = collisions.step(&world);
        assert!(events
            .iter()
            .any(|e| e.agent == a && e.kind == ContactKind::Started));
    }

    #[test]
    fn disabled_agent_suppresses_the_pair() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(1.0, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        collisions.register(a);
        collisions.register(b);
        collisions.step(&world);
        assert!(collisions.overlapping(a).any(|o| o == b));

        // While one side is disabled the pair is frozen: no events of any
        // kind, and the recorded overlap does not transition to Ended even
        // though the agents moved apart.
        collisions.set_enabled(b, false);
        move_to(&mut world, b, Vec3::new(50.0, 0.0, 0.0));
        assert!(collisions.step(&world).is_empty());
        assert!(collisions.overlapping(a).any(|o| o == b));

        // Re-enabling lets the separation surface as a normal end.
        collisions.set_enabled(b, true);
        let events = collisions.step(&world);
        assert_eq!(kinds_for(&events, a), vec![ContactKind::Ended]);
    }

    #[test]
    fn register_then_unregister_before_step_is_a_no_op() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(0.5, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        collisions.register(a);
        collisions.register(b);
        collisions.unregister(b);

        let events = collisions.step(&world);
        assert!(events.is_empty());
        assert_eq!(collisions.agent_count(), 1);
        assert!(collisions.contains(a));
        assert!(!collisions.contains(b));
    }

    #[test]
    fn unregister_mid_overlap_purges_partner_records() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(0.5, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        collisions.register(a);
        collisions.register(b);
        collisions.step(&world);
        assert!(collisions.overlapping(a).any(|o| o == b));

        collisions.unregister(b);
        let events = collisions.step(&world);
        // Removal is silent: no Ended, and A's record of B is gone.
        assert!(events.is_empty());
        assert_eq!(collisions.overlapping(a).count(), 0);
    }

    #[test]
    fn despawned_entity_does_not_break_the_scan() {
        let mut world = World::new();
        let a = agent(&mut world, Vec3::ZERO, 1.0);
        let b = agent(&mut world, Vec3::new(0.5, 0.0, 0.0), 1.0);
        let c = agent(&mut world, Vec3::new(0.9, 0.0, 0.0), 1.0);

        let mut collisions = CollisionWorld::new();
        for e in [a, b, c] {
            collisions.register(e);
        }
        collisions.step(&world);

        // B vanishes without unregistering first; the next scan just skips
        // it and the remaining pair still reports.
        world.despawn(b);
        collisions.unregister(b);
        let events = collisions.step(&world);
        assert!(events
            .iter()
            .all(|e| e.agent != b && e.other != b));
        assert!(events
            .iter()
            .any(|e| e.agent == a && e.other == c && e.kind == ContactKind::Occurring));
    }
}


// The step driver. Owns the ECS world plus every side structure the
// behaviors read (collision world, flow fields, paths, groups, food), and
// runs one fixed, single-threaded order per step:
//
//   collide -> refresh group stats -> behaviors consume events and emit
//   forces -> forces applied -> integrate -> post passes (cargo, field
//   wrap, debug lines)
//
// Everything is synchronous; events from the collision scan are fully
// handled within the same step that produced them.

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::info;
use std::collections::{HashMap, VecDeque};

use super::behavior::{AgentSnapshot, Behavior, BehaviorCtx, Group};
use super::collision::{CollisionEvent, CollisionWorld, ContactKind};
use super::components::{BoundingVolume, GroupMembership, Transform, Vehicle};
use super::debug_overlay::DebugLines;
use super::flow_field::FlowField;
use super::path::Path;
use super::steering::Kinematics;
use super::volume::Volume;

/// Per-step summary, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepReport {
    pub agents: usize,
    pub pairs_tested: usize,
    pub events: usize,
    pub contacts_started: usize,
    pub contacts_ended: usize,
}

pub struct Simulation {
    pub world: World,
    pub collisions: CollisionWorld,
    pub debug: DebugLines,
    paths: Vec<Path>,
    fields: Vec<FlowField>,
    groups: Vec<Group>,
    food_queue: VecDeque<Entity>,
    time: f32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            collisions: CollisionWorld::new(),
            debug: DebugLines::default(),
            paths: Vec::new(),
            fields: Vec::new(),
            groups: Vec::new(),
            food_queue: VecDeque::new(),
            time: 0.0,
        }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn add_path(&mut self, path: Path) -> usize {
        self.paths.push(path);
        self.paths.len() - 1
    }

    pub fn add_flow_field(&mut self, field: FlowField) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    pub fn add_group(&mut self) -> u32 {
        self.groups.push(Group::default());
        (self.groups.len() - 1) as u32
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index)
    }

    pub fn flow_field(&self, index: usize) -> Option<&FlowField> {
        self.fields.get(index)
    }

    pub fn group(&self, id: u32) -> Option<&Group> {
        self.groups.get(id as usize)
    }

    /// Make a food item available to foragers. The entity should already be
    /// spawned as a prop; spawning policy itself lives outside the core.
    pub fn stock_food(&mut self, food: Entity) {
        self.food_queue.push_back(food);
    }

    /// Spawn a steerable agent and register it with the collision world.
    pub fn spawn_agent(
        &mut self,
        transform: Transform,
        vehicle: Vehicle,
        volume: BoundingVolume,
        behavior: Behavior,
        group: Option<u32>,
    ) -> Entity {
        let entity = match group {
            Some(group_id) => self
                .world
                .spawn((transform, vehicle, volume, behavior, GroupMembership { group_id }))
                .id(),
            None => self.world.spawn((transform, vehicle, volume, behavior)).id(),
        };
        if let Some(id) = group {
            if let Some(g) = self.groups.get_mut(id as usize) {
                g.members.push(entity);
            }
        }
        self.collisions.register(entity);
        entity
    }

    /// Spawn a static collidable (food item, zone marker) and register it.
    pub fn spawn_prop(&mut self, transform: Transform, volume: BoundingVolume) -> Entity {
        let entity = self.world.spawn((transform, volume)).id();
        self.collisions.register(entity);
        entity
    }

    /// Spawn a force volume: a static region that pushes on overlapping
    /// vehicles for as long as the contact lasts.
    pub fn spawn_volume(
        &mut self,
        transform: Transform,
        bounding: BoundingVolume,
        volume: Volume,
    ) -> Entity {
        let entity = self.world.spawn((transform, bounding, volume)).id();
        self.collisions.register(entity);
        entity
    }

    /// Remove an entity from the simulation. The collision world drops it
    /// at its next fixed point; group and food references go immediately.
    pub fn despawn(&mut self, entity: Entity) {
        self.collisions.unregister(entity);
        for group in &mut self.groups {
            group.members.retain(|&m| m != entity);
        }
        self.food_queue.retain(|&f| f != entity);
        self.world.despawn(entity);
    }

    /// Advance the simulation by one step of `dt` seconds.
    pub fn step(&mut self, dt: f32) -> StepReport {
        let Self {
            world,
            collisions,
            debug,
            paths,
            fields,
            groups,
            food_queue,
            time,
        } = self;

        // 1. Resolve contacts. Structural changes queued since the last
        // scan take effect here, never mid-scan.
        let events = collisions.step(world);

        // 2. Group statistics, so flock members all read the same frame.
        refresh_groups(groups, world);

        // 3. Snapshots: behaviors run against these, not the live world.
        let snapshots: Vec<AgentSnapshot> = {
            let mut query = world.query::<(
                Entity,
                &Transform,
                &Vehicle,
                &BoundingVolume,
                Option<&GroupMembership>,
            )>();
            query
                .iter(world)
                .map(|(entity, transform, vehicle, volume, membership)| AgentSnapshot {
                    entity,
                    position: transform.position,
                    direction: vehicle.forward(),
                    inner_radius: volume.inner_radius(),
                    group_id: membership.map(|m| m.group_id),
                })
                .collect()
        };
        let positions: HashMap<Entity, Vec3> = {
            let mut query = world.query::<(Entity, &Transform)>();
            query
                .iter(world)
                .map(|(entity, transform)| (entity, transform.position))
                .collect()
        };
        let mut events_by_agent: HashMap<Entity, Vec<CollisionEvent>> = HashMap::new();
        for event in &events {
            events_by_agent.entry(event.agent).or_default().push(*event);
        }

        // 4. Behaviors: consume events, produce forces and cargo requests.
        struct Outcome {
            entity: Entity,
            force: Vec3,
            pick_up: Option<Entity>,
            drop: Option<(Entity, Vec3)>,
        }
        let mut outcomes: Vec<Outcome> = Vec::new();
        {
            let paths: &[Path] = paths;
            let fields: &[FlowField] = fields;
            let groups: &[Group] = groups;
            let mut query = world.query::<(
                Entity,
                &Transform,
                &Vehicle,
                &BoundingVolume,
                Option<&GroupMembership>,
                &mut Behavior,
            )>();
            for (entity, transform, vehicle, volume, membership, mut behavior) in
                query.iter_mut(world)
            {
                let ctx = BehaviorCtx {
                    entity,
                    k: Kinematics::from_parts(transform, vehicle),
                    planar: vehicle.planar,
                    outer_radius: volume.outer_radius(),
                    max_force: vehicle.max_force,
                    group_id: membership.map(|m| m.group_id),
                    events: events_by_agent
                        .get(&entity)
                        .map_or(&[][..], |list| list.as_slice()),
                    paths,
                    fields,
                    groups,
                    snapshots: &snapshots,
                    positions: &positions,
                };
                let out = behavior.tick(&ctx, food_queue);
                outcomes.push(Outcome {
                    entity,
                    force: out.force,
                    pick_up: out.pick_up,
                    drop: out.drop,
                });
            }
        }

        // 5. Apply the (already clamped) behavior forces.
        for outcome in &outcomes {
            if let Some(mut vehicle) = world.get_mut::<Vehicle>(outcome.entity) {
                vehicle.apply_force(outcome.force);
            }
        }

        // 6. Volume forces ride on Occurring contacts, outside the
        // behavior clamp, the same way any external force would.
        let mut pushes: Vec<(Entity, Vec3)> = Vec::new();
        for event in &events {
            if event.kind != ContactKind::Occurring {
                continue;
            }
            let Some(volume) = world.get::<Volume>(event.other) else {
                continue;
            };
            let (Some(vehicle), Some(bounding)) = (
                world.get::<Vehicle>(event.agent),
                world.get::<BoundingVolume>(event.agent),
            ) else {
                continue;
            };
            pushes.push((event.agent, volume.force(vehicle, bounding.half_extents())));
        }
        for (entity, force) in pushes {
            if let Some(mut vehicle) = world.get_mut::<Vehicle>(entity) {
                vehicle.apply_force(force);
            }
        }

        // 7. Integrate. Exactly once per vehicle per step.
        {
            let mut query = world.query::<(&mut Transform, &mut Vehicle)>();
            for (mut transform, mut vehicle) in query.iter_mut(world) {
                vehicle.integrate(&mut transform, dt);
            }
        }

        // 8. Cargo bookkeeping: picked-up food leaves the collision world,
        // dropped food lands ahead of the carrier and rejoins it.
        for outcome in &outcomes {
            if let Some(food) = outcome.pick_up {
                collisions.unregister(food);
            }
            if let Some((food, at)) = outcome.drop {
                if let Some(mut transform) = world.get_mut::<Transform>(food) {
                    transform.position = at;
                }
                collisions.register(food);
            }
        }

        // Carried food rides above its carrier's back.
        let mut rides: Vec<(Entity, Vec3)> = Vec::new();
        {
            let mut query = world.query::<(&Transform, &BoundingVolume, &Behavior)>();
            for (transform, volume, behavior) in query.iter(world) {
                if let Behavior::Forage(forage) = behavior {
                    if let Some(food) = forage.carrying() {
                        let perch = transform.position
                            + Vec3::Y * (volume.half_extents().y * 2.5);
                        rides.push((food, perch));
                    }
                }
            }
        }
        for (food, perch) in rides {
            if let Some(mut transform) = world.get_mut::<Transform>(food) {
                transform.position = perch;
            }
        }

        // 9. Flow followers loop: past the far edge of their field they
        // teleport back to the near edge.
        {
            let mut query = world.query::<(&mut Transform, &Behavior)>();
            for (mut transform, behavior) in query.iter_mut(world) {
                if let Behavior::FollowFlow { field, .. } = behavior {
                    if let Some(field) = fields.get(*field) {
                        let region = field.region();
                        if transform.position.z > region.max().z {
                            transform.position.z = region.min().z;
                        }
                    }
                }
            }
        }

        // 10. Debug axes, after physics so the lines track the new pose.
        if debug.is_enabled() {
            let mut query = world.query::<(&Transform, &Vehicle)>();
            for (transform, vehicle) in query.iter(world) {
                debug.request(0, transform.position, transform.position + vehicle.forward());
                debug.request(1, transform.position, transform.position + vehicle.right());
            }
        }

        *time += dt;

        let report = StepReport {
            agents: collisions.agent_count(),
            pairs_tested: collisions.pairs_tested(),
            events: events.len(),
            contacts_started: events
                .iter()
                .filter(|e| e.kind == ContactKind::Started)
                .count()
                / 2,
            contacts_ended: events
                .iter()
                .filter(|e| e.kind == ContactKind::Ended)
                .count()
                / 2,
        };
        if report.contacts_started + report.contacts_ended > 0 {
            info!(
                "step t={:.2}: {} agents, {} contacts started, {} ended",
                *time, report.agents, report.contacts_started, report.contacts_ended
            );
        }
        report
    }
}

fn refresh_groups(groups: &mut [Group], world: &World) {
    for group in groups {
        group.members.retain(|&m| world.get::<Transform>(m).is_some());
        let count = group.members.len();
        if count == 0 {
            group.center = Vec3::ZERO;
            group.heading = Vec3::ZERO;
            continue;
        }
        let mut center = Vec3::ZERO;
        let mut heading = Vec3::ZERO;
        for &member in &group.members {
            if let Some(transform) = world.get::<Transform>(member) {
                center += transform.position;
            }
            if let Some(vehicle) = world.get::<Vehicle>(member) {
                heading += vehicle.forward();
            }
        }
        group.center = center / count as f32;
        group.heading = heading.normalize_or_zero();
    }
}

// Behavior strategies: each agent carries one `Behavior` variant, and each
// variant maps to a fixed sequence of steering calls. Collision events for
// the step are consumed here, synchronously, before any force is returned.
//
// Behaviors never touch the ECS world directly; they read a prepared
// context of snapshots and hand structural requests (food pickups/drops)
// back to the simulation through their output.

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;
use std::collections::{HashMap, VecDeque};

use super::collision::{CollisionEvent, ContactKind};
use super::flow_field::FlowField;
use super::path::Path;
use super::steering::{
    self, FlockInfo, FlowFieldInfo, Kinematics, Obstacle, PathFollowInfo,
};

/// Per-step read-only context for one acting agent.
pub struct BehaviorCtx<'a> {
    pub entity: Entity,
    pub k: Kinematics,
    pub planar: bool,
    pub outer_radius: f32,
    pub max_force: f32,
    pub group_id: Option<u32>,
    /// This agent's collision events for the current step.
    pub events: &'a [CollisionEvent],
    pub paths: &'a [Path],
    pub fields: &'a [FlowField],
    pub groups: &'a [Group],
    /// Snapshots of every steerable agent, for neighbor queries.
    pub snapshots: &'a [AgentSnapshot],
    /// Positions of everything the collision world knows about (props
    /// included), for looking up event partners.
    pub positions: &'a HashMap<Entity, Vec3>,
}

/// Read-only data for one agent, collected before behaviors run.
#[derive(Debug, Clone, Copy)]
pub struct AgentSnapshot {
    pub entity: Entity,
    pub position: Vec3,
    pub direction: Vec3,
    pub inner_radius: f32,
    pub group_id: Option<u32>,
}

/// Flock statistics for one movement group, refreshed every step.
#[derive(Debug, Default, Clone)]
pub struct Group {
    pub members: Vec<Entity>,
    pub center: Vec3,
    pub heading: Vec3,
}

/// What a behavior wants done this step.
#[derive(Debug, Default)]
pub struct BehaviorOutput {
    /// Net steering force, already clamped to the vehicle's budget.
    pub force: Vec3,
    /// Food entity the agent just grabbed; the simulation pulls it out of
    /// the collision world and keeps it riding on the agent.
    pub pick_up: Option<Entity>,
    /// Carried entity to set down at a position.
    pub drop: Option<(Entity, Vec3)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForageState {
    FollowingPath,
    Foraging,
}

/// Tuning for the forager strategy.
#[derive(Debug, Clone, Copy)]
pub struct ForageInfo {
    pub path: PathFollowInfo,
    pub arrive_weight: f32,
    pub arrive_radius: f32,
    pub avoid_weight: f32,
}

impl Default for ForageInfo {
    fn default() -> Self {
        Self {
            path: PathFollowInfo::default(),
            arrive_weight: 1.0,
            arrive_radius: 4.0,
            avoid_weight: 1.5,
        }
    }
}

/// Forager state machine: walks its path until it bumps the food source
/// region, fetches one food item, and hauls it back until it bumps the
/// drop zone. Always dodges its fellow group members.
#[derive(Debug)]
pub struct Forage {
    pub info: ForageInfo,
    pub path: usize,
    pub food_source: Entity,
    pub drop_zone: Entity,
    state: ForageState,
    food_target: Option<Entity>,
    carrying: Option<Entity>,
}

impl Forage {
    pub fn new(info: ForageInfo, path: usize, food_source: Entity, drop_zone: Entity) -> Self {
        Self {
            info,
            path,
            food_source,
            drop_zone,
            state: ForageState::FollowingPath,
            food_target: None,
            carrying: None,
        }
    }

    pub fn state(&self) -> ForageState {
        self.state
    }

    pub fn carrying(&self) -> Option<Entity> {
        self.carrying
    }
}

#[derive(Component, Debug)]
pub enum Behavior {
    /// No steering at all; the agent coasts.
    Idle,
    Forage(Forage),
    Flock { info: FlockInfo },
    FollowFlow { info: FlowFieldInfo, field: usize },
}

impl Behavior {
    /// Consume this step's events and produce the net steering force.
    pub fn tick(&mut self, ctx: &BehaviorCtx, food_queue: &mut VecDeque<Entity>) -> BehaviorOutput {
        match self {
            Behavior::Idle => BehaviorOutput::default(),
            Behavior::Forage(forage) => tick_forage(forage, ctx, food_queue),
            Behavior::Flock { info } => tick_flock(*info, ctx),
            Behavior::FollowFlow { info, field } => tick_follow_flow(*info, *field, ctx),
        }
    }
}

fn tick_forage(
    forage: &mut Forage,
    ctx: &BehaviorCtx,
    food_queue: &mut VecDeque<Entity>,
) -> BehaviorOutput {
    let mut out = BehaviorOutput::default();

    for event in ctx.events {
        if event.kind != ContactKind::Started {
            continue;
        }
        if event.other == forage.food_source
            && forage.food_target.is_none()
            && forage.carrying.is_none()
        {
            // Reached the larder: claim the next item, if any is stocked.
            if let Some(food) = food_queue.pop_front() {
                debug!("{:?} now foraging for {:?}", ctx.entity, food);
                forage.food_target = Some(food);
                forage.state = ForageState::Foraging;
            }
        } else if forage.food_target == Some(event.other) {
            debug!("{:?} picked up {:?}", ctx.entity, event.other);
            forage.carrying = forage.food_target.take();
            forage.state = ForageState::FollowingPath;
            out.pick_up = forage.carrying;
        } else if event.other == forage.drop_zone {
            if let Some(carried) = forage.carrying.take() {
                debug!("{:?} dropped {:?}", ctx.entity, carried);
                out.drop = Some((carried, ctx.k.position + ctx.k.forward));
            }
        }
    }

    let mut net = Vec3::ZERO;
    match forage.state {
        ForageState::FollowingPath => {
            if let Some(path) = ctx.paths.get(forage.path) {
                net += steering::follow_path(&ctx.k, path, &forage.info.path)
                    * forage.info.path.weight;
            }
        }
        ForageState::Foraging => match forage.food_target.and_then(|f| ctx.positions.get(&f)) {
            Some(&target) => {
                net += steering::arrive(&ctx.k, target, forage.info.arrive_radius)
                    * forage.info.arrive_weight;
            }
            None => {
                // Target vanished from under us; go back to the path.
                forage.food_target = None;
                forage.state = ForageState::FollowingPath;
            }
        },
    }

    let obstacles: Vec<Obstacle> = ctx
        .snapshots
        .iter()
        .filter(|s| s.entity != ctx.entity && s.group_id == ctx.group_id)
        .map(|s| Obstacle {
            position: s.position,
            inner_radius: s.inner_radius,
        })
        .collect();
    net += steering::avoid(&ctx.k, ctx.outer_radius, &obstacles, ctx.planar)
        * forage.info.avoid_weight;

    out.force = steering::clamp_force(net, ctx.max_force);
    out
}

fn tick_flock(info: FlockInfo, ctx: &BehaviorCtx) -> BehaviorOutput {
    let Some(group) = ctx.group_id.and_then(|id| ctx.groups.get(id as usize)) else {
        return BehaviorOutput::default();
    };

    let neighbors = ctx
        .snapshots
        .iter()
        .filter(|s| s.group_id == ctx.group_id)
        .map(|s| s.position);

    let mut net = Vec3::ZERO;
    net += steering::separate(&ctx.k, neighbors, info.separation_radius) * info.separation_weight;
    net += steering::align(&ctx.k, group.heading) * info.align_weight;
    net += steering::cohere(&ctx.k, group.center) * info.cohere_weight;

    BehaviorOutput {
        force: steering::clamp_force(net, ctx.max_force),
        ..Default::default()
    }
}

fn tick_follow_flow(info: FlowFieldInfo, field: usize, ctx: &BehaviorCtx) -> BehaviorOutput {
    let Some(field) = ctx.fields.get(field) else {
        return BehaviorOutput::default();
    };
    let sample_pos = ctx.k.position + ctx.k.velocity * info.seconds_ahead;
    let net = steering::follow_flow_field(&ctx.k, field, sample_pos) * info.weight;
    BehaviorOutput {
        force: steering::clamp_force(net, ctx.max_force),
        ..Default::default()
    }
}

// Headless demo scene: a river full of fish, a forager path between a food
// patch and a drop zone, and a small flock, all stepped at a fixed rate
// with per-second stats on the log.

use glam::Vec3;
use rand::Rng;

use veldt::engine::{
    Aabb, Behavior, BoundingVolume, CollisionMethod, FlowField, Forage, ForageInfo, Path,
    Simulation, Transform, Vehicle, Volume,
};
use veldt::engine::steering::{FlockInfo, FlowFieldInfo};

const STEP_DT: f32 = 1.0 / 30.0;
const STEPS: usize = 900; // 30 seconds of simulation

fn main() {
    env_logger::init();

    let mut rng = rand::thread_rng();
    let mut sim = Simulation::new();

    // River down the west side of the scene, flowing +Z.
    let river_region = Aabb::new(Vec3::new(-30.0, 0.0, 0.0), Vec3::new(10.0, 2.0, 40.0));
    let river = sim.add_flow_field(FlowField::river(river_region, 2.0, 3.0, 2));
    for _ in 0..6 {
        let fish = sim.spawn_agent(
            Transform::from_position(Vec3::new(
                rng.gen_range(-36.0..-24.0),
                0.0,
                rng.gen_range(-35.0..35.0),
            )),
            Vehicle::new(1.0, 4.0, 8.0).with_wander_offset(rng.gen_range(0.0..10.0)),
            BoundingVolume::new(Vec3::new(0.4, 0.3, 0.8), CollisionMethod::BoundingCircle),
            Behavior::FollowFlow {
                info: FlowFieldInfo::default(),
                field: river,
            },
            None,
        );
        sim.world.get_mut::<Vehicle>(fish).unwrap().velocity = Vec3::new(0.0, 0.0, 1.0);
    }

    // Forager loop: village drop zone in the middle, food patch to the east.
    let trail = sim.add_path(Path::new(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(12.0, 0.0, 6.0),
            Vec3::new(24.0, 0.0, 4.0),
            Vec3::new(34.0, 0.0, 10.0),
        ],
        true,
    ));
    let drop_zone = sim.spawn_prop(
        Transform::from_position(Vec3::new(0.0, 0.0, 0.0)),
        BoundingVolume::new(Vec3::splat(2.5), CollisionMethod::BoundingCircle),
    );
    let food_patch = sim.spawn_prop(
        Transform::from_position(Vec3::new(34.0, 0.0, 10.0)),
        BoundingVolume::new(Vec3::splat(3.0), CollisionMethod::BoundingCircle),
    );
    for _ in 0..8 {
        let food = sim.spawn_prop(
            Transform::from_position(Vec3::new(
                rng.gen_range(30.0..38.0),
                0.0,
                rng.gen_range(6.0..14.0),
            )),
            BoundingVolume::new(Vec3::splat(0.3), CollisionMethod::BoundingCircle),
        );
        sim.stock_food(food);
    }

    let foragers = sim.add_group();
    for i in 0..3 {
        let forager = sim.spawn_agent(
            Transform::from_position(Vec3::new(2.0 + i as f32 * 1.5, 0.0, 1.0)),
            Vehicle::new(1.0, 5.0, 10.0).with_wander_offset(rng.gen_range(0.0..10.0)),
            BoundingVolume::new(Vec3::new(0.5, 0.9, 0.5), CollisionMethod::BoundingCircle),
            Behavior::Forage(Forage::new(ForageInfo::default(), trail, food_patch, drop_zone)),
            Some(foragers),
        );
        // Set them walking toward the food patch; path correction does the rest.
        sim.world.get_mut::<Vehicle>(forager).unwrap().velocity = Vec3::new(2.0, 0.0, 1.0);
    }

    // A flock milling around the east meadow.
    let flock = sim.add_group();
    for _ in 0..5 {
        sim.spawn_agent(
            Transform::from_position(Vec3::new(
                rng.gen_range(10.0..20.0),
                0.0,
                rng.gen_range(-20.0..-10.0),
            )),
            Vehicle::new(1.0, 4.5, 9.0).with_wander_offset(rng.gen_range(0.0..10.0)),
            BoundingVolume::new(Vec3::splat(0.4), CollisionMethod::BoundingCircle),
            Behavior::Flock {
                info: FlockInfo::default(),
            },
            Some(flock),
        );
    }

    // Headwind over the meadow, so the flock has something to fight.
    sim.spawn_volume(
        Transform::from_position(Vec3::new(15.0, 0.0, -15.0)),
        BoundingVolume::new(Vec3::new(8.0, 4.0, 8.0), CollisionMethod::BoundingCircle),
        Volume::drag(1.225, 0.37),
    );

    log::info!(
        "scene ready: river field {:?} cells, 14 agents, 11 props",
        sim.flow_field(river).map(|f| f.dimensions()).unwrap_or((0, 0)),
    );

    let mut started = 0usize;
    let mut ended = 0usize;
    for step in 0..STEPS {
        let report = sim.step(STEP_DT);
        started += report.contacts_started;
        ended += report.contacts_ended;
        if (step + 1) % 30 == 0 {
            log::info!(
                "t={:5.1}s  agents={:2}  pairs={}  contacts +{started} -{ended}",
                sim.time(),
                report.agents,
                report.pairs_tested,
            );
        }
    }

    println!(
        "simulated {:.0}s: {} contacts began, {} ended",
        sim.time(),
        started,
        ended
    );
}

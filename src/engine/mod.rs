// Engine module: the simulation core, independent of any front end.

pub mod behavior;
pub mod bounds;
pub mod collision;
pub mod components;
pub mod debug_overlay;
pub mod flow_field;
pub mod path;
pub mod simulation;
pub mod steering;
pub mod volume;

// Re-export commonly used items
pub use behavior::{AgentSnapshot, Behavior, BehaviorCtx, Forage, ForageInfo, ForageState, Group};
pub use bounds::Aabb;
pub use collision::{CollisionEvent, CollisionWorld, ContactKind};
pub use components::{BoundingVolume, CollisionMethod, GroupMembership, Transform, Vehicle};
pub use debug_overlay::{DebugLine, DebugLines};
pub use flow_field::FlowField;
pub use path::{Path, PathTarget};
pub use simulation::{Simulation, StepReport};
pub use volume::Volume;

// Autonomous-agent simulation core: steering forces, pairwise collision
// detection with begin/continue/end events, flow-field and path geometry,
// and the per-step force integrator that ties them together.

pub mod engine;

pub use engine::*;

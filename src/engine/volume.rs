// Force volumes: static regions that push on any vehicle overlapping them.
// The collision engine reports the overlap; the simulation applies the
// volume's force for every step the contact persists.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::components::Vehicle;

#[derive(Component, Debug, Clone, Copy)]
pub enum Volume {
    /// Aerodynamic-style drag: opposes the occupant's heading with a force
    /// proportional to its frontal area and squared speed.
    Drag {
        air_density: f32,
        drag_coefficient: f32,
    },
}

impl Volume {
    pub fn drag(air_density: f32, drag_coefficient: f32) -> Self {
        Self::Drag {
            air_density,
            drag_coefficient,
        }
    }

    /// Force exerted on an occupant with the given footprint half-extents.
    pub fn force(&self, vehicle: &Vehicle, half_extents: Vec3) -> Vec3 {
        match *self {
            Self::Drag {
                air_density,
                drag_coefficient,
            } => {
                // Frontal area of the bounding box: full width x full height.
                let area = half_extents.x * half_extents.y * 4.0;
                air_density
                    * drag_coefficient
                    * area
                    * -0.5
                    * vehicle.velocity.length_squared()
                    * vehicle.forward()
            }
        }
    }
}

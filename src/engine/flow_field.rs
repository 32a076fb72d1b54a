// Flow fields: a rectangular region of world space covered by a grid of
// precomputed direction vectors, sampled by agents on the ground plane.
//
// The grid is populated exactly once at construction and read-only after
// that. Queries outside the region return None and callers treat that as
// "no flow here", never as an error.

use glam::{Quat, Vec3};
use std::f32::consts::TAU;

use super::bounds::Aabb;
use super::debug_overlay::DebugLines;

/// Ground-plane (X x Z) grid of flow directions over `region`.
pub struct FlowField {
    region: Aabb,
    cols: usize,
    rows: usize,
    // Effective cell size per axis: region size / cell count. Slightly
    // larger than the requested units_per_cell after the floor division.
    cell_x: f32,
    cell_z: f32,
    grid: Vec<Vec3>,
}

impl FlowField {
    /// Build a field over `region`, filling every cell from `fill(col, row)`.
    ///
    /// Columns run along X, rows along Z. `units_per_cell` controls the
    /// resolution: the lower it is, the more detailed the field.
    ///
    /// # Panics
    /// Panics if the region does not span at least one cell on each axis.
    pub fn new(
        region: Aabb,
        units_per_cell: f32,
        mut fill: impl FnMut(usize, usize) -> Vec3,
    ) -> Self {
        let size = region.size();
        let cols = (size.x / units_per_cell) as usize;
        let rows = (size.z / units_per_cell) as usize;
        assert!(
            cols > 0 && rows > 0,
            "flow field region ({size}) must span at least one {units_per_cell}-unit cell per axis",
        );

        let mut grid = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                grid.push(fill(col, row));
            }
        }

        Self {
            region,
            cols,
            rows,
            cell_x: size.x / cols as f32,
            cell_z: size.z / rows as f32,
            grid,
        }
    }

    /// River pattern: flow runs down +Z while the heading undulates like the
    /// derivative of a sine wave, completing `waves` full periods across the
    /// rows. The first and last `padding` columns point straight inward so
    /// agents drifting toward the banks are pushed back into the stream.
    pub fn river(region: Aabb, units_per_cell: f32, waves: f32, padding: usize) -> Self {
        let size = region.size();
        let rows = (size.z / units_per_cell) as usize;
        let increment = if rows > 0 { TAU * waves / rows as f32 } else { 0.0 };

        Self::new(region, units_per_cell, |col, row| {
            let cols = (size.x / units_per_cell) as usize;
            if col < padding {
                Vec3::X
            } else if col >= cols.saturating_sub(padding) {
                -Vec3::X
            } else {
                // Instantaneous slope of sin is cos; steer by that angle.
                let theta = increment * row as f32;
                let angle = theta.cos().atan();
                Quat::from_rotation_y(angle) * Vec3::Z
            }
        })
    }

    pub fn region(&self) -> &Aabb {
        &self.region
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Flow direction at a world position, or None when the position falls
    /// outside the region on any axis.
    pub fn sample(&self, world: Vec3) -> Option<Vec3> {
        let local = world - self.region.min();
        let col = (local.x / self.cell_x).floor();
        let row = (local.z / self.cell_z).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.grid[row * self.cols + col])
    }

    /// One line per cell, from the cell origin along its flow direction.
    /// Expensive; intended for occasional inspection.
    pub fn debug_lines(&self, style: usize, lines: &mut DebugLines) {
        let origin = self.region.min();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let at = origin + Vec3::new(col as f32 * self.cell_x, 0.0, row as f32 * self.cell_z);
                lines.request(style, at, at + self.grid[row * self.cols + col]);
            }
        }
    }
}

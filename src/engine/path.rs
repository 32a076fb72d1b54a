// Waypoint paths. A path is an ordered list of points; agents never walk
// the list directly but instead project a predicted position onto the
// nearest segment and chase a point a little further along it.

use glam::Vec3;

/// Tolerance for the on-segment test below.
const SEGMENT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct Path {
    points: Vec<Vec3>,
    /// When set, segment directions flip to match the agent's travel
    /// direction, so the path can be walked from either end.
    pub bidirectional: bool,
}

/// Result of projecting a predicted position onto a path.
#[derive(Debug, Clone, Copy)]
pub struct PathTarget {
    /// Point on the winning segment nearest the predicted position.
    pub projected: Vec3,
    /// `projected` advanced along the segment direction; what the agent
    /// actually steers toward.
    pub target: Vec3,
    /// Distance from the predicted position to `projected`. The caller
    /// compares this against its accept radius to decide whether it has
    /// drifted off the path at all.
    pub normal_dist: f32,
}

impl Path {
    pub fn new(points: Vec<Vec3>, bidirectional: bool) -> Self {
        Self {
            points,
            bidirectional,
        }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Project `future` (the agent's predicted position) onto every segment
    /// and return the best candidate target. None for degenerate paths with
    /// fewer than two points.
    ///
    /// A projection only counts as on-segment if the segment length equals
    /// the two partial distances through the projected point (within
    /// epsilon); otherwise it is clamped to whichever endpoint is nearer to
    /// the agent's current `position`.
    pub fn project(
        &self,
        future: Vec3,
        position: Vec3,
        velocity: Vec3,
        dist_ahead: f32,
    ) -> Option<PathTarget> {
        if self.points.len() < 2 {
            return None;
        }

        let mut best: Option<PathTarget> = None;
        for pair in self.points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let Some(mut dir) = (end - start).try_normalize() else {
                continue; // zero-length segment contributes nothing
            };
            if self.bidirectional && velocity.dot(dir) < 0.0 {
                dir = -dir;
            }

            let mut projected = start + dir * (future - start).dot(dir);
            let through = start.distance(projected) + projected.distance(end);
            if (through - start.distance(end)).abs() > SEGMENT_EPSILON {
                projected = if position.distance_squared(start) < position.distance_squared(end) {
                    start
                } else {
                    end
                };
            }

            let normal_dist = projected.distance(future);
            if best.as_ref().is_none_or(|b| normal_dist < b.normal_dist) {
                best = Some(PathTarget {
                    projected,
                    target: projected + dir * dist_ahead,
                    normal_dist,
                });
            }
        }
        best
    }
}

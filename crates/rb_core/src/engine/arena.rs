//! Arena geometry oracle.
//!
//! The simulator never reasons about arena shape directly; it asks the
//! oracle for the nearest surface seen from a sphere center and resolves
//! contacts against that single distance/normal answer. The real arena mesh
//! lives outside this crate; [`BoxArena`] covers tests and local play.

use crate::engine::rules::RuleSet;
use crate::engine::vec::{vec3, Vec3};

/// Nearest-surface answer for one query point.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceContact {
    /// Distance from the query point to the nearest surface.
    pub distance: f64,
    /// Outward surface normal, oriented into the arena interior.
    pub normal: Vec3,
}

/// Nearest-surface distance and normal for a sphere of `radius` centered at
/// `point`. Called at least once per entity per simulated tick.
pub trait ArenaGeometry {
    fn distance_and_normal(&self, point: Vec3, radius: f64) -> SurfaceContact;
}

/// Axis-aligned box arena: flat floor at y = 0, ceiling, and four walls.
/// Goal recesses are not modelled; the scoring model handles goal planes.
#[derive(Clone, Copy, Debug)]
pub struct BoxArena {
    half_width: f64,
    height: f64,
    half_depth: f64,
}

impl BoxArena {
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Self { half_width: width / 2.0, height, half_depth: depth / 2.0 }
    }

    pub fn from_rules(rules: &RuleSet) -> Self {
        Self::new(rules.arena.width, rules.arena.height, rules.arena.depth)
    }
}

impl ArenaGeometry for BoxArena {
    fn distance_and_normal(&self, point: Vec3, _radius: f64) -> SurfaceContact {
        // Six candidate planes; the nearest one wins.
        let planes = [
            (point.y, vec3(0.0, 1.0, 0.0)),                       // floor
            (self.height - point.y, vec3(0.0, -1.0, 0.0)),        // ceiling
            (self.half_width - point.x, vec3(-1.0, 0.0, 0.0)),    // +x wall
            (self.half_width + point.x, vec3(1.0, 0.0, 0.0)),     // -x wall
            (self.half_depth - point.z, vec3(0.0, 0.0, -1.0)),    // +z wall
            (self.half_depth + point.z, vec3(0.0, 0.0, 1.0)),     // -z wall
        ];
        let mut best = SurfaceContact { distance: planes[0].0, normal: planes[0].1 };
        for &(distance, normal) in &planes[1..] {
            if distance < best.distance {
                best = SurfaceContact { distance, normal };
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> BoxArena {
        BoxArena::new(60.0, 20.0, 80.0)
    }

    #[test]
    fn test_floor_is_nearest_at_center() {
        let c = arena().distance_and_normal(vec3(0.0, 1.0, 0.0), 1.0);
        assert!((c.distance - 1.0).abs() < 1e-12);
        assert_eq!(c.normal, vec3(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_wall_normals_point_inward() {
        let c = arena().distance_and_normal(vec3(29.0, 10.0, 0.0), 1.0);
        assert!((c.distance - 1.0).abs() < 1e-12);
        assert_eq!(c.normal, vec3(-1.0, 0.0, 0.0));

        let c = arena().distance_and_normal(vec3(0.0, 10.0, -39.0), 1.0);
        assert!((c.distance - 1.0).abs() < 1e-12);
        assert_eq!(c.normal, vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_penetrating_point_reports_negative_distance() {
        let c = arena().distance_and_normal(vec3(0.0, -0.5, 0.0), 1.0);
        assert!(c.distance < 0.0);
        assert_eq!(c.normal, vec3(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_ceiling_nearest_when_high() {
        let c = arena().distance_and_normal(vec3(0.0, 19.5, 0.0), 1.0);
        assert!((c.distance - 0.5).abs() < 1e-12);
        assert_eq!(c.normal, vec3(0.0, -1.0, 0.0));
    }
}

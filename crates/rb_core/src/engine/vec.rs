//! Vector helpers shared by the simulator.
//!
//! Positions and velocities are `f64` 3-vectors: y is up, +z points toward
//! the enemy goal.

use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

/// Shorthand constructor.
#[inline]
pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Unit vector in the direction of `v`. A zero-length input is returned
/// unchanged rather than treated as an error.
#[inline]
pub fn normalized_or_keep(v: Vec3) -> Vec3 {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

/// Clamp the magnitude of `v` to `max_norm`, preserving direction.
#[inline]
pub fn clamp_norm(v: Vec3, max_norm: f64) -> Vec3 {
    if v.norm_squared() > max_norm * max_norm {
        normalized_or_keep(v) * max_norm
    } else {
        v
    }
}

//! Game rule constants.
//!
//! These arrive from the game server at match start and are fixed for the
//! whole match. Defaults mirror the reference game so tests and local runs
//! work without a server.

use serde::{Deserialize, Serialize};

use crate::engine::vec::{vec3, Vec3};
use crate::error::{AgentError, Result};

/// Arena bounding box. y is up; the goals sit on the ±z faces, the defended
/// goal at −z.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ArenaSize {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Default for ArenaSize {
    fn default() -> Self {
        Self { width: 60.0, height: 20.0, depth: 80.0 }
    }
}

/// Fixed rule constants for one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub ticks_per_second: u32,
    pub gravity: f64,
    pub robot_acceleration: f64,
    pub robot_min_radius: f64,
    pub robot_max_radius: f64,
    pub robot_max_jump_speed: f64,
    pub robot_max_ground_speed: f64,
    pub max_entity_speed: f64,
    pub min_hit_e: f64,
    pub max_hit_e: f64,
    pub robot_mass: f64,
    pub ball_mass: f64,
    pub ball_radius: f64,
    pub robot_arena_e: f64,
    pub ball_arena_e: f64,
    pub arena: ArenaSize,
    /// Number of future ticks simulated per plan evaluation (the horizon).
    pub simulation_depth: usize,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            gravity: 30.0,
            robot_acceleration: 100.0,
            robot_min_radius: 1.0,
            robot_max_radius: 1.05,
            robot_max_jump_speed: 15.0,
            robot_max_ground_speed: 30.0,
            max_entity_speed: 100.0,
            min_hit_e: 0.4,
            max_hit_e: 0.5,
            robot_mass: 2.0,
            ball_mass: 1.0,
            ball_radius: 2.0,
            robot_arena_e: 0.0,
            ball_arena_e: 0.7,
            arena: ArenaSize::default(),
            simulation_depth: 100,
        }
    }
}

impl RuleSet {
    /// Duration of one physics tick in seconds.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.ticks_per_second as f64
    }

    /// Restitution used for every sphere-sphere impulse: the mean of the
    /// game's min/max hit elasticity.
    #[inline]
    pub fn hit_restitution(&self) -> f64 {
        (self.min_hit_e + self.max_hit_e) / 2.0
    }

    /// Center of the goal we attack, at ground level on the +z face.
    #[inline]
    pub fn enemy_goal(&self) -> Vec3 {
        vec3(0.0, 0.0, self.arena.depth / 2.0)
    }

    /// Center of the goal we defend, on the −z face.
    #[inline]
    pub fn own_goal(&self) -> Vec3 {
        vec3(0.0, 0.0, -self.arena.depth / 2.0)
    }

    /// Reject rule sets the simulator cannot run on. Malformed constants are
    /// a caller contract violation, not something to mask.
    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_second == 0 {
            return Err(AgentError::InvalidRules("ticks_per_second is zero".into()));
        }
        if self.simulation_depth == 0 {
            return Err(AgentError::InvalidRules("simulation_depth is zero".into()));
        }
        if self.robot_min_radius > self.robot_max_radius {
            return Err(AgentError::InvalidRules(format!(
                "robot radius range inverted: min {} > max {}",
                self.robot_min_radius, self.robot_max_radius
            )));
        }
        if self.robot_max_jump_speed <= 0.0 {
            return Err(AgentError::InvalidRules("robot_max_jump_speed must be positive".into()));
        }
        if self.robot_mass <= 0.0 || self.ball_mass <= 0.0 {
            return Err(AgentError::InvalidRules("entity masses must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        assert!(RuleSet::default().validate().is_ok());
    }

    #[test]
    fn test_hit_restitution_is_mean() {
        let rules = RuleSet::default();
        assert!((rules.hit_restitution() - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_goals_sit_on_depth_faces() {
        let rules = RuleSet::default();
        assert_eq!(rules.enemy_goal().z, 40.0);
        assert_eq!(rules.own_goal().z, -40.0);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let rules = RuleSet { simulation_depth: 0, ..RuleSet::default() };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_inverted_radius_range_rejected() {
        let rules =
            RuleSet { robot_min_radius: 2.0, robot_max_radius: 1.0, ..RuleSet::default() };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_rules_json_round_trip() {
        let rules = RuleSet::default();
        let json = serde_json::to_string(&rules).unwrap();
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ticks_per_second, rules.ticks_per_second);
        assert_eq!(back.simulation_depth, rules.simulation_depth);
        assert!((back.gravity - rules.gravity).abs() < 1e-12);
    }
}

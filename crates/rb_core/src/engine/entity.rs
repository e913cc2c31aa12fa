//! Entities and their tick-indexed state history.
//!
//! One [`Entity`] per robot or ball, owned by value inside one simulator
//! instance and rebuilt from the game snapshot every tick. Static entities
//! carry a precomputed trajectory in `states`; replaying it by index is the
//! simulator's core performance win.

use crate::engine::plan::ControlInput;
use crate::engine::rules::RuleSet;
use crate::engine::snapshot::{BallSnapshot, RobotSnapshot};
use crate::engine::vec::{vec3, Vec3};

/// Physical state of one entity at one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
    pub touch: bool,
    pub touch_normal: Vec3,
}

/// One physical body (robot or ball) inside a simulator instance.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: i32,
    pub mass: f64,
    /// Restitution against the arena surface.
    pub arena_e: f64,
    pub is_teammate: bool,
    pub is_ball: bool,
    pub is_dynamic: bool,
    /// Earliest tick at which the precomputed trajectory stops being
    /// trustworthy because a dynamic entity came into contact range.
    pub wants_dynamic_on: Option<usize>,
    /// Rate of radius change this tick; equals the jump intensity for
    /// robots, zero for the ball.
    pub radius_change_speed: f64,
    /// Control applied on the next step (robots only; zero means brake).
    pub input: ControlInput,
    /// Live state.
    pub state: EntityState,
    states: Vec<EntityState>,
}

impl Entity {
    pub fn from_robot(robot: &RobotSnapshot, rules: &RuleSet) -> Self {
        Self {
            id: robot.id,
            mass: rules.robot_mass,
            arena_e: rules.robot_arena_e,
            is_teammate: robot.is_teammate,
            is_ball: false,
            is_dynamic: false,
            wants_dynamic_on: None,
            radius_change_speed: 0.0,
            input: ControlInput::default(),
            state: EntityState {
                position: robot.position,
                velocity: robot.velocity,
                radius: robot.radius,
                touch: robot.touch,
                touch_normal: robot.touch_normal.unwrap_or_else(|| vec3(0.0, 1.0, 0.0)),
            },
            states: Vec::new(),
        }
    }

    pub fn from_ball(ball: &BallSnapshot, rules: &RuleSet) -> Self {
        Self {
            id: -1,
            mass: rules.ball_mass,
            arena_e: rules.ball_arena_e,
            is_teammate: false,
            is_ball: true,
            is_dynamic: false,
            wants_dynamic_on: None,
            radius_change_speed: 0.0,
            input: ControlInput::default(),
            state: EntityState {
                position: ball.position,
                velocity: ball.velocity,
                radius: ball.radius,
                touch: false,
                touch_normal: vec3(0.0, 1.0, 0.0),
            },
            states: Vec::new(),
        }
    }

    /// Append the live state to the history. Used only while precomputing
    /// the static trajectory, so indices equal tick numbers.
    pub fn save_state(&mut self) {
        self.states.push(self.state);
    }

    /// Overwrite the live state from the history. O(1); this is how static
    /// entities are replayed instead of re-simulated.
    ///
    /// Panics if `tick` was never recorded, which would mean the horizon
    /// contract was violated by the caller.
    pub fn restore_state(&mut self, tick: usize) {
        self.state = self.states[tick];
    }

    /// Recorded state at `tick`, if any.
    pub fn recorded_state(&self, tick: usize) -> Option<&EntityState> {
        self.states.get(tick)
    }

    pub fn recorded_len(&self) -> usize {
        self.states.len()
    }

    /// Record that the precomputed trajectory is invalid from `tick` on.
    /// Keeps the earliest such tick across repeated detections.
    pub fn mark_wants_dynamic(&mut self, tick: usize) {
        self.wants_dynamic_on = Some(match self.wants_dynamic_on {
            Some(existing) => existing.min(tick),
            None => tick,
        });
    }

    /// Reset per-iteration search bookkeeping.
    pub fn clear_iteration_flags(&mut self) {
        self.wants_dynamic_on = None;
        self.input = ControlInput::default();
        self.radius_change_speed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::snapshot::RobotSnapshot;

    fn robot_entity() -> Entity {
        let rules = RuleSet::default();
        let snapshot = RobotSnapshot {
            id: 1,
            is_teammate: true,
            position: vec3(0.0, 1.0, 0.0),
            velocity: vec3(0.0, 0.0, 0.0),
            radius: 1.0,
            touch: true,
            touch_normal: Some(vec3(0.0, 1.0, 0.0)),
        };
        Entity::from_robot(&snapshot, &rules)
    }

    #[test]
    fn test_save_and_restore_round_trips_state() {
        let mut e = robot_entity();
        e.save_state();
        let saved = e.state;
        e.state.position = vec3(5.0, 2.0, -3.0);
        e.state.touch = false;
        e.restore_state(0);
        assert_eq!(e.state, saved);
    }

    #[test]
    fn test_restore_is_exact_not_approximate() {
        let mut e = robot_entity();
        e.state.position = vec3(0.1 + 0.2, 1.0, 0.0); // deliberately inexact decimal
        e.save_state();
        let bits = e.state.position.x.to_bits();
        e.state.position.x = 0.0;
        e.restore_state(0);
        assert_eq!(e.state.position.x.to_bits(), bits);
    }

    #[test]
    fn test_mark_wants_dynamic_keeps_earliest_tick() {
        let mut e = robot_entity();
        e.mark_wants_dynamic(12);
        e.mark_wants_dynamic(20);
        assert_eq!(e.wants_dynamic_on, Some(12));
        e.mark_wants_dynamic(4);
        assert_eq!(e.wants_dynamic_on, Some(4));
    }

    #[test]
    fn test_missing_touch_normal_defaults_up() {
        let rules = RuleSet::default();
        let snapshot = RobotSnapshot {
            id: 2,
            is_teammate: false,
            position: vec3(0.0, 5.0, 0.0),
            velocity: vec3(0.0, 0.0, 0.0),
            radius: 1.0,
            touch: false,
            touch_normal: None,
        };
        let e = Entity::from_robot(&snapshot, &rules);
        assert_eq!(e.state.touch_normal, vec3(0.0, 1.0, 0.0));
    }
}

//! Per-tick wire contract with the transport harness.
//!
//! The harness hands the agent one [`GameSnapshot`] per game tick and gets
//! back one [`Command`] per controlled robot. Everything here is plain data
//! with serde derives; the harness speaks JSON.

use serde::{Deserialize, Serialize};

use crate::engine::vec::Vec3;

/// One robot as reported by the game server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub id: i32,
    pub is_teammate: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
    pub touch: bool,
    /// Surface normal at the contact point, present only when `touch`.
    pub touch_normal: Option<Vec3>,
}

/// The ball as reported by the game server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
}

/// Full game state at one tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub robots: Vec<RobotSnapshot>,
    pub ball: BallSnapshot,
    #[serde(default)]
    pub my_score: u32,
    #[serde(default)]
    pub enemy_score: u32,
    #[serde(default)]
    pub ticks_remaining: u64,
}

impl GameSnapshot {
    /// Controlled robots, ordered by id. Role assignment keys off this
    /// order: first is the fighter, second the defender.
    pub fn teammates(&self) -> Vec<&RobotSnapshot> {
        let mut mine: Vec<&RobotSnapshot> =
            self.robots.iter().filter(|r| r.is_teammate).collect();
        mine.sort_by_key(|r| r.id);
        mine
    }
}

/// The control command emitted for one robot for one tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Command {
    pub target_velocity: Vec3,
    pub jump_speed: f64,
    /// Part of the wire contract; this agent never engages boost.
    #[serde(default)]
    pub use_boost: bool,
}

/// A command paired with the robot it is for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotCommand {
    pub robot_id: i32,
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vec::vec3;

    fn robot(id: i32, is_teammate: bool) -> RobotSnapshot {
        RobotSnapshot {
            id,
            is_teammate,
            position: vec3(0.0, 1.0, 0.0),
            velocity: vec3(0.0, 0.0, 0.0),
            radius: 1.0,
            touch: true,
            touch_normal: Some(vec3(0.0, 1.0, 0.0)),
        }
    }

    #[test]
    fn test_teammates_sorted_by_id() {
        let snapshot = GameSnapshot {
            robots: vec![robot(7, true), robot(2, false), robot(3, true)],
            ball: BallSnapshot {
                position: vec3(0.0, 2.0, 0.0),
                velocity: vec3(0.0, 0.0, 0.0),
                radius: 2.0,
            },
            my_score: 0,
            enemy_score: 0,
            ticks_remaining: 0,
        };
        let mine = snapshot.teammates();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, 3);
        assert_eq!(mine[1].id, 7);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snapshot = GameSnapshot {
            robots: vec![robot(1, true)],
            ball: BallSnapshot {
                position: vec3(1.0, 2.0, 3.0),
                velocity: vec3(-1.0, 0.0, 0.5),
                radius: 2.0,
            },
            my_score: 1,
            enemy_score: 2,
            ticks_remaining: 5000,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.robots.len(), 1);
        assert_eq!(back.my_score, 1);
        assert_eq!(back.ball.position, snapshot.ball.position);
    }

    #[test]
    fn test_command_boost_defaults_false() {
        let json = r#"{"target_velocity":[1.0,0.0,2.0],"jump_speed":0.0}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert!(!cmd.use_boost);
    }
}

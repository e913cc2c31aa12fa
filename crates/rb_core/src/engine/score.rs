//! Plan scoring.
//!
//! Each simulated tick contributes a role-specific reward to a discounted
//! running sum (×0.999 per tick, so later ticks weigh geometrically less),
//! and updates a few auxiliary extrema. A documented deterministic total
//! order over scores lets the search always pick a unique best candidate.

use std::cmp::Ordering;

/// Per-tick discount factor on the reward sum.
pub const DISCOUNT: f64 = 0.999;

/// Flat reward applied each tick the ball sits past a goal plane: positive
/// for the enemy goal, negated for our own.
const GOAL_REWARD: f64 = 500.0;

/// The two disjoint roles the controlled robots play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Fighter,
    Defender,
}

/// Distances sampled from the simulator after one tick, in the frame of the
/// robot under search.
#[derive(Clone, Copy, Debug)]
pub struct TickMetrics {
    pub dist_robot_to_ball: f64,
    pub dist_ball_to_enemy_goal: f64,
    pub dist_ball_to_own_goal: f64,
    pub dist_robot_to_own_goal: f64,
    pub dist_closest_enemy: f64,
    /// +1 while the ball is past the enemy goal plane, −1 past our own.
    pub goal_sign: i32,
}

/// Accumulated value of one simulated plan.
///
/// `min_dist_to_goal` / `last_dist_to_goal` are role-dependent: for the
/// fighter they track the ball's distance to the enemy goal, for the
/// defender the robot's distance from the own goal.
#[derive(Clone, Copy, Debug)]
pub struct Score {
    pub role: Role,
    pub sum: f64,
    pub min_dist_to_ball: f64,
    pub min_dist_to_goal: f64,
    pub last_dist_to_goal: f64,
    pub last_closest_enemy: f64,
    evaluated: bool,
}

impl Score {
    /// Fresh accumulator for a new evaluation pass.
    pub fn start(role: Role) -> Self {
        Self {
            role,
            sum: 0.0,
            min_dist_to_ball: f64::INFINITY,
            min_dist_to_goal: f64::INFINITY,
            last_dist_to_goal: 0.0,
            last_closest_enemy: 0.0,
            evaluated: true,
        }
    }

    /// Mark this score stale. A stale score loses to any evaluated one, so
    /// the aged warm-start plan is always re-scored against the current
    /// game state before it can win again.
    pub fn invalidate(&mut self) {
        self.evaluated = false;
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Fold one tick's metrics in. `multiplier` is the accumulated discount
    /// for this tick; `last_tick` captures the final-tick values.
    pub fn accumulate(&mut self, metrics: &TickMetrics, multiplier: f64, last_tick: bool) {
        let goal = metrics.goal_sign as f64 * GOAL_REWARD;
        // Only the reward sum carries the discount. The extrema stay in
        // plain meters so the tie-break keys do not depend on when in the
        // horizon the minimum occurred.
        match self.role {
            Role::Fighter => {
                let reward = -0.1 * metrics.dist_robot_to_ball
                    - 0.5 * metrics.dist_ball_to_enemy_goal
                    + goal;
                self.sum += reward * multiplier;
                self.min_dist_to_ball =
                    self.min_dist_to_ball.min(metrics.dist_robot_to_ball);
                self.min_dist_to_goal =
                    self.min_dist_to_goal.min(metrics.dist_ball_to_enemy_goal);
                if last_tick {
                    self.last_dist_to_goal = metrics.dist_ball_to_enemy_goal;
                    self.last_closest_enemy = metrics.dist_closest_enemy;
                }
            }
            Role::Defender => {
                let reward = 0.5 * metrics.dist_ball_to_own_goal
                    - 0.2 * metrics.dist_robot_to_own_goal
                    - 0.1 * metrics.dist_robot_to_ball
                    + goal;
                self.sum += reward * multiplier;
                self.min_dist_to_ball =
                    self.min_dist_to_ball.min(metrics.dist_robot_to_ball);
                self.min_dist_to_goal =
                    self.min_dist_to_goal.min(metrics.dist_robot_to_own_goal);
                if last_tick {
                    self.last_dist_to_goal = metrics.dist_robot_to_own_goal;
                }
            }
        }
    }

    /// Collapse the accumulators into one comparable value. Smaller extrema
    /// are better, so they enter negated; the enemy-distance capture is a
    /// small positive term (being away from enemies at the end is safer).
    pub fn aggregate(&self) -> f64 {
        let extrema = -0.5 * self.min_dist_to_ball
            - 0.3 * self.min_dist_to_goal
            - 0.3 * self.last_dist_to_goal;
        match self.role {
            Role::Fighter => self.sum + extrema + 0.05 * self.last_closest_enemy,
            Role::Defender => self.sum + extrema,
        }
    }

    /// Deterministic total order.
    ///
    /// Keys, in priority order: evaluated beats stale, then the aggregate
    /// via `f64::total_cmp`, then smaller `min_dist_to_ball`, smaller
    /// `min_dist_to_goal`, smaller `last_dist_to_goal`. Every key is a
    /// total order on its domain, so two scores never compare as
    /// incomparable and ties resolve identically on every run.
    pub fn total_cmp(&self, other: &Score) -> Ordering {
        self.evaluated
            .cmp(&other.evaluated)
            .then_with(|| self.aggregate().total_cmp(&other.aggregate()))
            .then_with(|| other.min_dist_to_ball.total_cmp(&self.min_dist_to_ball))
            .then_with(|| other.min_dist_to_goal.total_cmp(&self.min_dist_to_goal))
            .then_with(|| other.last_dist_to_goal.total_cmp(&self.last_dist_to_goal))
    }
}

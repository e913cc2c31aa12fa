//! Plan: the parameterized control trajectory the search optimizes.
//!
//! A plan is four control breakpoints (a jump tick, a steering-change tick,
//! and two angle/speed pairs) plus a set of flags derived while simulating
//! it. Time-valued fields age by one per real game tick and clamp at the
//! `NEVER` sentinel, which gives the search a memory-decaying warm start.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::engine::rules::RuleSet;
use crate::engine::score::{Role, Score};
use crate::engine::simulator::TickOutcome;
use crate::engine::vec::{vec3, Vec3};

/// Sentinel for time-valued plan fields: "never / not yet observed".
pub const NEVER: i32 = -1;

/// The per-tick control handed to the simulator for one robot.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlInput {
    pub target_velocity: Vec3,
    pub jump_speed: f64,
}

/// One candidate action sequence for one robot, with its score.
#[derive(Clone, Debug)]
pub struct Plan {
    /// Tick at which the jump engages (`NEVER` = no jump planned).
    pub time_jump: i32,
    /// Tick at which steering switches from pair 1 to pair 2. Aged past
    /// zero the switch lies in the past and pair 2 applies from tick 0.
    pub time_change: i32,
    pub angle1: f64,
    pub speed1: f64,
    pub angle2: f64,
    pub speed2: f64,

    // Derived while simulating; reset before every evaluation pass and
    // never written outside the observation hooks.
    pub was_jumping: bool,
    pub was_airborne_after_jump: bool,
    pub landed_after_air: bool,
    pub hit_ball_before_landing: bool,
    /// Earliest simulated tick at which a collision fired for the searched
    /// robot (`NEVER` until observed).
    pub oncoming_jump: i32,

    pub score: Score,
}

impl Plan {
    pub fn new(role: Role) -> Self {
        Self {
            time_jump: NEVER,
            time_change: NEVER,
            angle1: 0.0,
            speed1: 0.0,
            angle2: 0.0,
            speed2: 0.0,
            was_jumping: false,
            was_airborne_after_jump: false,
            landed_after_air: false,
            hit_ball_before_landing: false,
            oncoming_jump: NEVER,
            score: Score::start(role),
        }
    }

    /// Control command this plan issues at `tick`.
    ///
    /// Steering uses pair 1 strictly before `time_change` and pair 2 from
    /// it onward; a `time_change` aged to the sentinel means the switch is
    /// in the past, so pair 2 applies everywhere. The jump engages at full
    /// intensity from `time_jump` onward unless the jump was invalidated.
    pub fn action_at(&self, tick: i32, rules: &RuleSet) -> ControlInput {
        let (angle, speed) = if tick >= self.time_change {
            (self.angle2, self.speed2)
        } else {
            (self.angle1, self.speed1)
        };
        let jump_speed = if self.time_jump != NEVER && tick >= self.time_jump {
            rules.robot_max_jump_speed
        } else {
            0.0
        };
        ControlInput {
            target_velocity: vec3(angle.cos() * speed, 0.0, angle.sin() * speed),
            jump_speed,
        }
    }

    /// Age the plan by one real game tick: time fields shift down one and
    /// clamp at the sentinel, derived flags clear, and the score goes stale
    /// so the plan must re-earn its spot against fresh initial conditions.
    pub fn age(&mut self) {
        self.time_jump = (self.time_jump - 1).max(NEVER);
        self.time_change = (self.time_change - 1).max(NEVER);
        self.reset_derived();
        self.score.invalidate();
    }

    /// Clear the derived flags ahead of an evaluation pass.
    pub fn reset_derived(&mut self) {
        self.was_jumping = false;
        self.was_airborne_after_jump = false;
        self.landed_after_air = false;
        self.hit_ball_before_landing = false;
        self.oncoming_jump = NEVER;
    }

    /// Flag derivation from the robot's state entering this tick. Must run
    /// before the physics step; `touch` is the contact flag left by the
    /// previous tick. Landing before airborne before jump-start, so one
    /// tick can advance the chain at most one stage.
    pub fn observe_pre_tick(&mut self, touch: bool, jump_engaged: bool) {
        if !self.landed_after_air && self.was_airborne_after_jump && touch {
            self.landed_after_air = true;
            if !self.hit_ball_before_landing {
                // A jump that came back down without touching the ball is
                // not worth keeping.
                self.time_jump = NEVER;
            }
        }
        if !self.was_airborne_after_jump && self.was_jumping && !touch {
            self.was_airborne_after_jump = true;
        }
        if jump_engaged && touch {
            self.was_jumping = true;
        }
    }

    /// Flag derivation from the physics outcome of this tick.
    pub fn observe_outcome(&mut self, tick: i32, outcome: TickOutcome) {
        if outcome.searched_hit_ball || outcome.searched_hit_robot {
            if outcome.searched_hit_ball && self.was_airborne_after_jump {
                self.hit_ball_before_landing = true;
            }
            if self.oncoming_jump == NEVER {
                self.oncoming_jump = tick;
            }
        }
    }

    /// Post-pass cleanup, applied exactly once per full-horizon evaluation.
    pub fn finish(&mut self) {
        if self.was_airborne_after_jump && !self.hit_ball_before_landing {
            self.time_jump = NEVER;
        }
        if self.oncoming_jump == NEVER {
            self.oncoming_jump = self.time_jump;
        } else if self.time_jump != NEVER {
            self.oncoming_jump = self.oncoming_jump.min(self.time_jump);
        }
    }

    /// Randomized local move: perturb one breakpoint by a bounded delta.
    /// Deliberately not a uniform resample; hill-climbing needs neighbors.
    pub fn mutate(&mut self, rng: &mut ChaCha8Rng, rules: &RuleSet) {
        let horizon = rules.simulation_depth as i32;
        match rng.gen_range(0..6u8) {
            0 => self.angle1 += rng.gen_range(-0.6..0.6),
            1 => {
                self.speed1 = (self.speed1 + rng.gen_range(-8.0..8.0))
                    .clamp(0.0, rules.robot_max_ground_speed);
            }
            2 => self.angle2 += rng.gen_range(-0.6..0.6),
            3 => {
                self.speed2 = (self.speed2 + rng.gen_range(-8.0..8.0))
                    .clamp(0.0, rules.robot_max_ground_speed);
            }
            4 => {
                self.time_change =
                    (self.time_change + rng.gen_range(-12..=12)).clamp(NEVER, horizon - 1);
            }
            _ => {
                if self.time_jump == NEVER {
                    self.time_jump = rng.gen_range(0..horizon.max(2) / 2);
                } else if rng.gen_range(0..8u8) == 0 {
                    self.time_jump = NEVER;
                } else {
                    self.time_jump =
                        (self.time_jump + rng.gen_range(-6..=6)).clamp(NEVER, horizon - 1);
                }
            }
        }
    }
}

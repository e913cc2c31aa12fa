//! Search driver: iteration-bounded hill climbing over plans.
//!
//! One [`MatchSession`] lives for the whole match and is the only state
//! that survives between game ticks: the per-role best plans and the RNG.
//! Each tick it runs one search pass per controlled robot (defender first,
//! then fighter), each pass owning a fresh simulator. A pass seeds from the
//! aged previous best, alternates mutate/re-evaluate iterations, and keeps
//! whichever candidate compares greater under the score's total order. The
//! first tick of the winning plan becomes that robot's command.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::engine::arena::ArenaGeometry;
use crate::engine::plan::{ControlInput, Plan};
use crate::engine::rules::RuleSet;
use crate::engine::score::{Role, Score, DISCOUNT};
use crate::engine::simulator::{PromotionPolicy, Simulator};
use crate::engine::snapshot::{Command, GameSnapshot, RobotCommand};
use crate::error::{AgentError, Result};

/// Iteration budget for one search pass.
#[derive(Clone, Copy, Debug)]
pub struct PassBudget {
    /// Number of candidate evaluations.
    pub iterations: u32,
    /// Designated iteration that re-evaluates the unmutated current best
    /// against fresh initial conditions.
    pub elitism: u32,
}

/// Role- and phase-dependent budgets, plus an optional wall-clock deadline
/// checked between iterations (never mid-simulation).
#[derive(Clone, Copy, Debug)]
pub struct SearchBudget {
    pub fighter: PassBudget,
    pub defender: PassBudget,
    /// Applied instead when the ball is on the defended half: the fighter
    /// gets more budget, the defender less.
    pub fighter_urgent: PassBudget,
    pub defender_urgent: PassBudget,
    pub deadline: Option<Duration>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            fighter: PassBudget { iterations: 202, elitism: 200 },
            defender: PassBudget { iterations: 202, elitism: 200 },
            fighter_urgent: PassBudget { iterations: 352, elitism: 350 },
            defender_urgent: PassBudget { iterations: 52, elitism: 50 },
            deadline: None,
        }
    }
}

/// Optional instrumentation injected into the session. Observations never
/// influence chosen actions.
pub trait SearchProbe {
    fn iteration_evaluated(&mut self, role: Role, iteration: u32, aggregate: f64, improved: bool) {
        let _ = (role, iteration, aggregate, improved);
    }
    fn pass_complete(&mut self, role: Role, iterations: u32, best_aggregate: f64) {
        let _ = (role, iterations, best_aggregate);
    }
}

/// Match-lifetime agent context. Owns the geometry oracle, the rule
/// constants, the mutation RNG and the per-role committed plans.
pub struct MatchSession<G: ArenaGeometry> {
    rules: RuleSet,
    geometry: G,
    policy: PromotionPolicy,
    budget: SearchBudget,
    rng: ChaCha8Rng,
    best: [Plan; 2],
    probe: Option<Box<dyn SearchProbe>>,
}

fn slot(role: Role) -> usize {
    match role {
        Role::Fighter => 0,
        Role::Defender => 1,
    }
}

impl<G: ArenaGeometry> MatchSession<G> {
    pub fn new(rules: RuleSet, geometry: G, seed: u64) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            rules,
            geometry,
            policy: PromotionPolicy::default(),
            budget: SearchBudget::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            best: [Plan::new(Role::Fighter), Plan::new(Role::Defender)],
            probe: None,
        })
    }

    pub fn with_policy(mut self, policy: PromotionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn SearchProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Committed best plan for a role, as of the last `act` call.
    pub fn best_plan(&self, role: Role) -> &Plan {
        &self.best[slot(role)]
    }

    /// Per-tick entry point: run both search passes and emit one command
    /// per controlled robot.
    ///
    /// Controlled robots are the snapshot's teammates ordered by id: the
    /// first plays fighter, the second defender. One or two are accepted;
    /// anything else is a caller contract violation.
    pub fn act(&mut self, snapshot: &GameSnapshot) -> Result<Vec<RobotCommand>> {
        let teammates = snapshot.teammates();
        if teammates.is_empty() || teammates.len() > 2 {
            return Err(AgentError::MalformedSnapshot(format!(
                "expected 1 or 2 controlled robots, got {}",
                teammates.len()
            )));
        }
        let assignments: Vec<(Role, i32)> = teammates
            .iter()
            .zip([Role::Fighter, Role::Defender])
            .map(|(robot, role)| (role, robot.id))
            .collect();

        for plan in &mut self.best {
            plan.age();
        }

        let urgent = snapshot.ball.position.z < -0.01;

        // Defender first, fighter last; each pass sees the other robot's
        // last committed plan (sequential coordinate ascent, never a joint
        // optimization).
        for &(role, robot_id) in assignments.iter().rev() {
            self.run_pass(role, robot_id, snapshot, urgent)?;
        }

        Ok(assignments
            .iter()
            .map(|&(role, robot_id)| {
                let input = self.best[slot(role)].action_at(0, &self.rules);
                RobotCommand {
                    robot_id,
                    command: Command {
                        target_velocity: input.target_velocity,
                        jump_speed: input.jump_speed,
                        use_boost: false,
                    },
                }
            })
            .collect())
    }

    fn run_pass(
        &mut self,
        role: Role,
        robot_id: i32,
        snapshot: &GameSnapshot,
        urgent: bool,
    ) -> Result<()> {
        let budget = match (role, urgent) {
            (Role::Fighter, false) => self.budget.fighter,
            (Role::Fighter, true) => self.budget.fighter_urgent,
            (Role::Defender, false) => self.budget.defender,
            (Role::Defender, true) => self.budget.defender_urgent,
        };
        let me = slot(role);
        let committed_other = self.best[1 - me].clone();

        let mut sim =
            Simulator::new(&self.rules, &self.geometry, self.policy, snapshot, robot_id)?;
        let started = Instant::now();
        let mut candidate = self.best[me].clone();
        let mut evaluated = 0u32;

        for iteration in 0..budget.iterations {
            if let Some(deadline) = self.budget.deadline {
                // The seed is always evaluated before the deadline can cut
                // the pass, so a valid plan is guaranteed.
                if iteration > 0 && started.elapsed() >= deadline {
                    break;
                }
            }

            if iteration == 0 || iteration == budget.elitism {
                candidate = self.best[me].clone();
            } else if iteration % 2 == 1 {
                candidate = self.best[me].clone();
                candidate.mutate(&mut self.rng, &self.rules);
            }
            // Even iterations re-evaluate the previous candidate as left by
            // its post-pass cleanup.

            candidate.reset_derived();
            candidate.score = Score::start(role);
            evaluate_candidate(&self.rules, &mut sim, &mut candidate, &committed_other);
            evaluated += 1;

            let improved =
                candidate.score.total_cmp(&self.best[me].score) == Ordering::Greater;
            if let Some(probe) = self.probe.as_mut() {
                probe.iteration_evaluated(role, iteration, candidate.score.aggregate(), improved);
            }
            if improved {
                self.best[me] = candidate.clone();
            }
        }

        let best_aggregate = self.best[me].score.aggregate();
        debug!(
            ?role,
            robot_id,
            iterations = evaluated,
            best = best_aggregate,
            "search pass complete"
        );
        if let Some(probe) = self.probe.as_mut() {
            probe.pass_complete(role, evaluated, best_aggregate);
        }
        Ok(())
    }
}

/// Simulate one candidate over the full horizon and fill in its score and
/// derived flags. Teammate robots follow `committed_other`; promoted
/// enemies brake (their plans are unknown).
fn evaluate_candidate<G: ArenaGeometry>(
    rules: &RuleSet,
    sim: &mut Simulator<G>,
    candidate: &mut Plan,
    committed_other: &Plan,
) {
    sim.init_iteration();
    let horizon = rules.simulation_depth;
    let mut multiplier = 1.0;

    for tick in 0..horizon {
        let searched = sim.searched_index();
        let dynamic_robots: Vec<usize> = sim.dynamic_robot_indices().to_vec();
        for idx in dynamic_robots {
            if idx == searched {
                continue;
            }
            let robot = sim.robot_mut(idx);
            robot.input = if robot.is_teammate {
                committed_other.action_at(tick as i32, rules)
            } else {
                ControlInput::default()
            };
        }

        let input = candidate.action_at(tick as i32, rules);
        let touch = sim.searched_robot().state.touch;
        candidate.observe_pre_tick(touch, input.jump_speed > 0.0);
        sim.robot_mut(searched).input = input;

        let outcome = sim.tick_dynamic(tick);
        candidate.observe_outcome(tick as i32, outcome);

        let metrics = sim.metrics();
        candidate.score.accumulate(&metrics, multiplier, tick + 1 == horizon);
        multiplier *= DISCOUNT;
    }
    candidate.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::engine::arena::BoxArena;
    use crate::engine::snapshot::{BallSnapshot, RobotSnapshot};
    use crate::engine::vec::vec3;

    fn robot_at(id: i32, is_teammate: bool, position: crate::engine::vec::Vec3) -> RobotSnapshot {
        RobotSnapshot {
            id,
            is_teammate,
            position,
            velocity: vec3(0.0, 0.0, 0.0),
            radius: 1.0,
            touch: true,
            touch_normal: Some(vec3(0.0, 1.0, 0.0)),
        }
    }

    fn one_robot_snapshot() -> GameSnapshot {
        GameSnapshot {
            robots: vec![robot_at(1, true, vec3(0.0, 1.0, 0.0))],
            ball: BallSnapshot {
                // 5 units straight ahead of the robot, resting on the floor.
                position: vec3(0.0, 2.0, 5.0),
                velocity: vec3(0.0, 0.0, 0.0),
                radius: 2.0,
            },
            my_score: 0,
            enemy_score: 0,
            ticks_remaining: 10_000,
        }
    }

    fn two_robot_snapshot() -> GameSnapshot {
        GameSnapshot {
            robots: vec![
                robot_at(1, true, vec3(-5.0, 1.0, -10.0)),
                robot_at(2, true, vec3(5.0, 1.0, -30.0)),
                robot_at(3, false, vec3(0.0, 1.0, 20.0)),
            ],
            ball: BallSnapshot {
                position: vec3(0.0, 4.0, 0.0),
                velocity: vec3(0.0, 0.0, 0.0),
                radius: 2.0,
            },
            my_score: 0,
            enemy_score: 0,
            ticks_remaining: 10_000,
        }
    }

    fn short_rules() -> RuleSet {
        RuleSet { simulation_depth: 60, ..RuleSet::default() }
    }

    fn session(rules: RuleSet, seed: u64) -> MatchSession<BoxArena> {
        let arena = BoxArena::from_rules(&rules);
        MatchSession::new(rules, arena, seed).unwrap()
    }

    #[test]
    fn test_fighter_drives_toward_stationary_ball() {
        let mut session = session(short_rules(), 7);
        let commands = session.act(&one_robot_snapshot()).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].robot_id, 1);

        let v = commands[0].command.target_velocity;
        assert!(v.norm() > 1.0, "expected a real move, got {v:?}");
        // Ball is at +z: the command must point into a cone around +z.
        assert!(v.z > 0.0, "expected positive z component, got {v:?}");
        assert!(v.z / v.norm() > 0.5, "expected +z dominant direction, got {v:?}");

        // And the plan must actually close distance versus doing nothing:
        // a motionless robot never gets nearer than the starting gap.
        let start_gap = (vec3(0.0, 2.0, 5.0) - vec3(0.0, 1.0, 0.0)).norm();
        let best = session.best_plan(Role::Fighter);
        assert!(
            best.score.min_dist_to_ball < start_gap - 0.5,
            "min dist {} never improved on start gap {}",
            best.score.min_dist_to_ball,
            start_gap
        );
    }

    #[test]
    fn test_act_is_deterministic_for_seed_and_snapshot() {
        let snapshot = two_robot_snapshot();
        let a = session(short_rules(), 42).act(&snapshot).unwrap();
        let b = session(short_rules(), 42).act(&snapshot).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_different_seeds_may_disagree_but_both_act() {
        let snapshot = two_robot_snapshot();
        let a = session(short_rules(), 1).act(&snapshot).unwrap();
        let b = session(short_rules(), 2).act(&snapshot).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
    }

    #[derive(Default)]
    struct MonotoneLog {
        events: Vec<(Role, f64, bool)>,
    }

    struct SharedProbe(Rc<RefCell<MonotoneLog>>);

    impl SearchProbe for SharedProbe {
        fn iteration_evaluated(&mut self, role: Role, _i: u32, aggregate: f64, improved: bool) {
            self.0.borrow_mut().events.push((role, aggregate, improved));
        }
    }

    #[test]
    fn test_best_score_is_monotone_within_a_pass() {
        let log = Rc::new(RefCell::new(MonotoneLog::default()));
        let mut session = session(short_rules(), 11).with_probe(Box::new(SharedProbe(log.clone())));
        session.act(&two_robot_snapshot()).unwrap();

        for role in [Role::Fighter, Role::Defender] {
            let mut current_best = f64::NEG_INFINITY;
            let mut accepted = 0;
            for &(r, aggregate, improved) in
                log.borrow().events.iter().filter(|(r, _, _)| *r == role)
            {
                assert_eq!(r, role);
                if improved {
                    assert!(
                        aggregate >= current_best,
                        "accepted candidate regressed the best score"
                    );
                    current_best = aggregate;
                    accepted += 1;
                }
            }
            assert!(accepted >= 1, "the seed evaluation must always be accepted");
        }
    }

    #[test]
    fn test_warm_start_plan_persists_across_ticks() {
        let mut session = session(short_rules(), 5);
        let snapshot = one_robot_snapshot();
        session.act(&snapshot).unwrap();
        let first = session.best_plan(Role::Fighter).clone();
        session.act(&snapshot).unwrap();
        let second = session.best_plan(Role::Fighter);
        // The plan evolves, but its steering should not be reinvented from
        // scratch: speeds stay committed to a real move.
        assert!(first.score.is_evaluated());
        assert!(second.score.is_evaluated());
        assert!(second.action_at(0, &short_rules()).target_velocity.norm() > 1.0);
    }

    #[test]
    fn test_rejects_snapshot_without_controlled_robots() {
        let mut session = session(short_rules(), 0);
        let snapshot = GameSnapshot {
            robots: vec![robot_at(3, false, vec3(0.0, 1.0, 20.0))],
            ball: BallSnapshot {
                position: vec3(0.0, 2.0, 0.0),
                velocity: vec3(0.0, 0.0, 0.0),
                radius: 2.0,
            },
            my_score: 0,
            enemy_score: 0,
            ticks_remaining: 0,
        };
        assert!(matches!(session.act(&snapshot), Err(AgentError::MalformedSnapshot(_))));
    }

    #[test]
    fn test_deadline_still_produces_a_command() {
        let budget = SearchBudget { deadline: Some(Duration::ZERO), ..SearchBudget::default() };
        let mut session = session(short_rules(), 3).with_budget(budget);
        let commands = session.act(&two_robot_snapshot()).unwrap();
        // Only the seed gets evaluated, but the agent still answers.
        assert_eq!(commands.len(), 2);
        assert!(session.best_plan(Role::Fighter).score.is_evaluated());
        assert!(session.best_plan(Role::Defender).score.is_evaluated());
    }

    #[test]
    fn test_both_promotion_policies_complete_a_tick() {
        for policy in [PromotionPolicy::Rollback, PromotionPolicy::FlagOnly] {
            let mut session = session(short_rules(), 9).with_policy(policy);
            let commands = session.act(&two_robot_snapshot()).unwrap();
            assert_eq!(commands.len(), 2, "policy {policy:?} must still act");
        }
    }

    #[test]
    fn test_urgent_budget_selected_when_ball_on_defended_half() {
        let log = Rc::new(RefCell::new(MonotoneLog::default()));
        let mut snapshot = two_robot_snapshot();
        snapshot.ball.position.z = -10.0;
        let budget = SearchBudget::default();
        let mut session = session(short_rules(), 13).with_probe(Box::new(SharedProbe(log.clone())));
        session.act(&snapshot).unwrap();

        let fighter_count =
            log.borrow().events.iter().filter(|(r, _, _)| *r == Role::Fighter).count() as u32;
        let defender_count =
            log.borrow().events.iter().filter(|(r, _, _)| *r == Role::Defender).count() as u32;
        assert_eq!(fighter_count, budget.fighter_urgent.iterations);
        assert_eq!(defender_count, budget.defender_urgent.iterations);
    }
}

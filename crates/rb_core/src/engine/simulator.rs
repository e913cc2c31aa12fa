//! Deterministic forward simulator.
//!
//! One simulator instance serves one robot's search pass. At construction it
//! simulates the whole horizon once with every non-controlled entity marked
//! static, recording each tick's state: the world as if the searched robot
//! did nothing. Candidate evaluations then replay static entities by table
//! lookup and integrate only the dynamic set, promoting a static entity to
//! full simulation the moment a dynamic one reaches contact range.
//!
//! Physics semantics are identical in both phases: semi-implicit Euler with
//! a position correction term, mass-proportional sphere-sphere resolution,
//! and arena contacts resolved against the geometry oracle.

use crate::engine::arena::ArenaGeometry;
use crate::engine::entity::{Entity, EntityState};
use crate::engine::rules::RuleSet;
use crate::engine::score::TickMetrics;
use crate::engine::snapshot::GameSnapshot;
use crate::engine::vec::{clamp_norm, normalized_or_keep, Vec3};
use crate::error::{AgentError, Result};

/// What to do when a dynamic entity reaches a static one mid-evaluation.
///
/// The production history has both behaviors; they are kept selectable so
/// either can be tested and compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromotionPolicy {
    /// Canonical: roll the dynamic set back to the start of the tick,
    /// promote the flagged entity from its last recorded state, and re-run
    /// the tick with it simulated for real.
    #[default]
    Rollback,
    /// Only flag the contact; the static entity keeps replaying its
    /// precomputed trajectory. Cheaper, slightly wrong after contact.
    FlagOnly,
}

/// Collision signals for the searched robot from one simulated tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickOutcome {
    pub searched_hit_ball: bool,
    pub searched_hit_robot: bool,
}

/// Forward simulator for one search pass. Entities live by value in one
/// arena vector; the static/dynamic sets are index collections into it.
pub struct Simulator<'a, G: ArenaGeometry> {
    rules: &'a RuleSet,
    geometry: &'a G,
    policy: PromotionPolicy,
    entities: Vec<Entity>,
    ball: usize,
    searched: usize,
    initial_static_entities: Vec<usize>,
    initial_static_robots: Vec<usize>,
    initial_dynamic_entities: Vec<usize>,
    initial_dynamic_robots: Vec<usize>,
    static_entities: Vec<usize>,
    static_robots: Vec<usize>,
    dynamic_entities: Vec<usize>,
    dynamic_robots: Vec<usize>,
}

impl<'a, G: ArenaGeometry> Simulator<'a, G> {
    /// Build the entity arena from the snapshot and run the static
    /// precompute over the full horizon.
    ///
    /// The searched robot and its teammates are dynamic from the start
    /// (teammates follow their committed plans); enemies and the ball are
    /// static until promoted.
    pub fn new(
        rules: &'a RuleSet,
        geometry: &'a G,
        policy: PromotionPolicy,
        snapshot: &GameSnapshot,
        searched_robot_id: i32,
    ) -> Result<Self> {
        let mut entities = Vec::with_capacity(snapshot.robots.len() + 1);
        entities.push(Entity::from_ball(&snapshot.ball, rules));
        let ball = 0;

        let mut searched = None;
        let mut initial_static_entities = vec![ball];
        let mut initial_static_robots = Vec::new();
        let mut initial_dynamic_entities = Vec::new();
        let mut initial_dynamic_robots = Vec::new();

        for robot in &snapshot.robots {
            let idx = entities.len();
            entities.push(Entity::from_robot(robot, rules));
            if robot.id == searched_robot_id {
                searched = Some(idx);
            }
            if robot.is_teammate {
                entities[idx].is_dynamic = true;
                entities[idx].save_state();
                initial_dynamic_entities.push(idx);
                initial_dynamic_robots.push(idx);
            } else {
                initial_static_entities.push(idx);
                initial_static_robots.push(idx);
            }
        }

        let searched = searched.ok_or_else(|| {
            AgentError::MalformedSnapshot(format!(
                "searched robot id {searched_robot_id} not in snapshot"
            ))
        })?;
        if !entities[searched].is_teammate {
            return Err(AgentError::MalformedSnapshot(format!(
                "searched robot id {searched_robot_id} is not a teammate"
            )));
        }

        let mut sim = Self {
            rules,
            geometry,
            policy,
            entities,
            ball,
            searched,
            static_entities: initial_static_entities.clone(),
            static_robots: initial_static_robots.clone(),
            dynamic_entities: initial_dynamic_entities.clone(),
            dynamic_robots: initial_dynamic_robots.clone(),
            initial_static_entities,
            initial_static_robots,
            initial_dynamic_entities,
            initial_dynamic_robots,
        };

        // Record states for ticks 0..=horizon so a dynamic tick t can pull
        // index t+1 for every static entity.
        for _ in 0..=rules.simulation_depth {
            for i in 0..sim.initial_static_entities.len() {
                let idx = sim.initial_static_entities[i];
                sim.entities[idx].save_state();
            }
            sim.update_static();
        }

        Ok(sim)
    }

    /// Reset to tick 0 for the next candidate evaluation: membership back
    /// to the initial sets, promotion flags cleared, dynamic entities
    /// restored to their recorded initial state.
    pub fn init_iteration(&mut self) {
        self.static_entities = self.initial_static_entities.clone();
        self.static_robots = self.initial_static_robots.clone();
        self.dynamic_entities = self.initial_dynamic_entities.clone();
        self.dynamic_robots = self.initial_dynamic_robots.clone();
        for &idx in &self.static_entities {
            self.entities[idx].is_dynamic = false;
            self.entities[idx].wants_dynamic_on = None;
        }
        for i in 0..self.dynamic_entities.len() {
            let idx = self.dynamic_entities[i];
            self.entities[idx].is_dynamic = true;
            self.entities[idx].clear_iteration_flags();
            self.entities[idx].restore_state(0);
        }
    }

    /// Advance the dynamic set by one tick; static entities replay the
    /// precomputed state for `tick + 1`.
    pub fn tick_dynamic(&mut self, tick: usize) -> TickOutcome {
        for i in 0..self.static_entities.len() {
            let idx = self.static_entities[i];
            self.entities[idx].restore_state(tick + 1);
        }

        match self.policy {
            PromotionPolicy::FlagOnly => {
                let (outcome, _) = self.update_dynamic(tick);
                outcome
            }
            PromotionPolicy::Rollback => {
                let mut saved: Vec<(usize, EntityState, f64)> = self
                    .dynamic_entities
                    .iter()
                    .map(|&idx| {
                        (idx, self.entities[idx].state, self.entities[idx].radius_change_speed)
                    })
                    .collect();
                let (mut outcome, mut contact) = self.update_dynamic(tick);
                // Each promotion round moves at least one entity, so this
                // terminates within the entity count.
                while contact {
                    for &(idx, state, rcs) in &saved {
                        self.entities[idx].state = state;
                        self.entities[idx].radius_change_speed = rcs;
                    }
                    let already_dynamic = self.dynamic_entities.len();
                    self.promote_flagged(tick);
                    // Entities promoted this round join the rollback set at
                    // their re-seeded tick-start state, so a later round
                    // restores them too instead of integrating them twice.
                    for &idx in &self.dynamic_entities[already_dynamic..] {
                        saved.push((
                            idx,
                            self.entities[idx].state,
                            self.entities[idx].radius_change_speed,
                        ));
                    }
                    let (o, c) = self.update_dynamic(tick);
                    outcome = o;
                    contact = c;
                }
                outcome
            }
        }
    }

    /// Move every flagged static entity into the dynamic set, re-seeded
    /// from its recorded state at the start of this tick.
    fn promote_flagged(&mut self, tick: usize) {
        let flagged: Vec<usize> = self
            .static_entities
            .iter()
            .copied()
            .filter(|&idx| self.entities[idx].wants_dynamic_on.is_some())
            .collect();
        if flagged.is_empty() {
            return;
        }
        self.static_entities.retain(|idx| !flagged.contains(idx));
        self.static_robots.retain(|idx| !flagged.contains(idx));
        for idx in flagged {
            let e = &mut self.entities[idx];
            e.restore_state(tick);
            e.is_dynamic = true;
            e.radius_change_speed = 0.0;
            self.dynamic_entities.push(idx);
            if idx != self.ball {
                self.dynamic_robots.push(idx);
            }
        }
    }

    // ------------------------------------------------------------------
    // Static precompute phase
    // ------------------------------------------------------------------

    fn update_static(&mut self) {
        let dt = self.rules.dt();
        for i in 0..self.initial_static_robots.len() {
            let idx = self.initial_static_robots[i];
            let e = &mut self.entities[idx];
            steer_grounded_robot(e, dt, self.rules.robot_acceleration);
            move_entity(e, dt, self.rules.gravity, self.rules.max_entity_speed);
            update_robot_radius(e, self.rules);
        }
        {
            let ball = &mut self.entities[self.ball];
            move_entity(ball, dt, self.rules.gravity, self.rules.max_entity_speed);
        }

        let restitution = self.rules.hit_restitution();
        for i in 0..self.initial_static_robots.len() {
            for j in 0..i {
                let (a, b) = pair_mut(
                    &mut self.entities,
                    self.initial_static_robots[i],
                    self.initial_static_robots[j],
                );
                collide_spheres(a, b, restitution);
            }
        }

        for i in 0..self.initial_static_robots.len() {
            let idx = self.initial_static_robots[i];
            {
                let (robot, ball) = pair_mut(&mut self.entities, idx, self.ball);
                collide_spheres(robot, ball, restitution);
            }
            let normal = collide_with_arena(&mut self.entities[idx], self.geometry);
            apply_touch(&mut self.entities[idx], normal);
        }

        collide_with_arena(&mut self.entities[self.ball], self.geometry);
    }

    // ------------------------------------------------------------------
    // Dynamic phase
    // ------------------------------------------------------------------

    /// One dynamic step. Returns the searched robot's collision signals and
    /// whether any static entity was flagged for promotion this tick.
    fn update_dynamic(&mut self, tick: usize) -> (TickOutcome, bool) {
        let dt = self.rules.dt();
        let restitution = self.rules.hit_restitution();
        let mut outcome = TickOutcome::default();
        let mut static_contact = false;

        for i in 0..self.dynamic_robots.len() {
            let idx = self.dynamic_robots[i];
            let e = &mut self.entities[idx];
            steer_grounded_robot(e, dt, self.rules.robot_acceleration);
            move_entity(e, dt, self.rules.gravity, self.rules.max_entity_speed);
            update_robot_radius(e, self.rules);
        }

        let ball_dynamic = self.entities[self.ball].is_dynamic;
        if ball_dynamic {
            let ball = &mut self.entities[self.ball];
            move_entity(ball, dt, self.rules.gravity, self.rules.max_entity_speed);
        }

        for i in 0..self.dynamic_robots.len() {
            for j in 0..i {
                let (ia, ib) = (self.dynamic_robots[i], self.dynamic_robots[j]);
                let (a, b) = pair_mut(&mut self.entities, ia, ib);
                if collide_spheres(a, b, restitution)
                    && (ia == self.searched || ib == self.searched)
                {
                    outcome.searched_hit_robot = true;
                }
            }
        }

        for i in 0..self.static_robots.len() {
            for j in 0..self.dynamic_robots.len() {
                let (s, d) = (self.static_robots[i], self.dynamic_robots[j]);
                if spheres_overlap(&self.entities[s], &self.entities[d]) {
                    self.entities[s].mark_wants_dynamic(tick);
                    static_contact = true;
                }
            }
        }

        for i in 0..self.dynamic_robots.len() {
            let idx = self.dynamic_robots[i];
            if ball_dynamic {
                let (robot, ball) = pair_mut(&mut self.entities, idx, self.ball);
                if collide_spheres(robot, ball, restitution) && idx == self.searched {
                    outcome.searched_hit_ball = true;
                }
            } else if spheres_overlap(&self.entities[idx], &self.entities[self.ball]) {
                let ball = self.ball;
                self.entities[ball].mark_wants_dynamic(tick);
                static_contact = true;
            }

            // Once a promotion is pending this tick's remaining resolution
            // is either redone (Rollback) or knowingly approximate
            // (FlagOnly); matching both, arena contacts are skipped.
            if static_contact {
                continue;
            }
            let normal = collide_with_arena(&mut self.entities[idx], self.geometry);
            apply_touch(&mut self.entities[idx], normal);
        }

        if ball_dynamic {
            for i in 0..self.static_robots.len() {
                let idx = self.static_robots[i];
                if spheres_overlap(&self.entities[idx], &self.entities[self.ball]) {
                    self.entities[idx].mark_wants_dynamic(tick);
                    static_contact = true;
                }
            }
            if !static_contact {
                collide_with_arena(&mut self.entities[self.ball], self.geometry);
            }
        }

        (outcome, static_contact)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn searched_robot(&self) -> &Entity {
        &self.entities[self.searched]
    }

    pub fn ball(&self) -> &Entity {
        &self.entities[self.ball]
    }

    /// Mutable access to one dynamic robot, for the driver to install the
    /// tick's control input.
    pub fn robot_mut(&mut self, idx: usize) -> &mut Entity {
        &mut self.entities[idx]
    }

    /// Indices of currently dynamic robots.
    pub fn dynamic_robot_indices(&self) -> &[usize] {
        &self.dynamic_robots
    }

    pub fn searched_index(&self) -> usize {
        self.searched
    }

    /// Distances the scoring model consumes, sampled from the live states.
    pub fn metrics(&self) -> TickMetrics {
        let robot = &self.entities[self.searched].state;
        let ball = &self.entities[self.ball].state;
        let enemy_goal = self.rules.enemy_goal();
        let own_goal = self.rules.own_goal();
        let half_depth = self.rules.arena.depth / 2.0;

        let mut closest_enemy = f64::INFINITY;
        for e in &self.entities {
            if !e.is_ball && !e.is_teammate {
                closest_enemy = closest_enemy.min((e.state.position - robot.position).norm());
            }
        }
        if closest_enemy.is_infinite() {
            closest_enemy = 0.0;
        }

        let goal_sign = if ball.position.z > half_depth {
            1
        } else if ball.position.z < -half_depth {
            -1
        } else {
            0
        };

        TickMetrics {
            dist_robot_to_ball: (ball.position - robot.position).norm(),
            dist_ball_to_enemy_goal: (enemy_goal - ball.position).norm(),
            dist_ball_to_own_goal: (own_goal - ball.position).norm(),
            dist_robot_to_own_goal: (own_goal - robot.position).norm(),
            dist_closest_enemy: closest_enemy,
            goal_sign,
        }
    }

    #[cfg(test)]
    fn entity(&self, idx: usize) -> &Entity {
        &self.entities[idx]
    }
}

// ----------------------------------------------------------------------
// Physics primitives (shared verbatim by both phases)
// ----------------------------------------------------------------------

/// Semi-implicit Euler step with the position correction term.
pub(crate) fn move_entity(e: &mut Entity, dt: f64, gravity: f64, max_speed: f64) {
    e.state.velocity = clamp_norm(e.state.velocity, max_speed);
    e.state.position += e.state.velocity * dt;
    e.state.position.y -= gravity * dt * dt / 2.0;
    e.state.velocity.y -= gravity * dt;
}

/// While in contact, steer velocity toward the surface-tangential component
/// of the commanded target, with acceleration capped by the contact
/// normal's vertical component and by the remaining velocity gap.
pub(crate) fn steer_grounded_robot(e: &mut Entity, dt: f64, base_acceleration: f64) {
    if !e.state.touch {
        return;
    }
    let normal = e.state.touch_normal;
    let target = e.input.target_velocity - normal * normal.dot(&e.input.target_velocity);
    let change = target - e.state.velocity;
    let gap_sq = change.norm_squared();
    if gap_sq > 0.0 {
        let acceleration = base_acceleration * normal.y.max(0.0);
        let gap = gap_sq.sqrt();
        if acceleration * dt < gap {
            e.state.velocity += change * (acceleration * dt / gap);
        } else {
            e.state.velocity += change;
        }
    }
}

/// Robot radius is an affine function of jump intensity, clamped by rule
/// constants; the change rate feeds the collision closing-velocity terms.
pub(crate) fn update_robot_radius(e: &mut Entity, rules: &RuleSet) {
    e.state.radius = rules.robot_min_radius
        + (rules.robot_max_radius - rules.robot_min_radius) * e.input.jump_speed
            / rules.robot_max_jump_speed;
    e.radius_change_speed = e.input.jump_speed;
}

pub(crate) fn spheres_overlap(a: &Entity, b: &Entity) -> bool {
    let sum_r = a.state.radius + b.state.radius;
    (b.state.position - a.state.position).norm_squared() < sum_r * sum_r
}

/// Resolve one sphere-sphere contact: positional split in inverse
/// proportion to mass, then an impulse when the radius-adjusted closing
/// velocity is negative. Returns whether an impulse fired.
pub(crate) fn collide_spheres(a: &mut Entity, b: &mut Entity, restitution: f64) -> bool {
    let delta_position = b.state.position - a.state.position;
    let distance_sq = delta_position.norm_squared();
    let sum_r = a.state.radius + b.state.radius;
    if sum_r * sum_r <= distance_sq {
        return false;
    }
    let penetration = sum_r - distance_sq.sqrt();
    let k_a = 1.0 / (a.mass * (1.0 / a.mass + 1.0 / b.mass));
    let k_b = 1.0 / (b.mass * (1.0 / a.mass + 1.0 / b.mass));
    let normal = normalized_or_keep(delta_position);
    a.state.position -= normal * (penetration * k_a);
    b.state.position += normal * (penetration * k_b);
    let delta_velocity = (b.state.velocity - a.state.velocity).dot(&normal)
        - (b.radius_change_speed + a.radius_change_speed);
    if delta_velocity < 0.0 {
        let impulse = normal * ((1.0 + restitution) * delta_velocity);
        a.state.velocity += impulse * k_a;
        b.state.velocity -= impulse * k_b;
        return true;
    }
    false
}

/// Resolve one sphere-arena contact via the geometry oracle. Pushes the
/// body out of penetration and reflects the normal velocity with the
/// entity's own arena restitution; returns the contact normal on a bounce.
pub(crate) fn collide_with_arena<G: ArenaGeometry>(e: &mut Entity, geometry: &G) -> Option<Vec3> {
    let contact = geometry.distance_and_normal(e.state.position, e.state.radius);
    if e.state.radius > contact.distance {
        let penetration = e.state.radius - contact.distance;
        e.state.position += contact.normal * penetration;
        let velocity = e.state.velocity.dot(&contact.normal) - e.radius_change_speed;
        if velocity < 0.0 {
            e.state.velocity -= contact.normal * ((1.0 + e.arena_e) * velocity);
            return Some(contact.normal);
        }
    }
    None
}

/// Contact bookkeeping consumed by next tick's ground steering.
fn apply_touch(e: &mut Entity, normal: Option<Vec3>) {
    match normal {
        Some(n) => {
            e.state.touch = true;
            e.state.touch_normal = n;
        }
        None => e.state.touch = false,
    }
}

fn pair_mut(entities: &mut [Entity], i: usize, j: usize) -> (&mut Entity, &mut Entity) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = entities.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = entities.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

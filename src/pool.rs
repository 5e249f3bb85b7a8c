//! Fixed-capacity turtle pool and its round scheduler.
//!
//! The entry point is [`Pool`]. Build it from a seed [`Rule`] and a
//! [`PoolConfig`], register a [`Renderer`](crate::Renderer), then call
//! [`Pool::step`] until [`Pool::is_finished`] (or forever, for continuous
//! generative output).
//!
//! # Rounds
//!
//! A round clears every turtle's "done" marker, then sweeps the slots in
//! ascending index order, invoking each live turtle that is not yet done,
//! until every slot is done. Turtles cloned mid-round are picked up by a
//! later sweep of the same round, so a spawn takes effect immediately.
//! Visitation order, and therefore every random draw, is deterministic for a
//! given seed, capacity and seed rule.
//!
//! A rule that never yields, awaits or dies keeps the sweep going forever;
//! there is no iteration cap.

use crate::ops::{self, TurtleOp};
use crate::primitives::Renderer;
use crate::turtle::{CloneMode, Flow, Outcome, Rule, START, Site, SlotId, Turtle, TurtleState};
use glam::Mat4;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for a turtle pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of simultaneous turtles.
    pub capacity: usize,
    /// Seed of the pool-wide random generator.
    pub seed: u64,
    /// Turtles whose logical x or y scale drops to this value or below are culled.
    pub min_scale: f32,
    /// World size of one pixel, the unit of the grow operator.
    pub pixel_size: f32,
    /// Starting pose of the seed turtle. Identity when absent.
    pub initial_pose: Option<Mat4>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            seed: 0,
            min_scale: 0.25,
            pixel_size: 1.0,
            initial_pose: None,
        }
    }
}

impl PoolConfig {
    /// Checks the configuration for values the scheduler cannot work with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidConfig("capacity must be positive"));
        }
        if !self.min_scale.is_finite() || self.min_scale < 0.0 {
            return Err(PoolError::InvalidConfig(
                "min_scale must be finite and non-negative",
            ));
        }
        if !self.pixel_size.is_finite() || self.pixel_size <= 0.0 {
            return Err(PoolError::InvalidConfig(
                "pixel_size must be finite and positive",
            ));
        }
        if let Some(pose) = self.initial_pose {
            if !pose.is_finite() {
                return Err(PoolError::InvalidConfig("initial_pose must be finite"));
            }
            if pose.x_axis.truncate().length() == 0.0 || pose.y_axis.truncate().length() == 0.0 {
                return Err(PoolError::InvalidConfig(
                    "initial_pose must not collapse the x or y axis",
                ));
            }
        }
        Ok(())
    }
}

/// Errors that can occur when constructing a pool.
#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

struct Slot {
    generation: u32,
    turtle: Turtle,
}

/// A fixed-size arena of turtles plus the shared state they draw on.
pub struct Pool {
    slots: Vec<Slot>,
    live: usize,
    round: u64,
    rng: StdRng,
    min_scale: f32,
    pixel_size: f32,
    pub(crate) renderer: Option<Box<dyn Renderer>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.slots.len())
            .field("live", &self.live)
            .field("round", &self.round)
            .field("min_scale", &self.min_scale)
            .field("pixel_size", &self.pixel_size)
            .field("has_renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Creates a pool whose slot 0 holds a single seed turtle running `rule`.
    pub fn new(rule: Rule, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let pose = config.initial_pose.unwrap_or(Mat4::IDENTITY);

        let mut slots: Vec<Slot> = (0..config.capacity)
            .map(|_| Slot {
                generation: 0,
                turtle: Turtle::default(),
            })
            .collect();
        slots[0].turtle = Turtle::seed(rule, pose);

        debug!(
            "pool created: capacity={} seed={} min_scale={} pixel_size={}",
            config.capacity, config.seed, config.min_scale, config.pixel_size
        );

        Ok(Self {
            slots,
            live: 1,
            round: 0,
            rng: StdRng::seed_from_u64(config.seed),
            min_scale: config.min_scale,
            pixel_size: config.pixel_size,
            renderer: None,
        })
    }

    /// Registers the callback that receives emitted polygons.
    pub fn set_renderer(&mut self, renderer: impl Renderer + 'static) {
        self.renderer = Some(Box::new(renderer));
    }

    /// Number of live turtles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of completed rounds.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// `true` once every turtle has retired.
    pub fn is_finished(&self) -> bool {
        self.live == 0
    }

    /// Logical scale at or below which turtles are culled.
    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    /// Changes the cull threshold; takes effect from the next visit.
    pub fn set_min_scale(&mut self, min_scale: f32) {
        self.min_scale = min_scale;
    }

    /// World size of one pixel, as used by the grow operator.
    pub fn pixel_size(&self) -> f32 {
        self.pixel_size
    }

    /// Looks up a live turtle. Stale handles resolve to `None`.
    pub fn turtle(&self, id: SlotId) -> Option<&Turtle> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation && !slot.turtle.is_free())
            .map(|slot| &slot.turtle)
    }

    /// Live turtles in slot order.
    pub fn turtles(&self) -> impl Iterator<Item = (SlotId, &Turtle)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.turtle.is_free())
            .map(|(index, slot)| {
                (
                    SlotId {
                        index,
                        generation: slot.generation,
                    },
                    &slot.turtle,
                )
            })
    }

    /// Applies an operator list to `turtle`.
    pub fn transform(&self, turtle: &mut Turtle, ops: &[TurtleOp]) {
        ops::apply(turtle, ops, self.pixel_size);
    }

    // --- Randomness ---

    /// Uniform draw in `[min, max)`. A degenerate range returns `min`.
    pub fn frand(&mut self, min: f32, max: f32) -> f32 {
        min + self.rng.r#gen::<f32>() * (max - min)
    }

    /// `true` with probability `p`.
    pub fn brand(&mut self, p: f32) -> bool {
        self.frand(0.0, 1.0) <= p
    }

    /// Uniform draw in `[x - a, x + a)`.
    pub fn pm(&mut self, x: f32, a: f32) -> f32 {
        self.frand(x - a, x + a)
    }

    // --- Cloning ---

    /// Copies `parent` into the first free slot and applies `ops` to the copy.
    ///
    /// The child resumes at `site` in the parent's rule with the
    /// just-cloned marker set, so the rule can branch on
    /// [`Turtle::take_just_cloned`]. In [`CloneMode::Call`] the parent becomes
    /// blocked on the child; its rule should then return [`Flow::Await`].
    ///
    /// Returns `None`, with no other effect, when the pool is full.
    ///
    /// # Panics
    ///
    /// If `parent` is already waiting on another turtle.
    pub fn fork(
        &mut self,
        parent: &mut Turtle,
        mode: CloneMode,
        ops: &[TurtleOp],
        site: Site,
    ) -> Option<SlotId> {
        assert!(
            parent.wait.is_none(),
            "a turtle blocked on a call cannot clone"
        );
        parent.state.remove(TurtleState::JUST_CLONED);

        let Some(index) = self.slots.iter().position(|slot| slot.turtle.is_free()) else {
            debug!("pool full ({} slots), {mode:?} dropped", self.slots.len());
            return None;
        };

        let mut child = parent.clone();
        child.resume = site;
        child.sleep = 0;
        child.wait = None;
        child.child_outcome = None;
        child.state = TurtleState::JUST_CLONED;
        ops::apply(&mut child, ops, self.pixel_size);

        let slot = &mut self.slots[index];
        slot.turtle = child;
        self.live += 1;
        let id = SlotId {
            index,
            generation: slot.generation,
        };
        trace!("cloned into slot {index} ({mode:?}), live={}", self.live);

        if mode == CloneMode::Call {
            parent.wait = Some(id);
        }
        Some(id)
    }

    /// Starts `rule` in a new turtle; the parent keeps running.
    pub fn spawn(&mut self, parent: &mut Turtle, rule: Rule, ops: &[TurtleOp]) -> Option<SlotId> {
        self.clone_into_rule(parent, CloneMode::Spawn, rule, ops)
    }

    /// Starts `rule` in a new turtle and blocks the parent on it.
    ///
    /// The parent's rule should return [`Flow::Await`] right after.
    pub fn call(&mut self, parent: &mut Turtle, rule: Rule, ops: &[TurtleOp]) -> Option<SlotId> {
        self.clone_into_rule(parent, CloneMode::Call, rule, ops)
    }

    fn clone_into_rule(
        &mut self,
        parent: &mut Turtle,
        mode: CloneMode,
        rule: Rule,
        ops: &[TurtleOp],
    ) -> Option<SlotId> {
        let id = self.fork(parent, mode, ops, START)?;
        let child = &mut self.slots[id.index].turtle;
        if child.take_just_cloned() {
            child.rule = Some(rule);
        }
        Some(id)
    }

    // --- Scheduling ---

    /// Runs one round.
    pub fn step(&mut self) {
        for slot in &mut self.slots {
            slot.turtle.state.remove(TurtleState::DONE);
        }

        let mut sweeps = 0u32;
        loop {
            sweeps += 1;
            for index in 0..self.slots.len() {
                if !self.slots[index].turtle.is_done() {
                    self.visit(index);
                }
            }
            if self.slots.iter().all(|slot| slot.turtle.is_done()) {
                break;
            }
        }

        self.round += 1;
        trace!(
            "round {} settled after {sweeps} sweeps, live={}",
            self.round, self.live
        );
    }

    fn visit(&mut self, index: usize) {
        let turtle = &mut self.slots[index].turtle;
        if turtle.is_free() {
            turtle.mark_done();
            return;
        }

        if let Some(target) = turtle.wait {
            let target = &self.slots[target.index];
            debug_assert!(!target.turtle.is_free(), "waiting on a retired slot");
            if target.turtle.is_done() {
                self.slots[index].turtle.mark_done();
            }
            return;
        }

        if turtle.sleep > 0 {
            turtle.sleep -= 1;
            turtle.mark_done();
            return;
        }

        if turtle.below_scale(self.min_scale) {
            self.retire(index, Outcome::Culled);
            return;
        }

        self.invoke(index);
    }

    /// Runs the turtle's rule until it suspends, blocks or dies.
    fn invoke(&mut self, index: usize) {
        // Run on a copy: the rule needs `&mut Pool` for cloning and drawing,
        // and the occupied slot must keep looking occupied meanwhile.
        let mut turtle = self.slots[index].turtle.clone();
        let outcome = loop {
            let Some(rule) = turtle.rule else {
                unreachable!("invoked a free slot");
            };
            match rule(&mut turtle, self) {
                Flow::Yield(site) => {
                    turtle.resume = site;
                    break None;
                }
                Flow::YieldFor(site, rounds) => {
                    turtle.resume = site;
                    turtle.sleep = rounds.saturating_sub(1);
                    break None;
                }
                Flow::Goto(site) => turtle.resume = site,
                Flow::Await(site) => {
                    turtle.resume = site;
                    if turtle.wait.is_some() {
                        break None;
                    }
                }
                Flow::Jump(next) => {
                    turtle.rule = Some(next);
                    turtle.resume = START;
                }
                Flow::Kill => break Some(Outcome::Finished),
            }
        };
        turtle.time += 1;
        turtle.mark_done();
        self.slots[index].turtle = turtle;

        if let Some(outcome) = outcome {
            self.retire(index, outcome);
        }
    }

    /// Frees a slot, releasing every turtle blocked on it.
    ///
    /// `wait` is only ever set by [`Pool::fork`] to the current generation of
    /// a live slot, so matching on the exact [`SlotId`] releases every waiter.
    fn retire(&mut self, index: usize, outcome: Outcome) {
        let id = SlotId {
            index,
            generation: self.slots[index].generation,
        };
        for slot in &mut self.slots {
            if slot.turtle.wait == Some(id) {
                slot.turtle.wait = None;
                slot.turtle.child_outcome = Some(outcome);
            }
        }

        let slot = &mut self.slots[index];
        slot.turtle = Turtle::default();
        slot.turtle.mark_done();
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        debug!("slot {index} retired ({outcome:?}), live={}", self.live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Transform;

    fn finish(_: &mut Turtle, _: &mut Pool) -> Flow {
        Flow::Kill
    }

    fn hold(t: &mut Turtle, _: &mut Pool) -> Flow {
        Flow::Yield(t.resume_point() + 1)
    }

    #[test]
    fn validate_rejects_bad_config() {
        let bad = [
            PoolConfig {
                capacity: 0,
                ..Default::default()
            },
            PoolConfig {
                min_scale: f32::NAN,
                ..Default::default()
            },
            PoolConfig {
                pixel_size: 0.0,
                ..Default::default()
            },
            PoolConfig {
                initial_pose: Some(Mat4::ZERO),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                Pool::new(finish, config),
                Err(PoolError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn seed_occupies_slot_zero() {
        let pool = Pool::new(finish, PoolConfig::default()).unwrap();
        assert_eq!(pool.live_count(), 1);
        let (id, turtle) = pool.turtles().next().unwrap();
        assert_eq!(id.index, 0);
        assert_eq!(turtle.resume_point(), START);
    }

    #[test]
    fn kill_frees_slot_and_bumps_generation() {
        let mut pool = Pool::new(finish, PoolConfig::default()).unwrap();
        let (id, _) = pool.turtles().next().unwrap();
        pool.step();
        assert!(pool.is_finished());
        assert!(pool.turtle(id).is_none());
        assert_eq!(pool.slots[0].generation, id.generation + 1);
    }

    #[test]
    fn fork_copies_state_and_applies_ops_to_child_only() {
        let mut pool = Pool::new(hold, PoolConfig::default()).unwrap();
        let mut parent = pool.slots[0].turtle.clone();
        parent.vars[2] = 7.0;
        let id = pool
            .fork(&mut parent, CloneMode::Spawn, &Transform::new().scale(0.5), 9)
            .unwrap();
        assert_eq!(id.index, 1);
        let child = pool.turtle(id).unwrap();
        assert_eq!(child.vars[2], 7.0);
        assert_eq!(child.scale.x, 0.5);
        assert_eq!(child.resume_point(), 9);
        assert_eq!(parent.scale.x, 1.0);
        assert!(parent.wait_target().is_none());
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn call_mode_blocks_parent() {
        let mut pool = Pool::new(hold, PoolConfig::default()).unwrap();
        let mut parent = pool.slots[0].turtle.clone();
        let id = pool.call(&mut parent, finish, &[]).unwrap();
        assert_eq!(parent.wait_target(), Some(id));
    }

    #[test]
    #[should_panic(expected = "cannot clone")]
    fn waiting_turtle_cannot_clone() {
        let mut pool = Pool::new(hold, PoolConfig::default()).unwrap();
        let mut parent = pool.slots[0].turtle.clone();
        pool.call(&mut parent, finish, &[]);
        pool.spawn(&mut parent, finish, &[]);
    }

    #[test]
    fn random_draws_are_seeded() {
        let config = PoolConfig {
            seed: 42,
            ..Default::default()
        };
        let mut a = Pool::new(finish, config.clone()).unwrap();
        let mut b = Pool::new(finish, config).unwrap();
        let xs: Vec<f32> = (0..16).map(|_| a.pm(0.0, 5.0)).collect();
        let ys: Vec<f32> = (0..16).map(|_| b.pm(0.0, 5.0)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (-5.0..5.0).contains(x)));
        assert_eq!(a.frand(3.0, 3.0), 3.0);
        assert!(a.brand(1.0));
    }
}

//! Turtle state and the resumable rule contract.

use crate::color::Hsla;
use crate::geometry;
use crate::pool::Pool;
use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Number of user variable slots carried by every turtle.
pub const VAR_COUNT: usize = 8;

/// Identifier of a suspension site inside a rule.
///
/// `START` means "enter from the top"; any other value is chosen by the rule
/// author and only needs to be unique within one rule.
pub type Site = u32;

/// The resume point of a rule that has not run yet.
pub const START: Site = 0;

/// A rule procedure.
///
/// Called once per scheduled invocation with the turtle and the pool that owns
/// it. The rule dispatches on [`Turtle::resume_point`] and reports where to
/// continue through the returned [`Flow`].
pub type Rule = fn(&mut Turtle, &mut Pool) -> Flow;

/// What a rule wants the scheduler to do after it returns.
#[derive(Clone, Copy, Debug)]
pub enum Flow {
    /// Suspend for the rest of this round and resume at the given site next round.
    Yield(Site),
    /// Suspend for `rounds` rounds (at least one), then resume at the site.
    YieldFor(Site, u32),
    /// Re-enter the rule right away at another site, within the same invocation.
    Goto(Site),
    /// Block on the child created by the last [`Pool::call`] or call-mode
    /// [`Pool::fork`], then resume at the site once it retires.
    ///
    /// If the clone was dropped because the pool is full there is nothing to
    /// wait for and execution continues at the site immediately.
    Await(Site),
    /// Tail call: switch to another rule and start it from the top immediately.
    Jump(Rule),
    /// Terminate this turtle.
    Kill,
}

/// How a retired turtle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The rule returned [`Flow::Kill`].
    Finished,
    /// The logical scale fell to or below the pool's minimum scale.
    Culled,
}

/// Clone behaviour for [`Pool::fork`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloneMode {
    /// The parent keeps running in the same round.
    Spawn,
    /// The parent blocks until the child retires.
    Call,
}

/// Handle to a pool slot.
///
/// The generation changes every time a slot is freed, so a handle kept past
/// its turtle's retirement never resolves to the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    /// Position in the pool.
    pub index: usize,
    /// Occupancy count of the slot when the handle was issued.
    pub generation: u32,
}

bitflags! {
    /// Engine-private per-turtle state.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct TurtleState: u8 {
        /// Finished for the current round.
        const DONE = 1 << 0;
        /// Set on a fresh clone, consumed by `take_just_cloned`.
        const JUST_CLONED = 1 << 1;
    }
}

/// A single agent of the swarm.
///
/// Carries a pose, a logical scale, a color, opaque user flags and the
/// bookkeeping that lets its rule suspend and resume.
#[derive(Clone, Debug)]
pub struct Turtle {
    /// Local-to-world transform.
    pub pose: Mat4,

    /// Logical x/y scale, tracked apart from `pose` for scale-relative operators.
    pub scale: Vec2,

    /// Current fill color.
    pub color: Hsla,

    /// User flag bits, handed to the renderer untouched.
    pub flags: u32,

    /// User variables.
    pub vars: [f32; VAR_COUNT],

    /// Loop position for counted block loops; survives suspension.
    pub index: u32,

    /// Loop bound for counted block loops.
    pub count: u32,

    pub(crate) rule: Option<Rule>,
    pub(crate) resume: Site,
    pub(crate) sleep: u32,
    pub(crate) wait: Option<SlotId>,
    pub(crate) state: TurtleState,
    pub(crate) time: u64,
    pub(crate) child_outcome: Option<Outcome>,
}

impl Default for Turtle {
    fn default() -> Self {
        Self {
            pose: Mat4::IDENTITY,
            scale: Vec2::ONE,
            color: Hsla::default(),
            flags: 0,
            vars: [0.0; VAR_COUNT],
            index: 0,
            count: 0,
            rule: None,
            resume: START,
            sleep: 0,
            wait: None,
            state: TurtleState::empty(),
            time: 0,
            child_outcome: None,
        }
    }
}

impl Turtle {
    /// Creates a seed turtle running `rule` from `pose`.
    pub(crate) fn seed(rule: Rule, pose: Mat4) -> Self {
        Self {
            pose,
            scale: geometry::axis_lengths(&pose),
            rule: Some(rule),
            ..Default::default()
        }
    }

    /// Site the rule should continue from.
    pub fn resume_point(&self) -> Site {
        self.resume
    }

    /// Number of invocations that executed user code.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Slot this turtle is blocked on, if any.
    pub fn wait_target(&self) -> Option<SlotId> {
        self.wait
    }

    /// How the most recently awaited child ended.
    pub fn child_outcome(&self) -> Option<Outcome> {
        self.child_outcome
    }

    /// Returns `true` exactly once on a freshly cloned turtle.
    ///
    /// Lets a site shared by parent and child tell which side it is running.
    pub fn take_just_cloned(&mut self) -> bool {
        let cloned = self.state.contains(TurtleState::JUST_CLONED);
        self.state.remove(TurtleState::JUST_CLONED);
        cloned
    }

    /// World-space position of the turtle's origin.
    pub fn position(&self) -> Vec3 {
        geometry::origin(&self.pose)
    }

    /// Current color as RGBA.
    pub fn rgba(&self) -> Vec4 {
        self.color.to_rgba()
    }

    pub(crate) fn is_free(&self) -> bool {
        self.rule.is_none()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.contains(TurtleState::DONE)
    }

    pub(crate) fn mark_done(&mut self) {
        self.state.insert(TurtleState::DONE);
    }

    /// Either logical scale component is at or below `min_scale`.
    pub(crate) fn below_scale(&self, min_scale: f32) -> bool {
        self.scale.x.abs() <= min_scale || self.scale.y.abs() <= min_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(_: &mut Turtle, _: &mut Pool) -> Flow {
        Flow::Kill
    }

    #[test]
    fn seed_takes_scale_from_pose() {
        let pose = Mat4::from_scale(Vec3::new(640.0, 480.0, 1.0));
        let t = Turtle::seed(idle, pose);
        assert_eq!(t.scale, Vec2::new(640.0, 480.0));
        assert_eq!(t.color.alpha, 1.0);
        assert_eq!(t.resume_point(), START);
        assert!(!t.is_free());
    }

    #[test]
    fn just_cloned_is_one_shot() {
        let mut t = Turtle::default();
        t.state.insert(TurtleState::JUST_CLONED);
        assert!(t.take_just_cloned());
        assert!(!t.take_just_cloned());
    }

    #[test]
    fn below_scale_checks_both_axes() {
        let mut t = Turtle::default();
        assert!(!t.below_scale(0.25));
        t.scale = Vec2::new(1.0, -0.2);
        assert!(t.below_scale(0.25));
        t.scale = Vec2::new(0.25, 1.0);
        assert!(t.below_scale(0.25));
    }
}

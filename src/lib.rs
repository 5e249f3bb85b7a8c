//! # turtle-swarm
//!
//! A procedural shape generator driven by a fixed pool of cooperatively
//! scheduled "turtles". Each turtle runs a resumable [`Rule`], accumulates a
//! pose, a color and user flags through [`Transform`] operators, and emits
//! polygons to a [`Renderer`].
//!
//! Rules are plain functions that dispatch on the turtle's resume point and
//! return a [`Flow`] telling the scheduler where to continue:
//!
//! ```
//! use turtle_swarm::{Flow, Pool, PoolConfig, START, Transform, Turtle};
//!
//! fn blink(t: &mut Turtle, pool: &mut Pool) -> Flow {
//!     match t.resume_point() {
//!         START => {
//!             pool.square(t, &Transform::new().lightness(0.5));
//!             Flow::Yield(1)
//!         }
//!         _ => {
//!             pool.circle(t, &[]);
//!             Flow::Kill
//!         }
//!     }
//! }
//!
//! let mut pool = Pool::new(blink, PoolConfig::default()).unwrap();
//! pool.set_renderer(|_: &[glam::Vec3], _: turtle_swarm::Hsla, _: u32| {});
//! while !pool.is_finished() {
//!     pool.step();
//! }
//! assert_eq!(pool.round(), 2);
//! ```
//!
//! Everything runs on the calling thread: one [`Pool::step`] call runs every
//! live turtle until it yields, blocks or dies.

pub mod color;
pub mod geometry;
pub mod ops;
pub mod pool;
pub mod primitives;
pub mod turtle;

pub use color::Hsla;
pub use ops::{OpKind, OpStreamError, Transform, TurtleOp};
pub use pool::{Pool, PoolConfig, PoolError};
pub use primitives::Renderer;
pub use turtle::*;

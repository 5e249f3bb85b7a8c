//! Shape primitives and the render callback they feed.
//!
//! Every primitive is built in the turtle's unit frame (the square spans
//! `[-0.5, 0.5]²`, the circle has radius 0.5), transformed through the
//! turtle's pose and handed to the pool's [`Renderer`] exactly once.

use crate::color::{Hsla, mix};
use crate::geometry;
use crate::ops::TurtleOp;
use crate::pool::Pool;
use crate::turtle::Turtle;
use bevy_math::primitives::RegularPolygon;
use glam::{Vec2, Vec3};
use log::error;
use std::f32::consts::{FRAC_PI_2, TAU};

/// Number of sides of the circle approximation.
pub const CIRCLE_SIDES: u32 = 32;

/// Points per corner arc of a rounded square.
const CORNER_POINTS: usize = 8;

/// Receives emitted polygons.
///
/// Vertices are in world space and form a triangle fan. `color` is the
/// emitting turtle's HSLA color and `flags` its user flag bits.
pub trait Renderer {
    /// Called once per emitted primitive.
    fn render(&mut self, vertices: &[Vec3], color: Hsla, flags: u32);
}

impl<F> Renderer for F
where
    F: FnMut(&[Vec3], Hsla, u32),
{
    fn render(&mut self, vertices: &[Vec3], color: Hsla, flags: u32) {
        self(vertices, color, flags)
    }
}

/// Unit square centered on the origin.
pub fn square() -> Vec<Vec2> {
    vec![
        Vec2::new(-0.5, -0.5),
        Vec2::new(0.5, -0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(-0.5, 0.5),
    ]
}

/// Unit square with rounded corners.
///
/// The corner radius, in logical units, is `max((min(sx, sy) - inset) / 2, 0)`
/// where `(sx, sy)` is the logical scale, so corners stay round under
/// anisotropic scaling. An `inset` of 0 turns the square into a stadium or disc.
pub fn rounded_square(scale: Vec2, inset: f32) -> Vec<Vec2> {
    let r = ((scale.min_element() - inset) / 2.0).max(0.0);
    let radius = Vec2::new(r / scale.x, r / scale.y);
    let centers = [
        Vec2::new(0.5 - radius.x, 0.5 - radius.y),
        Vec2::new(-0.5 + radius.x, 0.5 - radius.y),
        Vec2::new(-0.5 + radius.x, -0.5 + radius.y),
        Vec2::new(0.5 - radius.x, -0.5 + radius.y),
    ];
    let step = FRAC_PI_2 / (CORNER_POINTS - 1) as f32;

    let mut points = Vec::with_capacity(4 * CORNER_POINTS);
    for (corner, center) in centers.iter().enumerate() {
        let start = corner as f32 * FRAC_PI_2;
        for i in 0..CORNER_POINTS {
            let (sin, cos) = (start + i as f32 * step).sin_cos();
            points.push(*center + radius * Vec2::new(cos, sin));
        }
    }
    points
}

/// Regular 32-gon of radius 0.5, first vertex on `+X`.
pub fn circle() -> Vec<Vec2> {
    // RegularPolygon starts at +Y; rotate back a quarter turn.
    RegularPolygon::new(0.5, CIRCLE_SIDES)
        .vertices(-FRAC_PI_2)
        .into_iter()
        .collect()
}

/// Star with `branches` tips on the unit circle.
///
/// The fan starts at the origin, then alternates tips and mid-points, repeating
/// the first tip at the end. `center` in `[-1, 1]` slides each mid-point along
/// the edge between its two tips and `flatness` in `[0, 1]` pulls it toward the
/// origin.
///
/// # Panics
///
/// If `branches` is zero.
pub fn star(branches: u32, flatness: f32, center: f32) -> Vec<Vec2> {
    assert!(branches > 0, "a star needs at least one branch");
    let n = branches as usize;
    let tip = |i: usize| {
        let (sin, cos) = (i as f32 * TAU / n as f32).sin_cos();
        Vec2::new(cos, sin) * 0.5
    };
    let along = (center + 1.0) / 2.0;

    let mut points = Vec::with_capacity(2 + 2 * n);
    points.push(Vec2::ZERO);
    for i in 0..n {
        let (a, b) = (tip(i), tip(i + 1));
        points.push(a);
        let edge = Vec2::new(mix(a.x, b.x, along), mix(a.y, b.y, along));
        points.push(edge * (1.0 - flatness));
    }
    points.push(tip(n));
    points
}

/// Triangle, the three-branch star.
pub fn triangle() -> Vec<Vec2> {
    star(3, 0.0, 0.0)
}

/// Primitive emission from inside a rule.
///
/// Each method applies `ops` to a throwaway copy of `turtle`, so the turtle
/// itself is left as it was.
impl Pool {
    /// Unit square.
    pub fn square(&mut self, turtle: &Turtle, ops: &[TurtleOp]) {
        self.emit(turtle, ops, |_| square());
    }

    /// Rounded square; see [`rounded_square`].
    pub fn rounded_square(&mut self, turtle: &Turtle, inset: f32, ops: &[TurtleOp]) {
        self.emit(turtle, ops, |t| rounded_square(t.scale, inset));
    }

    /// Circle of diameter 1, [`CIRCLE_SIDES`] vertices.
    pub fn circle(&mut self, turtle: &Turtle, ops: &[TurtleOp]) {
        self.emit(turtle, ops, |_| circle());
    }

    /// Star; see [`star`].
    pub fn star(
        &mut self,
        turtle: &Turtle,
        branches: u32,
        flatness: f32,
        center: f32,
        ops: &[TurtleOp],
    ) {
        self.emit(turtle, ops, |_| star(branches, flatness, center));
    }

    /// Three-pointed star with flat sides.
    pub fn triangle(&mut self, turtle: &Turtle, ops: &[TurtleOp]) {
        self.emit(turtle, ops, |_| triangle());
    }

    /// Arbitrary polygon given in the turtle's unit frame.
    pub fn polygon(&mut self, turtle: &Turtle, points: &[Vec2], ops: &[TurtleOp]) {
        self.emit(turtle, ops, |_| points.to_vec());
    }

    fn emit(
        &mut self,
        turtle: &Turtle,
        ops: &[TurtleOp],
        build: impl FnOnce(&Turtle) -> Vec<Vec2>,
    ) {
        let mut local = turtle.clone();
        self.transform(&mut local, ops);
        let vertices: Vec<Vec3> = build(&local)
            .into_iter()
            .map(|p| geometry::transform_point(&local.pose, p))
            .collect();
        self.render(&vertices, local.color, local.flags);
    }

    /// Sends world-space vertices to the renderer.
    ///
    /// # Panics
    ///
    /// If no renderer has been registered.
    pub fn render(&mut self, vertices: &[Vec3], color: Hsla, flags: u32) {
        let Some(renderer) = self.renderer.as_mut() else {
            error!("primitive emitted with no renderer registered");
            panic!("a renderer must be set before primitives are emitted");
        };
        renderer.render(vertices, color, flags);
    }
}

//! Transform operators applied to a turtle's pose, color and user state.
//!
//! An operator is a [`TurtleOp`]: an [`OpKind`] plus up to [`MAX_OPERANDS`]
//! floats. Operator lists are usually built with the [`Transform`] builder:
//!
//! ```
//! use turtle_swarm::Transform;
//!
//! let ops = Transform::new().translate(0.4, 0.0).rotate(3.0).scale(0.99);
//! assert_eq!(ops.len(), 3);
//! ```
//!
//! Flat float streams in the classic sentinel encoding can be turned into
//! typed operators with [`decode`].

use crate::color::{mix, mix_angle, move_value, wrap_degrees};
use crate::geometry;
use crate::turtle::{Turtle, VAR_COUNT};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, RangeInclusive};
use thiserror::Error;

/// Largest operand count of any operator.
pub const MAX_OPERANDS: usize = 8;

/// Marks the start of an operator in a flat float stream.
pub const OP_START: f32 = f32::MAX;

/// Operator kinds.
///
/// The discriminants are the opcodes used by the flat stream encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpKind {
    /// `(x[, y[, z]])`: y defaults to x, z to 1.
    Scale = 1,
    /// `()`: equalize the logical x/y scale, keeping the larger.
    ScaleNormalize = 2,
    /// `(axis, v)`: scale a single axis (0, 1 or 2).
    ScaleAxis = 3,
    /// `(x[, y[, z]])`: local translation, missing components are 0.
    Translate = 4,
    /// `(degrees)`: rotation around local Z.
    Rotate = 5,
    /// `(x[, y])`: grow by a fixed number of pixels.
    Grow = 6,
    /// `(degrees)`: mirror across a line through the origin.
    Flip = 7,
    /// `(h, s, l)` or `(t, h, s, l)`.
    Hsl = 8,
    /// `(delta)` or `(t, target)`.
    Hue = 9,
    /// `(v)` or `(t, target)`.
    Saturation = 10,
    /// `(v)` or `(t, target)`.
    Lightness = 11,
    /// `(v)` or `(t, target)`.
    Alpha = 12,
    /// `(index, value, ...)`: pairs of user variable assignments.
    SetVar = 13,
    /// `(bit[, on])`: set or clear one user flag bit (0..32); `on = 0` clears.
    SetFlag = 14,
}

impl OpKind {
    /// Allowed operand counts.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Self::Scale | Self::Translate => 1..=3,
            Self::ScaleNormalize => 0..=0,
            Self::ScaleAxis => 2..=2,
            Self::Rotate | Self::Flip => 1..=1,
            Self::Grow
            | Self::Hue
            | Self::Saturation
            | Self::Lightness
            | Self::Alpha
            | Self::SetFlag => 1..=2,
            Self::Hsl => 3..=4,
            Self::SetVar => 2..=MAX_OPERANDS,
        }
    }

    /// Whether `n` operands are acceptable for this operator.
    pub fn accepts(self, n: usize) -> bool {
        self.arity().contains(&n) && (self != Self::SetVar || n % 2 == 0)
    }

    /// Maps a stream opcode back to its kind.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Scale,
            2 => Self::ScaleNormalize,
            3 => Self::ScaleAxis,
            4 => Self::Translate,
            5 => Self::Rotate,
            6 => Self::Grow,
            7 => Self::Flip,
            8 => Self::Hsl,
            9 => Self::Hue,
            10 => Self::Saturation,
            11 => Self::Lightness,
            12 => Self::Alpha,
            13 => Self::SetVar,
            14 => Self::SetFlag,
            _ => return None,
        })
    }
}

/// A single operator with its operands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurtleOp {
    kind: OpKind,
    args: [f32; MAX_OPERANDS],
    len: u8,
}

impl TurtleOp {
    /// Builds an operator.
    ///
    /// # Panics
    ///
    /// If `args.len()` is outside the operator's arity. Operator programs are
    /// authored by the embedding code, so a wrong count is a programming error.
    pub fn new(kind: OpKind, args: &[f32]) -> Self {
        assert!(
            kind.accepts(args.len()),
            "{kind:?} takes {:?} operands, got {}",
            kind.arity(),
            args.len()
        );
        let mut buf = [0.0; MAX_OPERANDS];
        buf[..args.len()].copy_from_slice(args);
        Self {
            kind,
            args: buf,
            len: args.len() as u8,
        }
    }

    /// Operator kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Operands actually supplied.
    pub fn args(&self) -> &[f32] {
        &self.args[..self.len as usize]
    }
}

/// Applies `ops` in order to `turtle`.
///
/// `pixel_size` is the world size of one pixel, used by [`OpKind::Grow`].
///
/// # Panics
///
/// On an operand count outside an operator's arity, a scale axis other than
/// 0, 1 or 2, a variable index outside `0..VAR_COUNT`, or a flag bit outside
/// `0..32`.
pub fn apply(turtle: &mut Turtle, ops: &[TurtleOp], pixel_size: f32) {
    for op in ops {
        apply_one(turtle, op, pixel_size);
    }
}

fn apply_one(turtle: &mut Turtle, op: &TurtleOp, pixel_size: f32) {
    let args = op.args();
    let n = args.len();
    assert!(
        op.kind.accepts(n),
        "{:?} takes {:?} operands, got {n}",
        op.kind,
        op.kind.arity()
    );
    // Operand with default.
    let p = |idx: usize, def: f32| -> f32 { args.get(idx).copied().unwrap_or(def) };

    match op.kind {
        OpKind::Scale => {
            let x = args[0];
            scale(turtle, x, p(1, x), p(2, 1.0));
        }
        OpKind::ScaleNormalize => scale_normalize(turtle),
        OpKind::ScaleAxis => {
            let v = args[1];
            match args[0] as i32 {
                0 => scale(turtle, v, 1.0, 1.0),
                1 => scale(turtle, 1.0, v, 1.0),
                2 => scale(turtle, 1.0, 1.0, v),
                axis => panic!("scale axis must be 0, 1 or 2, got {axis}"),
            }
        }
        OpKind::Translate => {
            geometry::translate(&mut turtle.pose, args[0], p(1, 0.0), p(2, 0.0));
        }
        OpKind::Rotate => geometry::rotate_z(&mut turtle.pose, args[0]),
        OpKind::Flip => geometry::flip(&mut turtle.pose, args[0]),
        OpKind::Grow => {
            let x = args[0];
            grow(turtle, x * pixel_size, p(1, x) * pixel_size);
        }
        OpKind::Hue => {
            let color = &mut turtle.color;
            color.hue = if n == 1 {
                wrap_degrees(color.hue + args[0])
            } else {
                mix_angle(color.hue, args[1], args[0])
            };
        }
        OpKind::Saturation => adjust(&mut turtle.color.saturation, args),
        OpKind::Lightness => adjust(&mut turtle.color.lightness, args),
        OpKind::Alpha => adjust(&mut turtle.color.alpha, args),
        OpKind::Hsl => {
            let color = &mut turtle.color;
            if n == 3 {
                color.hue = wrap_degrees(color.hue + args[0]);
                color.saturation = move_value(color.saturation, args[1]);
                color.lightness = move_value(color.lightness, args[2]);
            } else {
                let t = args[0];
                color.hue = mix_angle(color.hue, args[1], t);
                color.saturation = mix(color.saturation, args[2], t);
                color.lightness = mix(color.lightness, args[3], t);
            }
        }
        OpKind::SetVar => {
            for pair in args.chunks_exact(2) {
                let idx = pair[0] as i64;
                assert!(
                    (0..VAR_COUNT as i64).contains(&idx),
                    "variable index {idx} out of range 0..{VAR_COUNT}"
                );
                turtle.vars[idx as usize] = pair[1];
            }
        }
        OpKind::SetFlag => {
            let bit = args[0] as i64;
            assert!(
                (0..u32::BITS as i64).contains(&bit),
                "flag bit {bit} out of range 0..{}",
                u32::BITS
            );
            let mask = 1u32 << bit;
            if p(1, 1.0) != 0.0 {
                turtle.flags |= mask;
            } else {
                turtle.flags &= !mask;
            }
        }
    }
}

/// One-operand form moves toward a bound, two-operand form mixes toward a target.
fn adjust(channel: &mut f32, args: &[f32]) {
    *channel = match *args {
        [v] => move_value(*channel, v),
        [t, target] => mix(*channel, target, t),
        _ => unreachable!("arity checked by caller"),
    };
}

fn scale(turtle: &mut Turtle, x: f32, y: f32, z: f32) {
    geometry::scale(&mut turtle.pose, x, y, z);
    turtle.scale.x *= x;
    turtle.scale.y *= y;
}

fn scale_normalize(turtle: &mut Turtle) {
    let (x, y) = (turtle.scale.x, turtle.scale.y);
    if y > x {
        scale(turtle, y / x, 1.0, 1.0);
    } else if x > y {
        scale(turtle, 1.0, x / y, 1.0);
    }
}

/// Widens the logical size by `2 * dx` and `2 * dy` world units.
fn grow(turtle: &mut Turtle, dx: f32, dy: f32) {
    let (sx, sy) = (turtle.scale.x, turtle.scale.y);
    let kx = (2.0 * dx + sx) / sx;
    let ky = (2.0 * dy + sy) / sy;
    scale(turtle, kx, ky, 1.0);
}

/// Chainable builder for operator lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    ops: Vec<TurtleOp>,
}

impl Transform {
    /// An empty operator list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arbitrary operator.
    pub fn op(mut self, kind: OpKind, args: &[f32]) -> Self {
        self.ops.push(TurtleOp::new(kind, args));
        self
    }

    /// Uniform scale.
    pub fn scale(self, s: f32) -> Self {
        self.op(OpKind::Scale, &[s])
    }

    /// Scales x and y independently.
    pub fn scale_xy(self, x: f32, y: f32) -> Self {
        self.op(OpKind::Scale, &[x, y])
    }

    /// Scales all three axes.
    pub fn scale_xyz(self, x: f32, y: f32, z: f32) -> Self {
        self.op(OpKind::Scale, &[x, y, z])
    }

    /// Raises the smaller logical axis to match the larger one.
    pub fn scale_normalize(self) -> Self {
        self.op(OpKind::ScaleNormalize, &[])
    }

    /// Scales the x axis only.
    pub fn scale_x(self, v: f32) -> Self {
        self.op(OpKind::ScaleAxis, &[0.0, v])
    }

    /// Scales the y axis only.
    pub fn scale_y(self, v: f32) -> Self {
        self.op(OpKind::ScaleAxis, &[1.0, v])
    }

    /// Scales the z axis only. The logical scale is left alone.
    pub fn scale_z(self, v: f32) -> Self {
        self.op(OpKind::ScaleAxis, &[2.0, v])
    }

    /// Moves in the turtle's local frame.
    pub fn translate(self, x: f32, y: f32) -> Self {
        self.op(OpKind::Translate, &[x, y])
    }

    /// Moves in the turtle's local frame, including depth.
    pub fn translate_xyz(self, x: f32, y: f32, z: f32) -> Self {
        self.op(OpKind::Translate, &[x, y, z])
    }

    /// Rotation in degrees.
    pub fn rotate(self, degrees: f32) -> Self {
        self.op(OpKind::Rotate, &[degrees])
    }

    /// Mirrors across the local line at `degrees` from the x axis.
    pub fn flip(self, degrees: f32) -> Self {
        self.op(OpKind::Flip, &[degrees])
    }

    /// Grows by `px` pixels on each side.
    pub fn grow(self, px: f32) -> Self {
        self.op(OpKind::Grow, &[px])
    }

    /// Grows by `x` and `y` pixels on each side.
    pub fn grow_xy(self, x: f32, y: f32) -> Self {
        self.op(OpKind::Grow, &[x, y])
    }

    /// Shifts the hue by `delta` degrees.
    pub fn hue(self, delta: f32) -> Self {
        self.op(OpKind::Hue, &[delta])
    }

    /// Mixes the hue toward `target` along the shorter arc.
    pub fn hue_mix(self, t: f32, target: f32) -> Self {
        self.op(OpKind::Hue, &[t, target])
    }

    /// Moves saturation toward 1 (`v > 0`) or 0 (`v < 0`) by `|v|`.
    pub fn saturation(self, v: f32) -> Self {
        self.op(OpKind::Saturation, &[v])
    }

    /// Mixes saturation toward `target`.
    pub fn saturation_mix(self, t: f32, target: f32) -> Self {
        self.op(OpKind::Saturation, &[t, target])
    }

    /// Moves lightness toward 1 (`v > 0`) or 0 (`v < 0`) by `|v|`.
    pub fn lightness(self, v: f32) -> Self {
        self.op(OpKind::Lightness, &[v])
    }

    /// Mixes lightness toward `target`.
    pub fn lightness_mix(self, t: f32, target: f32) -> Self {
        self.op(OpKind::Lightness, &[t, target])
    }

    /// Moves alpha toward 1 (`v > 0`) or 0 (`v < 0`) by `|v|`.
    pub fn alpha(self, v: f32) -> Self {
        self.op(OpKind::Alpha, &[v])
    }

    /// Mixes alpha toward `target`.
    pub fn alpha_mix(self, t: f32, target: f32) -> Self {
        self.op(OpKind::Alpha, &[t, target])
    }

    /// Hue shift plus saturation and lightness moves in one operator.
    pub fn hsl(self, h: f32, s: f32, l: f32) -> Self {
        self.op(OpKind::Hsl, &[h, s, l])
    }

    /// Mixes hue, saturation and lightness toward a target color.
    pub fn hsl_mix(self, t: f32, h: f32, s: f32, l: f32) -> Self {
        self.op(OpKind::Hsl, &[t, h, s, l])
    }

    /// Stores `value` in user variable `index`.
    pub fn var(self, index: usize, value: f32) -> Self {
        self.op(OpKind::SetVar, &[index as f32, value])
    }

    /// Sets user flag bit `bit` (0..32).
    pub fn set_flag(self, bit: u32) -> Self {
        self.op(OpKind::SetFlag, &[bit as f32])
    }

    /// Clears user flag bit `bit` (0..32).
    pub fn clear_flag(self, bit: u32) -> Self {
        self.op(OpKind::SetFlag, &[bit as f32, 0.0])
    }

    /// Consumes the builder.
    pub fn into_vec(self) -> Vec<TurtleOp> {
        self.ops
    }
}

impl Deref for Transform {
    type Target = [TurtleOp];

    fn deref(&self) -> &[TurtleOp] {
        &self.ops
    }
}

impl From<Vec<TurtleOp>> for Transform {
    fn from(ops: Vec<TurtleOp>) -> Self {
        Self { ops }
    }
}

/// Errors raised while decoding a flat operator stream.
#[derive(Debug, Error, PartialEq)]
pub enum OpStreamError {
    #[error("expected operator start marker at offset {offset}")]
    MissingStart { offset: usize },
    #[error("operator start marker at offset {offset} has no opcode")]
    MissingOpcode { offset: usize },
    #[error("unknown opcode {code} at offset {offset}")]
    UnknownOpcode { code: f32, offset: usize },
    #[error("{kind:?} at offset {offset} takes {expected:?} operands, got {got}")]
    Arity {
        kind: OpKind,
        offset: usize,
        expected: RangeInclusive<usize>,
        got: usize,
    },
}

/// Decodes a flat float stream into typed operators.
///
/// Each operator is `OP_START, opcode, operands...`, with operands running to
/// the next `OP_START` or the end of the buffer. Opcode 0 ends the stream.
pub fn decode(stream: &[f32]) -> Result<Vec<TurtleOp>, OpStreamError> {
    let mut ops = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        if stream[offset] != OP_START {
            return Err(OpStreamError::MissingStart { offset });
        }
        let code = *stream
            .get(offset + 1)
            .ok_or(OpStreamError::MissingOpcode { offset })?;
        if code == 0.0 {
            break;
        }
        let kind = (code.fract() == 0.0 && (0.0..=u8::MAX as f32).contains(&code))
            .then(|| OpKind::from_code(code as u8))
            .flatten()
            .ok_or(OpStreamError::UnknownOpcode { code, offset })?;

        let body = offset + 2;
        let end = stream[body..]
            .iter()
            .position(|&v| v == OP_START)
            .map_or(stream.len(), |i| body + i);
        let args = &stream[body..end];
        if !kind.accepts(args.len()) {
            return Err(OpStreamError::Arity {
                kind,
                offset,
                expected: kind.arity(),
                got: args.len(),
            });
        }
        ops.push(TurtleOp::new(kind, args));
        offset = end;
    }
    Ok(ops)
}

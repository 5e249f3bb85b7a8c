//! HSLA color value and the mixing helpers used by the color operators.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A color in hue/saturation/lightness space with alpha.
///
/// Hue is in degrees and kept in `[0, 360)`; the other channels live in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsla {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub alpha: f32,
}

impl Default for Hsla {
    /// Opaque black.
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Hsla {
    /// Builds a color from its four channels.
    pub const fn new(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
            alpha,
        }
    }

    /// Converts the HSL part to linear RGB in `[0, 1]`.
    pub fn to_rgb(&self) -> Vec3 {
        let h = wrap_degrees(self.hue) / 60.0;
        let c = (1.0 - (2.0 * self.lightness - 1.0).abs()) * self.saturation;
        let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = self.lightness - 0.5 * c;
        Vec3::new(r + m, g + m, b + m)
    }

    /// RGB with the alpha channel appended.
    pub fn to_rgba(&self) -> Vec4 {
        self.to_rgb().extend(self.alpha)
    }
}

/// Linear interpolation: `x` at `t = 0`, `y` at `t = 1`.
pub fn mix(x: f32, y: f32, t: f32) -> f32 {
    x * (1.0 - t) + y * t
}

/// Moves `x` toward `1` when `v > 0`, toward `0` when `v < 0`, by the fraction `|v|`.
///
/// `v = 0` returns `x` unchanged and `v = ±1` snaps exactly to the bound.
pub fn move_value(x: f32, v: f32) -> f32 {
    let target = if v >= 0.0 { 1.0 } else { 0.0 };
    mix(x, target, v.abs())
}

/// Wraps an angle in degrees into `[0, 360)`.
///
/// `rem_euclid` can round a tiny negative input up to exactly `360.0`; that
/// case folds back to `0.0`.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Interpolates between two hues in degrees along the shorter arc.
///
/// The result is wrapped into `[0, 360)`.
pub fn mix_angle(x: f32, y: f32, t: f32) -> f32 {
    let (mut lo, mut hi) = (wrap_degrees(x), wrap_degrees(y));
    let mut t = t;
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
        t = 1.0 - t;
    }
    if hi - lo > 180.0 {
        hi -= 360.0;
    }
    wrap_degrees(mix(lo, hi, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_value_bounds() {
        assert_eq!(move_value(0.37, -1.0), 0.0);
        assert_eq!(move_value(0.37, 1.0), 1.0);
        assert_eq!(move_value(0.37, 0.0), 0.37);
        assert!((move_value(0.5, 0.5) - 0.75).abs() < 1e-6);
        assert!((move_value(0.5, -0.5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn mix_angle_wraps_through_zero() {
        for t in [0.1_f32, 0.25, 0.5, 0.75, 0.9] {
            let h = mix_angle(350.0, 10.0, t);
            let expected = (350.0 + 20.0 * t).rem_euclid(360.0);
            assert!((h - expected).abs() < 1e-3, "t={t}: {h} != {expected}");
            // Never on the long way round.
            assert!(!(10.0..350.0).contains(&h) || h == 10.0, "t={t}: {h}");
        }
    }

    #[test]
    fn mix_angle_short_gap_is_linear() {
        assert!((mix_angle(20.0, 100.0, 0.5) - 60.0).abs() < 1e-4);
        assert!((mix_angle(100.0, 20.0, 0.25) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn wrap_degrees_stays_below_full_turn() {
        assert_eq!(wrap_degrees(-1e-6), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
        assert!(mix_angle(-1e-6, 0.0, 0.0) < 360.0);
    }

    #[test]
    fn primaries_convert() {
        let red = Hsla::new(0.0, 1.0, 0.5, 1.0).to_rgb();
        assert!(red.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        let green = Hsla::new(120.0, 1.0, 0.5, 1.0).to_rgb();
        assert!(green.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
        let blue = Hsla::new(240.0, 1.0, 0.5, 0.5).to_rgba();
        assert!(blue.abs_diff_eq(Vec4::new(0.0, 0.0, 1.0, 0.5), 1e-6));
    }

    #[test]
    fn grey_ignores_hue() {
        let a = Hsla::new(45.0, 0.0, 0.3, 1.0).to_rgb();
        assert!(a.abs_diff_eq(Vec3::splat(0.3), 1e-6));
    }
}

//! Pose matrix helpers.
//!
//! A turtle's pose is a column-major [`Mat4`]. Every adjustment below
//! post-multiplies the pose, so it acts in the turtle's *local* frame: a
//! translation of `(1, 0)` after a rotation of 90° moves the turtle along
//! world `+Y`.

use glam::{Mat4, Vec2, Vec3};

/// Returns the identity pose.
pub fn identity() -> Mat4 {
    Mat4::IDENTITY
}

/// Scales the local axes of `pose` by `(x, y, z)`.
pub fn scale(pose: &mut Mat4, x: f32, y: f32, z: f32) {
    pose.x_axis *= x;
    pose.y_axis *= y;
    pose.z_axis *= z;
}

/// Moves the origin of `pose` by `(x, y, z)` expressed in local coordinates.
pub fn translate(pose: &mut Mat4, x: f32, y: f32, z: f32) {
    pose.w_axis += pose.x_axis * x + pose.y_axis * y + pose.z_axis * z;
}

/// Rotates `pose` around its local Z axis by `degrees`.
///
/// A zero angle leaves the matrix untouched.
pub fn rotate_z(pose: &mut Mat4, degrees: f32) {
    if degrees == 0.0 {
        return;
    }
    *pose *= Mat4::from_rotation_z(degrees.to_radians());
}

/// Reflects `pose` across the line through the local origin at `degrees`.
pub fn flip(pose: &mut Mat4, degrees: f32) {
    let (y, x) = degrees.to_radians().sin_cos();
    let reflection = Mat4::from_cols_array(&[
        x * x - y * y,
        2.0 * x * y,
        0.0,
        0.0,
        2.0 * x * y,
        y * y - x * x,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ]);
    *pose *= reflection;
}

/// Maps a unit-space 2D point through `pose` (homogeneous, `z = 0`, `w = 1`).
pub fn transform_point(pose: &Mat4, point: Vec2) -> Vec3 {
    pose.transform_point3(point.extend(0.0))
}

/// Lengths of the pose's X and Y axis columns.
///
/// Used to seed a turtle's logical scale from an arbitrary starting pose.
pub fn axis_lengths(pose: &Mat4) -> Vec2 {
    Vec2::new(pose.x_axis.truncate().length(), pose.y_axis.truncate().length())
}

/// World-space origin of the pose.
pub fn origin(pose: &Mat4) -> Vec3 {
    pose.w_axis.truncate()
}

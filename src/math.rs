//! 2D math primitives shared by the whole simulation.

use std::f32::consts::TAU;
use std::ops::{Add, AddAssign, Neg};

use vek::Vec2;

/// How many screen pixels fit in a single simulation unit.
pub const PIXELS_PER_UNIT: f32 = 16.0;

/// Convert a pixel-space scalar to simulation units.
pub fn to_units(pixels: f32) -> f32 {
    pixels / PIXELS_PER_UNIT
}

/// Convert a simulation-unit scalar to pixels.
pub fn to_pixels(units: f32) -> f32 {
    units * PIXELS_PER_UNIT
}

/// Convert a pixel-space vector to simulation units.
pub fn vec_to_units(pixels: Vec2<f32>) -> Vec2<f32> {
    pixels / PIXELS_PER_UNIT
}

/// Convert a simulation-unit vector to pixels.
pub fn vec_to_pixels(units: Vec2<f32>) -> Vec2<f32> {
    units * PIXELS_PER_UNIT
}

/// Left perpendicular of a vector.
pub fn perp(v: Vec2<f32>) -> Vec2<f32> {
    Vec2::new(-v.y, v.x)
}

/// Scalar z component of the 3D cross product of two 2D vectors.
pub fn perp_dot(a: Vec2<f32>, b: Vec2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Rotation with cached sine and cosine parts.
///
/// The angle is kept normalized to `[0, 2π)`; the sine and cosine are
/// recomputed on every mutation so transforming vertices never has to
/// evaluate trigonometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    /// Angle in radians, normalized to `[0, 2π)`.
    angle: f32,
    /// Sine part of the rotation.
    sin: f32,
    /// Cosine part of the rotation.
    cos: f32,
}

impl Rotation {
    /// Create from radians.
    pub fn from_radians(angle: f32) -> Self {
        let angle = angle.rem_euclid(TAU);
        let (sin, cos) = angle.sin_cos();

        Self { angle, sin, cos }
    }

    /// Create from degrees.
    pub fn from_degrees(angle: f32) -> Self {
        Self::from_radians(angle.to_radians())
    }

    /// Convert to radians in `[0, 2π)`.
    pub fn to_radians(self) -> f32 {
        self.angle
    }

    /// Convert to degrees.
    pub fn to_degrees(self) -> f32 {
        self.angle.to_degrees()
    }

    /// Rotate a point.
    pub fn rotate(&self, point: Vec2<f32>) -> Vec2<f32> {
        Vec2::new(
            point.x * self.cos - point.y * self.sin,
            point.x * self.sin + point.y * self.cos,
        )
    }

    /// Rotate a point by the inverse of this rotation.
    pub fn rotate_inv(&self, point: Vec2<f32>) -> Vec2<f32> {
        Vec2::new(
            point.x * self.cos + point.y * self.sin,
            -point.x * self.sin + point.y * self.cos,
        )
    }

    /// Sine.
    pub fn sin(&self) -> f32 {
        self.sin
    }

    /// Cosine.
    pub fn cos(&self) -> f32 {
        self.cos
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            angle: 0.0,
            sin: 0.0,
            cos: 1.0,
        }
    }
}

impl From<f32> for Rotation {
    fn from(value: f32) -> Self {
        Self::from_radians(value)
    }
}

impl Add<f32> for Rotation {
    type Output = Self;

    fn add(self, rhs: f32) -> Self::Output {
        Self::from_radians(self.angle + rhs)
    }
}

impl AddAssign<f32> for Rotation {
    fn add_assign(&mut self, rhs: f32) {
        *self = *self + rhs;
    }
}

impl Neg for Rotation {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::from_radians(-self.angle)
    }
}

/// Position with a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Iso {
    /// Position before being rotated.
    pub pos: Vec2<f32>,
    /// Rotation.
    pub rot: Rotation,
}

impl Iso {
    /// Construct from a position and a rotation.
    pub fn new<P, R>(pos: P, rot: R) -> Self
    where
        P: Into<Vec2<f32>>,
        R: Into<Rotation>,
    {
        let pos = pos.into();
        let rot = rot.into();

        Self { pos, rot }
    }

    /// Construct from a position with a rotation of zero.
    pub fn from_pos<P>(pos: P) -> Self
    where
        P: Into<Vec2<f32>>,
    {
        let pos = pos.into();
        let rot = Rotation::default();

        Self { pos, rot }
    }

    /// Rotate a relative point and add the position.
    pub fn translate(&self, point: Vec2<f32>) -> Vec2<f32> {
        self.pos + self.rot.rotate(point)
    }

    /// Map a world-space point back into the local frame.
    pub fn inv_translate(&self, point: Vec2<f32>) -> Vec2<f32> {
        self.rot.rotate_inv(point - self.pos)
    }
}

impl From<(Vec2<f32>, Rotation)> for Iso {
    fn from((pos, rot): (Vec2<f32>, Rotation)) -> Self {
        Self { pos, rot }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{PI, TAU};

    use approx::assert_abs_diff_eq;
    use vek::Vec2;

    use super::{perp, perp_dot, to_pixels, to_units, Iso, Rotation};

    /// Test that angles stay normalized and the cached parts match.
    #[test]
    fn test_normalization() {
        let rot = Rotation::from_radians(TAU + PI);
        assert_abs_diff_eq!(rot.to_radians(), PI, epsilon = 1e-6);
        assert_abs_diff_eq!(rot.sin(), PI.sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(rot.cos(), PI.cos(), epsilon = 1e-6);

        let rot = Rotation::from_radians(-PI / 2.0);
        assert_abs_diff_eq!(rot.to_radians(), 3.0 * PI / 2.0, epsilon = 1e-6);

        let mut rot = Rotation::from_degrees(350.0);
        rot += 20f32.to_radians();
        assert_abs_diff_eq!(rot.to_degrees(), 10.0, epsilon = 1e-4);
    }

    /// Test that rotating and inverse rotating round-trips.
    #[test]
    fn test_rotate_roundtrip() {
        let rot = Rotation::from_degrees(37.0);
        let point = Vec2::new(3.0, -2.0);

        let back = rot.rotate_inv(rot.rotate(point));
        assert_abs_diff_eq!(back.x, point.x, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y, point.y, epsilon = 1e-6);
    }

    /// Test the perpendicular helpers.
    #[test]
    fn test_perp() {
        let v = Vec2::new(1.0, 0.0);
        assert_eq!(perp(v), Vec2::new(0.0, 1.0));
        assert_eq!(perp_dot(v, Vec2::new(0.0, 1.0)), 1.0);
        assert_eq!(perp_dot(v, Vec2::new(0.0, -1.0)), -1.0);
    }

    /// Test transforming into and out of a local frame.
    #[test]
    fn test_iso() {
        let iso = Iso::new(Vec2::new(10.0, 5.0), Rotation::from_degrees(90.0));
        let world = iso.translate(Vec2::new(1.0, 0.0));
        assert_abs_diff_eq!(world.x, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(world.y, 6.0, epsilon = 1e-6);

        let local = iso.inv_translate(world);
        assert_abs_diff_eq!(local.x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(local.y, 0.0, epsilon = 1e-6);
    }

    /// Test the pixel conversions.
    #[test]
    fn test_units() {
        assert_eq!(to_units(16.0), 1.0);
        assert_eq!(to_pixels(2.0), 32.0);
    }
}

//! 2-D affine transforms for drawing placement and the scene view.
//!
//! A thin immutable wrapper over `kurbo::Affine` that fixes the
//! composition conventions used everywhere in the engine:
//!
//! - `a.multiply(b)` is the matrix product `a × b`: the result maps a point
//!   through `b` first, then through `a`.
//! - `translate`, `scale` and `rotate` post-multiply in the same way, so
//!   `t.translate(dx, dy)` moves the *local* origin of `t`. Chains read like
//!   nested coordinate systems: `view.translate(x, 0).rotate(15.0)`.
//! - Angles are in degrees, positive is clockwise in a y-down space.

use crate::error::EngineError;
use kurbo::{Affine, Point, Vec2};

/// Determinants smaller than this are treated as singular.
pub const DEGENERATE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform(Affine);

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self(Affine::IDENTITY);

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// From `[a, b, c, d, e, f]`, the same layout as CSS `matrix(...)`.
    pub fn from_coeffs(coeffs: [f64; 6]) -> Self {
        Self(Affine::new(coeffs))
    }

    pub fn coeffs(self) -> [f64; 6] {
        self.0.as_coeffs()
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self(Affine::translate(Vec2::new(dx, dy)))
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self(Affine::scale_non_uniform(sx, sy))
    }

    pub fn rotation(degrees: f64) -> Self {
        Self(Affine::rotate(degrees.to_radians()))
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        self.multiply(Self::translation(dx, dy))
    }

    pub fn scale(self, sx: f64, sy: f64) -> Self {
        self.multiply(Self::scaling(sx, sy))
    }

    pub fn rotate(self, degrees: f64) -> Self {
        self.multiply(Self::rotation(degrees))
    }

    /// `self × other`: apply `other`, then `self`.
    pub fn multiply(self, other: Self) -> Self {
        Self(self.0 * other.0)
    }

    pub fn determinant(self) -> f64 {
        self.0.determinant()
    }

    pub fn is_invertible(self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() >= DEGENERATE_EPSILON
    }

    /// Inverse transform, or `DegenerateTransform` for a singular matrix.
    pub fn invert(self) -> Result<Self, EngineError> {
        if !self.is_invertible() {
            return Err(EngineError::DegenerateTransform);
        }
        Ok(Self(self.0.inverse()))
    }

    pub fn transform_point(self, p: Point) -> Point {
        self.0 * p
    }

    /// Where the local origin lands.
    pub fn offset(self) -> Vec2 {
        self.0.translation()
    }
}

//! 2D affine transform value type.
//!
//! The rendering collaborator positions the map under a pan/zoom transform;
//! converting screen clicks back to document coordinates needs the inverse.
//! This is an explicit matrix value type populated by the layout system,
//! never recovered by parsing a serialized transform string.

use serde::{Deserialize, Serialize};

use crate::node::Point;

/// Row-major 2x3 affine matrix:
///
/// ```text
/// | a c e |   | x |
/// | b d f | * | y |
///             | 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// Uniform scale by `k` about the origin.
    pub fn scaling(k: f64) -> Self {
        Self {
            a: k,
            d: k,
            ..Self::IDENTITY
        }
    }

    /// This transform followed by a translation.
    pub fn translate(self, tx: f64, ty: f64) -> Self {
        Self::translation(tx, ty).compose(self)
    }

    /// This transform followed by a uniform scale.
    pub fn scale(self, k: f64) -> Self {
        Self::scaling(k).compose(self)
    }

    /// Matrix product `self * other`: apply `other` first, then `self`.
    pub fn compose(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn invert(self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Self {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }

    /// Transform a point.
    pub fn apply(self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn identity_leaves_points_unchanged() {
        let p = Point { x: 12.5, y: -8.0 };
        assert!(close(Transform::IDENTITY.apply(p), p));
    }

    #[test]
    fn translate_then_scale() {
        // Scale applied after translation: (1,1) -> (3,5) -> (6,10).
        let t = Transform::translation(2.0, 4.0).scale(2.0);
        let out = t.apply(Point { x: 1.0, y: 1.0 });
        assert!(close(out, Point { x: 6.0, y: 10.0 }));
    }

    #[test]
    fn invert_roundtrips_screen_to_document() {
        let view = Transform::translation(150.0, -40.0).scale(0.75);
        let inverse = view.invert().unwrap();

        let click = Point { x: 321.0, y: 87.5 };
        let document = inverse.apply(click);
        assert!(close(view.apply(document), click));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let degenerate = Transform::scaling(0.0);
        assert!(degenerate.invert().is_none());
    }

    #[test]
    fn compose_matches_sequential_application() {
        let first = Transform::translation(3.0, 1.0);
        let second = Transform::scaling(2.0);
        let combined = second.compose(first);

        let p = Point { x: 5.0, y: -2.0 };
        assert!(close(combined.apply(p), second.apply(first.apply(p))));
    }
}

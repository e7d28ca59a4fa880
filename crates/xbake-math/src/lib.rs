#![warn(missing_docs)]

//! Math types for the xbake texture baker.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for mesh baking: points, vectors, directions, the axis-convention
//! transform and bounding boxes.

use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

mod bbox;

pub use bbox::Aabb3;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D texture space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 4-component vector (tangent direction plus handedness sign).
pub type Vec4 = Vector4<f64>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Rigid rotation taking a +Y-up/+Z-forward frame into a
    /// +Z-up/+Y-forward frame: `(x, y, z) -> (-x, z, y)`.
    ///
    /// Y and Z trade places and X is negated so the result stays
    /// right-handed (determinant +1) and triangle winding is preserved.
    pub fn y_up_to_z_up() -> Self {
        let mut m = Matrix4::zeros();
        m[(0, 0)] = -1.0;
        m[(1, 2)] = 1.0;
        m[(2, 1)] = 1.0;
        m[(3, 3)] = 1.0;
        Self { matrix: m }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a normal vector (uses inverse transpose of upper-left 3x3).
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0);
        if let Some(inv) = m3.try_inverse() {
            inv.transpose() * n
        } else {
            // Singular matrix: leave the normal as is
            *n
        }
    }
}

/// Build two unit vectors that, together with `n`, form a right-handed
/// orthonormal basis `(u, v, n)`.
///
/// Branchless construction from Duff et al., "Building an Orthonormal
/// Basis, Revisited" (JCGT 2017).
pub fn orthonormal_basis(n: &Dir3) -> (Vec3, Vec3) {
    let sign = 1.0f64.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    let u = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let v = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_y_up_to_z_up_maps_axes() {
        let t = Transform::y_up_to_z_up();
        let up = t.apply_vec(&Vec3::y());
        assert!((up - Vec3::z()).norm() < 1e-12);
        let forward = t.apply_vec(&Vec3::z());
        assert!((forward - Vec3::y()).norm() < 1e-12);
        let right = t.apply_vec(&Vec3::x());
        assert!((right + Vec3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_y_up_to_z_up_is_proper_rotation() {
        let t = Transform::y_up_to_z_up();
        let det = t.matrix.fixed_view::<3, 3>(0, 0).determinant();
        assert!((det - 1.0).abs() < 1e-12);
        // Rotations leave normals identical to vectors
        let n = Vec3::new(0.3, -0.4, 0.5);
        assert!((t.apply_normal(&n) - t.apply_vec(&n)).norm() < 1e-12);
    }

    #[test]
    fn test_orthonormal_basis() {
        for n in [
            Vec3::z(),
            -Vec3::z(),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-0.2, 0.9, -0.1),
        ] {
            let n = Dir3::new_normalize(n);
            let (u, v) = orthonormal_basis(&n);
            assert!((u.norm() - 1.0).abs() < 1e-12);
            assert!((v.norm() - 1.0).abs() < 1e-12);
            assert!(u.dot(&v).abs() < 1e-12);
            assert!(u.dot(n.as_ref()).abs() < 1e-12);
            assert!((u.cross(&v) - n.into_inner()).norm() < 1e-12);
        }
    }
}

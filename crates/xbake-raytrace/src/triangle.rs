//! Ray-triangle intersection.

use xbake_math::{Aabb3, Point3, Vec3};

use crate::Ray;

/// Barycentric slack that keeps rays from slipping through shared edges.
const EDGE_EPSILON: f64 = 1e-10;

/// A triangle of the high-poly soup with its shading normals.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// Vertex positions.
    pub vertices: [Point3; 3],
    /// Per-vertex shading normals (unit length, or zero if unknown).
    pub normals: [Vec3; 3],
}

impl Triangle {
    /// Create a triangle from positions and shading normals.
    pub fn new(vertices: [Point3; 3], normals: [Vec3; 3]) -> Self {
        Self { vertices, normals }
    }

    /// Bounding box of the three vertices.
    pub fn aabb(&self) -> Aabb3 {
        Aabb3::from_points(&self.vertices)
    }

    /// Centroid of the three vertices.
    pub fn centroid(&self) -> Point3 {
        let [a, b, c] = self.vertices;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Unnormalized face normal following the vertex winding.
    pub fn area_vector(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(&(c - a))
    }

    /// Two-sided Möller–Trumbore intersection.
    ///
    /// Returns `(t, u, v)` with barycentric weights `(1 - u - v, u, v)` when
    /// the ray hits the triangle at `0 < t <= max_t`.
    #[inline]
    pub fn intersect(&self, ray: &Ray, max_t: f64) -> Option<(f64, f64, f64)> {
        let [a, b, c] = self.vertices;
        let e1 = b - a;
        let e2 = c - a;
        let dir = ray.direction.as_ref();

        let pvec = dir.cross(&e2);
        let det = e1.dot(&pvec);
        if det.abs() < 1e-18 {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - a;
        let u = tvec.dot(&pvec) * inv_det;
        if !(-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&e1);
        let v = dir.dot(&qvec) * inv_det;
        if v < -EDGE_EPSILON || u + v > 1.0 + EDGE_EPSILON {
            return None;
        }

        let t = e2.dot(&qvec) * inv_det;
        if t <= 0.0 || t > max_t {
            return None;
        }

        Some((t, u, v))
    }

    /// Interpolate the shading normal at barycentric `(w, u, v)`.
    ///
    /// Falls back to the geometric normal when the vertex normals cancel.
    pub fn shading_normal(&self, bary: [f64; 3]) -> Vec3 {
        let n = self.normals[0] * bary[0] + self.normals[1] * bary[1] + self.normals[2] * bary[2];
        n.try_normalize(1e-12)
            .or_else(|| self.area_vector().try_normalize(f64::MIN_POSITIVE))
            .unwrap_or_else(Vec3::z)
    }
}

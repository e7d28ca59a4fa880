//! Cage-to-surface ray projection.

use xbake_math::{Dir3, Point3};
use xbake_raytrace::{Bvh, Ray, RayHit};

use crate::sampler::TexelSample;

/// Ray bias as a fraction of the low-poly bounding diagonal.
pub const RAY_BIAS_FACTOR: f64 = 1e-4;

/// A projected point on the high-poly surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    /// Hit position.
    pub point: Point3,
    /// Interpolated shading normal of the high-poly surface.
    pub normal: Dir3,
    /// Flat normal of the hit triangle.
    pub geometric_normal: Dir3,
    /// Barycentric weights within the hit triangle.
    pub barycentric: [f64; 3],
    /// High-poly triangle index.
    pub triangle: u32,
    /// Distance along the projection ray.
    pub distance: f64,
    /// True if found by the reverse-direction retry.
    pub reversed: bool,
}

impl SurfaceHit {
    fn from_ray_hit(hit: RayHit, reversed: bool) -> Self {
        Self {
            point: hit.point,
            normal: hit.normal,
            geometric_normal: hit.geometric_normal,
            barycentric: hit.barycentric,
            triangle: hit.triangle,
            distance: hit.t,
            reversed,
        }
    }

    /// Geometric normal flipped, if needed, to the shading normal's side.
    pub fn oriented_geometric_normal(&self) -> Dir3 {
        if self.geometric_normal.dot(&self.normal) < 0.0 {
            -self.geometric_normal
        } else {
            self.geometric_normal
        }
    }
}

/// Result of projecting one texel.
#[derive(Debug, Clone, Copy)]
pub enum HitRecord {
    /// Nothing found within the projection distance.
    Miss,
    /// The nearest high-poly surface point.
    Hit(SurfaceHit),
}

impl HitRecord {
    /// The hit, if any.
    pub fn hit(&self) -> Option<&SurfaceHit> {
        match self {
            HitRecord::Hit(hit) => Some(hit),
            HitRecord::Miss => None,
        }
    }
}

/// Casts projection rays from the cage into the high-poly mesh.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    bvh: &'a Bvh,
    bias: f64,
    max_distance: f64,
    bidirectional: bool,
}

impl<'a> Projector<'a> {
    /// Create a projector.
    ///
    /// `distance` is the search length from the cage (twice the extrusion
    /// unless overridden); `bias` is added to it on both ends.
    pub fn new(bvh: &'a Bvh, distance: f64, bias: f64, bidirectional: bool) -> Self {
        Self {
            bvh,
            bias,
            max_distance: distance + 2.0 * bias,
            bidirectional,
        }
    }

    /// Ray origin offset in mesh units.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Maximum ray length, bias included.
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Project one texel.
    ///
    /// The ray starts just outside the cage point and travels inward. If
    /// that misses and bidirectional search is enabled, the opposite
    /// direction is tried from the same origin.
    pub fn project(&self, sample: &TexelSample) -> HitRecord {
        let origin = sample.cage_point + sample.cage_normal.into_inner() * self.bias;
        let ray = Ray::from_dir(origin, sample.ray_direction());

        if let Some(hit) = self.bvh.closest_hit(&ray, self.max_distance) {
            return HitRecord::Hit(SurfaceHit::from_ray_hit(hit, false));
        }
        if self.bidirectional {
            if let Some(hit) = self.bvh.closest_hit(&ray.reversed(), self.max_distance) {
                return HitRecord::Hit(SurfaceHit::from_ray_hit(hit, true));
            }
        }
        HitRecord::Miss
    }
}

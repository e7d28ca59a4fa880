//! Ambient occlusion channel.
//!
//! Occlusion rays leave the hit point on the side its shading normal faces
//! and only count geometry closer than the falloff distance.

use std::f64::consts::PI;

use xbake_math::orthonormal_basis;
use xbake_raytrace::Ray;

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;

use super::{Channel, ChannelEvaluator, EvalContext, Texel};

/// Ambient occlusion from cosine-weighted hemisphere rays.
///
/// Samples follow a Hammersley set shifted by a per-texel Cranley-Patterson
/// rotation, so neighbouring texels decorrelate while every bake of the same
/// input gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct AmbientOcclusion {
    samples: u32,
    distance: f64,
}

impl AmbientOcclusion {
    /// `samples` rays per texel, occluders counted up to `distance`.
    pub fn new(samples: u32, distance: f64) -> Self {
        Self {
            samples: samples.max(1),
            distance,
        }
    }
}

/// Van der Corput radical inverse in base 2.
fn radical_inverse(mut bits: u32) -> f64 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f64 / 4_294_967_296.0
}

/// Integer hash (lowbias32) mapped to `[0, 1)`.
fn hash_unit(mut x: u32) -> f64 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x as f64 / 4_294_967_296.0
}

/// Per-pixel rotation offsets.
fn pixel_rotation(x: u32, y: u32) -> (f64, f64) {
    let seed = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663);
    (hash_unit(seed), hash_unit(seed ^ 0x9e37_79b9))
}

/// Cosine-weighted direction in the local frame (z = up).
fn cosine_hemisphere(u1: f64, u2: f64) -> (f64, f64, f64) {
    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    (r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt())
}

impl ChannelEvaluator for AmbientOcclusion {
    fn channel(&self) -> Channel {
        Channel::AmbientOcclusion
    }

    fn evaluate(&self, sample: &TexelSample, hit: &SurfaceHit, ctx: &EvalContext<'_>) -> Texel {
        let normal = hit.oriented_geometric_normal();
        let (tangent, bitangent) = orthonormal_basis(&normal);
        let n = normal.into_inner();
        let origin = hit.point + n * ctx.ray_bias;
        let (rot1, rot2) = pixel_rotation(sample.x, sample.y);

        let mut occluded = 0u32;
        for i in 0..self.samples {
            let u1 = (i as f64 / self.samples as f64 + rot1).fract();
            let u2 = (radical_inverse(i) + rot2).fract();
            let (lx, ly, lz) = cosine_hemisphere(u1, u2);
            let dir = tangent * lx + bitangent * ly + n * lz;
            if ctx.bvh.occluded(&Ray::new(origin, dir), self.distance) {
                occluded += 1;
            }
        }

        let ao = (1.0 - occluded as f64 / self.samples as f64) as f32;
        [ao; 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::{flat_sample, hit};
    use crate::testing::{quad, trough};
    use xbake_math::{Point3, Vec3};
    use xbake_raytrace::Bvh;

    #[test]
    fn test_radical_inverse() {
        assert_eq!(radical_inverse(0), 0.0);
        assert_eq!(radical_inverse(1), 0.5);
        assert_eq!(radical_inverse(2), 0.25);
        assert_eq!(radical_inverse(3), 0.75);
    }

    #[test]
    fn test_hemisphere_samples_are_unit_and_upward() {
        for i in 0..64 {
            let (x, y, z) = cosine_hemisphere(i as f64 / 64.0, radical_inverse(i));
            assert!(((x * x + y * y + z * z) - 1.0).abs() < 1e-12);
            assert!(z > 0.0);
        }
    }

    #[test]
    fn test_open_plane_is_unoccluded() {
        let bvh = Bvh::build(&quad("floor", 0.0));
        let ctx = EvalContext {
            bvh: &bvh,
            ray_bias: 1e-4,
        };
        let ao = AmbientOcclusion::new(64, 1.0);
        let v = ao.evaluate(&flat_sample(3, 4), &hit(Point3::new(0.5, 0.5, 0.0), Vec3::z()), &ctx);
        assert_eq!(v[0], 1.0);
    }

    #[test]
    fn test_trough_is_occluded() {
        let bvh = Bvh::build(&trough("trough"));
        let ctx = EvalContext {
            bvh: &bvh,
            ray_bias: 1e-4,
        };
        let ao = AmbientOcclusion::new(128, 1.0);
        let center = ao.evaluate(&flat_sample(0, 0), &hit(Point3::new(0.5, 0.5, 0.0), Vec3::z()), &ctx);
        let corner = ao.evaluate(&flat_sample(1, 0), &hit(Point3::new(0.02, 0.5, 0.0), Vec3::z()), &ctx);
        assert!(center[0] < 0.9, "center {}", center[0]);
        assert!(corner[0] < center[0], "corner {} center {}", corner[0], center[0]);
        assert!(corner[0] >= 0.0);
    }

    #[test]
    fn test_short_distance_ignores_far_walls() {
        let bvh = Bvh::build(&trough("trough"));
        let ctx = EvalContext {
            bvh: &bvh,
            ray_bias: 1e-4,
        };
        let ao = AmbientOcclusion::new(32, 0.1);
        let v = ao.evaluate(&flat_sample(0, 0), &hit(Point3::new(0.5, 0.5, 0.0), Vec3::z()), &ctx);
        assert_eq!(v[0], 1.0);
    }

    #[test]
    fn test_deterministic_per_pixel() {
        let bvh = Bvh::build(&trough("trough"));
        let ctx = EvalContext {
            bvh: &bvh,
            ray_bias: 1e-4,
        };
        let ao = AmbientOcclusion::new(16, 1.0);
        let h = hit(Point3::new(0.3, 0.5, 0.0), Vec3::z());
        let a = ao.evaluate(&flat_sample(7, 9), &h, &ctx);
        let b = ao.evaluate(&flat_sample(7, 9), &h, &ctx);
        assert_eq!(a, b);
    }
}

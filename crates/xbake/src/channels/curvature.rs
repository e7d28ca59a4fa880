//! Curvature channel.

use xbake_math::orthonormal_basis;
use xbake_raytrace::Ray;

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;

use super::{Channel, ChannelEvaluator, EvalContext, Texel};

/// Signed curvature from a finite difference of the high-poly normal field.
///
/// Four probes are dropped onto the surface at `radius` along the tangent
/// plane. Where the surface bends away (convex) the probe normals lean
/// toward the probe direction; where it folds in they lean back. The mean
/// lean `s` maps to `0.5 + s / (2w)` with `w = (1 - contrast) / 2 + 0.001`.
#[derive(Debug, Clone, Copy)]
pub struct Curvature {
    radius: f64,
    half_window: f64,
}

impl Curvature {
    /// Probe at `radius` mesh units with the given contrast in `[0, 1]`.
    pub fn new(radius: f64, contrast: f64) -> Self {
        Self {
            radius,
            half_window: (1.0 - contrast.clamp(0.0, 1.0)) / 2.0 + 0.001,
        }
    }

    /// Mean tilt of the probe normals toward their offsets, or `None` if
    /// every probe missed.
    fn mean_tilt(&self, hit: &SurfaceHit, ctx: &EvalContext<'_>) -> Option<f64> {
        let n = hit.normal.into_inner();
        let (u, v) = orthonormal_basis(&hit.normal);
        let lift = self.radius + ctx.ray_bias;

        let mut sum = 0.0;
        let mut count = 0u32;
        for d in [u, -u, v, -v] {
            let origin = hit.point + d * self.radius + n * lift;
            let ray = Ray::new(origin, -n);
            if let Some(probe) = ctx.bvh.closest_hit(&ray, 2.0 * lift) {
                // Two-sided surfaces: measure on the side the hit normal faces
                let pn = probe.normal.into_inner();
                let pn = if pn.dot(&n) < 0.0 { -pn } else { pn };
                sum += pn.dot(&d);
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    fn remap(&self, tilt: f64) -> f32 {
        (0.5 + tilt / (2.0 * self.half_window)).clamp(0.0, 1.0) as f32
    }
}

impl ChannelEvaluator for Curvature {
    fn channel(&self) -> Channel {
        Channel::Curvature
    }

    fn evaluate(&self, _sample: &TexelSample, hit: &SurfaceHit, ctx: &EvalContext<'_>) -> Texel {
        let value = match self.mean_tilt(hit, ctx) {
            Some(tilt) => self.remap(tilt),
            None => 0.5,
        };
        [value; 3]
    }
}

/// Default probe radius: two texels' worth of the low-poly diagonal.
pub(crate) fn default_radius(diagonal: f64, resolution: u32) -> f64 {
    let r = 2.0 * diagonal / resolution.max(1) as f64;
    if r > 0.0 {
        r
    } else {
        1e-3
    }
}

//! Tangent-space normal channel (OpenGL or DirectX green).

use xbake_math::Vec3;

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;
use crate::settings::NormalFormat;

use super::{Channel, ChannelEvaluator, EvalContext, Texel};

/// Tangent-space normal map.
///
/// The high-poly shading normal is expressed in the low-poly texel's
/// `(T, B, N)` frame and remapped from `[-1, 1]` to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct TangentNormal {
    format: NormalFormat,
}

impl TangentNormal {
    /// Evaluator writing the given green-channel convention.
    pub fn new(format: NormalFormat) -> Self {
        Self { format }
    }
}

impl ChannelEvaluator for TangentNormal {
    fn channel(&self) -> Channel {
        Channel::Normal
    }

    fn evaluate(&self, sample: &TexelSample, hit: &SurfaceHit, _ctx: &EvalContext<'_>) -> Texel {
        let n = hit.normal.into_inner();
        let local = Vec3::new(
            n.dot(&sample.tangent),
            n.dot(&sample.bitangent),
            n.dot(sample.normal.as_ref()),
        );
        let local = local.try_normalize(1e-12).unwrap_or_else(Vec3::z);

        let r = (local.x * 0.5 + 0.5) as f32;
        let g = (local.y * 0.5 + 0.5) as f32;
        let b = (local.z * 0.5 + 0.5) as f32;
        match self.format {
            NormalFormat::OpenGl => [r, g, b],
            NormalFormat::DirectX => [r, 1.0 - g, b],
        }
    }
}

//! World-space normal channel.

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;

use super::{Channel, ChannelEvaluator, EvalContext, Texel};

/// World-space normal, remapped from `[-1, 1]` to `[0, 1]` per axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldNormal;

impl ChannelEvaluator for WorldNormal {
    fn channel(&self) -> Channel {
        Channel::WorldNormal
    }

    fn evaluate(&self, _sample: &TexelSample, hit: &SurfaceHit, _ctx: &EvalContext<'_>) -> Texel {
        let n = hit.normal.into_inner();
        [n.x, n.y, n.z].map(|c| (c * 0.5 + 0.5) as f32)
    }
}

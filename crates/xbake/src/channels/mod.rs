//! Per-channel evaluators.
//!
//! Every texel is projected once; the resulting hit is handed to each
//! enabled evaluator in turn. Evaluators hold only job-level configuration
//! and are shared read-only by all worker threads.

mod ao;
mod curvature;
mod normal;
mod position;
mod world_normal;

pub use ao::AmbientOcclusion;
pub use curvature::Curvature;
pub(crate) use curvature::default_radius as default_curvature_radius;
pub use normal::TangentNormal;
pub use position::{PositionEncoding, PositionMap};
pub use world_normal::WorldNormal;

use std::fmt;

use serde::{Deserialize, Serialize};
use xbake_raytrace::Bvh;

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;

/// One texel value. Single-component channels use only the first entry.
pub type Texel = [f32; 3];

/// A bakeable output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Tangent-space normal map.
    Normal,
    /// Ambient occlusion.
    AmbientOcclusion,
    /// Signed surface curvature.
    Curvature,
    /// Position normalized to the low-poly bounding box.
    Position,
    /// World-space normal.
    WorldNormal,
}

impl Channel {
    /// All channels in output order.
    pub const ALL: [Channel; 5] = [
        Channel::Normal,
        Channel::AmbientOcclusion,
        Channel::Curvature,
        Channel::Position,
        Channel::WorldNormal,
    ];

    /// Number of components stored per texel.
    pub fn components(self) -> usize {
        match self {
            Channel::AmbientOcclusion | Channel::Curvature => 1,
            Channel::Normal | Channel::Position | Channel::WorldNormal => 3,
        }
    }

    /// File name suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::Normal => "normal",
            Channel::AmbientOcclusion => "ao",
            Channel::Curvature => "curvature",
            Channel::Position => "position",
            Channel::WorldNormal => "worldnormal",
        }
    }

    /// Value written where no surface was found.
    pub fn fallback(self) -> Texel {
        match self {
            Channel::Normal | Channel::WorldNormal => [0.5, 0.5, 1.0],
            Channel::AmbientOcclusion => [1.0, 1.0, 1.0],
            Channel::Curvature | Channel::Position => [0.5, 0.5, 0.5],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Job-level data shared by evaluators that cast secondary rays.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// High-poly acceleration structure.
    pub bvh: &'a Bvh,
    /// Offset applied to secondary ray origins.
    pub ray_bias: f64,
}

/// Turns a projected hit into one channel's texel value.
pub trait ChannelEvaluator: Send + Sync {
    /// The channel this evaluator produces.
    fn channel(&self) -> Channel;

    /// Value for a texel whose projection hit the high-poly surface.
    fn evaluate(&self, sample: &TexelSample, hit: &SurfaceHit, ctx: &EvalContext<'_>) -> Texel;

    /// Value for a texel whose projection missed.
    fn fallback(&self) -> Texel {
        self.channel().fallback()
    }
}

//! Position channel and its encoding.
//!
//! Hit points are stored per axis in `[0, 1]` relative to a box that holds
//! every point a projection ray can reach. The box travels with the bake
//! output so a raster can be decoded back to mesh units.

use serde::{Deserialize, Serialize};
use xbake_math::{Aabb3, Point3, Vec3};

use crate::project::SurfaceHit;
use crate::sampler::TexelSample;

use super::{Channel, ChannelEvaluator, EvalContext, Texel};

/// Affine map between mesh space and the `[0, 1]^3` position channel.
///
/// Each axis is normalized by the box the encoding was built from. A flat
/// axis is given unit extent around its center, so it encodes to 0.5.
/// [`encode`](Self::encode) itself does not clamp, so points outside the
/// box still decode exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEncoding {
    /// Point that encodes to `(0, 0, 0)`.
    pub origin: [f64; 3],
    /// Length of each axis in mesh units.
    pub extent: [f64; 3],
}

impl PositionEncoding {
    /// Encoding that maps `bounds` onto the unit cube.
    pub fn from_bounds(bounds: &Aabb3) -> Self {
        let size = bounds.size();
        let center = bounds.center();
        let mut origin = [0.0; 3];
        let mut extent = [0.0; 3];
        for axis in 0..3 {
            if size[axis] > 1e-12 {
                origin[axis] = bounds.min[axis];
                extent[axis] = size[axis];
            } else {
                origin[axis] = center[axis] - 0.5;
                extent[axis] = 1.0;
            }
        }
        Self { origin, extent }
    }

    /// Mesh-space point to normalized coordinates.
    pub fn encode(&self, p: &Point3) -> [f64; 3] {
        [0, 1, 2].map(|axis| (p[axis] - self.origin[axis]) / self.extent[axis])
    }

    /// Normalized coordinates back to a mesh-space point.
    pub fn decode(&self, value: [f64; 3]) -> Point3 {
        Point3::from(Vec3::from_fn(|axis, _| {
            self.origin[axis] + value[axis] * self.extent[axis]
        }))
    }
}

/// Position channel evaluator.
#[derive(Debug, Clone, Copy)]
pub struct PositionMap {
    encoding: PositionEncoding,
}

impl PositionMap {
    /// Evaluator writing positions under `encoding`.
    pub fn new(encoding: PositionEncoding) -> Self {
        Self { encoding }
    }

    /// The encoding in use.
    pub fn encoding(&self) -> &PositionEncoding {
        &self.encoding
    }
}

impl ChannelEvaluator for PositionMap {
    fn channel(&self) -> Channel {
        Channel::Position
    }

    fn evaluate(&self, _sample: &TexelSample, hit: &SurfaceHit, _ctx: &EvalContext<'_>) -> Texel {
        self.encoding
            .encode(&hit.point)
            .map(|c| c.clamp(0.0, 1.0) as f32)
    }
}

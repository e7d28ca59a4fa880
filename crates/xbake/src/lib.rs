#![warn(missing_docs)]

//! Cage-projection texture baking.
//!
//! Transfers surface detail from a high-poly mesh onto the UV layout of a
//! low-poly mesh. For every texel of the output raster a ray is cast from
//! an extruded copy of the low-poly surface (the cage) back toward it; the
//! nearest high-poly hit feeds each enabled channel:
//!
//! - tangent-space normal (OpenGL or DirectX green convention)
//! - ambient occlusion
//! - curvature
//! - position, normalized to the low-poly bounds
//! - world-space normal
//!
//! The engine does no file I/O. Hosts import meshes, run a [`BakeJob`] and
//! hand the rasters to a [`RasterSink`].
//!
//! # Example
//!
//! ```ignore
//! use xbake::{BakeJob, BakeSettings, CancelToken};
//!
//! let settings = BakeSettings { resolution: 1024, ..Default::default() };
//! let job = BakeJob::new(low_poly, high_poly, settings)?;
//! let output = job.run(&CancelToken::new())?;
//!
//! println!("miss rate: {:.2}%", output.report.miss_rate * 100.0);
//! let written = xbake::write_outputs(&sink, &job.output_stem(), &output.rasters);
//! ```

pub mod cage;
pub mod channels;
pub mod error;
pub mod job;
pub mod output;
pub mod project;
pub mod raster;
pub mod report;
pub mod sampler;
pub mod settings;

#[cfg(test)]
mod testing;

pub use cage::Cage;
pub use channels::{Channel, ChannelEvaluator, PositionEncoding, Texel};
pub use error::{BakeError, MeshRole, Result};
pub use job::{bake, BakeJob, BakeOutput, CancelToken};
pub use output::{file_stem, output_stem, write_outputs, RasterSink, WriteFailure, WriteReport};
pub use project::{HitRecord, Projector, SurfaceHit};
pub use raster::{ChannelRaster, CoverageMask, TexelState};
pub use report::{BakeReport, BakeWarning, PixelRect};
pub use sampler::{Coverage, TexelSample, TexelSampler};
pub use settings::{BakeSettings, NormalFormat, MAX_RESOLUTION};

//! Bake job configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xbake_mesh::AxisConvention;

use crate::channels::Channel;
use crate::error::{BakeError, Result};

/// Largest supported raster edge.
pub const MAX_RESOLUTION: u32 = 16384;

/// Green-channel convention of the tangent-space normal map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalFormat {
    /// +Y up (green = up).
    #[default]
    #[serde(rename = "OPENGL", alias = "opengl")]
    OpenGl,
    /// -Y up (green inverted).
    #[serde(rename = "DIRECTX", alias = "directx")]
    DirectX,
}

impl fmt::Display for NormalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalFormat::OpenGl => f.write_str("OPENGL"),
            NormalFormat::DirectX => f.write_str("DIRECTX"),
        }
    }
}

impl FromStr for NormalFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPENGL" | "GL" => Ok(NormalFormat::OpenGl),
            "DIRECTX" | "DX" => Ok(NormalFormat::DirectX),
            other => Err(format!("unknown normal format '{other}' (expected OPENGL or DIRECTX)")),
        }
    }
}

/// Parameters of a bake job.
///
/// Constructed once and never mutated while a job runs. Missing fields
/// take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    /// Cage offset along the smoothed low-poly normals (mesh units). Unused
    /// when the job is given a cage mesh.
    pub extrusion: f64,
    /// Projection distance override. Defaults to twice the cage extrusion.
    pub max_ray_distance: Option<f64>,
    /// Output raster width and height in pixels.
    pub resolution: u32,
    /// Green-channel convention for the normal map.
    pub normal_format: NormalFormat,
    /// Inputs are +Y-up/+Z-forward and are rotated into +Z-up at load.
    pub use_maya_orientation: bool,
    /// Bake the tangent-space normal channel.
    pub use_normal: bool,
    /// Bake the ambient occlusion channel.
    pub use_ao: bool,
    /// Bake the curvature channel.
    pub use_curvature: bool,
    /// Bake the normalized position channel.
    pub use_position: bool,
    /// Bake the world-space normal channel.
    pub use_world_normal: bool,
    /// Retry missed projection rays in the opposite direction.
    pub bidirectional: bool,
    /// Hemisphere rays per texel for ambient occlusion.
    pub ao_samples: u32,
    /// Occluders farther than this (mesh units) are ignored.
    pub ao_distance: f64,
    /// Tangential probe offset for curvature (mesh units).
    /// Defaults to two texels' worth of the low-poly bounding diagonal.
    pub curvature_radius: Option<f64>,
    /// Curvature contrast in `[0, 1]`; higher values saturate sooner.
    pub curvature_contrast: f64,
    /// Seam dilation distance in pixels.
    pub dilation_margin: u32,
    /// Dilation distance as a percentage of the resolution. Overrides
    /// `dilation_margin` when set.
    pub margin_percentage: Option<f64>,
    /// Pixels whose centers lie outside every UV triangle but within this
    /// many pixels of one are still sampled.
    pub edge_margin: f64,
    /// Miss rate (over projected texels) above which a warning is raised.
    pub miss_warning_threshold: f64,
    /// Edge length of the square tiles handed to worker threads.
    pub tile_size: u32,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            extrusion: 0.5,
            max_ray_distance: None,
            resolution: 2048,
            normal_format: NormalFormat::OpenGl,
            use_maya_orientation: false,
            use_normal: true,
            use_ao: true,
            use_curvature: true,
            use_position: true,
            use_world_normal: true,
            bidirectional: true,
            ao_samples: 32,
            ao_distance: 1.0,
            curvature_radius: None,
            curvature_contrast: 0.5,
            dilation_margin: 8,
            margin_percentage: None,
            edge_margin: 0.75,
            miss_warning_threshold: 0.05,
            tile_size: 64,
        }
    }
}

impl BakeSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !self.extrusion.is_finite() || self.extrusion < 0.0 {
            return Err(BakeError::InvalidSettings(
                "extrusion must be finite and non-negative".into(),
            ));
        }
        if let Some(d) = self.max_ray_distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(BakeError::InvalidSettings(
                    "max_ray_distance must be positive".into(),
                ));
            }
        }
        if self.resolution == 0 || self.resolution > MAX_RESOLUTION {
            return Err(BakeError::InvalidSettings(format!(
                "resolution must be between 1 and {MAX_RESOLUTION}"
            )));
        }
        if self.enabled_channels().is_empty() {
            return Err(BakeError::InvalidSettings(
                "at least one channel must be enabled".into(),
            ));
        }
        if self.use_ao && self.ao_samples == 0 {
            return Err(BakeError::InvalidSettings(
                "ao_samples must be at least 1".into(),
            ));
        }
        if self.use_ao && (!self.ao_distance.is_finite() || self.ao_distance <= 0.0) {
            return Err(BakeError::InvalidSettings(
                "ao_distance must be positive".into(),
            ));
        }
        if let Some(r) = self.curvature_radius {
            if !r.is_finite() || r <= 0.0 {
                return Err(BakeError::InvalidSettings(
                    "curvature_radius must be positive".into(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.curvature_contrast) {
            return Err(BakeError::InvalidSettings(
                "curvature_contrast must be between 0 and 1".into(),
            ));
        }
        if let Some(p) = self.margin_percentage {
            if !(0.0..=100.0).contains(&p) {
                return Err(BakeError::InvalidSettings(
                    "margin_percentage must be between 0 and 100".into(),
                ));
            }
        }
        if !self.edge_margin.is_finite() || self.edge_margin < 0.0 {
            return Err(BakeError::InvalidSettings(
                "edge_margin must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.miss_warning_threshold) {
            return Err(BakeError::InvalidSettings(
                "miss_warning_threshold must be between 0 and 1".into(),
            ));
        }
        if self.tile_size == 0 {
            return Err(BakeError::InvalidSettings(
                "tile_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Enabled channels in output order.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        let flags = [
            (Channel::Normal, self.use_normal),
            (Channel::AmbientOcclusion, self.use_ao),
            (Channel::Curvature, self.use_curvature),
            (Channel::Position, self.use_position),
            (Channel::WorldNormal, self.use_world_normal),
        ];
        flags
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(channel, _)| channel)
            .collect()
    }

    /// Axis convention of the input meshes.
    pub fn axis_convention(&self) -> AxisConvention {
        AxisConvention::from_maya_flag(self.use_maya_orientation)
    }

    /// Dilation distance in pixels after applying `margin_percentage`.
    /// Fractional pixels are truncated.
    pub fn effective_dilation_margin(&self) -> u32 {
        match self.margin_percentage {
            Some(p) => (self.resolution as f64 * p / 100.0) as u32,
            None => self.dilation_margin,
        }
    }
}

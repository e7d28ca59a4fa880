//! Non-fatal outcome of a bake job.

use std::fmt;

use serde::Serialize;

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    /// Leftmost column.
    pub x0: u32,
    /// Topmost row.
    pub y0: u32,
    /// Rightmost column.
    pub x1: u32,
    /// Bottom row.
    pub y1: u32,
}

impl PixelRect {
    /// Rectangle covering a single pixel.
    pub fn pixel(x: u32, y: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x,
            y1: y,
        }
    }

    /// Smallest rectangle containing both.
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Something the caller should know about, but that did not stop the bake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BakeWarning {
    /// Low-poly vertices without a usable normal.
    DegenerateVertices {
        /// Number of affected vertices.
        count: usize,
    },
    /// Low-poly triangles skipped for near-zero UV area.
    DegenerateUvTriangles {
        /// Number of affected triangles.
        count: usize,
    },
    /// Too many projection rays missed the high-poly mesh.
    HighMissRate {
        /// Observed miss rate.
        rate: f64,
        /// Configured threshold.
        threshold: f64,
    },
}

impl fmt::Display for BakeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BakeWarning::DegenerateVertices { count } => {
                write!(f, "{count} low-poly vertices have no valid normal")
            }
            BakeWarning::DegenerateUvTriangles { count } => {
                write!(f, "{count} low-poly triangles have zero UV area")
            }
            BakeWarning::HighMissRate { rate, threshold } => write!(
                f,
                "{:.1}% of projection rays missed (threshold {:.1}%); increase extrusion or check the cage",
                rate * 100.0,
                threshold * 100.0
            ),
        }
    }
}

/// Texel counts gathered by one or more tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileStats {
    /// Texels projected and evaluated.
    pub baked: u64,
    /// Covered texels whose ray missed.
    pub missed: u64,
    /// Texels of triangles with degenerate geometry.
    pub degenerate: u64,
    /// Texels outside the UV layout.
    pub uncovered: u64,
    /// Hits found by the reverse-direction retry.
    pub retried: u64,
    /// Bounding rectangle of missed texels.
    pub miss_region: Option<PixelRect>,
}

impl TileStats {
    /// Record a miss at `(x, y)`.
    pub fn record_miss(&mut self, x: u32, y: u32) {
        self.missed += 1;
        let px = PixelRect::pixel(x, y);
        self.miss_region = Some(self.miss_region.map_or(px, |r| r.union(px)));
    }

    /// Combine counts from two disjoint sets of texels.
    pub fn merge(self, other: Self) -> Self {
        let miss_region = match (self.miss_region, other.miss_region) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        };
        Self {
            baked: self.baked + other.baked,
            missed: self.missed + other.missed,
            degenerate: self.degenerate + other.degenerate,
            uncovered: self.uncovered + other.uncovered,
            retried: self.retried + other.retried,
            miss_region,
        }
    }
}

/// Job-level statistics returned alongside the rasters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BakeReport {
    /// Raster width and height.
    pub resolution: u32,
    /// Texels projected and evaluated.
    pub baked_texels: u64,
    /// Covered texels whose projection ray missed.
    pub missed_texels: u64,
    /// Texels of triangles with degenerate geometry.
    pub degenerate_texels: u64,
    /// Texels outside the UV layout.
    pub uncovered_texels: u64,
    /// Non-baked texels filled by dilation.
    pub dilated_texels: u64,
    /// Hits found only by the reverse-direction retry.
    pub retried_hits: u64,
    /// `missed / (baked + missed)`.
    pub miss_rate: f64,
    /// Bounding rectangle of missed texels.
    pub miss_region: Option<PixelRect>,
    /// Low-poly vertices without a valid normal.
    pub degenerate_vertices: Vec<u32>,
    /// Low-poly triangles with near-zero UV area.
    pub degenerate_uv_triangles: Vec<u32>,
    /// Wall-clock duration of the projection and composition phase.
    pub elapsed_seconds: f64,
    /// Everything worth surfacing to the user.
    pub warnings: Vec<BakeWarning>,
}

impl BakeReport {
    /// Assemble a report and derive its warnings.
    pub fn new(
        resolution: u32,
        stats: TileStats,
        dilated: u64,
        degenerate_vertices: Vec<u32>,
        degenerate_uv_triangles: Vec<u32>,
        elapsed_seconds: f64,
        miss_threshold: f64,
    ) -> Self {
        let projected = stats.baked + stats.missed;
        let miss_rate = if projected > 0 {
            stats.missed as f64 / projected as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        if !degenerate_vertices.is_empty() {
            warnings.push(BakeWarning::DegenerateVertices {
                count: degenerate_vertices.len(),
            });
        }
        if !degenerate_uv_triangles.is_empty() {
            warnings.push(BakeWarning::DegenerateUvTriangles {
                count: degenerate_uv_triangles.len(),
            });
        }
        if miss_rate > miss_threshold {
            warnings.push(BakeWarning::HighMissRate {
                rate: miss_rate,
                threshold: miss_threshold,
            });
        }

        Self {
            resolution,
            baked_texels: stats.baked,
            missed_texels: stats.missed,
            degenerate_texels: stats.degenerate,
            uncovered_texels: stats.uncovered,
            dilated_texels: dilated,
            retried_hits: stats.retried,
            miss_rate,
            miss_region: stats.miss_region,
            degenerate_vertices,
            degenerate_uv_triangles,
            elapsed_seconds,
            warnings,
        }
    }

    /// Texels inside the UV layout.
    pub fn covered_texels(&self) -> u64 {
        self.baked_texels + self.missed_texels + self.degenerate_texels
    }

    /// True if the miss rate crossed the warning threshold.
    pub fn has_high_miss_rate(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, BakeWarning::HighMissRate { .. }))
    }
}

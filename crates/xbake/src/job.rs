//! Bake job orchestration.
//!
//! [`BakeJob::new`] does everything that can fail: settings and mesh
//! validation, the orientation conversion, cage and BVH construction.
//! [`BakeJob::run`] is then pure computation over immutable data, spread
//! over the rayon pool one tile at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use xbake_math::{Aabb3, Vec3};
use xbake_mesh::{shading_normals, smooth_normals, tangent_frames, Mesh, TangentFrame};
use xbake_raytrace::Bvh;

use crate::cage::Cage;
use crate::channels::{
    default_curvature_radius, AmbientOcclusion, Channel, ChannelEvaluator, Curvature,
    EvalContext, PositionEncoding, PositionMap, TangentNormal, Texel, WorldNormal,
};
use crate::error::{BakeError, MeshRole, Result};
use crate::output::output_stem;
use crate::project::{HitRecord, Projector, RAY_BIAS_FACTOR};
use crate::raster::{ChannelRaster, Compositor, CoverageMask, TexelState, TileBuffer};
use crate::report::{BakeReport, TileStats};
use crate::sampler::{Coverage, SamplerConfig, TexelSampler, Tile};
use crate::settings::BakeSettings;

/// Cooperative cancellation flag, checked before each tile.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Tiles already running finish; no new tile starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a finished bake produces.
#[derive(Debug, Clone)]
pub struct BakeOutput {
    /// One raster per enabled channel, in [`Channel::ALL`] order.
    pub rasters: Vec<ChannelRaster>,
    /// Per-texel outcome.
    pub coverage: CoverageMask,
    /// Statistics and warnings.
    pub report: BakeReport,
    /// Encoding of the position channel, when it was baked.
    pub position_encoding: Option<PositionEncoding>,
}

impl BakeOutput {
    /// Raster for `channel`, if it was enabled.
    pub fn raster(&self, channel: Channel) -> Option<&ChannelRaster> {
        self.rasters.iter().find(|r| r.channel() == channel)
    }
}

/// A validated, ready-to-run bake.
pub struct BakeJob {
    settings: BakeSettings,
    low: Mesh,
    high_name: String,
    cage: Cage,
    normals: Vec<Vec3>,
    frames: Vec<TangentFrame>,
    degenerate_vertices: Vec<u32>,
    bvh: Bvh,
    low_bounds: Aabb3,
    high_bounds: Aabb3,
}

impl BakeJob {
    /// Validate inputs and build the cage and acceleration structure.
    ///
    /// Meshes are taken in the convention selected by
    /// `settings.use_maya_orientation` and converted once, here.
    pub fn new(low: Mesh, high: Mesh, settings: BakeSettings) -> Result<Self> {
        Self::with_cage(low, high, None, settings)
    }

    /// Like [`BakeJob::new`], projecting from `cage` instead of extruding
    /// the low-poly mesh when one is given. The cage must share the low-poly
    /// vertex count and triangle indices; `settings.extrusion` is then unused.
    pub fn with_cage(
        mut low: Mesh,
        mut high: Mesh,
        mut cage_mesh: Option<Mesh>,
        settings: BakeSettings,
    ) -> Result<Self> {
        settings.validate()?;
        low.validate_with_uvs()
            .map_err(BakeError::mesh(MeshRole::LowPoly))?;
        high.validate().map_err(BakeError::mesh(MeshRole::HighPoly))?;
        if let Some(cage) = &cage_mesh {
            cage.validate().map_err(BakeError::mesh(MeshRole::Cage))?;
        }

        info!(
            low = %low.name,
            low_triangles = low.num_triangles(),
            high = %high.name,
            high_triangles = high.num_triangles(),
            resolution = settings.resolution,
            "preparing bake"
        );

        let convention = settings.axis_convention();
        low.convert_orientation(convention);
        high.convert_orientation(convention);
        if let Some(cage) = &mut cage_mesh {
            cage.convert_orientation(convention);
        }

        let smooth = smooth_normals(&low);
        let normals = shading_normals(&low, &smooth);
        let frames = tangent_frames(&low, &normals);
        let cage = match &cage_mesh {
            Some(mesh) => {
                let cage = Cage::from_mesh(&low, mesh, &smooth)?;
                info!(cage = %mesh.name, max_offset = cage.extrusion(), "using cage mesh");
                cage
            }
            None => Cage::build(&low, &smooth, settings.extrusion),
        };
        // A cage mesh can give these vertices a direction
        let mut degenerate_vertices = smooth.degenerate_vertices();
        degenerate_vertices.retain(|&v| cage.normal(v as usize).is_none());
        if !degenerate_vertices.is_empty() {
            warn!(
                count = degenerate_vertices.len(),
                "low-poly vertices without a valid normal; their texels use fallback values"
            );
        }

        let started = Instant::now();
        let bvh = Bvh::build(&high);
        debug!(
            triangles = bvh.num_triangles(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built BVH"
        );

        let low_bounds = low.bounds();
        let high_bounds = high.bounds();
        Ok(Self {
            settings,
            high_name: high.name,
            low,
            cage,
            normals,
            frames,
            degenerate_vertices,
            bvh,
            low_bounds,
            high_bounds,
        })
    }

    /// Job settings.
    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Projection cage.
    pub fn cage(&self) -> &Cage {
        &self.cage
    }

    /// High-poly acceleration structure.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Low-poly mesh in the internal frame.
    pub fn low_poly(&self) -> &Mesh {
        &self.low
    }

    /// File stem for this job's outputs.
    pub fn output_stem(&self) -> String {
        output_stem(&self.low.name, &self.high_name)
    }

    /// Offset applied to ray origins.
    pub fn ray_bias(&self) -> f64 {
        RAY_BIAS_FACTOR * self.low_bounds.diagonal()
    }

    /// Projection ray length before bias: the override if set, else twice
    /// the cage extrusion.
    pub fn projection_distance(&self) -> f64 {
        self.settings
            .max_ray_distance
            .unwrap_or(2.0 * self.cage.extrusion())
    }

    /// Position channel encoding.
    ///
    /// Every hit lies on the high-poly surface within one ray length of the
    /// cage, so the cage bounds grown by that length and clipped to the
    /// high-poly bounds hold every value the channel can take.
    pub fn position_encoding(&self) -> PositionEncoding {
        let mut reach = self.cage.bounds();
        reach.expand(self.projection_distance() + 3.0 * self.ray_bias());
        let clipped = reach.intersection(&self.high_bounds);
        PositionEncoding::from_bounds(if clipped.is_empty() { &reach } else { &clipped })
    }

    fn evaluators(&self) -> Vec<Box<dyn ChannelEvaluator>> {
        let s = &self.settings;
        s.enabled_channels()
            .into_iter()
            .map(|channel| -> Box<dyn ChannelEvaluator> {
                match channel {
                    Channel::Normal => Box::new(TangentNormal::new(s.normal_format)),
                    Channel::AmbientOcclusion => {
                        Box::new(AmbientOcclusion::new(s.ao_samples, s.ao_distance))
                    }
                    Channel::Curvature => {
                        let radius = s.curvature_radius.unwrap_or_else(|| {
                            default_curvature_radius(self.low_bounds.diagonal(), s.resolution)
                        });
                        Box::new(Curvature::new(radius, s.curvature_contrast))
                    }
                    Channel::Position => Box::new(PositionMap::new(self.position_encoding())),
                    Channel::WorldNormal => Box::new(WorldNormal),
                }
            })
            .collect()
    }

    /// Bake every enabled channel.
    ///
    /// Returns [`BakeError::Cancelled`] if `cancel` fires before the last
    /// tile starts; nothing partial is returned in that case.
    pub fn run(&self, cancel: &CancelToken) -> Result<BakeOutput> {
        let started = Instant::now();
        let settings = &self.settings;

        let sampler = TexelSampler::new(
            &self.low,
            &self.cage,
            &self.normals,
            &self.frames,
            SamplerConfig {
                resolution: settings.resolution,
                tile_size: settings.tile_size,
                edge_margin: settings.edge_margin,
            },
        );
        let degenerate_uv = sampler.degenerate_uv_triangles().to_vec();
        if !degenerate_uv.is_empty() {
            warn!(
                count = degenerate_uv.len(),
                "skipping low-poly triangles with zero UV area"
            );
        }

        let bias = self.ray_bias();
        let projector = Projector::new(
            &self.bvh,
            self.projection_distance(),
            bias,
            settings.bidirectional,
        );
        let ctx = EvalContext {
            bvh: &self.bvh,
            ray_bias: bias,
        };
        let evaluators = self.evaluators();
        let channels: Vec<Channel> = evaluators.iter().map(|e| e.channel()).collect();

        let tiles = sampler.tiles();
        debug!(
            tiles = tiles.len(),
            tile_size = settings.tile_size,
            bias,
            max_distance = projector.max_distance(),
            "projecting"
        );

        let results: Vec<(TileBuffer, TileStats)> = tiles
            .par_iter()
            .map(|&tile| {
                if cancel.is_cancelled() {
                    return Err(BakeError::Cancelled);
                }
                Ok(bake_tile(&sampler, &projector, &evaluators, &ctx, tile))
            })
            .collect::<Result<_>>()?;

        if cancel.is_cancelled() {
            return Err(BakeError::Cancelled);
        }

        let mut compositor = Compositor::new(&channels, settings.resolution);
        let mut stats = TileStats::default();
        for (buffer, tile_stats) in &results {
            compositor.blit(buffer);
            stats = stats.merge(*tile_stats);
        }

        let (rasters, coverage, dilated) =
            compositor.finish(settings.effective_dilation_margin());

        let report = BakeReport::new(
            settings.resolution,
            stats,
            dilated as u64,
            self.degenerate_vertices.clone(),
            degenerate_uv,
            started.elapsed().as_secs_f64(),
            settings.miss_warning_threshold,
        );
        if report.has_high_miss_rate() {
            warn!(
                miss_rate = report.miss_rate,
                threshold = settings.miss_warning_threshold,
                region = ?report.miss_region,
                "high projection miss rate"
            );
        }
        info!(
            baked = report.baked_texels,
            missed = report.missed_texels,
            retried = report.retried_hits,
            elapsed_s = report.elapsed_seconds,
            "bake finished"
        );

        Ok(BakeOutput {
            rasters,
            coverage,
            report,
            position_encoding: settings.use_position.then(|| self.position_encoding()),
        })
    }
}

/// Project and evaluate every pixel of one tile.
fn bake_tile(
    sampler: &TexelSampler<'_>,
    projector: &Projector<'_>,
    evaluators: &[Box<dyn ChannelEvaluator>],
    ctx: &EvalContext<'_>,
    tile: Tile,
) -> (TileBuffer, TileStats) {
    let mut buffer = TileBuffer::new(tile, evaluators.len());
    let mut stats = TileStats::default();
    let mut values: Vec<Texel> = vec![[0.0; 3]; evaluators.len()];

    for (x, y, coverage) in sampler.tile_samples(tile) {
        match coverage {
            Coverage::Uncovered => stats.uncovered += 1,
            Coverage::Degenerate { .. } => {
                stats.degenerate += 1;
                buffer.put(x, y, TexelState::Degenerate, &[]);
            }
            Coverage::Covered(sample) => match projector.project(&sample) {
                HitRecord::Miss => {
                    stats.record_miss(x, y);
                    buffer.put(x, y, TexelState::Miss, &[]);
                }
                HitRecord::Hit(hit) => {
                    for (value, evaluator) in values.iter_mut().zip(evaluators) {
                        *value = evaluator.evaluate(&sample, &hit, ctx);
                    }
                    stats.baked += 1;
                    if hit.reversed {
                        stats.retried += 1;
                    }
                    buffer.put(x, y, TexelState::Baked, &values);
                }
            },
        }
    }
    (buffer, stats)
}

/// Validate, build and run a job in one call.
pub fn bake(low: Mesh, high: Mesh, settings: BakeSettings) -> Result<BakeOutput> {
    BakeJob::new(low, high, settings)?.run(&CancelToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::NormalFormat;
    use crate::testing::{quad, trough, uv_sphere};
    use xbake_mesh::MeshError;

    fn settings(resolution: u32) -> BakeSettings {
        BakeSettings {
            resolution,
            tile_size: 16,
            ao_samples: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_flat_quad_scenario() {
        let out = bake(quad("panel_low", 0.0), quad("panel_high", 0.01), settings(64)).unwrap();

        assert_eq!(out.report.baked_texels, 64 * 64);
        assert_eq!(out.report.missed_texels, 0);
        assert_eq!(out.report.miss_rate, 0.0);
        assert!(out.report.warnings.is_empty());

        let normal = out.raster(Channel::Normal).unwrap();
        let ao = out.raster(Channel::AmbientOcclusion).unwrap();
        for y in 0..64 {
            for x in 0..64 {
                let n = normal.get(x, y);
                assert!((n[0] - 0.5).abs() < 1e-6, "({x},{y}) {n:?}");
                assert!((n[1] - 0.5).abs() < 1e-6, "({x},{y}) {n:?}");
                assert!((n[2] - 1.0).abs() < 1e-6, "({x},{y}) {n:?}");
                assert_eq!(ao.get(x, y), &[1.0]);
            }
        }
    }

    #[test]
    fn test_directx_flips_green_channel() {
        let sphere_low = uv_sphere("ball_low", 1.0, 24, 12);
        let sphere_high = uv_sphere("ball_high", 1.02, 48, 24);
        let mut gl = settings(32);
        gl.use_ao = false;
        gl.use_curvature = false;
        let dx = BakeSettings {
            normal_format: NormalFormat::DirectX,
            ..gl.clone()
        };

        let a = bake(sphere_low.clone(), sphere_high.clone(), gl).unwrap();
        let b = bake(sphere_low, sphere_high, dx).unwrap();
        let (na, nb) = (
            a.raster(Channel::Normal).unwrap(),
            b.raster(Channel::Normal).unwrap(),
        );
        for y in 0..32 {
            for x in 0..32 {
                if a.coverage.get(x, y) != TexelState::Baked {
                    continue;
                }
                let (pa, pb) = (na.get(x, y), nb.get(x, y));
                assert_eq!(pa[0], pb[0]);
                assert_eq!(pb[1], 1.0 - pa[1]);
                assert_eq!(pa[2], pb[2]);
                assert!(pa.iter().all(|c| (0.0..=1.0).contains(c)));
            }
        }
        assert_eq!(
            a.raster(Channel::Position).unwrap(),
            b.raster(Channel::Position).unwrap()
        );
    }

    #[test]
    fn test_convex_self_bake_is_unoccluded() {
        let sphere = uv_sphere("orb", 1.0, 32, 16);
        let s = BakeSettings {
            extrusion: 0.0,
            use_normal: false,
            use_curvature: false,
            use_position: false,
            use_world_normal: false,
            ..settings(32)
        };
        let out = bake(sphere.clone(), sphere, s).unwrap();
        let ao = out.raster(Channel::AmbientOcclusion).unwrap();
        let mut baked = 0;
        for y in 0..32 {
            for x in 0..32 {
                if out.coverage.get(x, y) == TexelState::Baked {
                    baked += 1;
                    assert_eq!(ao.get(x, y), &[1.0], "texel ({x},{y})");
                }
            }
        }
        assert!(baked > 32 * 32 / 2);
    }

    #[test]
    fn test_trough_floor_is_occluded() {
        let s = BakeSettings {
            use_normal: false,
            use_curvature: false,
            use_position: false,
            use_world_normal: false,
            ao_samples: 64,
            ..settings(16)
        };
        let out = bake(quad("floor", 0.0), trough("floor_high"), s).unwrap();
        let ao = out.raster(Channel::AmbientOcclusion).unwrap();
        let values: Vec<f32> = ao.data().to_vec();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert!(mean < 0.9, "mean AO {mean}");
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        // Texels next to a wall see more occlusion than the middle
        assert!(ao.get(0, 8)[0] < ao.get(8, 8)[0]);
    }

    #[test]
    fn test_position_decodes_to_hit_points() {
        let out = bake(quad("tile_low", 0.0), quad("tile_high", 0.01), settings(16)).unwrap();
        let enc = out.position_encoding.unwrap();
        let pos = out.raster(Channel::Position).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let v = pos.get(x, y);
                let p = enc.decode([v[0] as f64, v[1] as f64, v[2] as f64]);
                let expected_x = (x as f64 + 0.5) / 16.0;
                let expected_y = 1.0 - (y as f64 + 0.5) / 16.0;
                assert!((p.x - expected_x).abs() < 1e-6, "{p:?}");
                assert!((p.y - expected_y).abs() < 1e-6, "{p:?}");
                assert!((p.z - 0.01).abs() < 1e-6, "{p:?}");
            }
        }
    }

    /// Round-trip through 16-bit storage, as an image writer would.
    fn quantize(v: f32) -> f64 {
        (f64::from(v.clamp(0.0, 1.0)) * 65535.0).round() / 65535.0
    }

    #[test]
    fn test_position_survives_quantization() {
        // High-poly sphere pokes outside the low-poly bounding box
        let low = uv_sphere("planet_low", 1.0, 16, 8);
        let high = uv_sphere("planet_high", 1.05, 64, 32);
        let s = BakeSettings {
            extrusion: 0.2,
            use_ao: false,
            use_curvature: false,
            ..settings(32)
        };
        let out = bake(low, high, s).unwrap();
        assert_eq!(out.report.missed_texels, 0);
        let enc = out.position_encoding.unwrap();
        let pos = out.raster(Channel::Position).unwrap();
        assert!(pos.data().iter().all(|v| (0.0..=1.0).contains(v)));

        for y in 0..32 {
            for x in 0..32 {
                if out.coverage.get(x, y) != TexelState::Baked {
                    continue;
                }
                let v = pos.get(x, y);
                let r = enc
                    .decode([quantize(v[0]), quantize(v[1]), quantize(v[2])])
                    .coords
                    .norm();
                // Polygonal sphere: between the inscribed and circumscribed radius
                assert!(r > 1.05 * 0.99 - 1e-4 && r < 1.05 + 1e-4, "radius {r}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let low = uv_sphere("rock_low", 1.0, 12, 6);
        let high = uv_sphere("rock_high", 1.03, 40, 20);
        let a = bake(low.clone(), high.clone(), settings(32)).unwrap();
        let b = bake(low, high, settings(32)).unwrap();
        assert_eq!(a.rasters, b.rasters);
        assert_eq!(a.coverage, b.coverage);
    }

    #[test]
    fn test_missing_uvs_is_fatal() {
        let mut low = quad("nouv", 0.0);
        low.uvs.clear();
        let err = BakeJob::new(low, quad("high", 0.0), settings(8))
            .err()
            .unwrap();
        assert_eq!(
            err,
            BakeError::Mesh {
                role: MeshRole::LowPoly,
                source: MeshError::MissingUvs("nouv".into()),
            }
        );
    }

    #[test]
    fn test_invalid_high_poly_is_fatal() {
        let mut high = quad("high", 0.0);
        high.indices.push(0);
        let err = BakeJob::new(quad("low", 0.0), high, settings(8)).err().unwrap();
        assert!(matches!(
            err,
            BakeError::Mesh {
                role: MeshRole::HighPoly,
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled_job_returns_nothing() {
        let job = BakeJob::new(quad("low", 0.0), quad("high", 0.01), settings(32)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(job.run(&cancel), Err(BakeError::Cancelled)));
    }

    #[test]
    fn test_misses_use_fallback_and_are_reported() {
        // High-poly far below the projection range
        let s = BakeSettings {
            bidirectional: false,
            ..settings(16)
        };
        let out = bake(quad("low", 0.0), quad("high", -5.0), s).unwrap();
        assert_eq!(out.report.baked_texels, 0);
        assert_eq!(out.report.missed_texels, 256);
        assert_eq!(out.report.miss_rate, 1.0);
        assert!(out.report.has_high_miss_rate());
        assert_eq!(
            out.report.miss_region,
            Some(crate::report::PixelRect {
                x0: 0,
                y0: 0,
                x1: 15,
                y1: 15
            })
        );
        let normal = out.raster(Channel::Normal).unwrap();
        assert_eq!(normal.get(5, 5), &[0.5, 0.5, 1.0]);
        let curvature = out.raster(Channel::Curvature).unwrap();
        assert_eq!(curvature.get(5, 5), &[0.5]);
    }

    #[test]
    fn test_reverse_retry_counts() {
        // High-poly outside the cage: only the reverse ray finds it
        let out = bake(quad("low", 0.0), quad("high", 0.8), settings(8)).unwrap();
        assert_eq!(out.report.missed_texels, 0);
        assert_eq!(out.report.retried_hits, 64);
    }

    #[test]
    fn test_maya_orientation_converts_once() {
        // A Y-up quad facing +Y becomes a Z-up quad facing +Z
        let mut low = quad("yup", 0.0);
        for p in &mut low.positions {
            *p = xbake_math::Point3::new(-p.x, 0.0, p.y);
        }
        let high = low.clone();
        let s = BakeSettings {
            use_maya_orientation: true,
            extrusion: 0.1,
            ..settings(8)
        };
        let out = bake(low, high, s).unwrap();
        assert_eq!(out.report.missed_texels, 0);
        let world = out.raster(Channel::WorldNormal).unwrap();
        let n = world.get(4, 4);
        assert!((n[2] - 1.0).abs() < 1e-6, "{n:?}");
    }

    #[test]
    fn test_output_stem_uses_common_prefix() {
        let job = BakeJob::new(quad("crate_low", 0.0), quad("crate_high", 0.01), settings(8)).unwrap();
        assert_eq!(job.output_stem(), "crate");
    }

    #[test]
    fn test_uncovered_texels_are_dilated() {
        // Left half of UV space only
        let mut low = quad("half", 0.0);
        for uv in &mut low.uvs {
            uv.x *= 0.5;
        }
        let s = BakeSettings {
            dilation_margin: 2,
            edge_margin: 0.0,
            ..settings(16)
        };
        let out = bake(low, quad("half_high", 0.01), s).unwrap();
        assert_eq!(out.report.uncovered_texels, 16 * 8);
        assert_eq!(out.report.dilated_texels, 16 * 2);
        assert_eq!(out.coverage.get(12, 3), TexelState::Uncovered);
        let pos = out.raster(Channel::Position).unwrap();
        // Dilated texel copies its neighbour; far texel keeps the fallback
        assert_eq!(pos.get(8, 3), pos.get(7, 3));
        assert_eq!(pos.get(12, 3), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_miss_texels_take_baked_neighbours() {
        // High-poly covers only the left half
        let mut high = quad("half_high", 0.01);
        for p in &mut high.positions {
            p.x *= 0.5;
        }
        let s = BakeSettings {
            bidirectional: false,
            dilation_margin: 4,
            ..settings(16)
        };
        let out = bake(quad("half_low", 0.0), high, s).unwrap();
        assert_eq!(out.report.missed_texels, 16 * 8);
        assert_eq!(out.report.dilated_texels, 16 * 4);
        assert_eq!(out.coverage.get(7, 3), TexelState::Baked);
        assert_eq!(out.coverage.get(8, 3), TexelState::Miss);

        let pos = out.raster(Channel::Position).unwrap();
        assert_eq!(pos.get(8, 3), pos.get(7, 3));
        assert_eq!(pos.get(11, 3), pos.get(7, 3));
        assert_eq!(pos.get(12, 3), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_cage_mesh_sets_ray_origins() {
        // Detail above the default extruded cage
        let s = BakeSettings {
            bidirectional: false,
            ..settings(8)
        };
        let out = bake(quad("low", 0.0), quad("high", 0.8), s.clone()).unwrap();
        assert_eq!(out.report.missed_texels, 64);

        let job = BakeJob::with_cage(
            quad("low", 0.0),
            quad("high", 0.8),
            Some(quad("low_cage", 1.0)),
            s,
        )
        .unwrap();
        assert_eq!(job.cage().position(0).z, 1.0);
        assert_eq!(job.projection_distance(), 2.0);

        let out = job.run(&CancelToken::new()).unwrap();
        assert_eq!(out.report.missed_texels, 0);
        assert_eq!(out.report.retried_hits, 0);
        let enc = out.position_encoding.unwrap();
        let v = out.raster(Channel::Position).unwrap().get(4, 4);
        let p = enc.decode([v[0] as f64, v[1] as f64, v[2] as f64]);
        assert!((p.z - 0.8).abs() < 1e-6, "{p:?}");
    }

    #[test]
    fn test_cage_mesh_is_validated() {
        let mut extra = quad("cage", 0.5);
        extra.uvs.clear();
        extra.positions.push(xbake_math::Point3::origin());
        let err = BakeJob::with_cage(quad("low", 0.0), quad("high", 0.0), Some(extra), settings(8))
            .err()
            .unwrap();
        assert!(matches!(err, BakeError::CageMismatch(_)));

        let mut broken = quad("cage", 0.5);
        broken.indices.pop();
        let err = BakeJob::with_cage(quad("low", 0.0), quad("high", 0.0), Some(broken), settings(8))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BakeError::Mesh {
                role: MeshRole::Cage,
                ..
            }
        ));
    }

    #[test]
    fn test_degenerate_geometry_is_reported() {
        use crate::report::BakeWarning;
        use xbake_math::{Point2, Point3};

        // Quad in the left half of UV space
        let mut low = quad("panel_low", 0.0);
        for uv in &mut low.uvs {
            uv.x *= 0.5;
        }
        // Triangle 2: collinear in 3D, so its vertices get no normal
        low.positions.extend([
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ]);
        low.uvs.extend([
            Point2::new(0.6, 0.1),
            Point2::new(0.9, 0.1),
            Point2::new(0.9, 0.9),
        ]);
        // Triangle 3: valid in 3D, collapsed in UV space
        low.positions.extend([
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ]);
        low.uvs.extend([
            Point2::new(0.95, 0.95),
            Point2::new(0.96, 0.96),
            Point2::new(0.97, 0.97),
        ]);
        low.indices.extend([4, 5, 6, 7, 8, 9]);

        let s = BakeSettings {
            dilation_margin: 0,
            ..settings(16)
        };
        let out = bake(low, quad("panel_high", 0.01), s).unwrap();
        let report = &out.report;
        assert_eq!(report.degenerate_vertices, vec![4, 5, 6]);
        assert_eq!(report.degenerate_uv_triangles, vec![3]);
        assert!(report
            .warnings
            .contains(&BakeWarning::DegenerateVertices { count: 3 }));
        assert!(report
            .warnings
            .contains(&BakeWarning::DegenerateUvTriangles { count: 1 }));
        assert!(report.degenerate_texels > 0);
        assert!(report.baked_texels > 0);

        // Pixel center (0.84, 0.28) lies in the collinear triangle
        assert_eq!(out.coverage.get(13, 11), TexelState::Degenerate);
        assert_eq!(out.raster(Channel::Normal).unwrap().get(13, 11), &[0.5, 0.5, 1.0]);
        assert_eq!(out.raster(Channel::AmbientOcclusion).unwrap().get(13, 11), &[1.0]);
        assert_eq!(out.coverage.get(3, 8), TexelState::Baked);
    }
}

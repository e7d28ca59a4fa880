//! UV-space rasterization of the low-poly mesh.
//!
//! Pixel `(x, y)` samples UV `((x + 0.5) / res, 1 - (y + 0.5) / res)`: row 0
//! is the top of the image, where V = 1. All geometric tests run in pixel
//! space, so the edge margin is a distance in pixels.
//!
//! Triangles are bucketed per tile up front; iterating a tile then only
//! looks at the triangles that can reach it. Iteration is lazy and has no
//! hidden state, so any tile can be sampled again with identical results.

use xbake_math::{orthonormal_basis, Dir3, Point2, Point3, Vec2, Vec3};
use xbake_mesh::{Mesh, TangentFrame};

use crate::cage::Cage;

/// UV triangles with less area than this (in UV units) are skipped.
pub const MIN_UV_AREA: f64 = 1e-10;

/// Barycentric slack for the point-in-triangle test.
const INSIDE_EPSILON: f64 = 1e-9;

/// A square block of pixels processed by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row-major tile index.
    pub index: usize,
    /// First column.
    pub x0: u32,
    /// First row.
    pub y0: u32,
    /// One past the last column.
    pub x1: u32,
    /// One past the last row.
    pub y1: u32,
}

impl Tile {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        (self.width() * self.height()) as usize
    }

    /// True for a zero-area tile.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A covered texel mapped back onto the low-poly surface.
#[derive(Debug, Clone, Copy)]
pub struct TexelSample {
    /// Pixel column.
    pub x: u32,
    /// Pixel row.
    pub y: u32,
    /// UV coordinate of the pixel center.
    pub uv: Point2,
    /// Low-poly triangle the texel was assigned to.
    pub triangle: u32,
    /// Barycentric weights within that triangle.
    pub barycentric: [f64; 3],
    /// Point on the low-poly surface.
    pub position: Point3,
    /// Interpolated shading normal.
    pub normal: Dir3,
    /// Unit tangent (increasing U), orthogonal to `normal`.
    pub tangent: Vec3,
    /// Unit bitangent (increasing V), orthogonal to `normal` and `tangent`.
    pub bitangent: Vec3,
    /// Point on the cage the projection ray starts from.
    pub cage_point: Point3,
    /// Interpolated outward cage normal.
    pub cage_normal: Dir3,
}

impl TexelSample {
    /// Direction of the projection ray (into the mesh).
    pub fn ray_direction(&self) -> Dir3 {
        -self.cage_normal
    }
}

/// What a pixel maps to.
#[derive(Debug, Clone, Copy)]
pub enum Coverage {
    /// No UV triangle reaches this pixel.
    Uncovered,
    /// The pixel belongs to a triangle with a degenerate vertex.
    Degenerate {
        /// Low-poly triangle index.
        triangle: u32,
    },
    /// A valid sample on the low-poly surface.
    Covered(TexelSample),
}

/// Sampler parameters.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Raster width and height.
    pub resolution: u32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Texel-straddling tolerance in pixels.
    pub edge_margin: f64,
}

/// A UV triangle in pixel space with precomputed barycentric terms.
#[derive(Debug, Clone, Copy)]
struct PixelTriangle {
    a: Vec2,
    b: Vec2,
    c: Vec2,
    e0: Vec2,
    e1: Vec2,
    d00: f64,
    d01: f64,
    d11: f64,
    inv_denom: f64,
}

impl PixelTriangle {
    fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        let e0 = b - a;
        let e1 = c - a;
        let d00 = e0.dot(&e0);
        let d01 = e0.dot(&e1);
        let d11 = e1.dot(&e1);
        Self {
            a,
            b,
            c,
            e0,
            e1,
            d00,
            d01,
            d11,
            inv_denom: 1.0 / (d00 * d11 - d01 * d01),
        }
    }

    fn barycentric(&self, p: &Vec2) -> [f64; 3] {
        let e2 = p - self.a;
        let d20 = e2.dot(&self.e0);
        let d21 = e2.dot(&self.e1);
        let v = (self.d11 * d20 - self.d01 * d21) * self.inv_denom;
        let w = (self.d00 * d21 - self.d01 * d20) * self.inv_denom;
        [1.0 - v - w, v, w]
    }

    /// Closest point on the triangle boundary to `p` and its distance.
    fn closest_on_edges(&self, p: &Vec2) -> (Vec2, f64) {
        [(self.a, self.b), (self.b, self.c), (self.c, self.a)]
            .into_iter()
            .map(|(s, e)| {
                let d = e - s;
                let len2 = d.dot(&d);
                let t = if len2 > 0.0 {
                    ((p - s).dot(&d) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let q = s + d * t;
                (q, (p - q).norm())
            })
            .fold((self.a, f64::INFINITY), |best, cur| {
                if cur.1 < best.1 {
                    cur
                } else {
                    best
                }
            })
    }

    fn pixel_bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.a.x.min(self.b.x).min(self.c.x),
            self.a.y.min(self.b.y).min(self.c.y),
            self.a.x.max(self.b.x).max(self.c.x),
            self.a.y.max(self.b.y).max(self.c.y),
        )
    }
}

fn is_inside(bary: &[f64; 3]) -> bool {
    bary.iter().all(|&w| w >= -INSIDE_EPSILON)
}

fn clamp_barycentric(bary: [f64; 3]) -> [f64; 3] {
    let clamped = bary.map(|w| w.max(0.0));
    let sum: f64 = clamped.iter().sum();
    if sum > 0.0 {
        clamped.map(|w| w / sum)
    } else {
        [1.0, 0.0, 0.0]
    }
}

/// Rasterizes the low-poly UV layout into texel samples.
pub struct TexelSampler<'a> {
    mesh: &'a Mesh,
    cage: &'a Cage,
    normals: &'a [Vec3],
    frames: &'a [TangentFrame],
    config: SamplerConfig,
    tiles_x: u32,
    tiles_y: u32,
    /// Pixel-space triangles, `None` for degenerate UVs.
    triangles: Vec<Option<PixelTriangle>>,
    /// Candidate triangles per tile, ascending.
    buckets: Vec<Vec<u32>>,
    degenerate_uv: Vec<u32>,
}

impl<'a> TexelSampler<'a> {
    /// Prepare a sampler over `mesh`.
    ///
    /// `normals` and `frames` are the per-vertex shading normals and tangent
    /// frames of the same mesh.
    pub fn new(
        mesh: &'a Mesh,
        cage: &'a Cage,
        normals: &'a [Vec3],
        frames: &'a [TangentFrame],
        config: SamplerConfig,
    ) -> Self {
        let res = config.resolution as f64;
        let tile = config.tile_size.max(1);
        let tiles_x = config.resolution.div_ceil(tile);
        let tiles_y = tiles_x;

        let mut triangles = Vec::with_capacity(mesh.num_triangles());
        let mut degenerate_uv = Vec::new();
        let mut buckets = vec![Vec::new(); (tiles_x * tiles_y) as usize];

        for t in 0..mesh.num_triangles() {
            let [i0, i1, i2] = mesh.triangle(t);
            let (u0, u1, u2) = (mesh.uvs[i0], mesh.uvs[i1], mesh.uvs[i2]);
            let area = 0.5 * (u1 - u0).perp(&(u2 - u0)).abs();
            if area.is_nan() || area < MIN_UV_AREA {
                degenerate_uv.push(t as u32);
                triangles.push(None);
                continue;
            }

            let to_pixel = |uv: Point2| Vec2::new(uv.x * res, (1.0 - uv.y) * res);
            let tri = PixelTriangle::new(to_pixel(u0), to_pixel(u1), to_pixel(u2));

            // Pixel centers sit at +0.5; include everything within the margin
            let (min_x, min_y, max_x, max_y) = tri.pixel_bounds();
            let m = config.edge_margin + 0.5;
            if max_x + m < 0.0 || max_y + m < 0.0 || min_x - m > res || min_y - m > res {
                triangles.push(Some(tri));
                continue;
            }
            let last = (config.resolution - 1) as f64;
            let px0 = (min_x - m).floor().clamp(0.0, last) as u32;
            let py0 = (min_y - m).floor().clamp(0.0, last) as u32;
            let px1 = (max_x + m).ceil().clamp(0.0, last) as u32;
            let py1 = (max_y + m).ceil().clamp(0.0, last) as u32;

            for ty in py0 / tile..=py1 / tile {
                for tx in px0 / tile..=px1 / tile {
                    buckets[(ty * tiles_x + tx) as usize].push(t as u32);
                }
            }
            triangles.push(Some(tri));
        }

        Self {
            mesh,
            cage,
            normals,
            frames,
            config,
            tiles_x,
            tiles_y,
            triangles,
            buckets,
            degenerate_uv,
        }
    }

    /// Raster width and height.
    pub fn resolution(&self) -> u32 {
        self.config.resolution
    }

    /// Indices of triangles skipped for near-zero UV area.
    pub fn degenerate_uv_triangles(&self) -> &[u32] {
        &self.degenerate_uv
    }

    /// All tiles, row-major.
    pub fn tiles(&self) -> Vec<Tile> {
        let size = self.config.tile_size.max(1);
        let res = self.config.resolution;
        let mut tiles = Vec::with_capacity((self.tiles_x * self.tiles_y) as usize);
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let x0 = tx * size;
                let y0 = ty * size;
                tiles.push(Tile {
                    index: (ty * self.tiles_x + tx) as usize,
                    x0,
                    y0,
                    x1: (x0 + size).min(res),
                    y1: (y0 + size).min(res),
                });
            }
        }
        tiles
    }

    /// Lazily sample every pixel of `tile` in row-major order.
    pub fn tile_samples(&self, tile: Tile) -> TileSamples<'_, 'a> {
        TileSamples {
            sampler: self,
            tile,
            x: tile.x0,
            y: tile.y0,
        }
    }

    /// Lazily sample the whole raster, tile by tile.
    pub fn samples(&self) -> impl Iterator<Item = (u32, u32, Coverage)> + '_ {
        self.tiles()
            .into_iter()
            .flat_map(move |tile| self.tile_samples(tile))
    }

    /// Classify one pixel.
    pub fn sample(&self, x: u32, y: u32) -> Coverage {
        let size = self.config.tile_size.max(1);
        let bucket = &self.buckets[((y / size) * self.tiles_x + x / size) as usize];
        let p = Vec2::new(x as f64 + 0.5, y as f64 + 0.5);

        let mut nearest: Option<(u32, f64, Vec2)> = None;
        for &t in bucket {
            let Some(tri) = &self.triangles[t as usize] else {
                continue;
            };
            let bary = tri.barycentric(&p);
            if is_inside(&bary) {
                return self.build_sample(x, y, t, clamp_barycentric(bary));
            }
            let (q, dist) = tri.closest_on_edges(&p);
            if dist <= self.config.edge_margin && nearest.map_or(true, |(_, d, _)| dist < d) {
                nearest = Some((t, dist, q));
            }
        }

        match nearest {
            Some((t, _, q)) => {
                let Some(tri) = &self.triangles[t as usize] else {
                    return Coverage::Uncovered;
                };
                self.build_sample(x, y, t, clamp_barycentric(tri.barycentric(&q)))
            }
            None => Coverage::Uncovered,
        }
    }

    fn build_sample(&self, x: u32, y: u32, triangle: u32, bary: [f64; 3]) -> Coverage {
        let idx = self.mesh.triangle(triangle as usize);

        let mut cage_normal = Vec3::zeros();
        for (k, &v) in idx.iter().enumerate() {
            match self.cage.normal(v) {
                Some(n) => cage_normal += n.into_inner() * bary[k],
                None => return Coverage::Degenerate { triangle },
            }
        }
        let Some(cage_normal) = Dir3::try_new(cage_normal, 1e-12) else {
            return Coverage::Degenerate { triangle };
        };

        let lerp = |values: [Vec3; 3]| values[0] * bary[0] + values[1] * bary[1] + values[2] * bary[2];

        let position = Point3::from(lerp(idx.map(|v| self.mesh.positions[v].coords)));
        let cage_point = Point3::from(lerp(idx.map(|v| self.cage.position(v).coords)));
        let normal = Dir3::try_new(lerp(idx.map(|v| self.normals[v])), 1e-12).unwrap_or(cage_normal);
        let n = normal.into_inner();

        let tangent = lerp(idx.map(|v| self.frames[v].tangent));
        let bitangent = lerp(idx.map(|v| self.frames[v].bitangent(&self.normals[v])));

        let tangent = match (tangent - n * n.dot(&tangent)).try_normalize(1e-12) {
            Some(t) => t,
            None => orthonormal_basis(&normal).0,
        };
        let sign = if n.cross(&tangent).dot(&bitangent) < 0.0 {
            -1.0
        } else {
            1.0
        };
        let bitangent = n.cross(&tangent) * sign;

        let res = self.config.resolution as f64;
        Coverage::Covered(TexelSample {
            x,
            y,
            uv: Point2::new((x as f64 + 0.5) / res, 1.0 - (y as f64 + 0.5) / res),
            triangle,
            barycentric: bary,
            position,
            normal,
            tangent,
            bitangent,
            cage_point,
            cage_normal,
        })
    }
}

/// Iterator over the pixels of one tile.
pub struct TileSamples<'s, 'a> {
    sampler: &'s TexelSampler<'a>,
    tile: Tile,
    x: u32,
    y: u32,
}

impl Iterator for TileSamples<'_, '_> {
    type Item = (u32, u32, Coverage);

    fn next(&mut self) -> Option<Self::Item> {
        if self.y >= self.tile.y1 || self.tile.is_empty() {
            return None;
        }
        let (x, y) = (self.x, self.y);
        self.x += 1;
        if self.x >= self.tile.x1 {
            self.x = self.tile.x0;
            self.y += 1;
        }
        Some((x, y, self.sampler.sample(x, y)))
    }
}

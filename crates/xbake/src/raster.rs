//! Channel rasters and the image compositor.
//!
//! Workers fill one [`TileBuffer`] each; the [`Compositor`] copies finished
//! tiles into the full-size rasters (tiles never overlap, so no two writers
//! touch the same pixel) and finalizes every channel once all tiles are in.

use rayon::prelude::*;
use serde::Serialize;

use crate::channels::{Channel, Texel};
use crate::sampler::Tile;

/// What happened at one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TexelState {
    /// Outside every UV triangle.
    #[default]
    Uncovered,
    /// Projected and evaluated.
    Baked,
    /// Covered, but the projection ray found nothing.
    Miss,
    /// Covered by a triangle with degenerate geometry.
    Degenerate,
}

/// Per-pixel [`TexelState`] for a whole raster.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMask {
    width: u32,
    height: u32,
    states: Vec<TexelState>,
}

impl CoverageMask {
    /// All-uncovered mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            states: vec![TexelState::Uncovered; (width * height) as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// State at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> TexelState {
        self.states[(y * self.width + x) as usize]
    }

    /// All states, row-major.
    pub fn states(&self) -> &[TexelState] {
        &self.states
    }

    /// Number of pixels in `state`.
    pub fn count(&self, state: TexelState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }
}

/// One channel's pixels at job resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRaster {
    channel: Channel,
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ChannelRaster {
    /// Raster filled with the channel's fallback value.
    pub fn new(channel: Channel, width: u32, height: u32) -> Self {
        let fallback = channel.fallback();
        let components = channel.components();
        let mut data = Vec::with_capacity((width * height) as usize * components);
        for _ in 0..width * height {
            data.extend_from_slice(&fallback[..components]);
        }
        Self {
            channel,
            width,
            height,
            data,
        }
    }

    /// The channel this raster holds.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Components per pixel (1 or 3).
    pub fn components(&self) -> usize {
        self.channel.components()
    }

    /// Pixel value at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> &[f32] {
        let c = self.components();
        let i = (y * self.width + x) as usize * c;
        &self.data[i..i + c]
    }

    /// Overwrite the pixel at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: &Texel) {
        let c = self.components();
        let i = (y * self.width + x) as usize * c;
        self.data[i..i + c].copy_from_slice(&value[..c]);
    }

    /// Interleaved row-major samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn copy_pixel(&mut self, dst: usize, src: usize) {
        let c = self.components();
        self.data.copy_within(src * c..src * c + c, dst * c);
    }
}

/// Output of one worker for one tile.
#[derive(Debug, Clone)]
pub struct TileBuffer {
    /// Tile these pixels belong to.
    pub tile: Tile,
    /// Row-major states within the tile.
    pub states: Vec<TexelState>,
    /// One value per tile pixel for each channel, in job channel order.
    pub values: Vec<Vec<Texel>>,
}

impl TileBuffer {
    /// Buffer for `tile` with every pixel uncovered.
    pub fn new(tile: Tile, channels: usize) -> Self {
        let len = tile.len();
        Self {
            tile,
            states: vec![TexelState::Uncovered; len],
            values: vec![vec![[0.0; 3]; len]; channels],
        }
    }

    /// Record one pixel. `x` and `y` are raster coordinates.
    pub fn put(&mut self, x: u32, y: u32, state: TexelState, values: &[Texel]) {
        let i = ((y - self.tile.y0) * self.tile.width() + (x - self.tile.x0)) as usize;
        self.states[i] = state;
        for (dst, v) in self.values.iter_mut().zip(values) {
            dst[i] = *v;
        }
    }
}

/// Assembles tiles into per-channel rasters.
#[derive(Debug, Clone)]
pub struct Compositor {
    rasters: Vec<ChannelRaster>,
    coverage: CoverageMask,
}

impl Compositor {
    /// Compositor for `channels` at `resolution` x `resolution`.
    pub fn new(channels: &[Channel], resolution: u32) -> Self {
        Self {
            rasters: channels
                .iter()
                .map(|&c| ChannelRaster::new(c, resolution, resolution))
                .collect(),
            coverage: CoverageMask::new(resolution, resolution),
        }
    }

    /// Copy a finished tile into place. Uncovered pixels keep the fallback.
    pub fn blit(&mut self, buffer: &TileBuffer) {
        let tile = buffer.tile;
        let width = self.coverage.width;
        for y in tile.y0..tile.y1 {
            for x in tile.x0..tile.x1 {
                let local = ((y - tile.y0) * tile.width() + (x - tile.x0)) as usize;
                let state = buffer.states[local];
                self.coverage.states[(y * width + x) as usize] = state;
                if state == TexelState::Baked {
                    for (raster, values) in self.rasters.iter_mut().zip(&buffer.values) {
                        raster.set(x, y, &values[local]);
                    }
                }
            }
        }
    }

    /// Dilate every channel by `margin` pixels and hand back the results.
    ///
    /// Non-baked pixels already hold the fallback value. Dilation then
    /// copies the value of the nearest baked pixel (8-connected steps,
    /// orthogonal neighbours preferred, then scan order) into uncovered,
    /// missed and degenerate pixels up to `margin` steps away. Pixels out of
    /// reach keep the fallback. Returns the rasters, the coverage mask and
    /// the number of dilated pixels.
    pub fn finish(self, margin: u32) -> (Vec<ChannelRaster>, CoverageMask, usize) {
        let Self {
            mut rasters,
            coverage,
        } = self;
        let sources = dilation_sources(&coverage, margin);

        rasters.par_iter_mut().for_each(|raster| {
            for &(dst, src) in &sources {
                raster.copy_pixel(dst, src);
            }
        });

        let dilated = sources.len();
        (rasters, coverage, dilated)
    }
}

/// `(target pixel, baked source pixel)` pairs from a multi-source BFS,
/// one ring per step. Within a ring orthogonal steps claim pixels first.
fn dilation_sources(coverage: &CoverageMask, margin: u32) -> Vec<(usize, usize)> {
    if margin == 0 {
        return Vec::new();
    }
    let (w, h) = (coverage.width as i64, coverage.height as i64);
    let len = coverage.states.len();

    // root[i] = baked pixel whose value i receives
    let mut root = vec![usize::MAX; len];
    let mut frontier = Vec::new();
    for (i, state) in coverage.states.iter().enumerate() {
        if *state == TexelState::Baked {
            root[i] = i;
            frontier.push(i);
        }
    }

    const ORTHOGONAL: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
    const DIAGONAL: [(i64, i64); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

    let mut sources = Vec::new();
    for _ in 0..margin {
        let mut next = Vec::new();
        for steps in [ORTHOGONAL, DIAGONAL] {
            for &i in &frontier {
                let (x, y) = ((i as i64) % w, (i as i64) / w);
                for (dx, dy) in steps {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let j = (ny * w + nx) as usize;
                    if root[j] != usize::MAX {
                        continue;
                    }
                    root[j] = root[i];
                    sources.push((j, root[i]));
                    next.push(j);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    sources
}

//! Output naming and the raster-write seam.
//!
//! The engine never touches the filesystem. Hosts implement [`RasterSink`]
//! and hand it to [`write_outputs`], which writes each channel on its own so
//! that one failed file does not take the others down.

use std::error::Error;

use tracing::{info, warn};

use crate::channels::Channel;
use crate::raster::ChannelRaster;

/// Stem used when neither mesh has a usable name.
const DEFAULT_STEM: &str = "bake";

/// File stem shared by all outputs of a job.
///
/// The longest common prefix of the two mesh names with every trailing
/// character outside `[a-zA-Z0-9]` removed (`crate_low` + `crate_high`
/// gives `crate`), or the low-poly name when they share nothing.
pub fn output_stem(low_name: &str, high_name: &str) -> String {
    let prefix_len: usize = low_name
        .chars()
        .zip(high_name.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let prefix = low_name[..prefix_len].trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if !prefix.is_empty() {
        prefix.to_string()
    } else if !low_name.is_empty() {
        low_name.to_string()
    } else {
        DEFAULT_STEM.to_string()
    }
}

/// File stem for one channel, e.g. `crate_normal`.
pub fn file_stem(stem: &str, channel: Channel) -> String {
    format!("{stem}_{}", channel.suffix())
}

/// Destination for finished rasters.
pub trait RasterSink {
    /// Persist `raster` under `file_stem` and return where it went.
    fn write(
        &self,
        file_stem: &str,
        raster: &ChannelRaster,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// A channel that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// The channel.
    pub channel: Channel,
    /// Error message from the sink.
    pub message: String,
}

/// Per-channel outcome of [`write_outputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Channels written, with the location the sink reported.
    pub written: Vec<(Channel, String)>,
    /// Channels that failed.
    pub failed: Vec<WriteFailure>,
}

impl WriteReport {
    /// True if every channel was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write every raster through `sink`, continuing past failures.
pub fn write_outputs(sink: &dyn RasterSink, stem: &str, rasters: &[ChannelRaster]) -> WriteReport {
    let mut report = WriteReport::default();
    for raster in rasters {
        let channel = raster.channel();
        let name = file_stem(stem, channel);
        match sink.write(&name, raster) {
            Ok(location) => {
                info!(%channel, %location, "wrote raster");
                report.written.push((channel, location));
            }
            Err(e) => {
                warn!(%channel, file = %name, error = %e, "failed to write raster");
                report.failed.push(WriteFailure {
                    channel,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

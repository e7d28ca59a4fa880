//! 16-bit PNG output.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageBuffer, ImageFormat, Luma, Rgb};
use xbake::{ChannelRaster, RasterSink};

/// Writes rasters as PNG files into one directory.
///
/// Each file is encoded to a hidden temporary next to its destination and
/// renamed into place, so a reader never sees a half-written image.
pub struct PngSink {
    dir: PathBuf,
}

impl PngSink {
    /// Sink writing into `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_png(&self, file_stem: &str, raster: &ChannelRaster) -> Result<PathBuf> {
        let path = self.dir.join(format!("{file_stem}.png"));
        let tmp = self.dir.join(format!(".{file_stem}.png.tmp"));

        if let Err(e) = encode(&tmp, raster) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
        }
        Ok(path)
    }
}

impl RasterSink for PngSink {
    fn write(
        &self,
        file_stem: &str,
        raster: &ChannelRaster,
    ) -> std::result::Result<String, Box<dyn Error + Send + Sync>> {
        let path = self.write_png(file_stem, raster)?;
        Ok(path.display().to_string())
    }
}

/// Quantize `[0, 1]` to the full 16-bit range.
fn to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn encode(path: &Path, raster: &ChannelRaster) -> Result<()> {
    let (w, h) = (raster.width(), raster.height());
    let data: Vec<u16> = raster.data().iter().map(|&v| to_u16(v)).collect();

    let result = match raster.components() {
        1 => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, data)
            .context("raster size mismatch")?
            .save_with_format(path, ImageFormat::Png),
        _ => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, data)
            .context("raster size mismatch")?
            .save_with_format(path, ImageFormat::Png),
    };
    result.with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xbake::Channel;

    #[test]
    fn test_quantization() {
        assert_eq!(to_u16(0.0), 0);
        assert_eq!(to_u16(1.0), 65535);
        assert_eq!(to_u16(0.5), 32768);
        assert_eq!(to_u16(-0.2), 0);
        assert_eq!(to_u16(7.0), 65535);
    }

    #[test]
    fn test_writes_rgb16_and_gray16() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PngSink::new(dir.path());

        let normal = ChannelRaster::new(Channel::Normal, 4, 2);
        let location = sink.write("crate_normal", &normal).unwrap();
        assert!(location.ends_with("crate_normal.png"));

        let img = image::open(dir.path().join("crate_normal.png")).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgb16);
        let rgb = img.to_rgb16();
        assert_eq!((rgb.width(), rgb.height()), (4, 2));
        assert_eq!(rgb.get_pixel(3, 1).0, [32768, 32768, 65535]);

        let ao = ChannelRaster::new(Channel::AmbientOcclusion, 3, 3);
        sink.write("crate_ao", &ao).unwrap();
        let img = image::open(dir.path().join("crate_ao.png")).unwrap();
        assert_eq!(img.color(), image::ColorType::L16);
        assert_eq!(img.to_luma16().get_pixel(1, 1).0, [65535]);

        // No temporaries left behind
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(names.iter().all(|n| !n.starts_with('.')));
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PngSink::new(dir.path().join("missing"));
        let raster = ChannelRaster::new(Channel::Curvature, 2, 2);
        assert!(sink.write("x_curvature", &raster).is_err());
    }
}

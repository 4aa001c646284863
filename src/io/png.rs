//! Colour mapped png images of snapshots
use super::{SeriesMeta, SnapshotWriter};
use crate::error::{Error, Result};
use crate::grid::GlobalGrid;
use std::path::{Path, PathBuf};

/// Writes `u_<t>.png` for every snapshot into a directory
///
/// Values are scaled to `[0, 1]` by the value range of each snapshot and
/// mapped through the turbo gradient. Row 0 is the top line of the image.
#[derive(Debug, Clone)]
pub struct PngDump {
    dir: PathBuf,
    meta: Option<SeriesMeta>,
}

impl PngDump {
    /// Dump into `dir`, which is created if missing
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            meta: None,
        }
    }

    /// File name of the image with time index `t`
    pub fn path(&self, t: usize) -> PathBuf {
        self.dir.join(format!("u_{:05}.png", t))
    }
}

/// Render `grid` with the turbo gradient
pub fn render(grid: &GlobalGrid) -> image::RgbImage {
    let (min, max) = grid
        .data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if max > min { max - min } else { 1. };
    let gradient = colorous::TURBO;
    let mut img = image::RgbImage::new(grid.width() as u32, grid.height() as u32);
    for ((y, x), v) in grid.data.indexed_iter() {
        let c = gradient.eval_continuous(((v - min) / span).clamp(0., 1.));
        img.put_pixel(x as u32, y as u32, image::Rgb(c.as_array()));
    }
    img
}

impl SnapshotWriter for PngDump {
    fn create(&mut self, meta: &SeriesMeta) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.meta = Some(*meta);
        Ok(())
    }

    fn append(&mut self, t: usize, grid: &GlobalGrid) -> Result<()> {
        let meta = self
            .meta
            .ok_or_else(|| Error::config("png dump was not created"))?;
        meta.check(grid)?;
        let path = self.path(t);
        log::debug!("[0]: write {:?}", path);
        render(grid).save(&path)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.meta = None;
        Ok(())
    }
}

//! Series of snapshots in one hdf5 file
//!
//! Layout:
//! ```text
//! /h, /ht, /width, /height   scalars
//! /u/<t>                     one (height, width) dataset per slice
//! /time                      time indices in append order, written on close
//! ```
use super::read_write_hdf5::{
    open_or_create, read_from_hdf5, read_scalar_from_hdf5, write_scalar_to_hdf5, write_to_hdf5,
};
use super::{SeriesMeta, SnapshotReader, SnapshotWriter};
use crate::error::{Error, Result};
use crate::grid::GlobalGrid;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};

const GROUP: &str = "u";

/// Read the initial field from dataset `u` of `path`
///
/// # Errors
/// File cannot be read or `u` is not two dimensional.
pub fn read_initial<P: AsRef<Path>>(path: P) -> Result<GlobalGrid> {
    let data: Array2<f64> = read_from_hdf5(path.as_ref(), GROUP)?;
    log::info!("initial field {:?} read from {:?}", data.shape(), path.as_ref());
    Ok(GlobalGrid { data })
}

/// Write the initial field as dataset `u` of `path`
///
/// # Errors
/// File cannot be written.
pub fn write_initial<P: AsRef<Path>>(path: P, grid: &GlobalGrid) -> Result<()> {
    write_to_hdf5(path, GROUP, &grid.data)
}

/// Snapshot series in an hdf5 file
#[derive(Debug, Clone)]
pub struct Hdf5Store {
    path: PathBuf,
    meta: Option<SeriesMeta>,
    times: Vec<usize>,
}

impl Hdf5Store {
    /// Store writing to (or reading from) `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            meta: None,
            times: Vec::new(),
        }
    }

    fn dataset_name(t: usize) -> String {
        format!("{}/{}", GROUP, t)
    }
}

impl SnapshotWriter for Hdf5Store {
    fn create(&mut self, meta: &SeriesMeta) -> Result<()> {
        let file = hdf5::File::create(&self.path)?;
        file.create_group(GROUP)?;
        drop(file);
        write_scalar_to_hdf5(&self.path, "h", meta.h)?;
        write_scalar_to_hdf5(&self.path, "ht", meta.ht)?;
        write_scalar_to_hdf5(&self.path, "width", meta.width as u64)?;
        write_scalar_to_hdf5(&self.path, "height", meta.height as u64)?;
        log::info!("[0]: series {:?} created", self.path);
        self.meta = Some(*meta);
        self.times.clear();
        Ok(())
    }

    fn append(&mut self, t: usize, grid: &GlobalGrid) -> Result<()> {
        let meta = self
            .meta
            .ok_or_else(|| Error::config("hdf5 series was not created"))?;
        meta.check(grid)?;
        let file = open_or_create(&self.path)?;
        let group = file.group(GROUP)?;
        group
            .new_dataset::<f64>()
            .no_chunk()
            .shape(grid.data.shape())
            .create(t.to_string().as_str())?
            .write(&grid.data.view())?;
        log::debug!("[0]: {} written", Self::dataset_name(t));
        self.times.push(t);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.meta.take().is_none() {
            return Ok(());
        }
        let times: Array1<u64> = self.times.iter().map(|&t| t as u64).collect();
        write_to_hdf5(&self.path, "time", &times)
    }
}

impl SnapshotReader for Hdf5Store {
    fn meta(&self) -> Result<SeriesMeta> {
        Ok(SeriesMeta {
            h: read_scalar_from_hdf5(&self.path, "h")?,
            ht: read_scalar_from_hdf5(&self.path, "ht")?,
            width: read_scalar_from_hdf5::<u64, _>(&self.path, "width")? as usize,
            height: read_scalar_from_hdf5::<u64, _>(&self.path, "height")? as usize,
        })
    }

    fn times(&self) -> Result<Vec<usize>> {
        let times: Array1<u64> = read_from_hdf5(&self.path, "time")?;
        Ok(times.iter().map(|&t| t as usize).collect())
    }

    fn read(&self, t: usize) -> Result<GlobalGrid> {
        let data: Array2<f64> = read_from_hdf5(&self.path, &Self::dataset_name(t))?;
        Ok(GlobalGrid { data })
    }
}

//! # Snapshot output
//!
//! Rank 0 hands every gathered [`GlobalGrid`] to one or more
//! [`SnapshotWriter`]s. A series starts with [`SnapshotWriter::create`],
//! receives slices through [`SnapshotWriter::append`] and ends with
//! [`SnapshotWriter::close`].
//!
//! Stores:
//! - [`MemoryStore`]: keeps the slices in memory, readable through
//!   [`SnapshotReader`]
//! - [`png::PngDump`]: one colour mapped image per slice
//! - `hdf5_store::Hdf5Store` (feature `hdf5`): one file holding the scalars
//!   `h`, `ht`, `width`, `height`, a dataset `u/<t>` per slice and the
//!   `time` index
pub mod png;
#[cfg(feature = "hdf5")]
pub mod hdf5_store;
#[cfg(feature = "hdf5")]
pub mod read_write_hdf5;

use crate::error::{Error, Result};
use crate::grid::GlobalGrid;

/// Parameters stored with a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesMeta {
    /// Grid spacing
    pub h: f64,
    /// Time step of one outer step, 0 for equations without time
    ///
    /// Slices are indexed by outer step, so slice `t` holds time `t * ht`
    /// whatever the snapshot interval.
    pub ht: f64,
    /// Global width
    pub width: usize,
    /// Global height
    pub height: usize,
}

impl SeriesMeta {
    /// Check that `grid` fits the series
    ///
    /// # Errors
    /// Shape mismatch.
    pub fn check(&self, grid: &GlobalGrid) -> Result<()> {
        if grid.width() != self.width || grid.height() != self.height {
            return Err(Error::config(format!(
                "snapshot is {}x{}, series holds {}x{}",
                grid.width(),
                grid.height(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// Destination of snapshots
pub trait SnapshotWriter {
    /// Start a new series
    ///
    /// # Errors
    /// Storage cannot be created.
    fn create(&mut self, meta: &SeriesMeta) -> Result<()>;

    /// Append the slice with time index `t`, the number of completed
    /// outer steps
    ///
    /// # Errors
    /// Series not created, grid has the wrong shape, or storage failed.
    fn append(&mut self, t: usize, grid: &GlobalGrid) -> Result<()>;

    /// Finish the series
    ///
    /// # Errors
    /// Storage failed.
    fn close(&mut self) -> Result<()>;
}

impl<W: SnapshotWriter + ?Sized> SnapshotWriter for &mut W {
    fn create(&mut self, meta: &SeriesMeta) -> Result<()> {
        (**self).create(meta)
    }

    fn append(&mut self, t: usize, grid: &GlobalGrid) -> Result<()> {
        (**self).append(t, grid)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Read back a series
pub trait SnapshotReader {
    /// Parameters of the series
    ///
    /// # Errors
    /// Series missing.
    fn meta(&self) -> Result<SeriesMeta>;

    /// Time indices of all slices, in the order they were appended
    ///
    /// # Errors
    /// Series missing.
    fn times(&self) -> Result<Vec<usize>>;

    /// Slice with time index `t`
    ///
    /// # Errors
    /// No such slice.
    fn read(&self, t: usize) -> Result<GlobalGrid>;
}

/// Series kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meta: Option<SeriesMeta>,
    slices: Vec<(usize, GlobalGrid)>,
    closed: bool,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// True after [`SnapshotWriter::close`]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of slices
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// True if no slice was appended
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Most recent slice
    pub fn last(&self) -> Option<&GlobalGrid> {
        self.slices.last().map(|(_, g)| g)
    }
}

impl SnapshotWriter for MemoryStore {
    fn create(&mut self, meta: &SeriesMeta) -> Result<()> {
        self.meta = Some(*meta);
        self.slices.clear();
        self.closed = false;
        Ok(())
    }

    fn append(&mut self, t: usize, grid: &GlobalGrid) -> Result<()> {
        let meta = self.meta()?;
        meta.check(grid)?;
        if self.closed {
            return Err(Error::config("series is closed"));
        }
        self.slices.push((t, grid.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl SnapshotReader for MemoryStore {
    fn meta(&self) -> Result<SeriesMeta> {
        self.meta
            .ok_or_else(|| Error::config("series was not created"))
    }

    fn times(&self) -> Result<Vec<usize>> {
        self.meta()?;
        Ok(self.slices.iter().map(|(t, _)| *t).collect())
    }

    fn read(&self, t: usize) -> Result<GlobalGrid> {
        self.slices
            .iter()
            .find(|(s, _)| *s == t)
            .map(|(_, g)| g.clone())
            .ok_or_else(|| Error::config(format!("no snapshot at time index {}", t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> SeriesMeta {
        SeriesMeta {
            h: 0.1,
            ht: 0.00125,
            width: 3,
            height: 2,
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.create(&meta()).unwrap();
        let a = GlobalGrid::random(3, 2, 1);
        let b = GlobalGrid::pulse(3, 2);
        store.append(0, &a).unwrap();
        store.append(5, &b).unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert_eq!(store.meta().unwrap(), meta());
        assert_eq!(store.times().unwrap(), vec![0, 5]);
        assert_eq!(store.read(0).unwrap(), a);
        assert_eq!(store.read(5).unwrap(), b);
        assert!(store.read(1).is_err());
    }

    #[test]
    fn test_append_checks_series() {
        let mut store = MemoryStore::new();
        assert!(store.append(0, &GlobalGrid::zeros(3, 2)).is_err());
        store.create(&meta()).unwrap();
        assert!(store.append(0, &GlobalGrid::zeros(2, 3)).is_err());
        store.close().unwrap();
        assert!(store.append(0, &GlobalGrid::zeros(3, 2)).is_err());
    }

    #[test]
    fn test_writer_through_reference() {
        let mut store = MemoryStore::new();
        {
            let mut writers: Vec<Box<dyn SnapshotWriter + '_>> = vec![Box::new(&mut store)];
            writers[0].create(&meta()).unwrap();
            writers[0].append(2, &GlobalGrid::zeros(3, 2)).unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}

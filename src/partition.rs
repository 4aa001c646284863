//! # Grid partitioner
//!
//! Splits a global `width x height` grid into an `nx x ny` process grid.
//! Rank `r` sits at horizontal index `r % nx` and vertical index `r / nx`
//! and owns the rectangle `[x0, x1) x [y0, y1)`.
//!
//! Only rank 0 computes the partition. The ranges are then broadcast as
//! `4 * nx * ny` integers (see [`Partition::to_raw`]), and every rank picks
//! its own four.
use crate::error::{Error, Result};

/// Shape of the process grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGrid {
    /// Number of ranks in x direction
    pub nx: usize,
    /// Number of ranks in y direction
    pub ny: usize,
}

impl ProcessGrid {
    /// Return a new process grid
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    /// Total number of ranks
    pub fn size(&self) -> usize {
        self.nx * self.ny
    }

    /// Horizontal index of `rank`
    pub fn rh(&self, rank: usize) -> usize {
        rank % self.nx
    }

    /// Vertical index of `rank`
    pub fn rv(&self, rank: usize) -> usize {
        rank / self.nx
    }

    /// Check the grid against the number of running workers
    ///
    /// # Errors
    /// Empty grid, or `nx * ny` differs from `nprocs`.
    pub fn check(&self, nprocs: usize) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(Error::config(format!(
                "process grid {}x{} is empty",
                self.nx, self.ny
            )));
        }
        if self.size() != nprocs {
            return Err(Error::config(format!(
                "process grid {}x{} needs {} ranks, but {} are running",
                self.nx,
                self.ny,
                self.size(),
                nprocs
            )));
        }
        Ok(())
    }
}

/// Index range `[x0, x1) x [y0, y1)` of the global grid owned by one rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    /// First column
    pub x0: usize,
    /// One past the last column
    pub x1: usize,
    /// First row
    pub y0: usize,
    /// One past the last row
    pub y1: usize,
}

impl Range {
    /// Number of columns
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    /// True if the range holds no cell
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the global cell `(x, y)` belongs to this range
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y)
    }
}

/// `round(k * n / parts)` in exact integer arithmetic, halves round up
fn split_point(k: usize, n: usize, parts: usize) -> usize {
    (2 * k * n + parts) / (2 * parts)
}

/// Ranges of all ranks of a process grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Global width
    pub width: usize,
    /// Global height
    pub height: usize,
    /// Process grid
    pub grid: ProcessGrid,
    /// Ranges, indexed by rank
    pub ranges: Vec<Range>,
}

impl Partition {
    /// Partition a `width x height` grid
    ///
    /// # Errors
    /// Empty process grid, or a process grid so fine that some rank would
    /// own an empty range.
    ///
    /// # Example
    /// ```
    /// use halopde::partition::{Partition, ProcessGrid};
    /// let part = Partition::new(4, 4, ProcessGrid::new(2, 2)).unwrap();
    /// assert_eq!(part.ranges[3].x0, 2);
    /// assert_eq!(part.ranges[3].y1, 4);
    /// ```
    pub fn new(width: usize, height: usize, grid: ProcessGrid) -> Result<Self> {
        grid.check(grid.size())?;
        if width < grid.nx || height < grid.ny {
            return Err(Error::config(format!(
                "grid {}x{} is too small for a {}x{} process grid",
                width, height, grid.nx, grid.ny
            )));
        }
        let ranges = (0..grid.size())
            .map(|r| {
                let (rx, ry) = (grid.rh(r), grid.rv(r));
                Range {
                    x0: split_point(rx, width, grid.nx),
                    x1: split_point(rx + 1, width, grid.nx),
                    y0: split_point(ry, height, grid.ny),
                    y1: split_point(ry + 1, height, grid.ny),
                }
            })
            .collect::<Vec<_>>();
        for (r, range) in ranges.iter().enumerate() {
            log::trace!(
                "range for rank {} = ({},{}): [{},{}) x [{},{})",
                r,
                grid.rh(r),
                grid.rv(r),
                range.x0,
                range.x1,
                range.y0,
                range.y1
            );
            if range.is_empty() {
                return Err(Error::config(format!("rank {} owns an empty range", r)));
            }
        }
        Ok(Self {
            width,
            height,
            grid,
            ranges,
        })
    }

    /// Range of `rank`
    pub fn range(&self, rank: usize) -> Range {
        self.ranges[rank]
    }

    /// Flatten into the broadcast layout: `[w, h, nx, ny, x0, x1, y0, y1, ...]`
    pub fn to_raw(&self) -> Vec<i32> {
        let mut raw = Vec::with_capacity(Self::raw_len(self.grid));
        raw.extend(
            [self.width, self.height, self.grid.nx, self.grid.ny]
                .iter()
                .map(|&v| v as i32),
        );
        for r in &self.ranges {
            raw.extend([r.x0, r.x1, r.y0, r.y1].iter().map(|&v| v as i32));
        }
        raw
    }

    /// Length of the broadcast buffer for a process grid
    pub fn raw_len(grid: ProcessGrid) -> usize {
        4 + 4 * grid.size()
    }

    /// Rebuild from the broadcast layout
    ///
    /// # Errors
    /// Buffer does not match the layout of [`Partition::to_raw`].
    pub fn from_raw(raw: &[i32]) -> Result<Self> {
        if raw.len() < 4 || raw.iter().any(|&v| v < 0) {
            return Err(Error::config("malformed partition buffer"));
        }
        let (width, height) = (raw[0] as usize, raw[1] as usize);
        let grid = ProcessGrid::new(raw[2] as usize, raw[3] as usize);
        if raw.len() != Self::raw_len(grid) {
            return Err(Error::config(format!(
                "partition buffer holds {} values, expected {}",
                raw.len(),
                Self::raw_len(grid)
            )));
        }
        let ranges = raw[4..]
            .chunks_exact(4)
            .map(|c| Range {
                x0: c[0] as usize,
                x1: c[1] as usize,
                y0: c[2] as usize,
                y1: c[3] as usize,
            })
            .collect();
        Ok(Self {
            width,
            height,
            grid,
            ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(width: usize, height: usize, nx: usize, ny: usize) {
        let part = Partition::new(width, height, ProcessGrid::new(nx, ny)).unwrap();
        let mut owner = vec![0usize; width * height];
        for r in &part.ranges {
            for y in r.y0..r.y1 {
                for x in r.x0..r.x1 {
                    owner[x + y * width] += 1;
                }
            }
        }
        assert!(
            owner.iter().all(|&c| c == 1),
            "{}x{} on {}x{} has gaps or overlaps",
            width,
            height,
            nx,
            ny
        );
        let total: usize = part.ranges.iter().map(Range::len).sum();
        assert_eq!(total, width * height);
    }

    #[test]
    fn test_partition_tiles_grid() {
        for &(w, h) in &[(4, 4), (7, 3), (10, 13), (33, 17), (5, 5)] {
            for nx in 1..=w.min(5) {
                for ny in 1..=h.min(4) {
                    assert_tiles(w, h, nx, ny);
                }
            }
        }
    }

    #[test]
    fn test_partition_rounds_split_points() {
        // 10 / 4 = 2.5 -> 0, 3, 5, 8, 10
        let part = Partition::new(10, 1, ProcessGrid::new(4, 1)).unwrap();
        let xs: Vec<_> = part.ranges.iter().map(|r| (r.x0, r.x1)).collect();
        assert_eq!(xs, vec![(0, 3), (3, 5), (5, 8), (8, 10)]);
    }

    #[test]
    fn test_partition_rank_layout_is_row_major() {
        let part = Partition::new(6, 4, ProcessGrid::new(3, 2)).unwrap();
        assert_eq!(part.range(1), Range { x0: 2, x1: 4, y0: 0, y1: 2 });
        assert_eq!(part.range(3), Range { x0: 0, x1: 2, y0: 2, y1: 4 });
        assert!(part.range(5).contains(5, 3));
    }

    #[test]
    fn test_partition_rejects_too_fine_grid() {
        assert!(Partition::new(3, 8, ProcessGrid::new(4, 1)).is_err());
        assert!(Partition::new(8, 8, ProcessGrid::new(0, 2)).is_err());
    }

    #[test]
    fn test_process_grid_check() {
        let grid = ProcessGrid::new(2, 3);
        assert!(grid.check(6).is_ok());
        assert!(matches!(grid.check(4), Err(Error::Config(_))));
    }

    #[test]
    fn test_partition_raw_layout() {
        let part = Partition::new(9, 5, ProcessGrid::new(3, 2)).unwrap();
        let raw = part.to_raw();
        assert_eq!(raw.len(), Partition::raw_len(part.grid));
        assert_eq!(Partition::from_raw(&raw).unwrap(), part);
        assert!(Partition::from_raw(&raw[..raw.len() - 1]).is_err());
    }
}

//! # Local domain of one rank
//!
//! Holds the iterate `u` and the right hand side `b` of the sub-grid owned
//! by a rank, the four halo buffers (edge values received from the
//! neighbours) and the four send buffers (own edge values, packed for
//! transmission).
//!
//! All arrays use the same convention: `(i, j)` is (row, column). The
//! accessor [`LocalDomain::u_at`] works on the sub-grid extended by a one
//! cell halo frame, i.e. `i` in `0..=height + 1` and `j` in `0..=width + 1`,
//! where `u_at(i, j) == u[[i - 1, j - 1]]` for interior cells.
use crate::partition::{Partition, ProcessGrid, Range};
use ndarray::{s, Array2};

/// Side of a sub-domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Smaller column index
    Left,
    /// Larger column index
    Right,
    /// Smaller row index
    Top,
    /// Larger row index
    Bottom,
}

impl Side {
    /// All sides, in the order halos are received
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    /// The matching side of the neighbour
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Value imposed on the outer boundary of the global grid
pub const DIRICHLET: f64 = 0.;

/// Sub-grid of one rank plus halo and send buffers
#[derive(Debug, Clone)]
pub struct LocalDomain {
    /// Rank owning this domain
    pub rank: usize,
    /// Process grid
    pub grid: ProcessGrid,
    /// Global range of the domain
    pub range: Range,
    /// Global width
    pub global_width: usize,
    /// Global height
    pub global_height: usize,
    /// Current iterate, shape (height, width)
    pub u: Array2<f64>,
    /// Right hand side of the current time step, shape (height, width)
    pub b: Array2<f64>,
    left: Vec<f64>,
    right: Vec<f64>,
    top: Vec<f64>,
    bottom: Vec<f64>,
    send_left: Vec<f64>,
    send_right: Vec<f64>,
    send_top: Vec<f64>,
    send_bottom: Vec<f64>,
}

impl LocalDomain {
    /// Allocate the domain of `rank`; all values start at zero
    pub fn new(partition: &Partition, rank: usize) -> Self {
        let range = partition.range(rank);
        let (width, height) = (range.width(), range.height());
        log::debug!(
            "[{}]: {} bytes allocated",
            rank,
            2 * width * height * std::mem::size_of::<f64>()
        );
        Self {
            rank,
            grid: partition.grid,
            range,
            global_width: partition.width,
            global_height: partition.height,
            u: Array2::zeros((height, width)),
            b: Array2::zeros((height, width)),
            left: vec![0.; height],
            right: vec![0.; height],
            top: vec![0.; width],
            bottom: vec![0.; width],
            send_left: vec![0.; height],
            send_right: vec![0.; height],
            send_top: vec![0.; width],
            send_bottom: vec![0.; width],
        }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.range.width()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.range.height()
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// True if the domain holds no cell
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Horizontal index in the process grid
    pub fn rh(&self) -> usize {
        self.grid.rh(self.rank)
    }

    /// Vertical index in the process grid
    pub fn rv(&self) -> usize {
        self.grid.rv(self.rank)
    }

    /// True if `side` of this domain lies on the outer boundary of the
    /// global grid
    pub fn at_global_edge(&self, side: Side) -> bool {
        match side {
            Side::Left => self.rh() == 0,
            Side::Right => self.rh() == self.grid.nx - 1,
            Side::Top => self.rv() == 0,
            Side::Bottom => self.rv() == self.grid.ny - 1,
        }
    }

    /// Rank of the neighbour across `side`, `None` on the global edge
    pub fn neighbor(&self, side: Side) -> Option<usize> {
        if self.at_global_edge(side) {
            return None;
        }
        Some(match side {
            Side::Left => self.rank - 1,
            Side::Right => self.rank + 1,
            Side::Top => self.rank - self.grid.nx,
            Side::Bottom => self.rank + self.grid.nx,
        })
    }

    /// Number of values exchanged across `side`
    pub fn edge_len(&self, side: Side) -> usize {
        match side {
            Side::Left | Side::Right => self.height(),
            Side::Top | Side::Bottom => self.width(),
        }
    }

    /// Value of `u` on the haloed sub-grid
    ///
    /// Corners of the halo frame are 0. Halo cells on a side that touches
    /// the global boundary return [`DIRICHLET`], whatever the halo buffer
    /// holds.
    ///
    /// # Panics
    /// `i > height + 1` or `j > width + 1`.
    pub fn u_at(&self, i: usize, j: usize) -> f64 {
        let (height, width) = (self.height(), self.width());
        if i == 0 || i == height + 1 {
            if j == 0 || j == width + 1 {
                return 0.;
            }
            return if i == 0 {
                self.halo_value(Side::Top, j - 1)
            } else {
                self.halo_value(Side::Bottom, j - 1)
            };
        }
        if j == 0 {
            return self.halo_value(Side::Left, i - 1);
        }
        if j == width + 1 {
            return self.halo_value(Side::Right, i - 1);
        }
        self.u[[i - 1, j - 1]]
    }

    /// Value of `b` at interior cell `(i, j)`, same indexing as [`Self::u_at`]
    pub fn b_at(&self, i: usize, j: usize) -> f64 {
        self.b[[i - 1, j - 1]]
    }

    fn halo_value(&self, side: Side, k: usize) -> f64 {
        if self.at_global_edge(side) {
            DIRICHLET
        } else {
            self.halo(side)[k]
        }
    }

    /// True if interior cell `(i, j)` lies on the outer boundary of the
    /// global grid
    pub fn on_global_boundary(&self, i: usize, j: usize) -> bool {
        (i == 1 && self.at_global_edge(Side::Top))
            || (i == self.height() && self.at_global_edge(Side::Bottom))
            || (j == 1 && self.at_global_edge(Side::Left))
            || (j == self.width() && self.at_global_edge(Side::Right))
    }

    /// Received halo of `side`
    pub fn halo(&self, side: Side) -> &[f64] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
        }
    }

    /// Packed send buffer of `side`
    pub fn send_buffer(&self, side: Side) -> &[f64] {
        match side {
            Side::Left => &self.send_left,
            Side::Right => &self.send_right,
            Side::Top => &self.send_top,
            Side::Bottom => &self.send_bottom,
        }
    }

    /// Copy the edge of `u` facing `side` into its send buffer
    pub fn pack(&mut self, side: Side) {
        let (height, width) = (self.height(), self.width());
        let (edge, buf) = match side {
            Side::Left => (self.u.slice(s![.., 0]), &mut self.send_left),
            Side::Right => (self.u.slice(s![.., width - 1]), &mut self.send_right),
            Side::Top => (self.u.slice(s![0, ..]), &mut self.send_top),
            Side::Bottom => (self.u.slice(s![height - 1, ..]), &mut self.send_bottom),
        };
        for (dst, src) in buf.iter_mut().zip(edge.iter()) {
            *dst = *src;
        }
    }

    /// Send buffer and halo buffer of every side, borrowed together so
    /// that an exchange can read the one while filling the other
    pub(crate) fn buffers_mut(&mut self) -> [(Side, &[f64], &mut [f64]); 4] {
        [
            (Side::Left, &self.send_left, &mut self.left),
            (Side::Right, &self.send_right, &mut self.right),
            (Side::Top, &self.send_top, &mut self.top),
            (Side::Bottom, &self.send_bottom, &mut self.bottom),
        ]
    }

    /// Overwrite the halo of `side` without communication
    #[cfg(test)]
    pub(crate) fn set_halo(&mut self, side: Side, values: &[f64]) {
        let halo = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        };
        halo.copy_from_slice(values);
    }

    /// Global column and row of interior cell `(i, j)`
    pub fn global_index(&self, i: usize, j: usize) -> (usize, usize) {
        (self.range.x0 + j - 1, self.range.y0 + i - 1)
    }
}

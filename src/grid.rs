//! # Global grid
//!
//! The full `width x height` field, only ever held by rank 0. Stored as an
//! `(height, width)` array, so the flat row-major index of cell `(x, y)` is
//! `x + y * width`.
use crate::error::{Error, Result};
use ndarray::{s, Array2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// Full field on rank 0
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalGrid {
    /// Values, shape (height, width)
    pub data: Array2<f64>,
}

impl GlobalGrid {
    /// Grid of zeros
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Grid from row-major values
    ///
    /// # Errors
    /// `values.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values).map_err(|e| {
            Error::config(format!("cannot build {}x{} grid: {}", width, height, e))
        })?;
        Ok(Self { data })
    }

    /// Grid of zeros with the central block `[w/4, w - w/4) x [h/4, h - h/4)`
    /// set to one
    ///
    /// ```
    /// use halopde::grid::GlobalGrid;
    /// let grid = GlobalGrid::pulse(4, 4);
    /// assert_eq!(grid.get(1, 2), 1.);
    /// assert_eq!(grid.get(0, 2), 0.);
    /// ```
    pub fn pulse(width: usize, height: usize) -> Self {
        let mut grid = Self::zeros(width, height);
        grid.data
            .slice_mut(s![height / 4..height - height / 4, width / 4..width - width / 4])
            .fill(1.);
        grid
    }

    /// Uniformly distributed values in `[0, 1)`, reproducible by `seed`
    pub fn random(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            data: Array2::random_using((height, width), Uniform::new(0., 1.), &mut rng),
        }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Value at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[[y, x]]
    }

    /// Values in row-major order
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Euclidean norm
    pub fn norm_l2(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Source of the initial field
#[derive(Debug, Clone, PartialEq)]
pub enum InitialCondition {
    /// All zero
    Zero,
    /// Central block set to one, see [`GlobalGrid::pulse`]
    Pulse,
    /// Uniform random values with a seed
    Random(u64),
    /// Dataset `u` of an hdf5 file; the file defines the grid size
    #[cfg(feature = "hdf5")]
    File(std::path::PathBuf),
}

impl InitialCondition {
    /// Build the initial field; `width` and `height` are ignored when the
    /// field is read from a file
    ///
    /// # Errors
    /// The file cannot be read.
    pub fn build(&self, width: usize, height: usize) -> Result<GlobalGrid> {
        Ok(match self {
            InitialCondition::Zero => GlobalGrid::zeros(width, height),
            InitialCondition::Pulse => GlobalGrid::pulse(width, height),
            InitialCondition::Random(seed) => GlobalGrid::random(width, height, *seed),
            #[cfg(feature = "hdf5")]
            InitialCondition::File(path) => crate::io::hdf5_store::read_initial(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let grid = GlobalGrid::from_vec(3, 2, (0..6).map(f64::from).collect()).unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.get(2, 0), 2.);
        assert_eq!(grid.get(0, 1), 3.);
        assert_eq!(grid.to_vec(), vec![0., 1., 2., 3., 4., 5.]);
        assert!(GlobalGrid::from_vec(3, 3, vec![0.; 6]).is_err());
    }

    #[test]
    fn test_pulse_is_centred() {
        let grid = GlobalGrid::pulse(8, 4);
        assert_eq!(grid.data.sum(), 4. * 2.);
        assert_eq!(grid.get(2, 1), 1.);
        assert_eq!(grid.get(5, 2), 1.);
        assert_eq!(grid.get(6, 2), 0.);
        assert_eq!(grid.get(2, 3), 0.);
    }

    #[test]
    fn test_random_is_reproducible() {
        let a = GlobalGrid::random(5, 4, 7);
        let b = GlobalGrid::random(5, 4, 7);
        assert_eq!(a, b);
        assert!(a.data.iter().all(|v| (0. ..1.).contains(v)));
        assert_ne!(a, GlobalGrid::random(5, 4, 8));
    }

    #[test]
    fn test_initial_condition() {
        let grid = InitialCondition::Pulse.build(4, 4).unwrap();
        assert_eq!(grid.norm_l2(), 2.);
        let grid = InitialCondition::Zero.build(2, 3).unwrap();
        assert_eq!(grid.data.shape(), &[3, 2]);
    }
}

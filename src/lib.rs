//! # `halopde`: Domain decomposed stencil solver for 2-D heat and potential equations
//!
//! The global grid is split into an `nx x ny` grid of rectangular
//! sub-domains, one per rank. Every rank relaxes its sub-domain with a five
//! point stencil and refreshes a one cell halo from its neighbours before
//! every sweep. Rank 0 owns the global grid: it distributes the initial
//! field and periodically gathers the result.
//!
//! # Dependencies
//! - cargo >= v1.65
//! - `hdf5` (optional, feature `hdf5`: sudo apt-get install -y libhdf5-dev)
//! - mpi installation and libclang (optional, feature `mpi`)
//!
//! # Details
//!
//! Components:
//! - [`partition`]: splits the global grid into rank ranges
//! - [`domain`]: sub-grid, halo buffers and the haloed accessor
//! - [`boundary`]: halo exchange
//! - [`stencil`], [`sweep`]: equations and relaxation methods
//! - [`gather`]: distribution and collection of the global grid
//! - [`solver`]: the outer loop
//! - [`comm`]: thread and MPI backends of the communication layer
//! - [`io`]: snapshot output
//!
//! ## Implemented equations
//!
//! - `Heat`: implicit time step, `ht = h^2 / 8`
//! - `Potential`: relaxation of `lap(u) = 1`
//!
//! Both use Dirichlet zero on the outer boundary. Relaxation by Jacobi,
//! Gauss-Seidel or symmetric Gauss-Seidel sweeps, a fixed number per step.
//!
//! # Example
//! Heat equation on 2 x 2 thread ranks
//! ```
//! use halopde::comm::{Communicator, ThreadUniverse};
//! use halopde::config::SolverConfig;
//! use halopde::grid::GlobalGrid;
//! use halopde::solver::run;
//!
//! let config = SolverConfig::heat(2, 2, 0.1, 0.01);
//! let universe = ThreadUniverse::new(4);
//! let results = universe.run(|comm| {
//!     let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(32, 32));
//!     run(&comm, &config, initial, Vec::new())
//! });
//! let grid = results[0].as_ref().unwrap().as_ref().unwrap();
//! assert!(grid.norm_l2() < GlobalGrid::pulse(32, 32).norm_l2());
//! ```
//!
//! Run the binary on MPI ranks ( `cargo build --release --features mpi` )
//!
//! `mpirun -np 4 halopde --backend mpi --nx 2 --ny 2 --width 256 --height 256`
#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod boundary;
pub mod comm;
pub mod config;
pub mod domain;
pub mod error;
pub mod gather;
pub mod grid;
pub mod io;
pub mod partition;
pub mod solver;
pub mod stencil;
pub mod sweep;

pub use config::{SolverConfig, StopCriterion};
pub use error::{Error, Result};

const MAX_TIMESTEP: usize = 10_000_000;

/// Integrate trait, step forward and write results
pub trait Integrate {
    /// Update solution by one outer step
    ///
    /// # Errors
    /// Communication failed.
    fn update(&mut self) -> Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Get timestep, 0 if the problem has no time
    fn get_dt(&self) -> f64;
    /// Number of completed steps
    fn get_step(&self) -> usize;
    /// Callback function (used for i/o)
    ///
    /// # Errors
    /// Output failed.
    fn callback(&mut self) -> Result<()>;
}

/// Integrate pde, that implements the Integrate trait.
///
/// Specify `save_intervall` to call [`Integrate::callback`] every n steps.
///
/// Stop Criteria:
/// 1. Time or step limit of `stop`
/// 2. Timestep limit
///
/// # Errors
/// Update or callback failed.
pub fn integrate<T: Integrate>(
    pde: &mut T,
    stop: StopCriterion,
    save_intervall: Option<usize>,
) -> Result<()> {
    let eps_dt = pde.get_dt() * 1e-4;
    loop {
        // Break
        match stop {
            StopCriterion::MaxTime(max_time) if pde.get_time() + eps_dt >= max_time => {
                log::info!("time limit reached: {:?}", pde.get_time());
                break;
            }
            StopCriterion::MaxSteps(max_steps) if pde.get_step() >= max_steps => {
                log::info!("step limit reached: {:?}", pde.get_step());
                break;
            }
            _ => (),
        }
        if pde.get_step() >= MAX_TIMESTEP {
            log::warn!("timestep limit reached: {:?}", pde.get_step());
            break;
        }

        // Update
        pde.update()?;

        // Save
        if let Some(n) = save_intervall {
            if pde.get_step() % n == 0 {
                pde.callback()?;
            }
        }
    }
    Ok(())
}

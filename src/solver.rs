//! # Distributed iterative solver
//!
//! Every rank runs the same outer loop on its own sub-grid:
//!
//! 1. exchange halos and recompute the right hand side (heat equation only)
//! 2. `sweeps` times: exchange halos, relax the sub-grid
//! 3. every `snapshot_interval` steps: gather `u` on rank 0 and append it
//!    to the snapshot writers
//!
//! The initial field is appended as slice 0 before the first step, the
//! final field after the last one.
//!
//! All ranks perform the same sequence of exchanges and gathers, so the
//! tags handed out by their [`TagCounter`]s agree.
//!
//! # Example
//! Potential equation on four thread ranks
//! ```
//! use halopde::comm::{Communicator, ThreadUniverse};
//! use halopde::config::SolverConfig;
//! use halopde::grid::GlobalGrid;
//! use halopde::solver::run;
//!
//! let mut config = SolverConfig::potential(2, 2, 1., 1);
//! config.sweeps = 1;
//! let universe = ThreadUniverse::new(4);
//! let results = universe.run(|comm| {
//!     let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(4, 4));
//!     run(&comm, &config, initial, Vec::new())
//! });
//! let grid = results[0].as_ref().unwrap().as_ref().unwrap();
//! assert_eq!(grid.get(1, 1), 0.25);
//! ```
use crate::boundary::exchange_boundaries;
use crate::comm::{Communicator, TagCounter};
use crate::config::{SolverConfig, SymmetricToggle};
use crate::domain::LocalDomain;
use crate::error::{Error, Result};
use crate::gather::{gather, scatter_initial};
use crate::grid::GlobalGrid;
use crate::io::{SeriesMeta, SnapshotWriter};
use crate::partition::Partition;
use crate::stencil::{compute_b, Equation, Stencil};
use crate::sweep::sweep;
use crate::Integrate;
use ndarray::Array2;

/// State of one rank
pub struct Solver<'a, C: Communicator> {
    comm: &'a C,
    /// Parameters
    pub config: SolverConfig,
    /// Ranges of all ranks
    pub partition: Partition,
    /// Own sub-grid
    pub domain: LocalDomain,
    equation: Equation,
    unew: Array2<f64>,
    tags: TagCounter,
    step: usize,
    sweep_count: usize,
    time: f64,
    last_snapshot: Option<usize>,
    global: Option<GlobalGrid>,
    writers: Vec<Box<dyn SnapshotWriter + 'a>>,
}

impl<'a, C: Communicator> Solver<'a, C> {
    /// Partition the grid on rank 0, broadcast the ranges and scatter the
    /// initial field
    ///
    /// `initial` is only read on rank 0, it defines the global grid size.
    ///
    /// # Errors
    /// Invalid configuration (reported on every rank, without aborting)
    /// or a failed communication.
    pub fn new(comm: &'a C, config: &SolverConfig, initial: Option<GlobalGrid>) -> Result<Self> {
        config.validate()?;
        config.grid().check(comm.size())?;
        let rank = comm.rank();
        let partition = broadcast_partition(comm, config, initial.as_ref())?;
        let mut tags = TagCounter::new();
        let mut domain = LocalDomain::new(&partition, rank);
        scatter_initial(comm, &partition, initial.as_ref(), &mut domain, tags.next_tag())?;
        let unew = Array2::zeros(domain.u.raw_dim());
        if rank == 0 {
            log::info!(
                "{}x{} grid on {}x{} ranks: {:?}, {:?}, {} sweeps per step",
                partition.width,
                partition.height,
                config.nx,
                config.ny,
                config.equation,
                config.method,
                config.sweeps
            );
        }
        Ok(Self {
            comm,
            config: config.clone(),
            equation: config.stencil(),
            partition,
            domain,
            unew,
            tags,
            step: 0,
            sweep_count: 0,
            time: 0.,
            last_snapshot: None,
            global: if rank == 0 { initial } else { None },
            writers: Vec::new(),
        })
    }

    /// Attach a snapshot writer and create its series
    ///
    /// Writers only ever receive data on rank 0, other ranks drop them.
    ///
    /// # Errors
    /// The writer cannot create its series.
    pub fn add_writer(&mut self, mut writer: Box<dyn SnapshotWriter + 'a>) -> Result<()> {
        if self.comm.rank() != 0 {
            return Ok(());
        }
        writer.create(&self.meta())?;
        self.writers.push(writer);
        Ok(())
    }

    /// Parameters stored with snapshot series
    ///
    /// Slices are indexed by outer step, slice `t` holds the field at time
    /// `t * ht`.
    pub fn meta(&self) -> SeriesMeta {
        SeriesMeta {
            h: self.config.h,
            ht: self.equation.time_step().unwrap_or(0.),
            width: self.partition.width,
            height: self.partition.height,
        }
    }

    /// Number of completed outer steps
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of completed sweeps over all steps
    pub fn sweep_count(&self) -> usize {
        self.sweep_count
    }

    /// Latest gathered grid, rank 0 only
    pub fn global(&self) -> Option<&GlobalGrid> {
        self.global.as_ref()
    }

    /// Gather `u` on rank 0 and append it to all writers with the current
    /// step as time index
    ///
    /// # Errors
    /// Communication or a writer failed.
    pub fn snapshot(&mut self) -> Result<()> {
        let tag = self.tags.next_tag();
        gather(
            self.comm,
            &self.partition,
            &self.domain,
            self.global.as_mut(),
            tag,
        )?;
        self.last_snapshot = Some(self.step);
        if let Some(global) = &self.global {
            log::info!(
                "step = {:6} time = {:8.4} |u| = {:10.4e}",
                self.step,
                self.time,
                global.norm_l2()
            );
            for writer in &mut self.writers {
                writer.append(self.step, global)?;
            }
        }
        Ok(())
    }

    /// Gather the final state unless it was just written, close all
    /// writers, and return the grid on rank 0
    ///
    /// # Errors
    /// Communication or a writer failed.
    pub fn finish(mut self) -> Result<Option<GlobalGrid>> {
        if self.last_snapshot != Some(self.step) {
            self.snapshot()?;
        }
        for writer in &mut self.writers {
            writer.close()?;
        }
        Ok(self.global.take())
    }
}

impl<C: Communicator> Integrate for Solver<'_, C> {
    fn update(&mut self) -> Result<()> {
        if self.equation.has_rhs() {
            let tag = self.tags.next_tag();
            exchange_boundaries(&mut self.domain, self.comm, tag)?;
            compute_b(&mut self.domain, &self.equation);
        }
        for _ in 0..self.config.sweeps {
            let tag = self.tags.next_tag();
            exchange_boundaries(&mut self.domain, self.comm, tag)?;
            let parity = match self.config.toggle {
                SymmetricToggle::PerSweep => self.sweep_count,
                SymmetricToggle::PerStep => self.step,
            };
            sweep(
                &mut self.domain,
                &self.equation,
                self.config.method,
                parity,
                &mut self.unew,
            );
            self.sweep_count += 1;
        }
        self.step += 1;
        if let Some(dt) = self.equation.time_step() {
            self.time += dt;
        }
        log::debug!("[{}]: step {} complete", self.domain.rank, self.step);
        Ok(())
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.equation.time_step().unwrap_or(0.)
    }

    fn get_step(&self) -> usize {
        self.step
    }

    fn callback(&mut self) -> Result<()> {
        self.snapshot()
    }
}

/// Rank 0 partitions the grid of `initial`, every rank receives the ranges
///
/// A partition rejected by rank 0 is broadcast as a buffer of `-1`, so that
/// all ranks fail with a configuration error instead of waiting.
fn broadcast_partition<C: Communicator>(
    comm: &C,
    config: &SolverConfig,
    initial: Option<&GlobalGrid>,
) -> Result<Partition> {
    let grid = config.grid();
    let mut raw = vec![0; Partition::raw_len(grid)];
    let mut local = None;
    if comm.rank() == 0 {
        match initial
            .ok_or_else(|| Error::config("rank 0 needs an initial field"))
            .and_then(|g| Partition::new(g.width(), g.height(), grid))
        {
            Ok(partition) => raw = partition.to_raw(),
            Err(e) => {
                raw.fill(-1);
                local = Some(e);
            }
        }
    }
    comm.broadcast(0, &mut raw)?;
    if let Some(e) = local {
        return Err(e);
    }
    let partition = Partition::from_raw(&raw)
        .map_err(|_| Error::config("partition was rejected by rank 0"))?;
    if partition.grid != grid {
        return Err(Error::config(format!(
            "rank 0 partitioned for a {}x{} process grid",
            partition.grid.nx, partition.grid.ny
        )));
    }
    Ok(partition)
}

/// Solve on all ranks of `comm`
///
/// Rank 0 passes the initial field and receives the final field; other
/// ranks pass `None` and receive `None`. `writers` only matter on rank 0.
///
/// Configuration errors are returned on every rank. Any other error aborts
/// the run on all ranks.
///
/// # Errors
/// See [`Solver::new`], [`Solver::snapshot`].
pub fn run<'a, C: Communicator>(
    comm: &'a C,
    config: &SolverConfig,
    initial: Option<GlobalGrid>,
    writers: Vec<Box<dyn SnapshotWriter + 'a>>,
) -> Result<Option<GlobalGrid>> {
    let result = solve(comm, config, initial, writers);
    match &result {
        Ok(_) => (),
        Err(e @ (Error::Config(_) | Error::Aborted(_))) => {
            log::error!("[{}]: {}", comm.rank(), e);
        }
        Err(e) => {
            log::error!("[{}]: {}", comm.rank(), e);
            comm.abort(1);
        }
    }
    result
}

fn solve<'a, C: Communicator>(
    comm: &'a C,
    config: &SolverConfig,
    initial: Option<GlobalGrid>,
    writers: Vec<Box<dyn SnapshotWriter + 'a>>,
) -> Result<Option<GlobalGrid>> {
    let mut solver = Solver::new(comm, config, initial)?;
    for writer in writers {
        solver.add_writer(writer)?;
    }
    solver.snapshot()?;
    crate::integrate(&mut solver, config.stop, config.snapshot_interval)?;
    solver.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadUniverse;
    use crate::config::{Method, StopCriterion};
    use crate::io::{MemoryStore, SnapshotReader};
    use crate::partition::ProcessGrid;

    fn approx_eq(result: f64, expected: f64) {
        let dif = (result - expected).abs();
        assert!(dif < 1e-10, "Large difference {} vs {}", result, expected);
    }

    /// Run on thread ranks, return the result of every rank
    fn run_threads(
        config: &SolverConfig,
        initial: &GlobalGrid,
    ) -> Vec<Result<Option<GlobalGrid>>> {
        let universe = ThreadUniverse::new(config.nx * config.ny);
        universe.run(|comm| {
            let initial = (comm.rank() == 0).then(|| initial.clone());
            run(&comm, config, initial, Vec::new())
        })
    }

    fn solve_threads(config: &SolverConfig, initial: &GlobalGrid) -> GlobalGrid {
        let mut results = run_threads(config, initial);
        for r in &results[1..] {
            assert!(r.as_ref().unwrap().is_none());
        }
        results.swap_remove(0).unwrap().unwrap()
    }

    #[test]
    fn test_pulse_on_four_ranks() {
        let mut config = SolverConfig::potential(2, 2, 1., 1);
        config.sweeps = 1;
        let grid = solve_threads(&config, &GlobalGrid::pulse(4, 4));
        for y in 0..4 {
            for x in 0..4 {
                let interior = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if interior { 0.25 } else { 0. };
                assert_eq!(grid.get(x, y), expected, "cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_jacobi_independent_of_decomposition() {
        let initial = GlobalGrid::random(9, 7, 42);
        for equation in [
            SolverConfig::heat(1, 1, 0.1, 0.1 * 0.1 / 8. * 3.),
            SolverConfig::potential(1, 1, 0.1, 3),
        ] {
            let mut config = equation;
            config.sweeps = 4;
            let reference = solve_threads(&config, &initial);
            for (nx, ny) in [(2, 2), (3, 1), (1, 3), (3, 2)] {
                config.nx = nx;
                config.ny = ny;
                let grid = solve_threads(&config, &initial);
                assert_eq!(grid, reference, "{:?} on {}x{}", config.equation, nx, ny);
            }
        }
    }

    #[test]
    fn test_gauss_seidel_differs_from_jacobi() {
        let mut config = SolverConfig::potential(1, 1, 1., 1);
        config.sweeps = 1;
        let jacobi = solve_threads(&config, &GlobalGrid::pulse(4, 4));
        config.method = Method::GaussSeidel;
        let gs = solve_threads(&config, &GlobalGrid::pulse(4, 4));
        assert_ne!(gs, jacobi);
        assert_eq!(gs.get(1, 1), 0.25);
        assert_eq!(gs.get(2, 1), 0.0625);
    }

    #[test]
    fn test_symmetric_toggle_per_step() {
        // one step with two sweeps: per step parity keeps both sweeps forward
        let initial = GlobalGrid::random(6, 5, 3);
        let mut config = SolverConfig::potential(1, 1, 0.5, 1);
        config.sweeps = 2;
        config.method = Method::GaussSeidel;
        let forward = solve_threads(&config, &initial);
        config.method = Method::Symmetric;
        config.toggle = SymmetricToggle::PerStep;
        assert_eq!(solve_threads(&config, &initial), forward);
        config.toggle = SymmetricToggle::PerSweep;
        assert_ne!(solve_threads(&config, &initial), forward);
    }

    #[test]
    fn test_heat_runs_until_time_limit() {
        let universe = ThreadUniverse::new(2);
        let config = SolverConfig::heat(2, 1, 1., 0.25);
        let results = universe.run(|comm| -> Result<(usize, f64, Option<f64>)> {
            let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(6, 6));
            let norm0 = initial.as_ref().map(GlobalGrid::norm_l2);
            let mut solver = Solver::new(&comm, &config, initial)?;
            crate::integrate(&mut solver, config.stop, None)?;
            let (step, time) = (solver.step(), solver.get_time());
            let grid = solver.finish()?;
            Ok((step, time, grid.map(|g| norm0.unwrap() - g.norm_l2())))
        });
        for r in &results {
            let (step, time, _) = r.as_ref().unwrap();
            assert_eq!(*step, 2);
            approx_eq(*time, 0.25);
        }
        // heat leaves through the dirichlet boundary
        let decay = results[0].as_ref().unwrap().2.unwrap();
        assert!(decay > 0.);
    }

    #[test]
    fn test_snapshots_round_trip() {
        let mut config = SolverConfig::potential(2, 1, 1., 3);
        config.snapshot_interval = Some(1);
        config.sweeps = 2;
        let universe = ThreadUniverse::new(2);
        let results = universe.run(|comm| -> Result<Option<(MemoryStore, GlobalGrid)>> {
            let mut store = MemoryStore::new();
            let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(6, 4));
            let grid = run(&comm, &config, initial, vec![Box::new(&mut store)])?;
            Ok(grid.map(|g| (store, g)))
        });
        let (store, grid) = results[0].as_ref().unwrap().as_ref().unwrap();
        assert!(store.is_closed());
        assert_eq!(store.times().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(store.read(0).unwrap(), GlobalGrid::pulse(6, 4));
        assert_eq!(store.read(3).unwrap(), *grid);
        let meta = store.meta().unwrap();
        assert_eq!((meta.width, meta.height, meta.ht), (6, 4, 0.));
        assert!(results[1].as_ref().unwrap().is_none());
    }

    #[test]
    fn test_final_state_written_without_interval() {
        let config = SolverConfig::potential(1, 1, 1., 2);
        let universe = ThreadUniverse::new(1);
        let mut store = MemoryStore::new();
        let comm = universe.communicator(0);
        let grid = run(&comm, &config, Some(GlobalGrid::pulse(4, 4)), vec![Box::new(&mut store)])
            .unwrap()
            .unwrap();
        assert_eq!(store.times().unwrap(), vec![0, 2]);
        assert_eq!(store.read(0).unwrap(), GlobalGrid::pulse(4, 4));
        assert_eq!(store.last(), Some(&grid));
    }

    #[test]
    fn test_initial_field_is_first_slice() {
        let config = SolverConfig::potential(1, 1, 1., 0);
        let universe = ThreadUniverse::new(1);
        let mut store = MemoryStore::new();
        let comm = universe.communicator(0);
        run(&comm, &config, Some(GlobalGrid::pulse(4, 4)), vec![Box::new(&mut store)]).unwrap();
        assert_eq!(store.times().unwrap(), vec![0]);
        assert_eq!(store.last(), Some(&GlobalGrid::pulse(4, 4)));
    }

    #[test]
    fn test_slice_index_times_ht_is_time() {
        let h = 0.5;
        let mut config = SolverConfig::heat(2, 1, h, h * h / 8. * 4.);
        config.snapshot_interval = Some(2);
        let universe = ThreadUniverse::new(2);
        let results = universe.run(|comm| -> Result<Option<(MemoryStore, f64)>> {
            let mut store = MemoryStore::new();
            let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(6, 6));
            let mut solver = Solver::new(&comm, &config, initial)?;
            solver.add_writer(Box::new(&mut store))?;
            solver.snapshot()?;
            crate::integrate(&mut solver, config.stop, config.snapshot_interval)?;
            let time = solver.get_time();
            let grid = solver.finish()?;
            Ok(grid.map(|_| (store, time)))
        });
        let (store, time) = results[0].as_ref().unwrap().as_ref().unwrap();
        let meta = store.meta().unwrap();
        assert_eq!(store.times().unwrap(), vec![0, 2, 4]);
        approx_eq(meta.ht, h * h / 8.);
        approx_eq(4. * meta.ht, *time);
    }

    #[test]
    fn test_rank_mismatch_is_config_error() {
        let config = SolverConfig::potential(2, 2, 1., 1);
        let universe = ThreadUniverse::new(3);
        let results = universe.run(|comm| {
            let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(4, 4));
            run(&comm, &config, initial, Vec::new())
        });
        for r in results {
            assert!(matches!(r, Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_grid_too_small_fails_on_every_rank() {
        let config = SolverConfig::potential(3, 1, 1., 1);
        let results = run_threads(&config, &GlobalGrid::zeros(2, 4));
        assert_eq!(results.len(), 3);
        for r in results {
            assert!(matches!(r, Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_abort_reaches_all_ranks() {
        let config = SolverConfig::potential(2, 2, 1., 5);
        let universe = ThreadUniverse::new(4);
        let results = universe.run(|comm| {
            if comm.rank() == 3 {
                comm.abort(2);
                return Err(Error::Aborted(3));
            }
            let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(8, 8));
            run(&comm, &config, initial, Vec::new())
        });
        for r in results {
            assert!(matches!(r, Err(Error::Aborted(3))));
        }
    }

    #[test]
    fn test_partition_is_shared() {
        let config = SolverConfig::potential(3, 2, 1., 0);
        let universe = ThreadUniverse::new(6);
        let results = universe.run(|comm| -> Result<Partition> {
            let initial = (comm.rank() == 0).then(|| GlobalGrid::zeros(10, 5));
            Ok(Solver::new(&comm, &config, initial)?.partition)
        });
        let expected = Partition::new(10, 5, ProcessGrid::new(3, 2)).unwrap();
        for r in results {
            assert_eq!(r.unwrap(), expected);
        }
    }
}

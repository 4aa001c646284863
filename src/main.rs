//! Run example:
//!
//! cargo run --release -- --nx 2 --ny 2 --width 256 --height 256 --init pulse
//!
//! On MPI ranks:
//!
//! cargo build --release --features mpi
//! mpirun -np 4 target/release/halopde --backend mpi --nx 2 --ny 2
//!
//! Log output is controlled by `RUST_LOG`, e.g. `RUST_LOG=debug`.
use clap::{Parser, ValueEnum};
use halopde::comm::{Communicator, ThreadUniverse};
use halopde::config::{EquationKind, Method, SolverConfig, StopCriterion, SymmetricToggle};
use halopde::grid::{GlobalGrid, InitialCondition};
use halopde::io::png::PngDump;
use halopde::io::SnapshotWriter;
use halopde::solver::run;
use halopde::{Error, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// Communication backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One thread per rank in this process
    Threads,
    /// One MPI process per rank
    Mpi,
}

/// Initial field
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Init {
    /// All zero
    Zero,
    /// Central block set to one
    Pulse,
    /// Uniform random values
    Random,
    /// Dataset `u` of the file given by `--input`
    File,
}

/// halopde: domain decomposed heat and potential equation solver
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Ranks in x direction
    #[arg(long, default_value = "1")]
    nx: usize,

    /// Ranks in y direction
    #[arg(long, default_value = "1")]
    ny: usize,

    /// Global grid width
    #[arg(long, default_value = "128")]
    width: usize,

    /// Global grid height
    #[arg(long, default_value = "128")]
    height: usize,

    /// Grid spacing
    #[arg(long, default_value = "0.01")]
    h: f64,

    /// Equation
    #[arg(short, long, default_value = "heat")]
    equation: EquationKind,

    /// Relaxation method
    #[arg(short, long, default_value = "jacobi")]
    method: Method,

    /// Relaxation method by number: 0 Jacobi, 1 Gauss-Seidel, 2 symmetric
    #[arg(long, conflicts_with = "method")]
    algorithm: Option<u8>,

    /// Sweeps per outer step
    #[arg(short, long, default_value = "30")]
    sweeps: usize,

    /// Number of outer steps (default for the potential equation: 100)
    #[arg(long, conflicts_with = "max_time")]
    max_steps: Option<usize>,

    /// Physical end time (default for the heat equation: 0.01)
    #[arg(long)]
    max_time: Option<f64>,

    /// Gather a snapshot every n steps
    #[arg(long)]
    snapshot_every: Option<usize>,

    /// Hdf5 file receiving the snapshots (feature `hdf5`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory receiving one png per snapshot
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Initial field
    #[arg(long, default_value = "pulse")]
    init: Init,

    /// Seed of the random initial field
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Hdf5 file holding the initial field (feature `hdf5`)
    #[arg(long, required_if_eq("init", "file"))]
    input: Option<PathBuf>,

    /// Communication backend
    #[arg(long, default_value = "threads")]
    backend: Backend,

    /// Parity source of the symmetric sweep
    #[arg(long, default_value = "per-sweep")]
    toggle: SymmetricToggle,

    /// Receive timeout of the thread backend in milliseconds
    #[arg(long)]
    recv_timeout_ms: Option<u64>,
}

impl Args {
    fn config(&self) -> Result<SolverConfig> {
        let method = match self.algorithm {
            Some(selector) => Method::from_selector(selector)?,
            None => self.method,
        };
        let stop = match (self.max_time, self.max_steps, self.equation) {
            (Some(t), _, _) => StopCriterion::MaxTime(t),
            (None, Some(n), _) => StopCriterion::MaxSteps(n),
            (None, None, EquationKind::Heat) => StopCriterion::MaxTime(0.01),
            (None, None, EquationKind::Potential) => StopCriterion::MaxSteps(100),
        };
        let mut config = match stop {
            StopCriterion::MaxTime(t) => SolverConfig::heat(self.nx, self.ny, self.h, t),
            StopCriterion::MaxSteps(n) => SolverConfig::potential(self.nx, self.ny, self.h, n),
        };
        config.equation = self.equation;
        config.stop = stop;
        config.method = method;
        config.sweeps = self.sweeps;
        config.snapshot_interval = self.snapshot_every;
        config.toggle = self.toggle;
        config.recv_timeout = self.recv_timeout_ms.map(Duration::from_millis);
        config.validate()?;
        config.grid().check(self.nx * self.ny)?;
        Ok(config)
    }

    fn initial_condition(&self) -> Result<InitialCondition> {
        Ok(match self.init {
            Init::Zero => InitialCondition::Zero,
            Init::Pulse => InitialCondition::Pulse,
            Init::Random => InitialCondition::Random(self.seed),
            #[cfg(feature = "hdf5")]
            Init::File => match &self.input {
                Some(path) => InitialCondition::File(path.clone()),
                None => return Err(Error::config("--init file needs --input")),
            },
            #[cfg(not(feature = "hdf5"))]
            Init::File => {
                return Err(Error::config("reading the initial field needs feature hdf5"))
            }
        })
    }

    fn writers<'a>(&self) -> Result<Vec<Box<dyn SnapshotWriter + 'a>>> {
        let mut writers: Vec<Box<dyn SnapshotWriter + 'a>> = Vec::new();
        if let Some(dir) = &self.dump_dir {
            writers.push(Box::new(PngDump::new(dir)));
        }
        if let Some(path) = &self.output {
            #[cfg(feature = "hdf5")]
            writers.push(Box::new(halopde::io::hdf5_store::Hdf5Store::new(path)));
            #[cfg(not(feature = "hdf5"))]
            return Err(Error::config(format!(
                "cannot write {:?}: built without feature hdf5",
                path
            )));
        }
        Ok(writers)
    }
}

/// Work of one rank; rank 0 returns the final field and the wall time
fn solve_rank<C: Communicator>(
    comm: &C,
    args: &Args,
    config: &SolverConfig,
) -> Result<Option<(GlobalGrid, Duration)>> {
    let (initial, writers) = if comm.rank() == 0 {
        let prepared = args
            .initial_condition()
            .and_then(|ic| ic.build(args.width, args.height))
            .and_then(|initial| Ok((Some(initial), args.writers()?)));
        match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("[0]: {}", e);
                // without a field rank 0 broadcasts a rejected partition,
                // every rank then fails with a configuration error
                let _rejected = run(comm, config, None, Vec::new());
                return Err(e);
            }
        }
    } else {
        (None, Vec::new())
    };
    let start = Instant::now();
    let grid = run(comm, config, initial, writers)?;
    Ok(grid.map(|g| (g, start.elapsed())))
}

/// Print the result line `ranks,width,height,seconds` on rank 0
fn report(config: &SolverConfig, grid: &GlobalGrid, elapsed: Duration) {
    log::info!("|u| = {:10.4e}", grid.norm_l2());
    println!(
        "{},{},{},{:.6}",
        config.nx * config.ny,
        grid.width(),
        grid.height(),
        elapsed.as_secs_f64()
    );
}

fn run_threads(args: &Args, config: &SolverConfig) -> Result<()> {
    let universe = ThreadUniverse::with_timeout(config.nx * config.ny, config.recv_timeout);
    let results = universe.run(|comm| solve_rank(&comm, args, config));
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(Some((grid, elapsed))) => report(config, &grid, elapsed),
            Ok(None) => (),
            Err(e) => errors.push(e),
        }
    }
    // the root cause wins over the aborts it triggered
    match errors.iter().position(|e| !matches!(e, Error::Aborted(_))) {
        Some(pos) => Err(errors.swap_remove(pos)),
        None => errors.into_iter().next().map_or(Ok(()), Err),
    }
}

/// Returns the rank together with the outcome, only rank 0 reports errors
#[cfg(feature = "mpi")]
fn run_mpi(args: &Args, config: &SolverConfig) -> (usize, Result<()>) {
    use halopde::comm::mpi::{initialize, MpiComm};
    let universe = match initialize() {
        Ok(universe) => universe,
        Err(e) => return (0, Err(e)),
    };
    let comm = MpiComm::new(&universe);
    let result = match solve_rank(&comm, args, config) {
        Ok(Some((grid, elapsed))) => {
            report(config, &grid, elapsed);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    (comm.rank(), result)
}

fn execute(args: &Args) -> (usize, Result<()>) {
    let config = match args.config() {
        Ok(config) => config,
        Err(e) => return (0, Err(e)),
    };
    match args.backend {
        Backend::Threads => (0, run_threads(args, &config)),
        #[cfg(feature = "mpi")]
        Backend::Mpi => run_mpi(args, &config),
        #[cfg(not(feature = "mpi"))]
        Backend::Mpi => (0, Err(Error::config("built without feature mpi"))),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match execute(&args) {
        (_, Ok(())) => ExitCode::SUCCESS,
        (0, Err(e)) => {
            eprintln!("halopde: {}", e);
            ExitCode::FAILURE
        }
        (_, Err(_)) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_initial_field_reaches_every_rank() {
        let args = Args::parse_from([
            "halopde", "--nx", "2", "--width", "8", "--height", "8", "--init", "file",
            "--input", "/nonexistent/halopde-missing.h5",
        ]);
        let config = args.config().unwrap();
        let universe = ThreadUniverse::new(2);
        let results = universe.run(|comm| solve_rank(&comm, &args, &config));
        assert!(results[0].is_err());
        assert!(!matches!(results[0], Err(Error::Config(ref m)) if m.contains("rejected")));
        assert!(matches!(results[1], Err(Error::Config(_))));
        // the failure is reported, not replaced by an abort
        match run_threads(&args, &config) {
            Err(Error::Aborted(_)) | Ok(()) => panic!("rank 0 error was lost"),
            Err(_) => (),
        }
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_missing_writer_backend_is_reported() {
        let args = Args::parse_from([
            "halopde", "--nx", "2", "--width", "8", "--height", "8", "--output", "out.h5",
        ]);
        let config = args.config().unwrap();
        match run_threads(&args, &config) {
            Err(Error::Config(message)) => assert!(message.contains("feature hdf5")),
            other => panic!("unexpected {:?}", other),
        }
    }
}

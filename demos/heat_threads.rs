//! Run example:
//!
//! cargo run --example heat_threads --release
//!
//! Heat equation with a central pulse on 2 x 2 thread ranks, a png per
//! snapshot is written to `data/`.
use halopde::comm::{Communicator, ThreadUniverse};
use halopde::config::{Method, SolverConfig};
use halopde::grid::GlobalGrid;
use halopde::io::png::PngDump;
use halopde::io::{MemoryStore, SnapshotReader, SnapshotWriter};
use halopde::solver::run;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // parameter
    let (width, height) = (128, 96);
    let h = 1. / 128.;
    let mut config = SolverConfig::heat(2, 2, h, 200. * h * h / 8.);
    config.method = Method::Symmetric;
    config.sweeps = 10;
    config.snapshot_interval = Some(20);

    let universe = ThreadUniverse::new(config.nx * config.ny);
    let results = universe.run(|comm| {
        let mut store = MemoryStore::new();
        let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(width, height));
        let writers: Vec<Box<dyn SnapshotWriter + '_>> =
            vec![Box::new(PngDump::new("data")), Box::new(&mut store)];
        let grid = run(&comm, &config, initial, writers).unwrap();
        grid.map(|g| (g, store))
    });

    let (grid, store) = results[0].as_ref().unwrap();
    for t in store.times().unwrap() {
        println!("t = {:4} |u| = {:10.4e}", t, store.read(t).unwrap().norm_l2());
    }
    println!("final |u| = {:10.4e}", grid.norm_l2());
}

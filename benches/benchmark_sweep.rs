use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use halopde::comm::{Communicator, ThreadUniverse};
use halopde::config::{Method, SolverConfig};
use halopde::domain::LocalDomain;
use halopde::grid::GlobalGrid;
use halopde::partition::{Partition, ProcessGrid};
use halopde::solver::run;
use halopde::stencil::{compute_b, Equation, Heat};
use halopde::sweep::sweep;
use ndarray::Array2;

const SIZES: [usize; 3] = [64, 128, 256];

pub fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sweep");
    group.significance_level(0.1).sample_size(10);
    for n in SIZES.iter() {
        let part = Partition::new(*n, *n, ProcessGrid::new(1, 1)).unwrap();
        let h = 1. / *n as f64;
        let equation = Equation::from(Heat::new(h, h * h / 8.));
        for method in [Method::Jacobi, Method::GaussSeidel] {
            let mut domain = LocalDomain::new(&part, 0);
            domain.u.assign(&GlobalGrid::random(*n, *n, 0).data);
            compute_b(&mut domain, &equation);
            let mut unew = Array2::zeros((*n, *n));
            let name = format!("{:?}", method);
            group.bench_with_input(BenchmarkId::new(name, n), n, |b, _| {
                b.iter(|| sweep(&mut domain, &equation, method, 0, &mut unew))
            });
        }
    }
    group.finish();
}

pub fn bench_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("Threads");
    group.significance_level(0.1).sample_size(10);
    let n = 128;
    for (nx, ny) in [(1, 1), (2, 1), (2, 2)] {
        let config = SolverConfig::potential(nx, ny, 1. / n as f64, 5);
        let universe = ThreadUniverse::new(nx * ny);
        let name = format!("{}x{}", nx, ny);
        group.bench_function(name, |b| {
            b.iter(|| {
                universe.run(|comm| {
                    let initial = (comm.rank() == 0).then(|| GlobalGrid::pulse(n, n));
                    run(&comm, &config, initial, Vec::new()).unwrap()
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sweep, bench_threads);
criterion_main!(benches);

//! Benchmarks for the two-stage update and the subdomain backends.
//!
//! Run with: `cargo bench --bench stage_bench`

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use deeps2d::grid::FlowNodeCore;
use deeps2d::solver::{
    ClosureParams, ClosureSettings, IdealGasClosure, LocalRows, NoReactions, NodeClosure,
    SimulationContext, SolverKernel, StandardBlending, reduce_residuals, stage1, stage2,
};
use deeps2d::{
    Backend, EquationLayout, FlowNode, Grid2D, GridSpacing, HaloMode, Primitive, Resolution2D,
    uniform_grid,
};

fn kernel(num_species: usize) -> SolverKernel {
    SolverKernel {
        layout: EquationLayout::new(num_species),
        spacing: GridSpacing::new(1.0e-3, 1.0e-3),
        blending: Arc::new(StandardBlending::Sqrt),
        closure: Arc::new(IdealGasClosure::default()),
        chemistry: Arc::new(NoReactions),
        closure_settings: ClosureSettings::default(),
    }
}

/// A closed uniform stream with a smooth pressure bump in the middle.
fn setup(kernel: &SolverKernel, nx: usize, ny: usize) -> Grid2D<FlowNode> {
    let layout = &kernel.layout;
    let air = Primitive {
        rho: 1.2,
        u: 30.0,
        v: 0.0,
        p: 1.0e5,
    };
    let mut grid = uniform_grid(layout, Resolution2D::new(nx, ny), air, &[1.0]).unwrap();
    let (cx, cy) = (nx as f64 / 2.0, ny as f64 / 2.0);
    let params = ClosureParams::default();
    for i in 0..nx {
        for j in 0..ny {
            let r2 = ((i as f64 - cx).powi(2) + (j as f64 - cy).powi(2)) / (nx as f64);
            let bump = Primitive {
                p: 1.0e5 * (1.0 + 0.1 * (-r2).exp()),
                ..air
            };
            let node = &mut grid[(i, j)];
            node.set_primitive(layout, bump, &[1.0]);
            kernel.closure.close(node, layout, &params);
        }
    }
    grid
}

/// Benchmark Stage1 alone.
fn bench_stage1(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage1");
    let kernel = kernel(1);
    let ctx = SimulationContext::new(1.0e-7, 0.5, 0.9);

    for n in [32, 64, 128] {
        let nodes = setup(&kernel, n, n);
        let mut core = Grid2D::filled(nodes.resolution(), FlowNodeCore::new(&kernel.layout)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{n}x{n}")), &n, |b, &n| {
            b.iter(|| stage1(black_box(&nodes), &mut core, 0..n, &kernel, &ctx))
        });
    }
    group.finish();
}

/// Benchmark a full Stage1 + Stage2 iteration on one subdomain.
fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage1_stage2");
    let kernel = kernel(1);
    let ctx = SimulationContext::new(1.0e-7, 0.5, 0.9);

    for n in [32, 64, 128] {
        let mut nodes = setup(&kernel, n, n);
        let mut core = Grid2D::filled(nodes.resolution(), FlowNodeCore::new(&kernel.layout)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{n}x{n}")), &n, |b, &n| {
            b.iter(|| {
                stage1(&nodes, &mut core, 0..n, &kernel, &ctx);
                black_box(stage2(&mut nodes, &mut core, LocalRows::whole(n), &kernel, &ctx).unwrap())
            })
        });
    }
    group.finish();
}

/// Benchmark one decomposed iteration per backend.
fn bench_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_iteration");
    let kernel = Arc::new(kernel(1));
    let ctx = SimulationContext::new(1.0e-7, 0.5, 0.9);
    let global = setup(&kernel, 128, 64);
    let backends = [
        ("serial", Backend::Serial),
        ("shared_memory", Backend::SharedMemory),
        (
            "message_passing",
            Backend::MessagePassing {
                halo: HaloMode::Blocking,
            },
        ),
    ];

    for (name, backend) in backends {
        let mut set = backend.build(&global, 4, Arc::clone(&kernel)).unwrap();
        group.bench_function(BenchmarkId::new(name, 4), |b| {
            b.iter(|| {
                set.stage1(&ctx).unwrap();
                let residuals = reduce_residuals(set.stage2(&ctx).unwrap());
                set.exchange_halos().unwrap();
                black_box(residuals.dt_min)
            })
        });
        set.shutdown();
    }
    group.finish();
}

criterion_group!(benches, bench_stage1, bench_iteration, bench_backends);
criterion_main!(benches);

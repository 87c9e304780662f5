//! # Planner Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use nalgebra::{Matrix2, Vector2};
use smpc_lib::{
    fusion::AgentEstimate,
    loc::Pose,
    obstacle::Obstacle,
    planner::{CycleInputs, Planner, PlannerParams},
};

fn planner_benchmark(c: &mut Criterion) {
    // ---- Build the scenario ----

    let params = PlannerParams::default();
    let horizon = params.horizon;

    let obstacles = vec![Obstacle {
        vertices_m: vec![
            Vector2::new(5.0, 5.0),
            Vector2::new(6.0, 7.0),
            Vector2::new(7.0, 5.2),
        ],
        risk: 0.1,
    }];

    let start = Pose::new(4.0, 2.0, 0.0);
    let goal = Pose::new(6.5, 4.6, 0.0);
    let cov = Matrix2::identity() * 0.0025;

    let inputs = CycleInputs {
        own_covs: vec![cov; horizon + 1],
        other: Some(AgentEstimate {
            poses: (0..=horizon)
                .map(|k| Pose::new(5.0 - 0.05 * k as f64, 2.0, 0.0))
                .collect(),
            covs: vec![cov; horizon + 1],
        }),
    };

    let make_planner = || {
        let mut planner = Planner::new(params.clone(), start, goal).unwrap();
        planner.set_obstacles(&obstacles).unwrap();
        planner
    };

    // Cold start, no warm start trajectory available
    c.bench_function("Planner::step::cold", |b| {
        b.iter_batched(
            || make_planner(),
            |mut planner| planner.step(&inputs).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    // Warm started from the previous cycle's solution
    let mut planner = make_planner();
    let out = planner.step(&inputs).unwrap();
    planner.set_current_pose(out.commanded_pose);

    c.bench_function("Planner::step::warm", |b| {
        b.iter(|| {
            let out = planner.step(&inputs).unwrap();
            planner.set_current_pose(start);
            out
        })
    });
}

criterion_group!(benches, planner_benchmark);
criterion_main!(benches);

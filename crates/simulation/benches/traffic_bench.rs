use criterion::{black_box, criterion_group, criterion_main, Criterion};

use simulation::procgen::{generate_world, ProcGenConfig};
use simulation::traffic::{compute_commute_traffic, TrafficConfig};
use simulation::{SimConfig, Simulator};

fn bench_traffic(c: &mut Criterion) {
    // Simulate a few days so the zones hold commuters.
    let mut world = generate_world(96, 96, 1, &ProcGenConfig::default());
    let mut sim = Simulator::new(SimConfig::default());
    for _ in 0..10 {
        sim.step_once(&mut world);
    }

    let free = TrafficConfig::default();
    c.bench_function("commute_free_flow_96", |b| {
        b.iter(|| compute_commute_traffic(black_box(&world), &free, 0.9, None))
    });

    let congested = TrafficConfig {
        congestion_aware_routing: true,
        congestion_iterations: 4,
        ..TrafficConfig::default()
    };
    c.bench_function("commute_congestion_aware_96", |b| {
        b.iter(|| compute_commute_traffic(black_box(&world), &congested, 0.9, None))
    });
}

criterion_group!(benches, bench_traffic);
criterion_main!(benches);

//! Criterion benchmarks for power propagation.
//!
//! Two benchmark groups:
//! - `deep_chain`: one generator feeding a 2000-deep chain of supplies
//! - `wide_grid`: 2000 appliances on one grid, toggling the only generator

use criterion::{Criterion, criterion_group, criterion_main};
use gridline_core::id::DeviceId;
use gridline_power::PowerSystem;
use gridline_power::test_utils::*;

// ===========================================================================
// Builders
// ===========================================================================

fn build_deep_chain(depth: usize) -> (PowerSystem, DeviceId) {
    let mut sys = PowerSystem::new();
    let generator = add_generator(&mut sys, 1_000.0, true);
    let mut upstream = generator;
    for _ in 0..depth {
        let supply = add_supply(&mut sys, 1_000.0);
        sys.begin_drawdown(upstream, supply)
            .expect("fresh supply links cleanly");
        upstream = supply;
    }
    let lamp = add_appliance(&mut sys, 1.0);
    sys.begin_drawdown(upstream, lamp)
        .expect("fresh appliance links cleanly");
    sys.drain_events();
    (sys, generator)
}

fn build_wide_grid(consumers: usize) -> (PowerSystem, DeviceId) {
    let mut sys = PowerSystem::new();
    let grid = sys.create_grid(None);
    let generator = add_generator(&mut sys, consumers as f64, true);
    sys.join_grid(generator, grid).expect("grid exists");
    for _ in 0..consumers {
        let lamp = add_appliance(&mut sys, 1.0);
        sys.join_grid(lamp, grid).expect("grid exists");
    }
    sys.drain_events();
    (sys, generator)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_deep_chain(c: &mut Criterion) {
    let (mut sys, generator) = build_deep_chain(2_000);
    let mut on = true;
    c.bench_function("deep_chain_toggle", |b| {
        b.iter(|| {
            on = !on;
            sys.set_switched_on(generator, on).expect("generator exists");
            sys.drain_events()
        })
    });
}

fn bench_wide_grid(c: &mut Criterion) {
    let (mut sys, generator) = build_wide_grid(2_000);
    let mut on = true;
    c.bench_function("wide_grid_toggle", |b| {
        b.iter(|| {
            on = !on;
            sys.set_switched_on(generator, on).expect("generator exists");
            sys.drain_events()
        })
    });
}

criterion_group!(benches, bench_deep_chain, bench_wide_grid);
criterion_main!(benches);

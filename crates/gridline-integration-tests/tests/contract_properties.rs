//! Integration test: the producer/consumer contract end to end.
//!
//! Each test builds a small topology through the public API and checks one
//! externally observable property of notifications and accounting.

use gridline_core::fixed::{Fixed64, watts};
use gridline_power::test_utils::*;
use gridline_power::{PowerEvent, PowerSystem};

#[test]
fn begin_while_producing_notifies_exactly_once() {
    let mut sys = PowerSystem::new();
    let producer = add_generator(&mut sys, 100.0, true);
    let consumer = add_appliance(&mut sys, 10.0);

    sys.begin_drawdown(producer, consumer).unwrap();

    let events = sys.drain_events();
    assert_eq!(arrivals(&events, consumer), 1);
    assert_eq!(events.len(), 1);
    assert!(sys.is_powered(consumer));
}

#[test]
fn repeated_begin_registers_once() {
    let mut sys = PowerSystem::new();
    let producer = add_generator(&mut sys, 100.0, true);
    let consumer = add_appliance(&mut sys, 10.0);

    sys.begin_drawdown(producer, consumer).unwrap();
    sys.begin_drawdown(producer, consumer).unwrap();

    assert_eq!(sys.device(producer).unwrap().connected(), &[consumer]);
    assert_eq!(sys.device(producer).unwrap().power_users(), &[consumer]);
    assert_eq!(arrivals(&sys.drain_events(), consumer), 1);
}

#[test]
fn grid_backed_chain_cuts_out_downstream_once() {
    // Grid-backed outlet P1 feeds supply P2, which feeds consumer C.
    let mut sys = PowerSystem::new();
    let grid = sys.create_grid(None);
    let plant = add_generator(&mut sys, 100.0, true);
    let p1 = add_outlet(&mut sys);
    let p2 = add_supply(&mut sys, 30.0);
    let c = add_appliance(&mut sys, 12.0);
    sys.join_grid(plant, grid).unwrap();
    sys.join_grid(p1, grid).unwrap();
    sys.begin_drawdown(p1, p2).unwrap();
    sys.begin_drawdown(p2, c).unwrap();
    assert!(sys.is_powered(c));
    assert!(sys.is_producing(p2));
    sys.drain_events();

    // Taking the outlet off the grid turns P1 off.
    sys.set_grid(p1, None).unwrap();

    let events = sys.drain_events();
    assert_eq!(removals(&events, c), 1);
    assert!(!sys.is_producing(p1));
    assert!(!sys.is_producing(p2));
    assert!(removal_index(&events, c).unwrap() < removal_index(&events, p2).unwrap());
    assert!(removal_index(&events, p2).unwrap() < removal_index(&events, p1).unwrap());

    // Bringing it back restores the whole chain, top down.
    sys.set_grid(p1, Some(grid)).unwrap();
    let events = sys.drain_events();
    assert_eq!(arrivals(&events, c), 1);
    assert!(arrival_index(&events, p1).unwrap() < arrival_index(&events, c).unwrap());
}

#[test]
fn switching_the_source_off_reaches_the_end_of_a_long_chain() {
    let mut sys = PowerSystem::new();
    let generator = add_generator(&mut sys, 1_000.0, true);
    let mut upstream = generator;
    let mut chain = Vec::new();
    for _ in 0..500 {
        let supply = add_supply(&mut sys, 1_000.0);
        sys.begin_drawdown(upstream, supply).unwrap();
        chain.push(supply);
        upstream = supply;
    }
    let tail = add_appliance(&mut sys, 1.0);
    sys.begin_drawdown(upstream, tail).unwrap();
    assert!(sys.is_powered(tail));
    sys.drain_events();

    sys.set_switched_on(generator, false).unwrap();

    let events = sys.drain_events();
    assert_eq!(events.len(), chain.len() + 1);
    assert_eq!(removal_index(&events, tail), Some(0));
    assert!(chain.iter().all(|s| !sys.is_producing(*s)));
    assert!(sys.validate().is_empty());
}

#[test]
fn drawdown_counts_only_powered_consumers() {
    let mut sys = PowerSystem::new();
    let grid = sys.create_grid(None);
    let generator = add_generator(&mut sys, 10.0, true);
    let c1 = add_appliance(&mut sys, 10.0);
    let c2 = add_appliance(&mut sys, 5.0);
    sys.join_grid(generator, grid).unwrap();
    sys.join_grid(c1, grid).unwrap();
    sys.join_grid(c2, grid).unwrap();

    assert!(sys.is_powered(c1));
    assert!(!sys.is_powered(c2));
    assert_eq!(sys.total_drawdown(grid), watts(10.0));
    assert_eq!(sys.total_supply(grid), watts(10.0));
}

#[test]
fn spikes_are_refused_when_not_producing() {
    let mut sys = PowerSystem::new();
    let generator = add_generator(&mut sys, 100.0, false);
    let battery = add_battery(&mut sys, 100.0, 0.0, 100.0);
    let supply = add_supply(&mut sys, 100.0);
    let outlet = add_outlet(&mut sys);

    for producer in [generator, battery, supply, outlet] {
        assert!(!sys.is_producing(producer));
        assert!(!sys.can_drawdown_spike(producer, Fixed64::ZERO));
        assert!(!sys.drawdown_spike(producer, watts(1.0)));
    }
}

#[test]
fn deleting_a_grid_notifies_every_consumer_first() {
    let mut sys = PowerSystem::new();
    let grid = sys.create_grid(None);
    let generator = add_generator(&mut sys, 1_000.0, true);
    sys.join_grid(generator, grid).unwrap();
    let consumers: Vec<_> = (0..25).map(|_| add_appliance(&mut sys, 10.0)).collect();
    for c in &consumers {
        sys.join_grid(*c, grid).unwrap();
    }
    sys.drain_events();

    assert!(sys.delete_grid(grid));

    let events = sys.drain_events();
    let deleted_at = events
        .iter()
        .position(|e| matches!(e, PowerEvent::GridDeleted { .. }))
        .unwrap();
    for c in &consumers {
        assert_eq!(removals(&events, *c), 1);
        assert!(removal_index(&events, *c).unwrap() < deleted_at);
    }
    assert!(sys.grid(grid).is_none());
    assert_eq!(sys.grid_of(consumers[0]), None);
}

#[test]
fn admission_and_brownout_work_together() {
    let mut sys = PowerSystem::new();
    let grid = sys.create_grid(None);
    let plant = add_generator(&mut sys, 40.0, true);
    let outlet = add_outlet(&mut sys);
    let supply = add_supply(&mut sys, 25.0);
    sys.join_grid(plant, grid).unwrap();
    sys.join_grid(outlet, grid).unwrap();
    sys.begin_drawdown(outlet, supply).unwrap();

    // The supply's own limit governs admission; the outlet admits anything.
    assert!(sys.can_begin_drawdown(supply, watts(25.0)));
    assert!(!sys.can_begin_drawdown(supply, watts(26.0)));
    assert!(sys.can_begin_drawdown(outlet, watts(500.0)));

    let drill = add_appliance(&mut sys, 20.0);
    sys.begin_drawdown(supply, drill).unwrap();
    let heater = add_appliance(&mut sys, 30.0);
    sys.join_grid(heater, grid).unwrap();

    // 20 W through the outlet fits; the 30 W heater on top does not.
    assert!(sys.is_powered(drill));
    assert!(!sys.is_powered(heater));
    assert!(sys.grid(grid).unwrap().is_brownout());

    sys.set_capacity(plant, watts(60.0)).unwrap();
    assert!(sys.is_powered(heater));
    assert!(!sys.grid(grid).unwrap().is_brownout());
    assert!(sys.validate().is_empty());
}

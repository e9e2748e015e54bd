//! Footpad sampling as seen from the bus.

use lcm::events::Footpads;
use lcm::{BoardMode, Event, EventKind, IdleSubmode, RidingSubmode};

use crate::mock_hw::Harness;

fn pad_events(h: &Harness) -> Vec<Footpads> {
    h.delivered
        .iter()
        .filter_map(|ev| match ev {
            Event::FootpadsChanged(pads) => Some(*pads),
            _ => None,
        })
        .collect()
}

#[test]
fn not_sampled_before_idle() {
    let mut h = Harness::new();
    h.set_pads(3.0, 3.0);
    h.tick(h.config.footpad_sample_interval_ms * 3);
    assert_eq!(h.pad_reads(), 0);

    h.board.boot(&h.queue).unwrap();
    h.drain();
    h.tick(h.config.footpad_sample_interval_ms * 3);
    assert_eq!(h.mode(), BoardMode::Booting);
    assert_eq!(h.pad_reads(), 0);
}

#[test]
fn sampled_once_per_interval_in_idle() {
    let mut h = Harness::new();
    h.boot_to_idle();
    let interval = h.config.footpad_sample_interval_ms;

    h.tick(interval - 1);
    assert_eq!(h.pad_reads(), 0);
    h.tick(1);
    assert_eq!(h.pad_reads(), 1);
    h.tick(interval * 4);
    assert_eq!(h.pad_reads(), 5);
}

#[test]
fn one_pad_is_enough_to_ride() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.set_pads(0.2, 2.6);
    h.sample_footpads();
    assert_eq!(pad_events(&h), [Footpads::RIGHT]);
    assert_eq!(h.board.footpad_state(), Footpads::RIGHT);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Stopped));
}

#[test]
fn threshold_is_exclusive() {
    let mut h = Harness::new();
    h.boot_to_idle();
    let at = h.config.footpad_threshold_volts;
    h.set_pads(at, at);
    h.sample_footpads();
    assert!(pad_events(&h).is_empty());
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
}

#[test]
fn published_only_on_change() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.set_pads(3.0, 0.0);
    h.tick(h.config.footpad_sample_interval_ms * 5);
    h.set_pads(3.0, 3.0);
    h.tick(h.config.footpad_sample_interval_ms * 5);
    h.set_pads(0.0, 0.0);
    h.tick(h.config.footpad_sample_interval_ms * 5);

    assert_eq!(
        pad_events(&h),
        [Footpads::LEFT, Footpads::BOTH, Footpads::NONE]
    );
    // Stepped off at standstill.
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
}

#[test]
fn sampling_stops_in_fault_and_restarts_after_reset() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.set_pads(3.0, 3.0);
    h.sample_footpads();
    assert!(h.mode().is_riding());

    h.push(Event::EmergencyFault(lcm::EmergencyFault::InvalidState));
    assert_eq!(h.board.footpad_state(), Footpads::NONE);
    let reads = h.pad_reads();
    h.tick(h.config.footpad_sample_interval_ms * 3);
    assert_eq!(h.pad_reads(), reads);

    h.board.reset().unwrap();
    h.boot_to_idle();
    h.sample_footpads();
    assert_eq!(h.pad_reads(), reads + 1);
    assert!(h.mode().is_riding());
}

#[test]
fn one_sampler_across_idle_and_riding() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.set_pads(3.0, 3.0);
    h.sample_footpads();
    h.telemetry(3000, 40.0);
    h.telemetry(3000, 90.0);
    h.set_pads(0.0, 0.0);
    h.telemetry(0, 0.0);
    h.sample_footpads();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));

    // Idle timer plus a single sampler, however many mode changes happened.
    assert_eq!(h.board.timer_service().active_count(), 2);
    // Power, footpads, commands and headlights follow the mode.
    assert_eq!(h.bus.subscriber_count(EventKind::ModeChanged), 4);
}

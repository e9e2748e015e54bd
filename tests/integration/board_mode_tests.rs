//! End-to-end board-mode scenarios through the real bus, timers and
//! peripheral modules.

use lcm::error::BusError;
use lcm::events::{ButtonPress, Footpads};
use lcm::{
    Board, BoardConfig, BoardMode, EmergencyFault, Error, Event, EventBus, EventKind, EventQueue,
    IdleSubmode, RidingSubmode,
};

use crate::mock_hw::{
    mock_headlights, Harness, MockButton, MockFootpads, MockMotorLink, MockPin, TestBoard,
};

fn riding() -> Harness {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.set_pads(3.0, 3.0);
    h.sample_footpads();
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Stopped));
    h.clear_log();
    h
}

#[test]
fn starts_off_and_boots_to_idle_active() {
    let mut h = Harness::new();
    assert_eq!(h.mode(), BoardMode::Off);
    assert!(h.queue.is_empty());

    h.board.boot(&h.queue).unwrap();
    h.drain();
    assert_eq!(h.mode(), BoardMode::Booting);

    h.push(Event::MotorLinkAlive);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert!(h.board.controller().idle_timer().is_some());

    let changes = h.mode_changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].previous, BoardMode::Off);
    assert_eq!(changes[0].mode, BoardMode::Booting);
    assert_eq!(changes[1].previous, BoardMode::Booting);
}

#[test]
fn motor_link_alive_outside_booting_is_ignored() {
    let mut h = Harness::new();
    h.push(Event::MotorLinkAlive);
    assert_eq!(h.mode(), BoardMode::Off);
    assert!(h.mode_changes().is_empty());
}

#[test]
fn idle_cascade_powers_off_after_four_steps() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.clear_log();

    let c = h.config.clone();
    h.tick(c.idle_active_timeout_ms - 1);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    h.tick(1);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Default));

    h.tick(c.idle_default_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Dozing));
    h.tick(c.idle_dozing_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::ShuttingDown));
    h.tick(c.idle_shutting_down_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Off);

    let modes: Vec<_> = h.mode_changes().iter().map(|c| c.mode).collect();
    assert_eq!(
        modes,
        [
            BoardMode::Idle(IdleSubmode::Default),
            BoardMode::Idle(IdleSubmode::Dozing),
            BoardMode::Idle(IdleSubmode::ShuttingDown),
            BoardMode::Off,
        ]
    );
    assert!(!h.power_high());
    assert_eq!(h.board.timer_service().active_count(), 0);
}

#[test]
fn stepping_on_starts_riding_and_cancels_idle_timer() {
    let mut h = Harness::new();
    h.boot_to_idle();
    let idle_timer = h.board.controller().idle_timer().unwrap();

    h.set_pads(3.2, 3.1);
    h.sample_footpads();
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Stopped));
    assert!(!h.board.timer_service().is_timer_active(idle_timer));
    assert_eq!(h.board.controller().idle_timer(), None);
    // Only the footpad sampler keeps running.
    assert_eq!(h.board.timer_service().active_count(), 1);
}

#[test]
fn duty_hysteresis_returns_to_warning() {
    let mut h = riding();

    h.telemetry(3000, 85.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Warning));
    h.telemetry(3000, 95.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Danger));
    h.telemetry(3000, 84.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Warning));
    h.telemetry(3000, 60.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Normal));
}

#[test]
fn rpm_ladder_end_to_end() {
    let mut h = riding();
    h.telemetry(-900, 12.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Slow));
    h.telemetry(-2500, 30.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Normal));
    h.telemetry(10, 1.0);
    assert_eq!(h.mode(), BoardMode::Riding(RidingSubmode::Stopped));
}

#[test]
fn stepping_off_at_standstill_returns_to_idle() {
    let mut h = riding();
    h.telemetry(1200, 20.0);

    // Rider hops off while still rolling: stay in Riding.
    h.set_pads(0.1, 0.1);
    h.sample_footpads();
    assert!(h.mode().is_riding());

    h.telemetry(0, 0.0);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert!(h.board.controller().idle_timer().is_some());
}

#[test]
fn shutdown_while_standing_then_reboot_returns_to_idle() {
    let mut h = riding();
    h.push(Event::CommandShutdown);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::ShuttingDown));
    assert_eq!(h.board.footpad_state(), Footpads::BOTH);

    h.tick(h.config.idle_shutting_down_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Off);
    // Sampling stopped and took the pressed mask with it.
    assert_eq!(h.board.footpad_state(), Footpads::NONE);

    h.set_pads(0.0, 0.0);
    h.boot_to_idle();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));

    // Pushed off by hand, then brought to a stop with nobody on it.
    h.telemetry(300, 5.0);
    assert!(h.mode().is_riding());
    h.telemetry(0, 0.0);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert_eq!(h.board.footpad_state(), Footpads::NONE);

    h.tick(h.config.idle_active_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Default));
}

#[test]
fn released_button_aborts_shutdown() {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.push(Event::CommandShutdown);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::ShuttingDown));

    h.tick(h.config.idle_shutting_down_timeout_ms / 2);
    h.push(Event::ButtonUp(ButtonPress { time: 42 }));
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));

    h.tick(h.config.idle_shutting_down_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert!(h.power_high());
}

#[test]
fn emergency_fault_from_riding() {
    let mut h = riding();
    h.push(Event::EmergencyFault(EmergencyFault::MotorLinkTimeout));
    assert_eq!(h.mode(), BoardMode::Fault);
    assert_eq!(h.mode_changes().len(), 1);
    assert_eq!(h.board.controller().idle_timer(), None);
    // Sampling stops outside Idle and Riding; only the headlight blink runs.
    assert_eq!(h.board.timer_service().active_count(), 1);
    assert!(h.board.headlights().is_blinking());

    // Nothing observed on the bus brings it back.
    h.push(Event::CommandBoot);
    h.push(Event::MotorLinkAlive);
    h.set_pads(0.0, 0.0);
    h.telemetry(0, 0.0);
    assert_eq!(h.mode(), BoardMode::Fault);
    assert_eq!(h.mode_changes().len(), 1);
}

#[test]
fn reset_then_boot_recovers_from_fault() {
    let mut h = riding();
    h.push(Event::EmergencyFault(EmergencyFault::MotorController));
    assert_eq!(h.mode(), BoardMode::Fault);

    h.board.reset().unwrap();
    assert_eq!(h.mode(), BoardMode::Off);
    assert!(!h.power_high());
    assert_eq!(h.board.footpad_state(), Footpads::NONE);

    h.set_pads(0.0, 0.0);
    h.boot_to_idle();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
}

#[test]
fn config_mode_only_from_idle() {
    let mut h = riding();
    h.push(Event::CommandModeConfig { enable: true });
    assert!(h.mode().is_riding());
    assert!(h.delivered.contains(&Event::CommandNack));

    let mut h = Harness::new();
    h.boot_to_idle();
    h.push(Event::CommandModeConfig { enable: true });
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Config));
    assert_eq!(h.board.controller().idle_timer(), None);

    // The cascade is suspended while configuring.
    h.tick(h.config.idle_active_timeout_ms * 2);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Config));

    h.push(Event::CommandModeConfig { enable: false });
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
}

#[test]
fn rejected_push_leaves_queue_unchanged() {
    let mut h = Harness::new();
    for _ in 0..h.queue.capacity() {
        h.queue.push(Event::ButtonWakeup).unwrap();
    }
    let before = h.queue.len();
    assert!(h.queue.push(Event::CommandBoot).is_err());
    assert_eq!(h.queue.len(), before);
    h.drain();
    assert_eq!(h.mode(), BoardMode::Off);
}

fn noop(_board: &mut TestBoard, _event: &Event, _queue: &EventQueue) {}

#[test]
fn subscription_exhaustion_fails_init_and_faults() {
    let queue = EventQueue::new();
    let mut bus: EventBus<TestBoard> = EventBus::new();
    // Leave room for the tick handler and the first six controller handlers.
    for _ in 0..bus.capacity() - 7 {
        bus.subscribe(EventKind::CommandToggleBeeper, noop, &queue)
            .unwrap();
    }

    let mut board = Board::new(
        &BoardConfig::default(),
        MockMotorLink::default(),
        MockFootpads::default(),
        MockPin::default(),
        MockButton::default(),
        mock_headlights(),
    )
    .unwrap();
    assert_eq!(
        board.init(&mut bus, &queue),
        Err(Error::Bus(BusError::SubscriptionsFull))
    );
    assert_eq!(
        bus.subscriber_count(EventKind::EmergencyFault),
        1,
        "fault handler made it in before the table filled"
    );

    bus.drain(&queue, &mut board);
    assert_eq!(board.mode(), BoardMode::Fault);
}

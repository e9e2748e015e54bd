//! Button, command processor and headlights driven through the full board.

use lcm::events::CommandContext;
use lcm::{BoardMode, EmergencyFault, Event, IdleSubmode};

use crate::mock_hw::{Harness, PWM_MAX};

fn idle() -> Harness {
    let mut h = Harness::new();
    h.boot_to_idle();
    h.clear_log();
    h
}

fn full_duty(brightness: f32) -> u16 {
    (f32::from(PWM_MAX) * brightness) as u16
}

#[test]
fn headlights_follow_boot_and_cascade() {
    let mut h = Harness::new();
    assert_eq!(h.headlight_duty(), 0);
    assert_eq!(h.headlight_pins(), (false, false));

    h.boot_to_idle();
    let high = full_duty(h.board.settings().headlight_brightness);
    assert_eq!(h.headlight_duty(), high);
    assert_eq!(h.headlight_pins(), (true, false));

    h.tick(h.config.idle_active_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Default));
    assert_eq!(h.headlight_duty(), high >> 2);
}

#[test]
fn single_click_toggles_the_lights() {
    let mut h = idle();
    h.click(1);
    assert!(!h.board.settings().enable_headlights);
    assert_eq!(h.headlight_duty(), 0);
    assert!(h.delivered.contains(&Event::CommandToggleLights));
    assert!(h.delivered.contains(&Event::CommandAck));

    h.click(1);
    assert!(h.board.settings().enable_headlights);
    assert_eq!(h.headlight_duty(), full_duty(h.board.settings().headlight_brightness));
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
}

#[test]
fn double_click_toggles_the_beeper() {
    let mut h = idle();
    h.click(2);
    assert!(!h.board.settings().enable_beep);
    assert!(h.delivered.contains(&Event::CommandToggleBeeper));
    assert!(!h.delivered.contains(&Event::CommandToggleLights));
}

#[test]
fn hold_through_the_window_powers_off() {
    let mut h = idle();
    h.hold(1);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::ShuttingDown));

    h.tick(h.config.idle_shutting_down_timeout_ms);
    assert_eq!(h.mode(), BoardMode::Off);
    assert!(!h.power_high());
    assert_eq!(h.headlight_duty(), 0);

    // Letting go once off changes nothing.
    h.button_up();
    assert_eq!(h.mode(), BoardMode::Off);
}

#[test]
fn hold_released_early_aborts_shutdown() {
    let mut h = idle();
    h.hold(1);
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::ShuttingDown));
    h.button_up();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert!(h.power_high());
}

#[test]
fn settings_pages_adjust_brightness_with_the_pads() {
    let mut h = idle();
    h.hold(2);
    h.button_up();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Config));
    assert_eq!(h.board.commands().context(), CommandContext::HeadlightBrightness);

    let before = h.board.settings().headlight_brightness;
    h.set_pads(3.0, 0.0);
    h.sample_footpads();
    assert!(h.board.commands().is_adjusting());
    // The controller ignores the pads while configuring.
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Config));

    h.tick(500);
    h.set_pads(0.0, 0.0);
    h.sample_footpads();
    assert!(!h.board.commands().is_adjusting());
    let after = h.board.settings().headlight_brightness;
    assert!(after > before);
    assert_eq!(h.headlight_duty(), full_duty(after));
    assert!(h
        .delivered
        .contains(&Event::CommandSettingsChanged(CommandContext::HeadlightBrightness)));

    // Hold leaves the pages and restarts the cascade.
    h.hold(1);
    h.button_up();
    assert_eq!(h.mode(), BoardMode::Idle(IdleSubmode::Active));
    assert_eq!(h.board.commands().context(), CommandContext::Default);
    assert!(h.board.controller().idle_timer().is_some());
}

#[test]
fn clicks_are_ignored_while_off() {
    let mut h = Harness::new();
    h.click(1);
    h.click(2);
    assert_eq!(h.board.settings(), &lcm::config::UserSettings::default());
    assert!(!h.delivered.contains(&Event::CommandAck));
    assert_eq!(h.mode(), BoardMode::Off);
    assert!(!h.board.button().is_polling());
}

#[test]
fn fault_blinks_the_headlights() {
    let mut h = idle();
    h.push(Event::EmergencyFault(EmergencyFault::MotorController));
    assert_eq!(h.mode(), BoardMode::Fault);
    assert!(h.board.headlights().is_blinking());

    let lit = h.headlight_duty();
    h.tick(lcm::drivers::headlights::FAULT_BLINK_MS);
    assert_ne!(h.headlight_duty(), lit);

    h.board.reset().unwrap();
    assert!(!h.board.headlights().is_blinking());
    assert_eq!(h.headlight_duty(), 0);
    assert_eq!(h.board.timer_service().active_count(), 0);
}

#[test]
fn riding_backwards_swaps_the_lights() {
    let mut h = idle();
    h.set_pads(3.0, 3.0);
    h.sample_footpads();
    assert!(h.mode().is_riding());

    h.telemetry(-600, 10.0);
    assert_eq!(h.headlight_pins(), (false, true));
    h.telemetry(-20, 2.0);
    assert_eq!(h.headlight_pins(), (false, true));
    h.telemetry(300, 5.0);
    assert_eq!(h.headlight_pins(), (true, false));
}

//! Fuzz target: arbitrary event sequences through a fully wired board.
//!
//! Each input byte picks an event (the high bits select the kind, the low
//! bits its payload).  The board must never panic, never overflow its
//! queue, must keep its idle timer in step with its mode, and must only
//! have the settings pages open in Idle/Config.
//!
//! cargo fuzz run fuzz_event_sequence

#![no_main]

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use libfuzzer_sys::fuzz_target;
use lcm::app::ports::{FootpadSensor, MotorLink};
use lcm::drivers::headlights::Headlights;
use lcm::events::{ButtonPress, CommandContext, Footpads};
use lcm::{Board, BoardConfig, BoardMode, EmergencyFault, Event, EventBus, EventQueue, IdleSubmode};

#[derive(Default)]
struct Motor {
    rpm: Cell<i32>,
}

impl MotorLink for Motor {
    fn rpm(&self) -> i32 {
        self.rpm.get()
    }

    fn duty_cycle(&self) -> f32 {
        0.0
    }
}

#[derive(Default)]
struct Pads(f32, f32);

impl FootpadSensor for Pads {
    fn left_volts(&mut self) -> f32 {
        self.0
    }

    fn right_volts(&mut self) -> f32 {
        self.1
    }
}

struct Pin;

impl ErrorType for Pin {
    type Error = Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Button line that flips level every few reads, bouncing included.
struct Bouncy(u8);

impl ErrorType for Bouncy {
    type Error = Infallible;
}

impl InputPin for Bouncy {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.0 = self.0.wrapping_add(1);
        Ok(self.0 % 23 < 11)
    }
}

struct Pwm;

impl pwm::ErrorType for Pwm {
    type Error = Infallible;
}

impl SetDutyCycle for Pwm {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Infallible> {
        Ok(())
    }
}

fn decode(byte: u8, tick: u32) -> Event {
    let arg = byte & 0x1f;
    match byte >> 5 {
        0 => Event::SysTick(tick),
        1 => Event::RpmChanged((i32::from(arg) - 16) * 250),
        2 => Event::DutyCycleChanged(f32::from(arg) * 100.0 / 31.0),
        3 => Event::FootpadsChanged(Footpads::from_bits_truncate(arg)),
        4 => match arg % 4 {
            0 => Event::CommandBoot,
            1 => Event::CommandShutdown,
            2 => Event::CommandModeConfig { enable: arg & 0x10 != 0 },
            _ => Event::ButtonUp(ButtonPress { time: tick }),
        },
        5 => Event::MotorLinkAlive,
        6 => Event::EmergencyFault(EmergencyFault::ALL[usize::from(arg) % EmergencyFault::ALL.len()]),
        _ => match arg >> 3 {
            0 => Event::ButtonWakeup,
            1 => Event::ButtonClick(arg & 0x07),
            _ => Event::ButtonHold(arg & 0x07),
        },
    }
}

fuzz_target!(|data: &[u8]| {
    let config = BoardConfig {
        idle_active_timeout_ms: 3,
        idle_default_timeout_ms: 3,
        idle_dozing_timeout_ms: 3,
        idle_shutting_down_timeout_ms: 3,
        footpad_sample_interval_ms: 2,
        ..BoardConfig::default()
    };
    let queue = EventQueue::new();
    let mut bus = EventBus::new();
    let Ok(lights) = Headlights::new(Pwm, Pin, Pin) else {
        return;
    };
    let Ok(mut board) = Board::new(
        &config,
        Motor::default(),
        Pads(3.0, 0.0),
        Pin,
        Bouncy(0),
        lights,
    ) else {
        return;
    };
    if board.init(&mut bus, &queue).is_err() {
        return;
    }

    let mut tick = 0u32;
    for &byte in data {
        tick = tick.wrapping_add(1);
        let event = decode(byte, tick);
        if let Event::RpmChanged(rpm) = event {
            board.motor().rpm.set(rpm);
        }
        assert!(queue.push(event).is_ok(), "queue drained after every event");
        bus.drain(&queue, &mut board);

        let mode = board.mode();
        let cascading = matches!(mode, BoardMode::Idle(sub) if sub != IdleSubmode::Config);
        assert_eq!(board.controller().idle_timer().is_some(), cascading);
        assert_eq!(
            board.commands().context() != CommandContext::Default,
            mode == BoardMode::Idle(IdleSubmode::Config)
        );
    }
});

//! LCM host simulator.
//!
//! Runs the board core against scripted hardware on the host, one 1 ms
//! tick at a time, and logs every mode transition:
//!
//! ```text
//!  boot ─▶ motor link alive ─▶ lights off and on again ─▶ rider steps on
//!       ─▶ accelerate ─▶ duty spike ─▶ slow down ─▶ step off
//!       ─▶ idle cascade ─▶ Off
//! ```
//!
//! Build with `--features sim`; `RUST_LOG` controls verbosity.

use core::cell::Cell;
use core::convert::Infallible;
use std::rc::Rc;

use anyhow::Result;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::{debug, info, warn};

use lcm::app::ports::{FootpadSensor, MotorLink};
use lcm::drivers::headlights::Headlights;
use lcm::config::TICK_PERIOD_MS;
use lcm::{Board, BoardConfig, BoardMode, EmergencyFault, Event, EventBus, EventQueue};

/// Shared with the (simulated) interrupt handlers.
static EVENTS: EventQueue = EventQueue::new();

// ── Scripted hardware ─────────────────────────────────────────

#[derive(Default)]
struct SimMotor {
    rpm: Cell<i32>,
    duty: Cell<f32>,
}

impl MotorLink for SimMotor {
    fn rpm(&self) -> i32 {
        self.rpm.get()
    }

    fn duty_cycle(&self) -> f32 {
        self.duty.get()
    }
}

#[derive(Default)]
struct SimPads {
    left: f32,
    right: f32,
}

impl FootpadSensor for SimPads {
    fn left_volts(&mut self) -> f32 {
        self.left
    }

    fn right_volts(&mut self) -> f32 {
        self.right
    }
}

/// Output pin that logs its writes under a name.
struct SimPin(&'static str);

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        debug!("[pin] {} LOW", self.0);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        debug!("[pin] {} HIGH", self.0);
        Ok(())
    }
}

/// Active-low button; the script holds the other handle.
#[derive(Clone, Default)]
struct SimButton(Rc<Cell<bool>>);

impl ErrorType for SimButton {
    type Error = Infallible;
}

impl InputPin for SimButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }
}

struct SimHeadlightPwm {
    duty: u16,
}

impl pwm::ErrorType for SimHeadlightPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimHeadlightPwm {
    fn max_duty_cycle(&self) -> u16 {
        1000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        if duty != self.duty {
            info!("[pwm] headlights {}/1000", duty);
            self.duty = duty;
        }
        Ok(())
    }
}

type SimBoard = Board<SimMotor, SimPads, SimPin, SimButton, SimHeadlightPwm, SimPin>;

// ── Session script ────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Step {
    /// Motor-controller UART came up.
    LinkAlive,
    /// Button line level; true is pressed.
    Button(bool),
    /// Pad voltages (left, right).
    Pads(f32, f32),
    /// Motor telemetry frame: (rpm, duty %).
    Telemetry(i32, f32),
}

const SCRIPT: &[(u32, Step)] = &[
    (50, Step::LinkAlive),
    (300, Step::Button(true)),
    (360, Step::Button(false)),
    (700, Step::Button(true)),
    (760, Step::Button(false)),
    (1_000, Step::Pads(3.1, 3.0)),
    (1_500, Step::Telemetry(400, 8.0)),
    (2_500, Step::Telemetry(2_400, 35.0)),
    (3_500, Step::Telemetry(4_800, 88.0)),
    (4_000, Step::Telemetry(5_600, 96.0)),
    (4_500, Step::Telemetry(4_200, 70.0)),
    (6_000, Step::Telemetry(600, 10.0)),
    (7_000, Step::Telemetry(0, 0.0)),
    (7_200, Step::Pads(0.4, 0.3)),
];

fn apply(step: Step, board: &mut SimBoard, button: &SimButton) {
    let pushed = match step {
        Step::LinkAlive => EVENTS.push(Event::MotorLinkAlive),
        Step::Button(pressed) => {
            button.0.set(pressed);
            // Stands in for the edge interrupt.
            EVENTS.push(Event::ButtonWakeup)
        }
        Step::Pads(left, right) => {
            let pads = board.sensor_mut();
            pads.left = left;
            pads.right = right;
            Ok(())
        }
        Step::Telemetry(rpm, duty) => {
            let motor = board.motor();
            motor.rpm.set(rpm);
            motor.duty.set(duty);
            EVENTS
                .push(Event::RpmChanged(rpm))
                .and_then(|()| EVENTS.push(Event::DutyCycleChanged(duty)))
        }
    };
    if let Err(e) = pushed {
        warn!("Scripted event dropped: {}", e);
    }
}

fn fault_hook(code: EmergencyFault) {
    warn!("[hook] emergency fault: {}", code);
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("LCM simulator v{}", env!("CARGO_PKG_VERSION"));

    let config = BoardConfig::default();
    let button = SimButton::default();
    let headlights = Headlights::new(
        SimHeadlightPwm { duty: 0 },
        SimPin("headlights forward"),
        SimPin("headlights reverse"),
    )?;
    let mut board = SimBoard::new(
        &config,
        SimMotor::default(),
        SimPads::default(),
        SimPin("motor power"),
        button.clone(),
        headlights,
    )?;
    let mut bus = EventBus::new();

    EVENTS.set_fault_hook(fault_hook);
    board.init(&mut bus, &EVENTS)?;
    board.boot(&EVENTS)?;
    bus.drain(&EVENTS, &mut board);

    let cascade_ms = config.idle_active_timeout_ms
        + config.idle_default_timeout_ms
        + config.idle_dozing_timeout_ms
        + config.idle_shutting_down_timeout_ms;
    let last_step = SCRIPT.last().map_or(0, |(at, _)| *at);
    // Leave room for the footpad sampler to notice the rider stepping off.
    let end = (last_step + cascade_ms + config.footpad_sample_interval_ms) / TICK_PERIOD_MS + 10;

    let mut script = SCRIPT.iter().peekable();
    for tick in 1..=end {
        while let Some((_, step)) = script.next_if(|(at, _)| *at / TICK_PERIOD_MS == tick) {
            apply(*step, &mut board, &button);
        }

        // Stands in for the SysTick interrupt.
        if EVENTS.push(Event::SysTick(tick)).is_err() {
            warn!("Tick {} dropped", tick);
        }
        bus.drain(&EVENTS, &mut board);

        if board.mode() == BoardMode::Off && script.peek().is_none() {
            info!("Board powered off after {} ms", tick * TICK_PERIOD_MS);
            break;
        }
    }

    info!(
        "Final mode {}, power {}, dropped events {}",
        board.mode(),
        if board.power_is_on() { "on" } else { "off" },
        EVENTS.dropped()
    );
    Ok(())
}

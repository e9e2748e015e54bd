//! Headlight and taillight driver.
//!
//! ## Hardware
//!
//! One PWM channel sets the brightness; two direction pins pick which end
//! of the board shows white.  Forward drives the forward pin, reverse the
//! other; both are low while the lights are dark.
//!
//! ## Behaviour
//!
//! | Board mode                         | Level |
//! |------------------------------------|-------|
//! | Booting (direction reset forward)  | high  |
//! | Riding, Idle/Active, Idle/Config   | high  |
//! | Idle/Default, Dozing, ShuttingDown | low   |
//! | Fault                              | blink |
//! | Off, Charging                      | off   |
//!
//! High is the rider's brightness setting, low a quarter of it.  The
//! direction follows the sign of the RPM through a ±40 RPM latch, so a
//! board rocking at standstill does not flicker between ends.  Disabling
//! the headlights from the command processor forces the duty to zero
//! without changing the level.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, error, info};

use crate::config::{BoardConfig, UserSettings};
use crate::error::{BusError, EmergencyFault, Error, Result, TimerError};
use crate::events::{CommandContext, Event, EventBus, EventKind, EventQueue};
use crate::fsm::{BoardMode, IdleSubmode, ModeView};
use crate::hysteresis::Hysteresis;
use crate::timer::{TimerHost, TimerId};

/// RPM beyond which the lights swap ends.
pub const DIRECTION_RPM: f32 = 40.0;
/// Half period of the fault blink.
pub const FAULT_BLINK_MS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
    Off,
    Blink,
}

pub struct Headlights<W, D> {
    pwm: W,
    forward: D,
    reverse: D,
    /// Set while moving forward.
    direction: Hysteresis,
    level: Level,
    duty: u16,
    blink_timer: Option<TimerId>,
    blink_on: bool,
}

/// Context owning the headlights, the timer table and the user settings.
pub trait HeadlightsHost: TimerHost + ModeView {
    type Pwm: SetDutyCycle;
    type Pin: OutputPin;

    fn headlights(&mut self) -> &mut Headlights<Self::Pwm, Self::Pin>;
    fn user_settings(&self) -> UserSettings;
}

impl<W: SetDutyCycle, D: OutputPin> Headlights<W, D> {
    pub fn new(pwm: W, forward: D, reverse: D) -> Result<Self> {
        let mut direction = Hysteresis::new(DIRECTION_RPM, -DIRECTION_RPM)?;
        direction.latch();
        Ok(Self {
            pwm,
            forward,
            reverse,
            direction,
            level: Level::Off,
            duty: 0,
            blink_timer: None,
            blink_on: false,
        })
    }

    /// Write the direction pins and the duty for the current level.
    fn drive(&mut self, settings: &UserSettings) -> Result<()> {
        let lit = self.level != Level::Off;
        let forward = self.direction() == Direction::Forward;
        self.forward
            .set_state(PinState::from(lit && forward))
            .map_err(|_| Error::Hardware("headlight direction"))?;
        self.reverse
            .set_state(PinState::from(lit && !forward))
            .map_err(|_| Error::Hardware("headlight direction"))?;

        let duty = self.target_duty(settings);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|_| Error::Hardware("headlight pwm"))?;
        self.duty = duty;
        Ok(())
    }

    fn target_duty(&self, settings: &UserSettings) -> u16 {
        if !settings.enable_headlights {
            return 0;
        }
        let brightness = settings.headlight_brightness.clamp(0.0, 1.0);
        let full = (f32::from(self.pwm.max_duty_cycle()) * brightness) as u16;
        match self.level {
            Level::High => full,
            Level::Low => full >> 2,
            Level::Off => 0,
            Level::Blink if self.blink_on => full,
            Level::Blink => 0,
        }
    }

    /// Go dark immediately.
    pub fn switch_off(&mut self) -> Result<()> {
        self.level = Level::Off;
        self.blink_on = false;
        self.drive(&UserSettings::default())
    }
}

impl<W, D> Headlights<W, D> {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn direction(&self) -> Direction {
        if self.direction.is_set() {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Duty last written to the PWM channel.
    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn is_blinking(&self) -> bool {
        self.blink_timer.is_some()
    }

    /// Forget the blink timer and face forward.  Used when the owner clears
    /// its timer table; the outputs are left to the caller.
    pub fn reset(&mut self) {
        self.level = Level::Off;
        self.blink_timer = None;
        self.blink_on = false;
        self.direction.latch();
    }
}

pub fn subscribe<H: HeadlightsHost>(
    bus: &mut EventBus<H>,
    queue: &EventQueue,
) -> core::result::Result<(), BusError> {
    bus.subscribe(EventKind::ModeChanged, on_mode_changed::<H>, queue)?;
    bus.subscribe(EventKind::RpmChanged, on_rpm_changed::<H>, queue)?;
    bus.subscribe(EventKind::CommandToggleLights, on_settings::<H>, queue)?;
    bus.subscribe(EventKind::CommandContextChanged, on_settings::<H>, queue)?;
    bus.subscribe(EventKind::CommandSettingsChanged, on_settings::<H>, queue)?;
    info!("Headlights subscribed");
    Ok(())
}

fn refresh<H: HeadlightsHost>(host: &mut H, queue: &EventQueue) {
    let settings = host.user_settings();
    if let Err(e) = host.headlights().drive(&settings) {
        error!("Headlight output failed: {}", e);
        queue.fault(EmergencyFault::UnexpectedError);
    }
}

fn level_for(mode: BoardMode) -> Level {
    match mode {
        BoardMode::Booting
        | BoardMode::Riding(_)
        | BoardMode::Idle(IdleSubmode::Active)
        | BoardMode::Idle(IdleSubmode::Config) => Level::High,
        BoardMode::Idle(_) => Level::Low,
        BoardMode::Fault => Level::Blink,
        BoardMode::Off | BoardMode::Charging | BoardMode::Unknown => Level::Off,
    }
}

// ───────────────────────────────────────────────────────────────
// Event handlers
// ───────────────────────────────────────────────────────────────

pub fn on_mode_changed<H: HeadlightsHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ModeChanged(change) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let level = level_for(change.mode);
    let lights = host.headlights();
    if change.mode == BoardMode::Booting {
        lights.direction.latch();
    }
    lights.level = level;
    debug!("Headlights {:?} in {}", level, change.mode);

    let blink = lights.blink_timer;
    match (level, blink) {
        (Level::Blink, None) => {
            lights.blink_on = true;
            match host
                .timers()
                .set_timer(BoardConfig::ticks(FAULT_BLINK_MS), on_blink_timer::<H>, true)
            {
                Ok(id) => host.headlights().blink_timer = Some(id),
                Err(TimerError::TableFull) => {
                    // Steady instead of blinking; the fault is already raised.
                    error!("No timer slot for the headlight blink");
                }
                Err(e) => error!("Blink timer rejected: {}", e),
            }
        }
        (Level::Blink, Some(_)) => {}
        (_, Some(id)) => {
            host.headlights().blink_timer = None;
            if host.timers().cancel_timer(id).is_err() {
                debug!("Blink timer {} already gone", id.get());
            }
        }
        (_, None) => {}
    }
    refresh(host, queue);
}

pub fn on_rpm_changed<H: HeadlightsHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::RpmChanged(rpm) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let lights = host.headlights();
    let before = lights.direction();
    lights.direction.apply(rpm as f32);
    let after = lights.direction();
    if after != before {
        info!("Headlights facing {:?}", after);
        refresh(host, queue);
    }
}

/// Lights toggled, or the headlight brightness page opened, left or
/// changed: redraw with the current settings.
pub fn on_settings<H: HeadlightsHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    match *event {
        Event::CommandToggleLights | Event::CommandContextChanged(_) => refresh(host, queue),
        Event::CommandSettingsChanged(CommandContext::HeadlightBrightness) => refresh(host, queue),
        Event::CommandSettingsChanged(_) => {}
        _ => queue.fault(EmergencyFault::InvalidEvent),
    }
}

pub fn on_blink_timer<H: HeadlightsHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let lights = host.headlights();
    lights.blink_on = !lights.blink_on;
    refresh(host, queue);
}

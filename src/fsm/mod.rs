//! Hierarchical board-mode state machine.
//!
//! The board is always in exactly one [`BoardMode`].  Idle and Riding carry
//! their own submode, so a submode can never outlive the mode it belongs
//! to:
//!
//! ```text
//!         boot               motor link alive
//!  Off ──────────▶ Booting ──────────────────▶ Idle(Active)
//!   ▲                                            │ idle timer
//!   │                                            ▼
//!   │   Idle(ShuttingDown) ◀── Idle(Dozing) ◀── Idle(Default)
//!   │          │
//!   └──────────┘ idle timer
//!
//!  Idle   ── footpads pressed ──▶ Riding(Stopped | Slow | Normal | Warning | Danger)
//!  Riding ── stepped off, rpm 0 ─▶ Idle(Active)
//!  any    ── emergency fault ───▶ Fault
//! ```
//!
//! The controller reacts only to events delivered by the bus and to the
//! idle timer it arms itself.  Every change of mode publishes exactly one
//! `ModeChanged` event; handling an event that causes no transition
//! publishes nothing.  The transition handlers live in [`handlers`].

pub mod handlers;

use core::fmt;

use crate::app::ports::MotorLink;
use crate::config::BoardConfig;
use crate::error::Result;
use crate::events::Footpads;
use crate::hysteresis::Hysteresis;
use crate::timer::{TimerHost, TimerId};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdleSubmode {
    /// Just parked or woken; lights fully on.
    Active,
    Default,
    Dozing,
    /// Last window in which a button release aborts the power-off.
    ShuttingDown,
    /// User is editing settings; the shutdown cascade is suspended.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RidingSubmode {
    Stopped,
    Slow,
    Normal,
    Warning,
    Danger,
}

/// Coarse operating state, with the submode of the modes that have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoardMode {
    #[default]
    Unknown,
    Off,
    Booting,
    Idle(IdleSubmode),
    Riding(RidingSubmode),
    Charging,
    /// Terminal until the controller is reset.
    Fault,
}

impl BoardMode {
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle(_))
    }

    pub const fn is_riding(self) -> bool {
        matches!(self, Self::Riding(_))
    }
}

impl fmt::Display for BoardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Off => f.write_str("Off"),
            Self::Booting => f.write_str("Booting"),
            Self::Idle(sub) => write!(f, "Idle/{:?}", sub),
            Self::Riding(sub) => write!(f, "Riding/{:?}", sub),
            Self::Charging => f.write_str("Charging"),
            Self::Fault => f.write_str("Fault"),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller state
// ---------------------------------------------------------------------------

/// State owned by the board-mode controller.
///
/// Mutated only by the functions in [`handlers`], which reach it through
/// [`BoardModeHost`].
pub struct BoardModeController {
    mode: BoardMode,
    /// The single timer driving the idle cascade, if armed.
    idle_timer: Option<TimerId>,
    danger: Hysteresis,
    warning: Hysteresis,
    slow_rpm: Hysteresis,
    stopped_rpm: Hysteresis,
    config: BoardConfig,
}

impl BoardModeController {
    /// Build the controller in `Off`.  Fails on an inconsistent config.
    pub fn new(config: &BoardConfig) -> Result<Self> {
        config.validate()?;

        let band = config.duty_hysteresis_band;
        let danger = Hysteresis::new(
            config.duty_danger_threshold,
            config.duty_danger_threshold - band,
        )?;
        let warning = Hysteresis::new(
            config.duty_warning_threshold,
            config.duty_warning_threshold - band,
        )?;

        let keep = 1.0 - config.rpm_hysteresis_ratio;
        let slow = config.slow_rpm_threshold as f32;
        let stopped = config.stopped_rpm_threshold as f32;
        let slow_rpm = Hysteresis::new(slow, slow * keep)?;
        let stopped_rpm = Hysteresis::new(stopped, stopped * keep)?;

        Ok(Self {
            mode: BoardMode::Off,
            idle_timer: None,
            danger,
            warning,
            slow_rpm,
            stopped_rpm,
            config: config.clone(),
        })
    }

    pub fn mode(&self) -> BoardMode {
        self.mode
    }

    pub fn idle_timer(&self) -> Option<TimerId> {
        self.idle_timer
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Return to `Off`, forgetting the latches and the idle timer handle.
    /// The owner clears its timer table alongside.
    pub fn reset(&mut self) {
        self.mode = BoardMode::Off;
        self.idle_timer = None;
        self.release_latches();
    }

    fn release_latches(&mut self) {
        self.danger.reset();
        self.warning.reset();
        self.slow_rpm.reset();
        self.stopped_rpm.reset();
    }

    /// Ticks the idle timer runs for before leaving `sub`.
    fn idle_timeout(&self, sub: IdleSubmode) -> Option<u32> {
        let ms = match sub {
            IdleSubmode::Active => self.config.idle_active_timeout_ms,
            IdleSubmode::Default => self.config.idle_default_timeout_ms,
            IdleSubmode::Dozing => self.config.idle_dozing_timeout_ms,
            IdleSubmode::ShuttingDown => self.config.idle_shutting_down_timeout_ms,
            IdleSubmode::Config => return None,
        };
        Some(BoardConfig::ticks(ms))
    }
}

// ---------------------------------------------------------------------------
// Host trait
// ---------------------------------------------------------------------------

/// The device context the controller's handlers run against.
///
/// Owns the controller and the timer table, and exposes the motor link so
/// the riding ladder can poll RPM and duty cycle synchronously.
pub trait BoardModeHost: TimerHost {
    type Motor: MotorLink;

    fn board_mode(&mut self) -> &mut BoardModeController;
    fn motor_link(&self) -> &Self::Motor;

    /// Footpad mask last published by the footpad sampler.  The controller
    /// keeps no copy, so the mask cannot outlive the sampler resetting it.
    fn footpads(&self) -> Footpads;
}

/// Read-only view of the current mode, for peripherals that gate their
/// input on it without owning a copy.
pub trait ModeView {
    fn current_mode(&self) -> BoardMode;
}

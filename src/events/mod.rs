//! Event model and the interrupt-to-main-loop event system.
//!
//! Events are produced by:
//! - Interrupt handlers (system tick, button edges, motor-link bytes)
//! - Timer callbacks (footpad sampling, idle cascade)
//! - Software (mode changes, commands, fault escalation)
//!
//! Events are consumed by the main loop, which drains the queue and
//! dispatches each event to its subscribers in registration order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Tick ISR    │────▶│              │     │              │
//! │ Button ISR  │────▶│  EventQueue  │────▶│  EventBus    │──▶ handlers
//! │ Timers      │────▶│  (crit-sect) │     │  (main loop) │
//! │ Software    │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod queue;

use core::fmt;
use core::ops::BitOr;

use crate::error::EmergencyFault;
use crate::fsm::BoardMode;

pub use bus::{EventBus, EventHandler};
pub use queue::EventQueue;

// ───────────────────────────────────────────────────────────────
// Event kinds
// ───────────────────────────────────────────────────────────────

/// Type tag of an [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    // ── Timing ────────────────────────────────────────────
    SysTick = 0,

    // ── User input ────────────────────────────────────────
    ButtonWakeup = 10,
    ButtonDown = 11,
    ButtonUp = 12,
    ButtonClick = 13,
    ButtonHold = 14,

    // ── Sensors and telemetry ─────────────────────────────
    FootpadsChanged = 20,
    DutyCycleChanged = 21,
    RpmChanged = 22,
    MotorLinkAlive = 24,

    // ── Board mode ────────────────────────────────────────
    ModeChanged = 30,

    // ── Commands ──────────────────────────────────────────
    CommandContextChanged = 40,
    CommandToggleLights = 41,
    CommandToggleBeeper = 42,
    CommandBoot = 43,
    CommandShutdown = 44,
    CommandAck = 45,
    CommandNack = 46,
    CommandSettingsChanged = 47,
    CommandModeConfig = 48,

    // ── Faults ────────────────────────────────────────────
    EmergencyFault = 50,
}

// ───────────────────────────────────────────────────────────────
// Payload types
// ───────────────────────────────────────────────────────────────

/// Bitmask of pressed footpads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footpads(u8);

impl Footpads {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const BOTH: Self = Self(Self::LEFT.0 | Self::RIGHT.0);

    /// Build from raw bits, discarding anything that is not a pad.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::BOTH.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for Footpads {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Button edge timestamp, in system ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub time: u32,
}

/// Payload of [`Event::ModeChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: BoardMode,
    pub previous: BoardMode,
}

/// Which user setting a context or settings command targets.
///
/// `Default` is the normal riding context; the others are the settings
/// pages reachable in Idle/Config, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandContext {
    Default,
    HeadlightBrightness,
    StatusBarBrightness,
    PersonalColor,
    BootAnimation,
    IdleAnimation,
    DozingAnimation,
    RidingAnimation,
    ShutdownAnimation,
}

impl CommandContext {
    /// Settings pages, in navigation order.
    pub const PAGES: [Self; 8] = [
        Self::HeadlightBrightness,
        Self::StatusBarBrightness,
        Self::PersonalColor,
        Self::BootAnimation,
        Self::IdleAnimation,
        Self::DozingAnimation,
        Self::RidingAnimation,
        Self::ShutdownAnimation,
    ];

    fn page(self) -> Option<usize> {
        Self::PAGES.iter().position(|&p| p == self)
    }

    /// Following page, wrapping after the last.  `Default` leads to the
    /// first page.
    pub fn next(self) -> Self {
        let index = self.page().map_or(0, |i| (i + 1) % Self::PAGES.len());
        Self::PAGES[index]
    }

    /// Preceding page, wrapping before the first.  `Default` leads to the
    /// last page.
    pub fn previous(self) -> Self {
        let len = Self::PAGES.len();
        let index = self.page().map_or(len - 1, |i| (i + len - 1) % len);
        Self::PAGES[index]
    }
}

// ───────────────────────────────────────────────────────────────
// Event
// ───────────────────────────────────────────────────────────────

/// A typed, fixed-size message.  The variant is the tag; the fields are
/// the payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Periodic tick; carries the tick counter.
    SysTick(u32),

    ButtonWakeup,
    ButtonDown(ButtonPress),
    ButtonUp(ButtonPress),
    /// Number of clicks in the sequence.
    ButtonClick(u8),
    /// Number of presses in the sequence, the last one held.
    ButtonHold(u8),

    FootpadsChanged(Footpads),
    /// Motor duty cycle, percent.
    DutyCycleChanged(f32),
    /// Electrical RPM, signed by direction.
    RpmChanged(i32),
    MotorLinkAlive,

    ModeChanged(ModeChange),

    CommandContextChanged(CommandContext),
    CommandToggleLights,
    CommandToggleBeeper,
    CommandBoot,
    CommandShutdown,
    CommandAck,
    CommandNack,
    CommandSettingsChanged(CommandContext),
    CommandModeConfig { enable: bool },

    EmergencyFault(EmergencyFault),
}

impl Event {
    /// The subscription key for this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SysTick(_) => EventKind::SysTick,
            Self::ButtonWakeup => EventKind::ButtonWakeup,
            Self::ButtonDown(_) => EventKind::ButtonDown,
            Self::ButtonUp(_) => EventKind::ButtonUp,
            Self::ButtonClick(_) => EventKind::ButtonClick,
            Self::ButtonHold(_) => EventKind::ButtonHold,
            Self::FootpadsChanged(_) => EventKind::FootpadsChanged,
            Self::DutyCycleChanged(_) => EventKind::DutyCycleChanged,
            Self::RpmChanged(_) => EventKind::RpmChanged,
            Self::MotorLinkAlive => EventKind::MotorLinkAlive,
            Self::ModeChanged(_) => EventKind::ModeChanged,
            Self::CommandContextChanged(_) => EventKind::CommandContextChanged,
            Self::CommandToggleLights => EventKind::CommandToggleLights,
            Self::CommandToggleBeeper => EventKind::CommandToggleBeeper,
            Self::CommandBoot => EventKind::CommandBoot,
            Self::CommandShutdown => EventKind::CommandShutdown,
            Self::CommandAck => EventKind::CommandAck,
            Self::CommandNack => EventKind::CommandNack,
            Self::CommandSettingsChanged(_) => EventKind::CommandSettingsChanged,
            Self::CommandModeConfig { .. } => EventKind::CommandModeConfig,
            Self::EmergencyFault(_) => EventKind::EmergencyFault,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeChanged(change) => write!(f, "ModeChanged({} -> {})", change.previous, change.mode),
            Self::EmergencyFault(code) => write!(f, "EmergencyFault({code})"),
            other => write!(f, "{:?}", other),
        }
    }
}

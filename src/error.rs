//! Unified error types for the LCM firmware core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's error handling uniform.  All variants are `Copy` so they can
//! be passed through the event bus and state machine without allocation.
//!
//! Two classes of failure exist:
//!
//! - **Status errors** (`BusError`, `TimerError`, `InvalidParam`): returned
//!   to the caller, who decides whether to drop, retry on its next sample,
//!   or escalate.  Nothing in the core retries internally.
//! - **Emergency faults** (`EmergencyFault`): conditions the firmware cannot
//!   safely continue past.  They are raised through
//!   [`EventQueue::fault`](crate::events::queue::EventQueue::fault), which
//!   calls the process-wide hook and publishes an `EmergencyFault` event so
//!   the board-mode controller reaches `Fault` through the normal path.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The event bus rejected an operation.
    Bus(BusError),
    /// The timer service rejected an operation.
    Timer(TimerError),
    /// A parameter-validating API was handed an unusable value.
    InvalidParam(&'static str),
    /// Configuration is inconsistent.
    Config(&'static str),
    /// A peripheral could not be driven.
    Hardware(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::InvalidParam(msg) => write!(f, "invalid parameter: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Hardware(msg) => write!(f, "hardware: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Event bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The event queue is at capacity; the event was dropped.
    QueueFull,
    /// The subscription table has no free slot.
    SubscriptionsFull,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "event queue full"),
            Self::SubscriptionsFull => write!(f, "subscription table full"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Every timer slot is occupied.
    TableFull,
    /// A timer needs at least one tick to count down.
    InvalidTimeout,
    /// The id does not name an active timer.
    UnknownTimer,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "timer table full"),
            Self::InvalidTimeout => write!(f, "timeout must be at least one tick"),
            Self::UnknownTimer => write!(f, "unknown or inactive timer"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Emergency faults
// ---------------------------------------------------------------------------

/// Fault codes carried by the `EmergencyFault` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EmergencyFault {
    Undefined = 0,
    NullPointer,
    OutOfBounds,
    DivideByZero,
    Overflow,
    Underflow,
    InvalidArgument,
    InvalidState,
    /// A handler received an event it was not subscribed for.
    InvalidEvent,
    InvalidLength,
    /// The motor controller reported a fault.
    MotorController,
    /// The motor controller stopped answering.
    MotorLinkTimeout,
    InitFail,
    UnexpectedError,
}

impl EmergencyFault {
    /// Every fault code, in discriminant order.
    pub const ALL: [Self; 14] = [
        Self::Undefined,
        Self::NullPointer,
        Self::OutOfBounds,
        Self::DivideByZero,
        Self::Overflow,
        Self::Underflow,
        Self::InvalidArgument,
        Self::InvalidState,
        Self::InvalidEvent,
        Self::InvalidLength,
        Self::MotorController,
        Self::MotorLinkTimeout,
        Self::InitFail,
        Self::UnexpectedError,
    ];
}

impl fmt::Display for EmergencyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Undefined => "undefined",
            Self::NullPointer => "null pointer",
            Self::OutOfBounds => "out of bounds",
            Self::DivideByZero => "divide by zero",
            Self::Overflow => "overflow",
            Self::Underflow => "underflow",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
            Self::InvalidEvent => "invalid event",
            Self::InvalidLength => "invalid length",
            Self::MotorController => "motor controller fault",
            Self::MotorLinkTimeout => "motor link timeout",
            Self::InitFail => "init failed",
            Self::UnexpectedError => "unexpected error",
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

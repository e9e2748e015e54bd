//! LCM firmware library.
//!
//! The event bus, timer service and board-mode state machine that sequence
//! a self-balancing board through boot, idle, riding and fault, plus the
//! peripheral modules wired to them: footpads, power latch, button,
//! command processor and headlights.  Hardware is reached only through the
//! port traits in [`app::ports`] and `embedded-hal` pins, so the whole
//! crate runs on the host for testing and simulation.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod hysteresis;
pub mod sensors;
pub mod timer;

pub use app::service::Board;
pub use config::{BoardConfig, UserSettings};
pub use error::{EmergencyFault, Error, Result};
pub use events::{Event, EventBus, EventKind, EventQueue};
pub use fsm::{BoardMode, IdleSubmode, RidingSubmode};

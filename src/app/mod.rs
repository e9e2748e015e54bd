//! Application core: the owned device context, its port traits, and the
//! command processor.
//!
//! [`service::Board`] wires the event bus, timer table, board-mode
//! controller and peripheral modules into one context.  [`commands`] turns
//! button gestures into commands and runs the settings pages.  All interaction
//! with hardware happens through the **port traits** in [`ports`] and
//! `embedded-hal` pins, keeping this layer testable without real
//! peripherals.

pub mod commands;
pub mod ports;
pub mod service;

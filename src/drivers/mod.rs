//! Actuator and input drivers wired to the event bus.

pub mod button;
pub mod headlights;
pub mod power;

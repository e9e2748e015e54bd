//! Sensor peripherals that feed domain events into the bus.

pub mod footpads;

//! Port traits: the boundary between the board logic and the hardware.
//!
//! ```text
//!   Driver ──▶ Port trait ──▶ Board (domain)
//! ```
//!
//! Drivers (motor-controller UART link, footpad ADC) implement these
//! traits.  [`Board`](super::service::Board) consumes them via generics,
//! so the mode controller never touches hardware directly and tests swap
//! in scripted fakes.

// ───────────────────────────────────────────────────────────────
// Motor link (driven adapter: motor controller → domain)
// ───────────────────────────────────────────────────────────────

/// Latest telemetry received from the motor controller.
///
/// Reads are synchronous and return the last values the link decoded;
/// they never block on the wire.
pub trait MotorLink {
    /// Electrical RPM, signed by direction of travel.
    fn rpm(&self) -> i32;

    /// Motor duty cycle in percent (0–100).
    fn duty_cycle(&self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Footpad sensor (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Raw footpad pressure readings.
pub trait FootpadSensor {
    /// Left pad voltage.
    fn left_volts(&mut self) -> f32;

    /// Right pad voltage.
    fn right_volts(&mut self) -> f32;
}

//! System configuration parameters
//!
//! Compile-time capacities for the fixed-size tables, plus the tunable
//! thresholds and timeouts that drive the board-mode controller and the
//! footpad sampler.  All durations are in milliseconds; the system tick is
//! [`TICK_PERIOD_MS`], so a duration is also its timer tick count.
//!
//! [`UserSettings`] holds what the rider changes from the button in
//! Idle/Config.  It lives in RAM; storing it is left to the integrator.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Capacities ---

/// Maximum number of events waiting in the queue.
pub const EVENT_QUEUE_CAPACITY: usize = 8;
/// Maximum number of event subscriptions across all event kinds.
pub const MAX_SUBSCRIPTIONS: usize = 32;
/// Maximum number of concurrently armed software timers.
pub const MAX_TIMERS: usize = 8;
/// Period of the `SysTick` event.
pub const TICK_PERIOD_MS: u32 = 1;

/// Core board configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    // --- Idle cascade ---
    /// Idle/Active → Idle/Default
    pub idle_active_timeout_ms: u32,
    /// Idle/Default → Idle/Dozing
    pub idle_default_timeout_ms: u32,
    /// Idle/Dozing → Idle/ShuttingDown
    pub idle_dozing_timeout_ms: u32,
    /// Idle/ShuttingDown → Off (window to abort the shutdown)
    pub idle_shutting_down_timeout_ms: u32,

    // --- Riding ladder ---
    /// |ERPM| at or above which the board counts as moving slowly
    pub stopped_rpm_threshold: u32,
    /// |ERPM| at or above which the board counts as moving normally
    pub slow_rpm_threshold: u32,
    /// Fraction below an RPM threshold at which its latch releases
    pub rpm_hysteresis_ratio: f32,
    /// Duty cycle (%) entering the warning band
    pub duty_warning_threshold: f32,
    /// Duty cycle (%) entering the danger band
    pub duty_danger_threshold: f32,
    /// Points below a duty threshold at which its latch releases
    pub duty_hysteresis_band: f32,

    // --- Footpads ---
    /// Pad voltage above which a pad counts as pressed
    pub footpad_threshold_volts: f32,
    /// Footpad sampling period
    pub footpad_sample_interval_ms: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            // Idle cascade
            idle_active_timeout_ms: 4 * 1000,
            idle_default_timeout_ms: 2 * 60 * 1000,
            idle_dozing_timeout_ms: 8 * 60 * 1000,
            idle_shutting_down_timeout_ms: 1000,

            // Riding ladder
            stopped_rpm_threshold: 20,
            slow_rpm_threshold: 2000, // roughly 3-4 mph
            rpm_hysteresis_ratio: 0.1,
            duty_warning_threshold: 85.0,
            duty_danger_threshold: 95.0,
            duty_hysteresis_band: 5.0,

            // Footpads
            footpad_threshold_volts: 2.5,
            footpad_sample_interval_ms: 100,
        }
    }
}

impl BoardConfig {
    /// Reject combinations that would make the ladder or cascade misbehave.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            self.idle_active_timeout_ms,
            self.idle_default_timeout_ms,
            self.idle_dozing_timeout_ms,
            self.idle_shutting_down_timeout_ms,
            self.footpad_sample_interval_ms,
        ];
        if timeouts.contains(&0) {
            return Err(Error::Config("timeouts must be non-zero"));
        }
        if self.slow_rpm_threshold <= self.stopped_rpm_threshold {
            return Err(Error::Config("slow RPM threshold must exceed stopped threshold"));
        }
        if !(0.0..1.0).contains(&self.rpm_hysteresis_ratio) {
            return Err(Error::Config("RPM hysteresis ratio must be in [0, 1)"));
        }
        if self.duty_warning_threshold >= self.duty_danger_threshold {
            return Err(Error::Config("warning duty must be below danger duty"));
        }
        if self.duty_danger_threshold > 100.0 || self.duty_warning_threshold <= 0.0 {
            return Err(Error::Config("duty thresholds must be within (0, 100]"));
        }
        if self.duty_hysteresis_band < 0.0 {
            return Err(Error::Config("duty hysteresis band must not be negative"));
        }
        if self.footpad_threshold_volts <= 0.0 {
            return Err(Error::Config("footpad threshold must be positive"));
        }
        Ok(())
    }

    /// Convert a millisecond duration into system ticks (at least one).
    pub fn ticks(ms: u32) -> u32 {
        (ms / TICK_PERIOD_MS).max(1)
    }
}

// --- User settings ---

/// Status-bar animation choices, in the order the settings page steps
/// through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    None,
    RainbowScan,
    RainbowMirror,
    RainbowBar,
    Scroll120,
    ComplementaryWave,
    FloatwheelClassic,
    PersonalScan,
}

impl Animation {
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::RainbowScan,
        Self::RainbowMirror,
        Self::RainbowBar,
        Self::Scroll120,
        Self::ComplementaryWave,
        Self::FloatwheelClassic,
        Self::PersonalScan,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|&a| a == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let len = Self::ALL.len();
        Self::ALL[(self.index() + len - 1) % len]
    }
}

/// Rider-adjustable settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub enable_beep: bool,
    pub enable_headlights: bool,
    pub enable_status_leds: bool,
    /// Fraction of full headlight output, 0.0..=1.0
    pub headlight_brightness: f32,
    /// Fraction of full status-bar output, 0.0..=1.0
    pub status_brightness: f32,
    /// Hue in degrees, 0.0..360.0
    pub personal_color: f32,
    pub boot_animation: Animation,
    pub idle_animation: Animation,
    pub dozing_animation: Animation,
    pub riding_animation: Animation,
    pub shutdown_animation: Animation,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enable_beep: true,
            enable_headlights: true,
            enable_status_leds: true,
            headlight_brightness: 0.8,
            status_brightness: 0.8,
            personal_color: 200.0,
            boot_animation: Animation::FloatwheelClassic,
            idle_animation: Animation::None,
            dozing_animation: Animation::None,
            riding_animation: Animation::None,
            shutdown_animation: Animation::None,
        }
    }
}

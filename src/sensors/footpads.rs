//! Footpad pressure sampler.
//!
//! Two resistive pads under the rider's feet, read as voltages through
//! [`FootpadSensor`].  A pad counts as pressed above the configured
//! threshold (2.5 V by default).
//!
//! Sampling only runs while the board is Idle or Riding: a repeating timer
//! is armed when `ModeChanged` enters either mode and cancelled on any
//! other.  `FootpadsChanged` is published only when the mask actually
//! changes.  A rejected push leaves the stored mask untouched, so the next
//! sample retries it.

use log::{debug, error, info, warn};

use crate::app::ports::FootpadSensor;
use crate::config::BoardConfig;
use crate::error::{BusError, EmergencyFault};
use crate::events::{Event, EventBus, EventKind, EventQueue, Footpads};
use crate::fsm::BoardMode;
use crate::timer::{TimerHost, TimerId};

pub struct FootpadSampler {
    timer: Option<TimerId>,
    state: Footpads,
    threshold_volts: f32,
    interval_ticks: u32,
}

/// Context owning the sampler, its sensor, and the timer table.
pub trait FootpadsHost: TimerHost {
    type Sensor: FootpadSensor;

    fn footpad_sampler(&mut self) -> &mut FootpadSampler;
    fn footpad_sensor(&mut self) -> &mut Self::Sensor;
}

impl FootpadSampler {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            timer: None,
            state: Footpads::NONE,
            threshold_volts: config.footpad_threshold_volts,
            interval_ticks: BoardConfig::ticks(config.footpad_sample_interval_ms),
        }
    }

    /// Last published mask.
    pub fn state(&self) -> Footpads {
        self.state
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Forget the timer and the published mask.  Used when the owner
    /// clears its timer table.
    pub fn reset(&mut self) {
        self.timer = None;
        self.state = Footpads::NONE;
    }

    /// Mask for a pair of pad voltages.
    pub fn classify(&self, left: f32, right: f32) -> Footpads {
        let mut pads = Footpads::NONE;
        if left > self.threshold_volts {
            pads.insert(Footpads::LEFT);
        }
        if right > self.threshold_volts {
            pads.insert(Footpads::RIGHT);
        }
        pads
    }
}

pub fn subscribe<H: FootpadsHost>(bus: &mut EventBus<H>, queue: &EventQueue) -> Result<(), BusError> {
    bus.subscribe(EventKind::ModeChanged, on_mode_changed::<H>, queue)?;
    info!("Footpad sampler subscribed");
    Ok(())
}

/// Start or stop sampling to follow the board mode.
pub fn on_mode_changed<H: FootpadsHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ModeChanged(change) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };

    let timer = host.footpad_sampler().timer;
    let running = timer.is_some_and(|id| host.timers().is_timer_active(id));

    match change.mode {
        BoardMode::Idle(_) | BoardMode::Riding(_) => {
            if running {
                return;
            }
            let interval = host.footpad_sampler().interval_ticks;
            match host.timers().set_timer(interval, on_sample::<H>, true) {
                Ok(id) => {
                    debug!("Footpad sampling started");
                    host.footpad_sampler().timer = Some(id);
                }
                Err(e) => {
                    error!("Footpad sampling not started: {}", e);
                    queue.fault(EmergencyFault::Overflow);
                }
            }
        }
        _ => {
            let sampler = host.footpad_sampler();
            sampler.state = Footpads::NONE;
            if let Some(id) = sampler.timer.take() {
                if host.timers().cancel_timer(id).is_ok() {
                    debug!("Footpad sampling stopped");
                }
            }
        }
    }
}

/// Sample timer callback.
pub fn on_sample<H: FootpadsHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let sensor = host.footpad_sensor();
    let (left, right) = (sensor.left_volts(), sensor.right_volts());

    let sampler = host.footpad_sampler();
    let pads = sampler.classify(left, right);
    if pads == sampler.state {
        return;
    }
    match queue.push(Event::FootpadsChanged(pads)) {
        Ok(()) => sampler.state = pads,
        Err(_) => warn!("Event queue full, footpad change deferred"),
    }
}

//! Motor-controller power latch.
//!
//! A single `embedded-hal` output pin enables the motor controller's
//! supply.  It is driven high when the board starts booting and low when
//! it reaches Off; every other mode leaves it alone.
//!
//! ## Safety contract
//!
//! The latch is released at initialisation, so motor power is never live
//! before the boot command has been accepted by the mode controller.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::error::{BusError, EmergencyFault};
use crate::events::{Event, EventBus, EventKind, EventQueue};
use crate::fsm::BoardMode;

pub struct PowerControl<P> {
    pin: P,
    on: bool,
}

/// Context owning the power latch.
pub trait PowerHost {
    type Pin: OutputPin;

    fn power(&mut self) -> &mut PowerControl<Self::Pin>;
}

impl<P: OutputPin> PowerControl<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, on: false }
    }

    pub fn on(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.on = true;
        info!("Motor controller power on");
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.on = false;
        info!("Motor controller power off");
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Give the pin back, e.g. for inspection in tests.
    pub fn release(self) -> P {
        self.pin
    }
}

pub fn subscribe<H: PowerHost>(bus: &mut EventBus<H>, queue: &EventQueue) -> Result<(), BusError> {
    bus.subscribe(EventKind::ModeChanged, on_mode_changed::<H>, queue)
}

pub fn on_mode_changed<H: PowerHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ModeChanged(change) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let power = host.power();
    let result = match change.mode {
        BoardMode::Booting => power.on(),
        BoardMode::Off => power.off(),
        _ => Ok(()),
    };
    if result.is_err() {
        error!("Power pin write failed entering {}", change.mode);
        queue.fault(EmergencyFault::UnexpectedError);
    }
}

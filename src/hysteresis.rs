//! Two-threshold latch.
//!
//! Sets when the input reaches `set`, releases only once it drops below
//! `reset`.  Values between the two keep the previous state, which stops
//! a reading that hovers around one threshold from toggling every sample.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HysteresisState {
    Reset,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    set: f32,
    reset: f32,
    state: HysteresisState,
}

impl Hysteresis {
    /// Build a released latch.  `set` must not be below `reset`.
    pub fn new(set: f32, reset: f32) -> Result<Self> {
        if set < reset || set.is_nan() || reset.is_nan() {
            return Err(Error::InvalidParam("hysteresis set threshold below reset"));
        }
        Ok(Self {
            set,
            reset,
            state: HysteresisState::Reset,
        })
    }

    /// Feed a sample and return the resulting state.
    pub fn apply(&mut self, value: f32) -> HysteresisState {
        match self.state {
            HysteresisState::Reset if value >= self.set => self.state = HysteresisState::Set,
            HysteresisState::Set if value < self.reset => self.state = HysteresisState::Reset,
            _ => {}
        }
        self.state
    }

    pub fn is_set(&self) -> bool {
        self.state == HysteresisState::Set
    }

    /// Release the latch without feeding a sample.
    pub fn reset(&mut self) {
        self.state = HysteresisState::Reset;
    }

    /// Set the latch without feeding a sample.
    pub fn latch(&mut self) {
        self.state = HysteresisState::Set;
    }
}

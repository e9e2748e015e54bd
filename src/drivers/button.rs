//! Push-button debounce and gesture recognition.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up, read through an
//! `embedded-hal` [`InputPin`].  The edge interrupt only pushes
//! `ButtonWakeup`; everything else runs on the main loop.
//!
//! ## Debounce
//!
//! `ButtonWakeup` starts a one-tick repeating poll.  A level that holds for
//! more than [`DEBOUNCE_TICKS`] is published once, as `ButtonDown` or
//! `ButtonUp` stamped with the tick it settled on.  The poll stops once the
//! release has been published.
//!
//! ## Gesture detection
//!
//! | Gesture         | Condition                                          | Event            |
//! |-----------------|----------------------------------------------------|------------------|
//! | n clicks        | n presses of 10-180 ms, gaps up to 200 ms, quiet   | `ButtonClick(n)` |
//! | n-1 clicks+hold | n-th press held for 500 ms                         | `ButtonHold(n)`  |
//!
//! A press shorter than 10 ms, or released between 180 and 500 ms, abandons
//! the sequence without an event.

use embedded_hal::digital::InputPin;
use log::{debug, error, info, warn};

use crate::config::BoardConfig;
use crate::error::{BusError, EmergencyFault, TimerError};
use crate::events::{ButtonPress, Event, EventBus, EventKind, EventQueue};
use crate::timer::{TimerCallback, TimerHost, TimerId};

/// Ticks a level must hold, exclusive, before it counts.
pub const DEBOUNCE_TICKS: u32 = 5;
pub const CLICK_MIN_MS: u32 = 10;
pub const CLICK_MAX_MS: u32 = 180;
/// Longest gap between a release and the next press of one sequence.
pub const REPEAT_WINDOW_MS: u32 = 200;
pub const HOLD_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    Pressed { since: u32 },
    Released { since: u32 },
}

pub struct Button<B> {
    pin: B,
    // ── Debounce ──
    poll_timer: Option<TimerId>,
    reading: Level,
    reading_since: u32,
    published: Level,
    // ── Gestures ──
    state: GestureState,
    presses: u8,
    hold_fired: bool,
    hold_timer: Option<TimerId>,
    repeat_timer: Option<TimerId>,
}

/// Context owning the button and the timer table.
pub trait ButtonHost: TimerHost {
    type Pin: InputPin;

    fn button(&mut self) -> &mut Button<Self::Pin>;
}

impl<B: InputPin> Button<B> {
    pub fn new(pin: B) -> Self {
        Self {
            pin,
            poll_timer: None,
            reading: Level::Released,
            reading_since: 0,
            published: Level::Released,
            state: GestureState::Idle,
            presses: 0,
            hold_fired: false,
            hold_timer: None,
            repeat_timer: None,
        }
    }

    fn read(&mut self) -> Result<Level, B::Error> {
        Ok(if self.pin.is_low()? {
            Level::Pressed
        } else {
            Level::Released
        })
    }
}

impl<B> Button<B> {
    /// True while the debounce poll is armed.
    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_some()
    }

    /// True between the first press of a sequence and its gesture event.
    pub fn in_gesture(&self) -> bool {
        self.state != GestureState::Idle
    }

    /// Forget every timer handle and any sequence in progress.  Used when
    /// the owner clears its timer table.
    pub fn reset(&mut self) {
        self.poll_timer = None;
        self.reading = Level::Released;
        self.reading_since = 0;
        self.published = Level::Released;
        self.clear_gesture();
    }

    fn clear_gesture(&mut self) {
        self.state = GestureState::Idle;
        self.presses = 0;
        self.hold_fired = false;
        self.hold_timer = None;
        self.repeat_timer = None;
    }

    pub fn release(self) -> B {
        self.pin
    }
}

pub fn subscribe<H: ButtonHost>(bus: &mut EventBus<H>, queue: &EventQueue) -> Result<(), BusError> {
    bus.subscribe(EventKind::ButtonWakeup, on_wakeup::<H>, queue)?;
    bus.subscribe(EventKind::ButtonDown, on_button_down::<H>, queue)?;
    bus.subscribe(EventKind::ButtonUp, on_button_up::<H>, queue)?;
    info!("Button subscribed");
    Ok(())
}

fn arm<H: ButtonHost>(
    host: &mut H,
    ms: u32,
    callback: TimerCallback<H>,
    repeat: bool,
    queue: &EventQueue,
) -> Option<TimerId> {
    match host.timers().set_timer(BoardConfig::ticks(ms), callback, repeat) {
        Ok(id) => Some(id),
        Err(TimerError::TableFull) => {
            error!("No timer slot for the button");
            queue.fault(EmergencyFault::Overflow);
            None
        }
        Err(e) => {
            error!("Button timer rejected: {}", e);
            queue.fault(EmergencyFault::InvalidArgument);
            None
        }
    }
}

fn cancel<H: ButtonHost>(host: &mut H, timer: Option<TimerId>) {
    if let Some(id) = timer {
        if host.timers().cancel_timer(id).is_err() {
            debug!("Button timer {} already expired", id.get());
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Debounce
// ───────────────────────────────────────────────────────────────

/// Edge interrupt seen: poll the pin until it settles.
pub fn on_wakeup<H: ButtonHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    if !matches!(event, Event::ButtonWakeup) {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    }
    let timer = host.button().poll_timer;
    if timer.is_some_and(|id| host.timers().is_timer_active(id)) {
        return;
    }
    let id = arm(host, 1, on_poll::<H>, true, queue);
    host.button().poll_timer = id;
}

/// Debounce poll, once per tick while armed.
pub fn on_poll<H: ButtonHost>(host: &mut H, tick: u32, queue: &EventQueue) {
    let button = host.button();
    let level = match button.read() {
        Ok(level) => level,
        Err(_) => {
            error!("Button pin read failed");
            let timer = button.poll_timer.take();
            cancel(host, timer);
            queue.fault(EmergencyFault::UnexpectedError);
            return;
        }
    };

    if level != button.reading {
        button.reading = level;
        button.reading_since = tick;
        return;
    }
    if tick.wrapping_sub(button.reading_since) <= DEBOUNCE_TICKS {
        return;
    }

    if level != button.published {
        let press = ButtonPress { time: tick };
        let edge = match level {
            Level::Pressed => Event::ButtonDown(press),
            Level::Released => Event::ButtonUp(press),
        };
        if queue.push(edge).is_err() {
            // Still settled on the next poll, which retries.
            warn!("Event queue full, button edge deferred");
            return;
        }
        button.published = level;
    }
    if level == Level::Released {
        let timer = button.poll_timer.take();
        cancel(host, timer);
    }
}

// ───────────────────────────────────────────────────────────────
// Gestures
// ───────────────────────────────────────────────────────────────

pub fn on_button_down<H: ButtonHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ButtonDown(press) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let repeat = host.button().repeat_timer.take();
    cancel(host, repeat);

    match host.button().state {
        GestureState::Idle => start_press(host, press.time, queue),
        GestureState::Released { since } => {
            if press.time.wrapping_sub(since) > REPEAT_WINDOW_MS {
                debug!("Repeat window missed, new sequence");
                reset_gesture(host);
            }
            start_press(host, press.time, queue);
        }
        GestureState::Pressed { .. } => {}
    }
}

fn start_press<H: ButtonHost>(host: &mut H, time: u32, queue: &EventQueue) {
    let button = host.button();
    button.presses = button.presses.saturating_add(1);
    button.state = GestureState::Pressed { since: time };
    button.hold_fired = false;
    let id = arm(host, HOLD_MS, on_hold_timer::<H>, false, queue);
    host.button().hold_timer = id;
}

pub fn on_button_up<H: ButtonHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ButtonUp(press) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let hold = host.button().hold_timer.take();
    cancel(host, hold);

    let button = host.button();
    let GestureState::Pressed { since } = button.state else {
        return;
    };
    if button.hold_fired {
        reset_gesture(host);
        return;
    }
    let held = press.time.wrapping_sub(since);
    if !(CLICK_MIN_MS..=CLICK_MAX_MS).contains(&held) {
        debug!("Press of {} ms is not a click", held);
        reset_gesture(host);
        return;
    }
    button.state = GestureState::Released { since: press.time };
    let id = arm(host, REPEAT_WINDOW_MS, on_repeat_timer::<H>, false, queue);
    host.button().repeat_timer = id;
}

/// Press held long enough: report the hold while the button is still down.
pub fn on_hold_timer<H: ButtonHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let button = host.button();
    button.hold_timer = None;
    if let GestureState::Pressed { .. } = button.state {
        button.hold_fired = true;
        if queue.push(Event::ButtonHold(button.presses)).is_err() {
            warn!("Event queue full, ButtonHold dropped");
        }
    }
}

/// No further press within the window: the click sequence is complete.
pub fn on_repeat_timer<H: ButtonHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let button = host.button();
    button.repeat_timer = None;
    if let GestureState::Released { .. } = button.state {
        if queue.push(Event::ButtonClick(button.presses)).is_err() {
            warn!("Event queue full, ButtonClick dropped");
        }
        reset_gesture(host);
    }
}

fn reset_gesture<H: ButtonHost>(host: &mut H) {
    let button = host.button();
    let (hold, repeat) = (button.hold_timer, button.repeat_timer);
    button.clear_gesture();
    cancel(host, hold);
    cancel(host, repeat);
}

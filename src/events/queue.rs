//! Interrupt-safe bounded event FIFO.
//!
//! Interrupt handlers push, the main loop pops.  Every access goes through
//! a `critical_section::with` block that covers only the deque operation
//! itself, never dispatch.  The queue is `const`-constructible so firmware
//! can keep it in a `static` shared with its interrupt handlers:
//!
//! ```ignore
//! static EVENTS: EventQueue = EventQueue::new();
//!
//! fn systick_isr(tick: u32) {
//!     let _ = EVENTS.push(Event::SysTick(tick));
//! }
//! ```
//!
//! One slot beyond [`capacity`](EventQueue::capacity) is held back for
//! [`fault`](EventQueue::fault), so an escalation raised while the queue is
//! saturated still reaches the board-mode controller.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use heapless::Deque;
use log::error;

use crate::config::EVENT_QUEUE_CAPACITY;
use crate::error::{BusError, EmergencyFault};

use super::Event;

/// Process-wide fault escalation hook.
pub type FaultHook = fn(EmergencyFault);

/// Storage size: the ordinary capacity plus the slot kept for faults.
const SLOTS: usize = EVENT_QUEUE_CAPACITY + 1;

pub struct EventQueue {
    events: Mutex<RefCell<Deque<Event, SLOTS>>>,
    /// Pushes rejected because the queue was full.
    dropped: Mutex<Cell<u32>>,
    fault_hook: Mutex<Cell<Option<FaultHook>>>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(RefCell::new(Deque::new())),
            dropped: Mutex::new(Cell::new(0)),
            fault_hook: Mutex::new(Cell::new(None)),
        }
    }

    /// Append an event at the tail.
    ///
    /// Safe to call from interrupt context.  On `QueueFull` the event is
    /// dropped and the queue is left untouched; callers either ignore the
    /// loss or retry on their next sample.
    pub fn push(&self, event: Event) -> Result<(), BusError> {
        self.push_within(event, EVENT_QUEUE_CAPACITY)
    }

    fn push_within(&self, event: Event, limit: usize) -> Result<(), BusError> {
        critical_section::with(|cs| {
            let mut events = self.events.borrow_ref_mut(cs);
            if events.len() >= limit || events.push_back(event).is_err() {
                let dropped = self.dropped.borrow(cs);
                dropped.set(dropped.get().wrapping_add(1));
                return Err(BusError::QueueFull);
            }
            Ok(())
        })
    }

    /// Remove the oldest event.  Main loop only.
    pub(crate) fn pop(&self) -> Option<Event> {
        critical_section::with(|cs| self.events.borrow_ref_mut(cs).pop_front())
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.events.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of ordinary events the queue holds.  A pending fault
    /// may occupy one further slot.
    pub const fn capacity(&self) -> usize {
        EVENT_QUEUE_CAPACITY
    }

    /// Total pushes rejected since construction.
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }

    /// Install the hook called synchronously on every fault escalation.
    pub fn set_fault_hook(&self, hook: FaultHook) {
        critical_section::with(|cs| self.fault_hook.borrow(cs).set(Some(hook)));
    }

    /// Escalate an unrecoverable condition.
    ///
    /// Calls the installed hook, then publishes `EmergencyFault(code)` so the
    /// board-mode controller moves to `Fault` through the normal event path.
    /// The publish may use the reserved slot.  Only when that slot is taken
    /// as well, which means a fault is already pending, is the event
    /// dropped; the drop is counted and logged.
    pub fn fault(&self, code: EmergencyFault) {
        error!("Emergency fault: {}", code);
        let hook = critical_section::with(|cs| self.fault_hook.borrow(cs).get());
        if let Some(hook) = hook {
            hook(code);
        }
        if self.push_within(Event::EmergencyFault(code), SLOTS).is_err() {
            error!("Event queue saturated, fault {} not queued", code);
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

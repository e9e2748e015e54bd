//! Software timer multiplexer.
//!
//! A fixed table of one-shot and repeating countdown timers, advanced by
//! the `SysTick` event.  Expiry callbacks run on the main loop from inside
//! tick processing, never from interrupt context, and may freely arm or
//! cancel timers (including their own) or publish events.
//!
//! Callbacks receive the owning context through [`TimerHost`], so a
//! module's timer handler reaches the same state its event handlers do:
//!
//! ```text
//!  SysTick ──▶ on_system_tick ──▶ advance ──▶ slot expired? ──▶ callback(ctx)
//! ```
//!
//! Cancellation is total: once `cancel_timer` returns, that timer's
//! callback never runs again, even if the tick pass in progress has not
//! reached its slot yet.

use core::num::NonZeroU8;

use log::{debug, trace};

use crate::config::MAX_TIMERS;
use crate::error::{EmergencyFault, TimerError};
use crate::events::{Event, EventQueue};

/// Expiry callback; receives the tick counter of the expiring pass.
pub type TimerCallback<C> = fn(&mut C, u32, &EventQueue);

/// Handle to an armed timer.  Never zero; unique among live timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(NonZeroU8);

impl TimerId {
    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

struct TimerSlot<C> {
    id: TimerId,
    remaining: u32,
    period: u32,
    callback: TimerCallback<C>,
    repeat: bool,
    /// Armed during the current tick pass; skip its countdown until the next.
    fresh: bool,
}

/// Fixed-capacity timer table.
pub struct TimerService<C> {
    slots: [Option<TimerSlot<C>>; MAX_TIMERS],
    next_id: u8,
    in_tick: bool,
}

/// Implemented by the context that owns the [`TimerService`], so tick
/// processing can hand that same context to each callback.
pub trait TimerHost: Sized {
    fn timers(&mut self) -> &mut TimerService<Self>;
}

impl<C> TimerService<C> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            next_id: 1,
            in_tick: false,
        }
    }

    /// Arm a timer that fires after `timeout` ticks, and every `timeout`
    /// ticks after that when `repeat` is set.
    pub fn set_timer(
        &mut self,
        timeout: u32,
        callback: TimerCallback<C>,
        repeat: bool,
    ) -> Result<TimerId, TimerError> {
        if timeout == 0 {
            return Err(TimerError::InvalidTimeout);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(TimerError::TableFull)?;
        let id = self.allocate_id();
        self.slots[index] = Some(TimerSlot {
            id,
            remaining: timeout,
            period: timeout,
            callback,
            repeat,
            fresh: self.in_tick,
        });
        debug!("timer {} armed: {} ticks, repeat={}", id.get(), timeout, repeat);
        Ok(id)
    }

    /// Deactivate a timer.  Unknown or already-expired ids are reported,
    /// never escalated.
    pub fn cancel_timer(&mut self, id: TimerId) -> Result<(), TimerError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|t| t.id == id))
            .ok_or(TimerError::UnknownTimer)?;
        *slot = None;
        debug!("timer {} cancelled", id.get());
        Ok(())
    }

    pub fn is_timer_active(&self, id: TimerId) -> bool {
        self.find(id).is_some()
    }

    /// Ticks left before `id` expires.
    pub fn remaining(&self, id: TimerId) -> Option<u32> {
        self.find(id).map(|t| t.remaining)
    }

    pub fn is_repeating(&self, id: TimerId) -> bool {
        self.find(id).is_some_and(|t| t.repeat)
    }

    /// Number of armed timers.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub const fn capacity(&self) -> usize {
        MAX_TIMERS
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.slots = core::array::from_fn(|_| None);
        self.in_tick = false;
    }

    // ── Internal ──────────────────────────────────────────────

    fn find(&self, id: TimerId) -> Option<&TimerSlot<C>> {
        self.slots.iter().flatten().find(|t| t.id == id)
    }

    fn allocate_id(&mut self) -> TimerId {
        // A free slot exists, so at most MAX_TIMERS - 1 ids are live and the
        // search ends well within one lap of the u8 space.
        loop {
            let candidate = NonZeroU8::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(raw) = candidate {
                let id = TimerId(raw);
                if self.find(id).is_none() {
                    return id;
                }
            }
        }
    }

    /// Decrement slot `index`; returns its callback if it reached zero.
    fn countdown(&mut self, index: usize) -> Option<(TimerId, TimerCallback<C>)> {
        let slot = self.slots[index].as_mut()?;
        if slot.fresh {
            return None;
        }
        slot.remaining = slot.remaining.saturating_sub(1);
        (slot.remaining == 0).then_some((slot.id, slot.callback))
    }

    /// Reload or free slot `index` after its callback ran, unless the
    /// callback already cancelled or re-armed it.
    fn complete(&mut self, index: usize, id: TimerId) {
        let entry = &mut self.slots[index];
        let Some(slot) = entry.as_mut() else {
            return;
        };
        if slot.id != id || slot.remaining != 0 {
            return;
        }
        if slot.repeat {
            slot.remaining = slot.period;
        } else {
            *entry = None;
        }
    }

    fn begin_tick(&mut self) {
        self.in_tick = true;
    }

    fn end_tick(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.fresh = false;
        }
        self.in_tick = false;
    }
}

impl<C> Default for TimerService<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one tick pass over every slot of the host's timer table.
pub fn advance<C: TimerHost>(ctx: &mut C, tick: u32, queue: &EventQueue) {
    ctx.timers().begin_tick();
    for index in 0..MAX_TIMERS {
        let Some((id, callback)) = ctx.timers().countdown(index) else {
            continue;
        };
        trace!("timer {} expired at tick {}", id.get(), tick);
        callback(ctx, tick, queue);
        ctx.timers().complete(index, id);
    }
    ctx.timers().end_tick();
}

/// `SysTick` subscriber.
pub fn on_system_tick<C: TimerHost>(ctx: &mut C, event: &Event, queue: &EventQueue) {
    match event {
        Event::SysTick(tick) => advance(ctx, *tick, queue),
        _ => queue.fault(EmergencyFault::InvalidEvent),
    }
}

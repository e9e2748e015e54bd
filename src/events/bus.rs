//! Subscriber registry and synchronous dispatch.
//!
//! Handlers are plain function pointers, the same shape as an FSM action
//! table: no heap, no `dyn`, no captured state.  Every handler receives the
//! owned device context `C`, the event, and the queue so it can publish
//! follow-up events.  A handler never sees the bus itself, which makes
//! recursive dispatch impossible to express.

use heapless::Vec;
use log::{error, trace};

use crate::config::MAX_SUBSCRIPTIONS;
use crate::error::{BusError, EmergencyFault};

use super::{Event, EventKind, EventQueue};

/// Signature for an event subscriber.
pub type EventHandler<C> = fn(&mut C, &Event, &EventQueue);

struct Subscription<C> {
    kind: EventKind,
    handler: EventHandler<C>,
}

/// Fixed-capacity registry of `(kind, handler)` pairs.
pub struct EventBus<C> {
    subscriptions: Vec<Subscription<C>, MAX_SUBSCRIPTIONS>,
}

impl<C> EventBus<C> {
    pub const fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Register `handler` for every event of `kind`.
    ///
    /// Handlers for the same kind run in registration order.  Exhausting
    /// the table is a configuration bug, so besides returning
    /// `SubscriptionsFull` it escalates an `Overflow` fault.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: EventHandler<C>,
        queue: &EventQueue,
    ) -> Result<(), BusError> {
        if self.subscriptions.push(Subscription { kind, handler }).is_err() {
            error!("Subscription table full, {:?} handler rejected", kind);
            queue.fault(EmergencyFault::Overflow);
            return Err(BusError::SubscriptionsFull);
        }
        Ok(())
    }

    /// Pop the oldest event and deliver it to every subscriber of its kind.
    ///
    /// Returns the delivered event, or `None` when the queue is empty.
    pub fn pop_and_notify(&self, queue: &EventQueue, ctx: &mut C) -> Option<Event> {
        let event = queue.pop()?;
        let kind = event.kind();
        trace!("dispatch {:?}", kind);
        for sub in self.subscriptions.iter().filter(|s| s.kind == kind) {
            (sub.handler)(ctx, &event, queue);
        }
        Some(event)
    }

    /// Dispatch until the queue is empty, including events published by
    /// the handlers themselves.  Returns the number of events delivered.
    pub fn drain(&self, queue: &EventQueue, ctx: &mut C) -> usize {
        let mut delivered = 0;
        while self.pop_and_notify(queue, ctx).is_some() {
            delivered += 1;
        }
        delivered
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.iter().filter(|s| s.kind == kind).count()
    }

    /// Total registrations across all kinds.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        MAX_SUBSCRIPTIONS
    }
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

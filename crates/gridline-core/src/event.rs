//! Buffered event delivery.
//!
//! Events are emitted while a mutation runs and handed out only after it
//! returns. Listeners receive `&E` and nothing else, so a listener can never
//! reach back into the system that produced the event while that system is
//! mid-update.
//!
//! Alongside the pending queue the bus keeps a bounded [`EventBuffer`] of
//! recent history for inspection and debugging.

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer. When full, the oldest entry is dropped.
#[derive(Debug, Clone)]
pub struct EventBuffer<E> {
    events: VecDeque<E>,
    capacity: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl<E> EventBuffer<E> {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: E) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.events.len() as u64)
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &E> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only, in emission order.
pub type Listener<E> = Box<dyn FnMut(&E)>;

/// Pending-event queue with listeners and a bounded history.
///
/// Unlike the history ring, the pending queue never drops: every emitted
/// event is delivered exactly once by [`EventBus::deliver`].
pub struct EventBus<E> {
    pending: Vec<E>,
    history: EventBuffer<E>,
    listeners: Vec<Listener<E>>,
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E: Clone> EventBus<E> {
    /// Create a bus whose history ring holds `history_capacity` events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: EventBuffer::new(history_capacity),
            listeners: Vec::new(),
        }
    }

    /// Queue an event for the next delivery.
    pub fn emit(&mut self, event: E) {
        self.history.push(event.clone());
        self.pending.push(event);
    }

    /// Register a passive listener, called for each event on delivery.
    pub fn subscribe(&mut self, listener: Listener<E>) {
        self.listeners.push(listener);
    }

    /// Hand every pending event to the listeners, then return them in order.
    pub fn deliver(&mut self) -> Vec<E> {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for listener in &mut self.listeners {
                listener(event);
            }
        }
        events
    }

    /// Events emitted but not yet delivered.
    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    /// Recent events, including already delivered ones.
    pub fn history(&self) -> &EventBuffer<E> {
        &self.history
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

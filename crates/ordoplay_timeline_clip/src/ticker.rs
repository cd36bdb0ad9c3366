// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tick source delivering elapsed time to subscribers.
//!
//! Subscriptions are scoped: [`Ticker::subscribe`] returns a
//! [`TickSubscription`] that unsubscribes when dropped. Callbacks are invoked
//! in subscription order, outside the registry lock, so a callback may drop
//! subscriptions (including its own).

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// One tick of the display clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickEvent {
    /// Milliseconds since the previous tick
    pub elapsed_ms: f64,
    /// Tick counter, starting at 1
    pub sequence: u64,
}

type Callback = Arc<dyn Fn(&TickEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    subscribers: IndexMap<u64, Callback>,
    next_id: u64,
    sequence: u64,
    last_tick: Option<Instant>,
}

/// Publish/subscribe tick source
#[derive(Clone, Default)]
pub struct Ticker {
    registry: Arc<Mutex<Registry>>,
}

impl Ticker {
    /// Create a ticker with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to ticks until the returned guard is dropped
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> TickSubscription
    where
        F: Fn(&TickEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, Arc::new(callback));

        TickSubscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Deliver a tick with an explicit elapsed time
    pub fn tick(&self, elapsed_ms: f64) -> TickEvent {
        let (event, callbacks) = {
            let mut registry = self.registry.lock();
            registry.sequence += 1;
            registry.last_tick = Some(Instant::now());
            let event = TickEvent {
                elapsed_ms,
                sequence: registry.sequence,
            };
            let callbacks: Vec<Callback> = registry.subscribers.values().cloned().collect();
            (event, callbacks)
        };

        for callback in callbacks {
            callback(&event);
        }
        event
    }

    /// Deliver a tick using the wall-clock time since the previous tick
    pub fn tick_now(&self) -> TickEvent {
        let elapsed_ms = self
            .registry
            .lock()
            .last_tick
            .map(|last| last.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.tick(elapsed_ms)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

/// Scoped tick subscription; unsubscribes on drop
pub struct TickSubscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl TickSubscription {
    /// Whether the ticker still exists and holds this subscription
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().subscribers.contains_key(&self.id))
    }
}

impl Drop for TickSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().subscribers.shift_remove(&self.id);
        }
    }
}

impl std::fmt::Debug for TickSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

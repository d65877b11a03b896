//! Notification bus towards the UI (time slider, layer switcher).
//!
//! Architecture:
//! - Subscribers register callbacks, invoked immediately on `emit()`
//! - `emit()` also queues the notification for deferred `poll()` in the
//!   host's main loop
//!
//! Callback order: FIFO (first-subscribed, first-called).

use log::warn;
use std::sync::{Arc, Mutex, RwLock};

use crate::entities::{IntervalSnapshot, LoadId, Millis};

/// Maximum notifications in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Advisory report of one failed fetch
#[derive(Debug, Clone, PartialEq)]
pub struct LoadErrorParams {
    pub load_id: LoadId,
    pub layer_id: String,
    pub sample_time: Millis,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A new session replaced the previous one
    Reload { load_id: LoadId },
    /// Full interval table, ordered by end time
    IntervalsChanged {
        load_id: LoadId,
        intervals: Vec<IntervalSnapshot>,
    },
    /// Every interval of the session settled (once per session)
    Loaded { load_id: LoadId },
    /// Lazy strategy: nothing pending or errored in the window
    Ready { load_id: LoadId },
    LoadError(LoadErrorParams),
    TimeChanged { time: Millis },
    PlayStateChanged { playing: bool },
}

type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Callback>>>,
    queue: Arc<Mutex<Vec<Notification>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every notification
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Invoke callbacks immediately and queue for `poll()`
    pub fn emit(&self, notification: Notification) {
        // Clone the list so callbacks may subscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for cb in &callbacks {
            cb(&notification);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} notifications), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(notification);
    }

    /// Take everything emitted since the last poll
    pub fn poll(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe(move |n| {
            if matches!(n, Notification::Reload { .. }) {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.emit(Notification::Reload { load_id: LoadId(1) });
        bus.emit(Notification::TimeChanged { time: 5 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_queues_for_poll() {
        let bus = EventBus::new();
        bus.emit(Notification::Loaded { load_id: LoadId(1) });
        bus.emit(Notification::PlayStateChanged { playing: true });
        assert_eq!(bus.poll().len(), 2);
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        for t in 0..(MAX_QUEUE_SIZE as Millis + 1) {
            bus.emit(Notification::TimeChanged { time: t });
        }
        let polled = bus.poll();
        assert_eq!(polled.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(polled.last(), Some(&Notification::TimeChanged { time: MAX_QUEUE_SIZE as Millis }));
    }
}

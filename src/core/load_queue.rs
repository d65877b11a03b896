//! Async load queue - orders pending (overlay, frame) fetches and releases
//! them under a concurrency cap.
//!
//! Ordering: items at or after the current animation time come first, then
//! items before it; within each side the closest to the current time wins.
//! Ties keep insertion order (stable sort).
//!
//! The "worker pool" is just a counter of outstanding requests: `pop_ready`
//! hands out work while `in_flight < max_concurrency`, `complete` frees a slot.

use log::trace;
use std::collections::VecDeque;

use crate::entities::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadQueueItem {
    pub overlay_index: usize,
    pub frame_index: usize,
    pub sample_time: Millis,
}

#[derive(Debug, Clone)]
pub struct LoadQueue {
    items: VecDeque<LoadQueueItem>,
    in_flight: usize,
    max_concurrency: usize,
}

/// Sort key: (before current time?, distance to current time)
fn priority(item: &LoadQueueItem, current: Millis) -> (bool, Millis) {
    (item.sample_time < current, (item.sample_time - current).abs())
}

impl LoadQueue {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            items: VecDeque::new(),
            in_flight: 0,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn push(&mut self, item: LoadQueueItem) {
        self.items.push_back(item);
    }

    pub fn extend<I: IntoIterator<Item = LoadQueueItem>>(&mut self, items: I) {
        self.items.extend(items);
    }

    /// Queue only the newest item for an overlay, dropping any still-queued one
    pub fn replace_for_overlay(&mut self, item: LoadQueueItem) {
        self.items.retain(|i| i.overlay_index != item.overlay_index);
        self.items.push_back(item);
    }

    pub fn remove_overlay(&mut self, overlay_index: usize) {
        self.items.retain(|i| i.overlay_index != overlay_index);
    }

    /// Re-sort pending items around the current animation time
    pub fn prioritize(&mut self, current: Millis) {
        self.items
            .make_contiguous()
            .sort_by_key(|item| priority(item, current));
    }

    /// Next item to dispatch if a slot is free. Counts it as in flight.
    pub fn pop_ready(&mut self) -> Option<LoadQueueItem> {
        if self.in_flight >= self.max_concurrency {
            return None;
        }
        let item = self.items.pop_front()?;
        self.in_flight += 1;
        trace!(
            "Dispatch overlay {} frame {} @{} ({}/{} in flight)",
            item.overlay_index,
            item.frame_index,
            item.sample_time,
            self.in_flight,
            self.max_concurrency
        );
        Some(item)
    }

    /// One outstanding request finished (success or error)
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn pending(&self) -> usize {
        self.items.len()
    }

    pub fn is_idle(&self) -> bool {
        self.items.is_empty() && self.in_flight == 0
    }

    pub fn contains_overlay(&self, overlay_index: usize) -> bool {
        self.items.iter().any(|i| i.overlay_index == overlay_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadQueueItem> {
        self.items.iter()
    }
}

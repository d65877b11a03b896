//! Load sessions and their generation ids.
//!
//! A session owns the interval table and load queue of one scheduling
//! episode. On reload the whole value is replaced; nothing from the new
//! session ever touches the old one. Every fetch carries the session's
//! [`LoadId`] and completions tagged with any other id are dropped.

use log::debug;

use super::load_queue::LoadQueue;
use crate::entities::{IntervalTable, LoadId, Millis};

/// Hands out strictly increasing load ids seeded from the wall clock
#[derive(Debug, Clone, Default)]
pub struct LoadIdAllocator {
    last: u64,
}

impl LoadIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id: the wall-clock timestamp, bumped past the previous id if the
    /// clock stalled or went backwards.
    pub fn next(&mut self, wall_clock: Millis) -> LoadId {
        let id = (wall_clock.max(0) as u64).max(self.last + 1);
        self.last = id;
        LoadId(id)
    }

    pub fn last(&self) -> LoadId {
        LoadId(self.last)
    }
}

/// Current scheduling episode
#[derive(Debug, Clone)]
pub struct Session {
    pub load_id: LoadId,
    pub intervals: IntervalTable,
    pub queue: LoadQueue,
}

impl Session {
    pub fn new(load_id: LoadId, intervals: IntervalTable, max_concurrency: usize) -> Self {
        debug!(
            "Session {} created: {} intervals, concurrency {}",
            load_id,
            intervals.len(),
            max_concurrency
        );
        Self {
            load_id,
            intervals,
            queue: LoadQueue::new(max_concurrency),
        }
    }

    /// Placeholder before the first build
    pub fn empty(max_concurrency: usize) -> Self {
        Self {
            load_id: LoadId(0),
            intervals: IntervalTable::new(),
            queue: LoadQueue::new(max_concurrency),
        }
    }

    pub fn is_current(&self, load_id: LoadId) -> bool {
        self.load_id == load_id
    }
}

/// Tracks which session last reached "finished" so `loaded` fires once
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishTracker {
    finished_id: LoadId,
}

impl FinishTracker {
    /// Mark `session` finished. True the first time for a given newer id.
    pub fn mark(&mut self, load_id: LoadId) -> bool {
        if load_id > self.finished_id {
            self.finished_id = load_id;
            true
        } else {
            false
        }
    }

    pub fn finished_id(&self) -> LoadId {
        self.finished_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut alloc = LoadIdAllocator::new();
        let a = alloc.next(1_000);
        let b = alloc.next(1_000);
        let c = alloc.next(900);
        let d = alloc.next(5_000);
        assert_eq!(a, LoadId(1_000));
        assert!(b > a && c > b && d > c);
        assert_eq!(d, LoadId(5_000));
        assert_eq!(alloc.last(), d);
    }

    #[test]
    fn test_finish_fires_once() {
        let mut f = FinishTracker::default();
        assert!(f.mark(LoadId(5)));
        assert!(!f.mark(LoadId(5)));
        assert!(!f.mark(LoadId(3)));
        assert!(f.mark(LoadId(6)));
        assert_eq!(f.finished_id(), LoadId(6));
    }

    #[test]
    fn test_is_current() {
        let s = Session::new(LoadId(7), IntervalTable::new(), 2);
        assert!(s.is_current(LoadId(7)));
        assert!(!s.is_current(LoadId(6)));
        assert_eq!(s.queue.max_concurrency(), 2);
    }
}

//! Interval status table.
//!
//! One record per distinct sample end time across every overlay of a
//! session, kept sorted by `end_time`. Load callbacks only ever increment
//! counters or set sticky flags, so the final table does not depend on the
//! order completions arrive in.

use log::trace;
use serde::{Deserialize, Serialize};

use super::time::Millis;

/// Load state of one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntervalStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Error,
}

impl IntervalStatus {
    /// Terminal for the session (no further transition except into Error)
    pub fn is_settled(self) -> bool {
        matches!(self, IntervalStatus::Ready | IntervalStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub begin_time: Millis,
    pub end_time: Millis,
    pub status: IntervalStatus,
    pub loaded: u32,
    pub to_be_loaded: u32,
}

/// Row published to the UI status sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSnapshot {
    pub begin_time: Millis,
    pub end_time: Millis,
    pub status: IntervalStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalTable {
    records: Vec<IntervalRecord>,
}

impl IntervalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-overlay sample lists. `fallback_span` is used as the
    /// length of the very first interval.
    pub fn build<'a, I>(overlays: I, fallback_span: Millis) -> Self
    where
        I: IntoIterator<Item = &'a [Millis]>,
    {
        let mut table = Self::new();
        for samples in overlays {
            for &t in samples {
                table.insert_sample(t);
            }
        }
        table.link_begin_times(fallback_span);
        table
    }

    /// Insert-or-increment the record ending at `end_time`
    pub fn insert_sample(&mut self, end_time: Millis) {
        match self.records.binary_search_by_key(&end_time, |r| r.end_time) {
            Ok(idx) => self.records[idx].to_be_loaded += 1,
            Err(idx) => self.records.insert(
                idx,
                IntervalRecord {
                    begin_time: end_time,
                    end_time,
                    status: IntervalStatus::Unloaded,
                    loaded: 0,
                    to_be_loaded: 1,
                },
            ),
        }
    }

    /// Each interval begins where the previous one ends
    fn link_begin_times(&mut self, fallback_span: Millis) {
        let mut prev_end: Option<Millis> = None;
        for record in &mut self.records {
            record.begin_time = prev_end.unwrap_or(record.end_time - fallback_span.max(0));
            prev_end = Some(record.end_time);
        }
    }

    fn record_mut(&mut self, sample_time: Millis) -> Option<&mut IntervalRecord> {
        let idx = self
            .records
            .binary_search_by_key(&sample_time, |r| r.end_time)
            .ok();
        if idx.is_none() {
            trace!("No interval ends at {}", sample_time);
        }
        idx.map(|i| &mut self.records[i])
    }

    /// unloaded -> loading. Returns true if the table changed.
    pub fn on_load_start(&mut self, sample_time: Millis) -> bool {
        match self.record_mut(sample_time) {
            Some(r) if r.status == IntervalStatus::Unloaded => {
                r.status = IntervalStatus::Loading;
                true
            }
            _ => false,
        }
    }

    /// One fetch for this interval finished. Ready once every fetch is in
    /// and none failed.
    pub fn on_load_end(&mut self, sample_time: Millis) -> bool {
        let Some(r) = self.record_mut(sample_time) else {
            return false;
        };
        let before = r.clone();
        r.loaded = (r.loaded + 1).min(r.to_be_loaded);
        if r.status != IntervalStatus::Error && r.loaded >= r.to_be_loaded {
            r.status = IntervalStatus::Ready;
        } else if r.status == IntervalStatus::Unloaded {
            r.status = IntervalStatus::Loading;
        }
        *r != before
    }

    /// Sticky for the rest of the session
    pub fn on_load_error(&mut self, sample_time: Millis) -> bool {
        match self.record_mut(sample_time) {
            Some(r) if r.status != IntervalStatus::Error => {
                r.status = IntervalStatus::Error;
                true
            }
            _ => false,
        }
    }

    pub fn records(&self) -> &[IntervalRecord] {
        &self.records
    }

    pub fn get(&self, end_time: Millis) -> Option<&IntervalRecord> {
        self.records
            .binary_search_by_key(&end_time, |r| r.end_time)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record ready or error. An empty table is never finished.
    pub fn is_finished(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.status.is_settled())
    }

    pub fn has_status(&self, status: IntervalStatus) -> bool {
        self.records.iter().any(|r| r.status == status)
    }

    /// (loaded, to_be_loaded) summed over all records
    pub fn progress(&self) -> (u32, u32) {
        self.records
            .iter()
            .fold((0, 0), |(l, t), r| (l + r.loaded, t + r.to_be_loaded))
    }

    pub fn snapshot(&self) -> Vec<IntervalSnapshot> {
        self.records
            .iter()
            .map(|r| IntervalSnapshot {
                begin_time: r.begin_time,
                end_time: r.end_time,
                status: r.status,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> IntervalTable {
        let a: Vec<Millis> = vec![100, 200, 300];
        let b: Vec<Millis> = vec![200, 250];
        IntervalTable::build([a.as_slice(), b.as_slice()], 100)
    }

    #[test]
    fn test_build_sorted_and_counted() {
        let t = table();
        let ends: Vec<Millis> = t.records().iter().map(|r| r.end_time).collect();
        assert_eq!(ends, vec![100, 200, 250, 300]);
        assert_eq!(t.get(200).unwrap().to_be_loaded, 2);
        assert_eq!(t.get(100).unwrap().begin_time, 0);
        assert_eq!(t.get(250).unwrap().begin_time, 200);
    }

    #[test]
    fn test_ready_needs_all_loads() {
        let mut t = table();
        assert!(t.on_load_start(200));
        assert!(!t.on_load_start(200));
        assert!(t.on_load_end(200));
        assert_eq!(t.get(200).unwrap().status, IntervalStatus::Loading);
        assert!(t.on_load_end(200));
        assert_eq!(t.get(200).unwrap().status, IntervalStatus::Ready);
        // capped
        assert!(!t.on_load_end(200));
        assert_eq!(t.get(200).unwrap().loaded, 2);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut t = table();
        t.on_load_start(200);
        assert!(t.on_load_error(200));
        t.on_load_end(200);
        t.on_load_end(200);
        assert_eq!(t.get(200).unwrap().status, IntervalStatus::Error);
        assert!(!t.on_load_start(200));
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        #[derive(Clone, Copy)]
        enum Ev {
            End(Millis),
            Err(Millis),
        }
        let events = [Ev::End(200), Ev::Err(200), Ev::End(100), Ev::End(300), Ev::End(250)];
        let apply = |order: &[usize]| {
            let mut t = table();
            for &i in order {
                match events[i] {
                    Ev::End(s) => t.on_load_end(s),
                    Ev::Err(s) => t.on_load_error(s),
                };
            }
            t
        };
        let reference = apply(&[0, 1, 2, 3, 4]);
        for order in [[4, 3, 2, 1, 0], [1, 0, 3, 4, 2], [2, 4, 1, 3, 0]] {
            assert_eq!(apply(&order), reference);
        }
        assert_eq!(reference.get(200).unwrap().status, IntervalStatus::Error);
        assert!(reference.is_finished());
    }

    #[test]
    fn test_finished_and_progress() {
        let mut t = table();
        assert!(!t.is_finished());
        for s in [100, 200, 200, 250, 300] {
            t.on_load_end(s);
        }
        assert!(t.is_finished());
        assert_eq!(t.progress(), (5, 5));
        assert!(!IntervalTable::new().is_finished());
    }

    #[test]
    fn test_unknown_sample_is_ignored() {
        let mut t = table();
        assert!(!t.on_load_start(999));
        assert!(!t.on_load_end(999));
        assert!(!t.on_load_error(999));
    }
}

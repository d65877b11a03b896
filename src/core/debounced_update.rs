//! Debounced view updates - coalesce bursts of interaction into one
//! governor evaluation.
//!
//! Every `schedule` replaces the pending payload and restarts the timer, so a
//! burst of pan/zoom/visibility events yields a single evaluation using the
//! latest parameters once the window has been quiet for `delay`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DebouncedUpdate<T> {
    delay: Duration,
    /// Pending payload and the instant it becomes due
    pending: Option<(T, Instant)>,
}

impl<T> Default for DebouncedUpdate<T> {
    fn default() -> Self {
        Self::new(50)
    }
}

impl<T> DebouncedUpdate<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay = Duration::from_millis(delay_ms);
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// Schedule `payload`, restarting the debounce window
    pub fn schedule(&mut self, payload: T) {
        self.schedule_at(payload, Instant::now());
    }

    pub fn schedule_at(&mut self, payload: T, now: Instant) {
        self.pending = Some((payload, now + self.delay));
        log::trace!("DebouncedUpdate: scheduled in {}ms", self.delay.as_millis());
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::trace!("DebouncedUpdate: cancelled");
        }
    }

    /// Payload if the window has elapsed; clears the pending state
    pub fn tick(&mut self) -> Option<T> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(payload, _)| payload),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(payload, _)| payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_no_trigger() {
        let mut d = DebouncedUpdate::new(100);
        d.schedule(1);
        assert!(d.is_pending());
        assert!(d.tick().is_none());
    }

    #[test]
    fn test_trigger_after_delay() {
        let mut d = DebouncedUpdate::new(10);
        d.schedule("a");
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(d.tick(), Some("a"));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_burst_coalesces_to_latest() {
        let t0 = Instant::now();
        let mut d = DebouncedUpdate::new(50);
        d.schedule_at("first", t0);
        d.schedule_at("second", t0 + Duration::from_millis(30));

        // first deadline passed, but the window restarted
        assert_eq!(d.tick_at(t0 + Duration::from_millis(60)), None);
        assert_eq!(d.pending(), Some(&"second"));

        assert_eq!(d.tick_at(t0 + Duration::from_millis(80)), Some("second"));
        assert_eq!(d.tick_at(t0 + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_cancel() {
        let t0 = Instant::now();
        let mut d = DebouncedUpdate::new(5);
        d.schedule_at(1, t0);
        d.cancel();
        assert_eq!(d.tick_at(t0 + Duration::from_secs(1)), None);
    }
}

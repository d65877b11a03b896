//! Shared animation time axis.
//!
//! Either a regular grid (begin, end, resolution) or an explicit sorted list
//! of instants. The current animation time always lies inside [begin, end];
//! a degenerate axis (begin after end) pins it to begin and yields no samples.

use log::trace;
use serde::{Deserialize, Serialize};

use super::time::Millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    begin_time: Millis,
    end_time: Millis,
    resolution_time: Millis,
    num_intervals: usize,
    current_time: Millis,
    /// Explicit instants, replaces the regular grid when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    times: Option<Vec<Millis>>,
}

impl TimeAxis {
    /// Regular axis. Current time starts at `begin_time`.
    pub fn new(begin_time: Millis, end_time: Millis, resolution_time: Millis) -> Self {
        let mut axis = Self {
            begin_time,
            end_time,
            resolution_time: resolution_time.max(0),
            num_intervals: 0,
            current_time: begin_time,
            times: None,
        };
        axis.recompute();
        axis
    }

    /// Axis driven by an explicit list of instants (sorted and deduplicated here).
    pub fn from_times(mut times: Vec<Millis>) -> Self {
        times.sort_unstable();
        times.dedup();
        let begin_time = times.first().copied().unwrap_or(0);
        let end_time = times.last().copied().unwrap_or(0);
        let resolution_time = times
            .windows(2)
            .map(|w| w[1] - w[0])
            .min()
            .unwrap_or(0);
        let mut axis = Self {
            begin_time,
            end_time,
            resolution_time,
            num_intervals: 0,
            current_time: begin_time,
            times: Some(times),
        };
        axis.recompute();
        axis
    }

    fn recompute(&mut self) {
        self.num_intervals = match &self.times {
            Some(times) => times.len().saturating_sub(1),
            None if self.resolution_time > 0 && self.end_time >= self.begin_time => {
                ((self.end_time - self.begin_time) / self.resolution_time) as usize
            }
            None => 0,
        };
        self.current_time = self.clamp(self.current_time);
    }

    fn clamp(&self, t: Millis) -> Millis {
        if self.is_degenerate() {
            self.begin_time
        } else {
            t.clamp(self.begin_time, self.end_time)
        }
    }

    pub fn begin_time(&self) -> Millis {
        self.begin_time
    }

    pub fn end_time(&self) -> Millis {
        self.end_time
    }

    pub fn resolution_time(&self) -> Millis {
        self.resolution_time
    }

    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    pub fn current_time(&self) -> Millis {
        self.current_time
    }

    pub fn times(&self) -> Option<&[Millis]> {
        self.times.as_deref()
    }

    /// Begin after end: a valid but empty animation
    pub fn is_degenerate(&self) -> bool {
        self.begin_time > self.end_time
    }

    /// Set current time (clamped). Returns true if it changed.
    pub fn set_animation_time(&mut self, t: Millis) -> bool {
        let t = self.clamp(t);
        if t == self.current_time {
            return false;
        }
        trace!("Animation time: {} -> {}", self.current_time, t);
        self.current_time = t;
        true
    }

    pub fn set_begin_time(&mut self, begin_time: Millis) {
        self.times = None;
        self.begin_time = begin_time;
        self.recompute();
    }

    pub fn set_end_time(&mut self, end_time: Millis) {
        self.times = None;
        self.end_time = end_time;
        self.recompute();
    }

    pub fn set_resolution_time(&mut self, resolution_time: Millis) {
        self.times = None;
        self.resolution_time = resolution_time.max(0);
        self.recompute();
    }

    /// Time the next step lands on, or None when it would run past the end.
    pub fn peek_next(&self) -> Option<Millis> {
        if self.is_degenerate() {
            return None;
        }
        match &self.times {
            Some(times) => times.iter().copied().find(|&t| t > self.current_time),
            None if self.resolution_time > 0 => {
                let next = self.current_time + self.resolution_time;
                (next <= self.end_time).then_some(next)
            }
            None => None,
        }
    }

    /// Time the previous step lands on, or None when it would run before begin.
    pub fn peek_previous(&self) -> Option<Millis> {
        if self.is_degenerate() {
            return None;
        }
        match &self.times {
            Some(times) => times.iter().rev().copied().find(|&t| t < self.current_time),
            None if self.resolution_time > 0 => {
                let prev = self.current_time - self.resolution_time;
                (prev >= self.begin_time).then_some(prev)
            }
            None => None,
        }
    }

    /// Step forward, wrapping to begin after end. Returns true if time changed.
    pub fn next(&mut self) -> bool {
        let target = self.peek_next().unwrap_or(self.begin_time);
        self.set_animation_time(target)
    }

    /// Step backward, wrapping to end before begin. Returns true if time changed.
    pub fn previous(&mut self) -> bool {
        let target = self.peek_previous().unwrap_or(self.end_time);
        self.set_animation_time(target)
    }

    /// Whether the current time is the last step of the axis
    pub fn at_end(&self) -> bool {
        self.peek_next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_axis() {
        let axis = TimeAxis::new(0, 3_600_000, 900_000);
        assert_eq!(axis.num_intervals(), 4);
        assert_eq!(axis.current_time(), 0);
    }

    #[test]
    fn test_next_wraps() {
        let mut axis = TimeAxis::new(0, 300, 100);
        assert!(axis.next());
        assert!(axis.next());
        assert!(axis.next());
        assert_eq!(axis.current_time(), 300);
        assert!(axis.at_end());
        assert!(axis.next());
        assert_eq!(axis.current_time(), 0);
    }

    #[test]
    fn test_previous_wraps() {
        let mut axis = TimeAxis::new(0, 300, 100);
        assert!(axis.previous());
        assert_eq!(axis.current_time(), 300);
        assert!(axis.previous());
        assert_eq!(axis.current_time(), 200);
    }

    #[test]
    fn test_clamp_and_setters() {
        let mut axis = TimeAxis::new(0, 1000, 100);
        axis.set_animation_time(5000);
        assert_eq!(axis.current_time(), 1000);
        axis.set_end_time(500);
        assert_eq!(axis.current_time(), 500);
        assert_eq!(axis.num_intervals(), 5);
        axis.set_begin_time(600);
        assert!(axis.is_degenerate());
        assert_eq!(axis.current_time(), 600);
        assert_eq!(axis.num_intervals(), 0);
        assert!(!axis.next());
    }

    #[test]
    fn test_explicit_times() {
        let mut axis = TimeAxis::from_times(vec![500, 100, 200, 200]);
        assert_eq!(axis.begin_time(), 100);
        assert_eq!(axis.end_time(), 500);
        assert_eq!(axis.resolution_time(), 100);
        assert_eq!(axis.num_intervals(), 2);
        axis.next();
        assert_eq!(axis.current_time(), 200);
        axis.next();
        assert_eq!(axis.current_time(), 500);
        axis.next();
        assert_eq!(axis.current_time(), 100);
    }
}

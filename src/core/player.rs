//! Playback transport - decides when the animation clock steps.
//!
//! Delay-based: one step every `frame_delay`. When the current time is the
//! last step of the axis the next step (which wraps to the beginning) waits
//! an additional `period_delay`, so a loop visibly rests on its newest frame.
//! With looping disabled playback pauses on the last step instead.
//!
//! `update()` is called from the host's tick; it never blocks.

use log::{info, trace};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Transport {
    playing: bool,
    loop_enabled: bool,
    frame_delay: Duration,
    period_delay: Duration,
    /// Last step timestamp (runtime-only)
    last_step: Option<Instant>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(500, 1000, true)
    }
}

impl Transport {
    pub fn new(frame_delay_ms: u64, period_delay_ms: u64, loop_enabled: bool) -> Self {
        Self {
            playing: false,
            loop_enabled,
            frame_delay: Duration::from_millis(frame_delay_ms),
            period_delay: Duration::from_millis(period_delay_ms),
            last_step: None,
        }
    }

    /// Start playing with the given per-step and end-of-loop delays
    pub fn play(&mut self, delay_ms: u64, period_delay_ms: u64) {
        self.frame_delay = Duration::from_millis(delay_ms);
        self.period_delay = Duration::from_millis(period_delay_ms);
        self.playing = true;
        self.last_step = None;
        info!("Playback started: delay={}ms period_delay={}ms", delay_ms, period_delay_ms);
    }

    pub fn pause(&mut self) {
        if self.playing {
            info!("Playback paused");
        }
        self.playing = false;
        self.last_step = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub fn period_delay(&self) -> Duration {
        self.period_delay
    }

    /// True when the clock should step now. `at_end`: the current time is
    /// the axis' last step.
    pub fn update(&mut self, now: Instant, at_end: bool) -> bool {
        if !self.playing {
            return false;
        }
        if at_end && !self.loop_enabled {
            trace!("Reached end of axis, stopping");
            self.pause();
            return false;
        }

        let Some(last) = self.last_step else {
            self.last_step = Some(now);
            return false;
        };

        let wait = if at_end {
            self.frame_delay + self.period_delay
        } else {
            self.frame_delay
        };
        if now.duration_since(last) >= wait {
            self.last_step = Some(now);
            true
        } else {
            false
        }
    }
}

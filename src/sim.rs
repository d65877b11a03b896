//! Simulated tile renderer for the demo binary and integration tests.
//!
//! Every `load`/`refresh` becomes a job on the fetch pool: it reports
//! `Start`, waits out the configured latency and then reports `End` (or
//! `Error` for every Nth request when failure injection is on). Samples
//! fetched once are remembered in an LRU cache and complete without delay.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::core::workers::Workers;
use crate::entities::{FrameId, FrameRequest, LoadEvent, LoadEventSender, Millis, Renderer};

const CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub latency: Duration,
    /// Fail every Nth request (0 = never)
    pub fail_every: u32,
    pub threads: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(120),
            fail_every: 0,
            threads: (num_cpus::get() * 3 / 4).max(1),
        }
    }
}

/// Renderer-side state of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SimFrame {
    pub layer_id: String,
    pub sample_time: Millis,
    pub opacity: f32,
}

type CacheKey = (String, Millis);

pub struct SimRenderer {
    tx: LoadEventSender,
    options: SimOptions,
    workers: Workers,
    cache: Arc<Mutex<LruCache<CacheKey, ()>>>,
    frames: HashMap<FrameId, SimFrame>,
    requests: u32,
    repaints: u64,
}

impl SimRenderer {
    pub fn new(tx: LoadEventSender, options: SimOptions) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        log::debug!(
            "SimRenderer: latency={}ms fail_every={} threads={}",
            options.latency.as_millis(),
            options.fail_every,
            options.threads
        );
        Self {
            tx,
            workers: Workers::new(options.threads),
            options,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            frames: HashMap::new(),
            requests: 0,
            repaints: 0,
        }
    }

    pub fn frame(&self, id: FrameId) -> Option<&SimFrame> {
        self.frames.get(&id)
    }

    /// Frames with nonzero opacity
    pub fn visible(&self) -> Vec<&SimFrame> {
        let mut v: Vec<&SimFrame> = self.frames.values().filter(|f| f.opacity > 0.0).collect();
        v.sort_by(|a, b| a.layer_id.cmp(&b.layer_id));
        v
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn repaints(&self) -> u64 {
        self.repaints
    }

    fn fetch(&mut self, frame: FrameId, request: &FrameRequest) {
        self.requests += 1;
        if let Some(f) = self.frames.get_mut(&frame) {
            f.sample_time = request.sample_time;
        }
        let fail = self.options.fail_every > 0 && self.requests % self.options.fail_every == 0;

        // Older sessions' queued fetches become no-ops
        self.workers.advance_generation(request.load_id.0);

        let tx = self.tx.clone();
        let cache = Arc::clone(&self.cache);
        let latency = self.options.latency;
        let request = request.clone();
        self.workers.execute_for(request.load_id.0, move || {
            tx.send(LoadEvent::start(&request, frame));
            let key = (request.layer_id.clone(), request.sample_time);
            let cached = cache.lock().map(|mut c| c.get(&key).is_some()).unwrap_or(false);
            if !cached {
                thread::sleep(latency);
            }
            if fail {
                tx.send(LoadEvent::error(&request, frame, "simulated fetch failure"));
                return;
            }
            if let Ok(mut c) = cache.lock() {
                c.put(key, ());
            }
            tx.send(LoadEvent::end(&request, frame));
        });
    }
}

impl Renderer for SimRenderer {
    fn create_frame(&mut self, request: &FrameRequest) -> FrameId {
        let id = FrameId::new();
        self.frames.insert(
            id,
            SimFrame {
                layer_id: request.layer_id.clone(),
                sample_time: request.sample_time,
                opacity: 0.0,
            },
        );
        id
    }

    fn load(&mut self, frame: FrameId, request: &FrameRequest) {
        self.fetch(frame, request);
    }

    fn refresh(&mut self, frame: FrameId, request: &FrameRequest) {
        self.fetch(frame, request);
    }

    fn set_opacity(&mut self, frame: FrameId, opacity: f32) {
        if let Some(f) = self.frames.get_mut(&frame) {
            f.opacity = opacity;
        }
    }

    fn remove_frame(&mut self, frame: FrameId) {
        self.frames.remove(&frame);
    }

    fn request_repaint(&mut self) {
        self.repaints += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Extent, LoadEventKind, LoadId, load_event_channel};

    fn request(t: Millis) -> FrameRequest {
        FrameRequest {
            load_id: LoadId(1),
            layer_id: "radar".into(),
            sample_time: t,
            extent: Extent::default(),
        }
    }

    fn options(fail_every: u32) -> SimOptions {
        SimOptions {
            latency: Duration::from_millis(5),
            fail_every,
            threads: 2,
        }
    }

    #[test]
    fn test_fetch_reports_start_then_end() {
        let (tx, rx) = load_event_channel(16);
        let mut sim = SimRenderer::new(tx, options(0));
        let req = request(100);
        let id = sim.create_frame(&req);
        sim.load(id, &req);

        let timeout = Duration::from_secs(2);
        let first = rx.recv_timeout(timeout).unwrap();
        let second = rx.recv_timeout(timeout).unwrap();
        assert_eq!(first.kind, LoadEventKind::Start);
        assert_eq!(second.kind, LoadEventKind::End);
        assert_eq!(second.frame, id);
        assert_eq!(second.load_id, LoadId(1));
    }

    #[test]
    fn test_fail_every_second_request() {
        let (tx, rx) = load_event_channel(16);
        let mut sim = SimRenderer::new(tx, options(2));
        let a = request(100);
        let b = request(200);
        let fa = sim.create_frame(&a);
        let fb = sim.create_frame(&b);
        sim.load(fa, &a);
        sim.load(fb, &b);

        let timeout = Duration::from_secs(2);
        let events: Vec<LoadEvent> = (0..4).filter_map(|_| rx.recv_timeout(timeout).ok()).collect();
        let failed: Vec<Millis> = events
            .iter()
            .filter(|e| matches!(e.kind, LoadEventKind::Error(_)))
            .map(|e| e.sample_time)
            .collect();
        assert_eq!(failed, vec![200]);
    }

    #[test]
    fn test_opacity_and_removal() {
        let (tx, _rx) = load_event_channel(16);
        let mut sim = SimRenderer::new(tx, options(0));
        let req = request(100);
        let id = sim.create_frame(&req);
        assert!(sim.visible().is_empty());
        sim.set_opacity(id, 0.8);
        assert_eq!(sim.visible().len(), 1);
        sim.remove_frame(id);
        assert_eq!(sim.frame_count(), 0);
    }
}

//! Recording renderer and manual clock shared by the engine tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::entities::{Clock, FrameId, FrameRequest, Millis, Renderer};

/// Renderer that fetches nothing and remembers every call
#[derive(Debug, Default)]
pub struct MockRenderer {
    pub created: Vec<(FrameId, FrameRequest)>,
    pub loads: Vec<(FrameId, FrameRequest)>,
    pub refreshes: Vec<(FrameId, FrameRequest)>,
    pub removed: Vec<FrameId>,
    pub opacities: HashMap<FrameId, f32>,
    pub repaints: usize,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opacity(&self, id: FrameId) -> f32 {
        self.opacities.get(&id).copied().unwrap_or(0.0)
    }

    /// Frames currently carrying nonzero opacity
    pub fn visible_frames(&self) -> Vec<FrameId> {
        let mut v: Vec<FrameId> = self
            .opacities
            .iter()
            .filter(|(id, o)| **o > 0.0 && !self.removed.contains(id))
            .map(|(id, _)| *id)
            .collect();
        v.sort();
        v
    }

    /// Every fetch issued so far (load or refresh), in order
    pub fn requests(&self) -> Vec<(FrameId, FrameRequest)> {
        let mut all = self.loads.clone();
        all.extend(self.refreshes.iter().cloned());
        all
    }
}

impl Renderer for MockRenderer {
    fn create_frame(&mut self, request: &FrameRequest) -> FrameId {
        let id = FrameId::new();
        self.created.push((id, request.clone()));
        self.opacities.insert(id, 0.0);
        id
    }

    fn load(&mut self, frame: FrameId, request: &FrameRequest) {
        self.loads.push((frame, request.clone()));
    }

    fn refresh(&mut self, frame: FrameId, request: &FrameRequest) {
        self.refreshes.push((frame, request.clone()));
    }

    fn set_opacity(&mut self, frame: FrameId, opacity: f32) {
        self.opacities.insert(frame, opacity);
    }

    fn remove_frame(&mut self, frame: FrameId) {
        self.opacities.remove(&frame);
        self.removed.push(frame);
    }

    fn request_repaint(&mut self) {
        self.repaints += 1;
    }
}

/// Clock the test moves by hand
#[derive(Debug, Clone, Default)]
pub struct ManualClock(pub Rc<Cell<Millis>>);

impl ManualClock {
    pub fn new(now: Millis) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    pub fn set(&self, now: Millis) {
        self.0.set(now);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.0.get()
    }
}

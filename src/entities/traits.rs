//! Collaborator interfaces.
//!
//! The engine never paints or fetches anything itself. A [`Renderer`]
//! creates frames, fetches their artwork and reports progress back through a
//! [`LoadEventSender`]; a [`Clock`] supplies wall-clock "now"; a
//! [`PreferenceStore`] remembers per-layer visibility between sessions.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::time::{Extent, Millis};

/// Opaque handle of one renderer frame (layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub Uuid);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

/// Session generation. Strictly increasing across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LoadId(pub u64);

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters of one frame: which layer, which instant, which extent.
/// The load id travels with the request and comes back on every event.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub load_id: LoadId,
    pub layer_id: String,
    pub sample_time: Millis,
    pub extent: Extent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadEventKind {
    Start,
    End,
    Error(String),
}

/// Progress report for one frame fetch
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEvent {
    pub load_id: LoadId,
    pub frame: FrameId,
    pub sample_time: Millis,
    pub kind: LoadEventKind,
}

impl LoadEvent {
    pub fn start(request: &FrameRequest, frame: FrameId) -> Self {
        Self::with_kind(request, frame, LoadEventKind::Start)
    }

    pub fn end(request: &FrameRequest, frame: FrameId) -> Self {
        Self::with_kind(request, frame, LoadEventKind::End)
    }

    pub fn error(request: &FrameRequest, frame: FrameId, message: impl Into<String>) -> Self {
        Self::with_kind(request, frame, LoadEventKind::Error(message.into()))
    }

    fn with_kind(request: &FrameRequest, frame: FrameId, kind: LoadEventKind) -> Self {
        Self {
            load_id: request.load_id,
            frame,
            sample_time: request.sample_time,
            kind,
        }
    }
}

/// Cloneable handle renderers use to report load progress.
///
/// Backed by a bounded channel: `send` blocks when the engine falls behind,
/// `try_send` drops the event and logs instead.
#[derive(Debug, Clone)]
pub struct LoadEventSender {
    tx: Sender<LoadEvent>,
}

impl LoadEventSender {
    pub fn send(&self, event: LoadEvent) {
        if self.tx.send(event).is_err() {
            // Receiver gone: the animator was dropped, nothing left to notify
            log::trace!("Load event dropped, animator gone");
        }
    }

    pub fn try_send(&self, event: LoadEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                warn!("Load event channel full, dropping {:?} for {}", ev.kind, ev.sample_time);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Create the completion channel shared by a renderer and the animator
pub fn load_event_channel(capacity: usize) -> (LoadEventSender, Receiver<LoadEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (LoadEventSender { tx }, rx)
}

/// Rendering surface. All calls come from the animator's thread.
pub trait Renderer {
    /// Create a hidden frame for `request`. No fetch happens yet.
    fn create_frame(&mut self, request: &FrameRequest) -> FrameId;

    /// Start fetching the frame's artwork. Must eventually report Start and
    /// then exactly one of End / Error through the load event sender.
    fn load(&mut self, frame: FrameId, request: &FrameRequest);

    /// Re-target an existing frame to new parameters and fetch them. Same
    /// reporting contract as [`Renderer::load`].
    fn refresh(&mut self, frame: FrameId, request: &FrameRequest);

    fn set_opacity(&mut self, frame: FrameId, opacity: f32);

    fn remove_frame(&mut self, frame: FrameId);

    /// Ask for a repaint after visibility changes
    fn request_repaint(&mut self) {}
}

/// Wall clock in ms since the epoch
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as Millis)
            .unwrap_or(0)
    }
}

/// Remembered visibility/opacity of one layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerPref {
    pub visible: bool,
    pub opacity: f32,
}

/// Persistent per-layer preferences
pub trait PreferenceStore {
    fn layer_pref(&self, layer_id: &str) -> Option<LayerPref>;
    fn set_layer_pref(&mut self, layer_id: &str, pref: LayerPref);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FrameRequest {
        FrameRequest {
            load_id: LoadId(7),
            layer_id: "radar".into(),
            sample_time: 1_000,
            extent: Extent::default(),
        }
    }

    #[test]
    fn test_event_carries_request_identity() {
        let (tx, rx) = load_event_channel(4);
        let frame = FrameId::new();
        tx.send(LoadEvent::error(&request(), frame, "timeout"));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.load_id, LoadId(7));
        assert_eq!(ev.frame, frame);
        assert_eq!(ev.sample_time, 1_000);
        assert_eq!(ev.kind, LoadEventKind::Error("timeout".into()));
    }

    #[test]
    fn test_try_send_on_full_channel() {
        let (tx, rx) = load_event_channel(1);
        let frame = FrameId::new();
        assert!(tx.try_send(LoadEvent::start(&request(), frame)));
        assert!(!tx.try_send(LoadEvent::end(&request(), frame)));
        drop(rx);
        assert!(!tx.try_send(LoadEvent::end(&request(), frame)));
    }
}

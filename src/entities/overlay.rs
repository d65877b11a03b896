//! Overlay groups: all renderer frames belonging to one animated layer.

use super::layer::LayerKind;
use super::time::{Extent, Millis};
use super::traits::FrameId;

/// One pre-rendered frame of a group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayFrame {
    pub id: FrameId,
    pub sample_time: Millis,
}

/// Frames sharing one layer identity, ordered by sample time.
///
/// `pointer` is the active frame index, -1 before the first selection.
/// `shown` is the frame currently given nonzero opacity, if any.
#[derive(Debug, Clone)]
pub struct OverlayGroup {
    pub layer_id: String,
    pub kind: LayerKind,
    pub resolution_time: Millis,
    pub opacity: f32,
    pub visible: bool,
    pub extent: Extent,
    pub frames: Vec<OverlayFrame>,
    pub pointer: isize,
    pub shown: Option<usize>,
}

impl OverlayGroup {
    pub fn new(layer_id: impl Into<String>, kind: LayerKind, resolution_time: Millis, extent: Extent) -> Self {
        Self {
            layer_id: layer_id.into(),
            kind,
            resolution_time,
            opacity: 1.0,
            visible: true,
            extent,
            frames: Vec::new(),
            pointer: -1,
            shown: None,
        }
    }

    pub fn sample_times(&self) -> Vec<Millis> {
        self.frames.iter().map(|f| f.sample_time).collect()
    }

    pub fn frame_index(&self, id: FrameId) -> Option<usize> {
        self.frames.iter().position(|f| f.id == id)
    }

    /// Effective opacity when shown
    pub fn display_opacity(&self) -> f32 {
        if self.visible { self.opacity } else { 0.0 }
    }
}

/// What the reload governor needs to know about one rendered overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySummary {
    pub layer_id: String,
    pub visible: bool,
    pub rendered_frames: usize,
    pub extent: Extent,
}

//! Entities module - plain data types and collaborator traits
//!
//! Nothing here schedules or decides anything; the `core` engine owns the
//! behavior and works on these types.

pub mod interval;
pub mod layer;
pub mod overlay;
pub mod time;
pub mod time_axis;
pub mod traits;

pub use interval::{IntervalRecord, IntervalSnapshot, IntervalStatus, IntervalTable};
pub use layer::{CapabilityTimes, LayerAnimationSpec, LayerConfig, LayerKind, LayerTimeSpec};
pub use overlay::{OverlayFrame, OverlayGroup, OverlaySummary};
pub use time::{Extent, Millis};
pub use time_axis::TimeAxis;
pub use traits::{
    Clock, FrameId, FrameRequest, LayerPref, LoadEvent, LoadEventKind, LoadEventSender, LoadId,
    PreferenceStore, Renderer, SystemClock, load_event_channel,
};

//! Materialization strategies.
//!
//! Both strategies share the resolver, interval table and load queue; they
//! differ only in how renderer frames map onto samples:
//! - [`EagerScheduler`]: one renderer frame per sample, all pre-rendered,
//!   visibility toggled by the frame selector.
//! - [`LazyScheduler`]: two renderer frames per overlay, the hidden one is
//!   refreshed to the next sample and swapped in once loaded.

use enum_dispatch::enum_dispatch;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::resolver::ResolvedLayer;
use super::session::Session;
use crate::entities::{Extent, FrameId, LayerKind, LoadEvent, Millis, OverlaySummary, Renderer};

pub mod eager;
pub mod lazy;

pub use eager::EagerScheduler;
pub use lazy::LazyScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Eager,
    Lazy,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Eager => write!(f, "eager"),
            StrategyKind::Lazy => write!(f, "lazy"),
        }
    }
}

/// One animated layer entering a session
#[derive(Debug, Clone)]
pub struct OverlayPlan {
    pub layer_id: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f32,
    pub resolved: ResolvedLayer,
}

/// How a layer should currently be displayed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDisplay {
    pub visible: bool,
    pub opacity: f32,
}

/// Everything a strategy may touch while handling one event
pub struct SchedulerContext<'a> {
    pub session: &'a mut Session,
    pub renderer: &'a mut dyn Renderer,
    /// Current animation time
    pub time: Millis,
    /// Wall clock
    pub now: Millis,
    pub extent: Extent,
}

#[enum_dispatch]
pub trait Scheduler {
    fn kind(&self) -> StrategyKind;

    /// Create renderer frames for a fresh session and queue its first loads
    fn build(&mut self, plans: &[OverlayPlan], ctx: &mut SchedulerContext<'_>);

    /// Hand queued items to the renderer while concurrency slots are free
    fn dispatch(&mut self, ctx: &mut SchedulerContext<'_>);

    /// The animation clock moved to `ctx.time`
    fn on_time_changed(&mut self, ctx: &mut SchedulerContext<'_>);

    /// Strategy-specific reaction to a current-session load event. The
    /// interval table and queue counters are already updated.
    fn on_load_event(&mut self, event: &LoadEvent, ctx: &mut SchedulerContext<'_>);

    /// Re-apply visibility/opacity without rebuilding
    fn apply_display(&mut self, displays: &IndexMap<String, LayerDisplay>, ctx: &mut SchedulerContext<'_>);

    /// Layer owning a renderer frame of this session
    fn layer_of(&self, frame: FrameId) -> Option<&str>;

    fn overlays(&self) -> Vec<OverlaySummary>;

    /// Nothing waiting to load or swap
    fn is_settled(&self, session: &Session) -> bool;

    /// Remove every renderer frame of the session
    fn teardown(&mut self, renderer: &mut dyn Renderer);
}

#[enum_dispatch(Scheduler)]
#[derive(Debug)]
pub enum Strategy {
    Eager(EagerScheduler),
    Lazy(LazyScheduler),
}

impl Strategy {
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Eager => Strategy::Eager(EagerScheduler::new()),
            StrategyKind::Lazy => Strategy::Lazy(LazyScheduler::new()),
        }
    }
}

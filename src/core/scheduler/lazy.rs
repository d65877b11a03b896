//! Lazy double-buffered strategy.
//!
//! Each overlay owns two renderer frames. The active one is visible; when
//! the clock moves to a new sample the inactive one is refreshed in place
//! and the two swap once that refresh completes. At most one refresh per
//! overlay is outstanding: a newer target waits and is issued when the
//! current refresh lands. A refresh whose sample is no longer the latest
//! target is not shown, but its sample stays cached in the inactive buffer
//! so returning to it swaps without a fetch.

use indexmap::IndexMap;
use log::{debug, trace};

use super::{LayerDisplay, OverlayPlan, Scheduler, SchedulerContext, StrategyKind};
use crate::core::frame_selector::{advance_pointer, target_frame};
use crate::core::load_queue::LoadQueueItem;
use crate::core::session::Session;
use crate::entities::{
    Extent, FrameId, FrameRequest, IntervalStatus, LayerKind, LoadEvent, LoadEventKind, LoadId,
    Millis, OverlaySummary, Renderer,
};

#[derive(Debug, Clone)]
struct BufferPair {
    layer_id: String,
    kind: LayerKind,
    resolution_time: Millis,
    visible: bool,
    opacity: f32,
    extent: Extent,
    samples: Vec<Millis>,
    buffers: [FrameId; 2],
    active: usize,
    pointer: isize,
    /// Sample loaded in the active buffer
    shown_time: Option<Millis>,
    /// Sample loaded in the inactive buffer
    inactive_time: Option<Millis>,
    in_flight: Option<Millis>,
    latest_requested: Option<Millis>,
    /// Active buffer currently has nonzero opacity
    displayed: bool,
}

impl BufferPair {
    fn active_id(&self) -> FrameId {
        self.buffers[self.active]
    }

    fn inactive_id(&self) -> FrameId {
        self.buffers[1 - self.active]
    }

    fn set_displayed(&mut self, on: bool, renderer: &mut dyn Renderer) {
        let on = on && self.visible && self.shown_time.is_some();
        if on != self.displayed {
            renderer.set_opacity(self.active_id(), if on { self.opacity } else { 0.0 });
            self.displayed = on;
        }
    }

    /// Bring the inactive buffer to the front
    fn swap(&mut self, renderer: &mut dyn Renderer) {
        if self.displayed {
            renderer.set_opacity(self.active_id(), 0.0);
            self.displayed = false;
        }
        self.active = 1 - self.active;
        std::mem::swap(&mut self.shown_time, &mut self.inactive_time);
        trace!("{}: swapped to {:?}", self.layer_id, self.shown_time);
        self.set_displayed(true, renderer);
    }

    /// Nothing left to fetch or swap for the latest target
    fn is_settled(&self) -> bool {
        self.in_flight.is_none() && (self.latest_requested.is_none() || self.latest_requested == self.shown_time)
    }
}

#[derive(Debug, Default)]
pub struct LazyScheduler {
    pairs: Vec<BufferPair>,
    load_id: LoadId,
}

impl LazyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_latest(&self, oi: usize, ctx: &mut SchedulerContext<'_>) {
        let pair = &self.pairs[oi];
        let Some(t) = pair.latest_requested else {
            return;
        };
        if let Ok(fi) = pair.samples.binary_search(&t) {
            ctx.session.queue.replace_for_overlay(LoadQueueItem {
                overlay_index: oi,
                frame_index: fi,
                sample_time: t,
            });
        }
    }

    /// Re-target one overlay at the context's clock
    fn retarget(&mut self, oi: usize, ctx: &mut SchedulerContext<'_>) {
        let pair = &mut self.pairs[oi];
        pair.pointer = advance_pointer(&pair.samples, pair.pointer, ctx.time, pair.resolution_time);
        let target = if pair.visible {
            target_frame(pair.kind, &pair.samples, pair.pointer, ctx.time, ctx.now).map(|i| pair.samples[i])
        } else {
            None
        };

        match target {
            None => {
                pair.latest_requested = None;
                pair.set_displayed(false, ctx.renderer);
                ctx.session.queue.remove_overlay(oi);
            }
            Some(t) if pair.shown_time == Some(t) => {
                pair.latest_requested = Some(t);
                pair.set_displayed(true, ctx.renderer);
                ctx.session.queue.remove_overlay(oi);
            }
            Some(t) => {
                pair.latest_requested = Some(t);
                if pair.in_flight.is_some() {
                    // issued when the running refresh lands
                    ctx.session.queue.remove_overlay(oi);
                } else if pair.inactive_time == Some(t) {
                    pair.swap(ctx.renderer);
                    ctx.session.queue.remove_overlay(oi);
                } else {
                    self.queue_latest(oi, ctx);
                }
            }
        }
    }

    fn pair_of(&self, frame: FrameId) -> Option<usize> {
        self.pairs.iter().position(|p| p.buffers.contains(&frame))
    }
}

impl Scheduler for LazyScheduler {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Lazy
    }

    fn build(&mut self, plans: &[OverlayPlan], ctx: &mut SchedulerContext<'_>) {
        self.load_id = ctx.session.load_id;
        self.pairs.clear();

        for plan in plans {
            let Some(&first) = plan.resolved.samples.first() else {
                continue;
            };
            let request = FrameRequest {
                load_id: self.load_id,
                layer_id: plan.layer_id.clone(),
                sample_time: first,
                extent: ctx.extent,
            };
            let buffers = [ctx.renderer.create_frame(&request), ctx.renderer.create_frame(&request)];
            debug!("Lazy overlay {}: {} samples", plan.layer_id, plan.resolved.samples.len());
            self.pairs.push(BufferPair {
                layer_id: plan.layer_id.clone(),
                kind: plan.kind,
                resolution_time: plan.resolved.resolution_time,
                visible: plan.visible,
                opacity: plan.opacity,
                extent: ctx.extent,
                samples: plan.resolved.samples.clone(),
                buffers,
                active: 0,
                pointer: -1,
                shown_time: None,
                inactive_time: None,
                in_flight: None,
                latest_requested: None,
                displayed: false,
            });
        }

        self.on_time_changed(ctx);
    }

    fn dispatch(&mut self, ctx: &mut SchedulerContext<'_>) {
        while let Some(item) = ctx.session.queue.pop_ready() {
            let Some(pair) = self.pairs.get_mut(item.overlay_index) else {
                ctx.session.queue.complete();
                continue;
            };
            if pair.in_flight.is_some() || pair.latest_requested != Some(item.sample_time) {
                ctx.session.queue.complete();
                continue;
            }
            let request = FrameRequest {
                load_id: self.load_id,
                layer_id: pair.layer_id.clone(),
                sample_time: item.sample_time,
                extent: pair.extent,
            };
            pair.in_flight = Some(item.sample_time);
            // the inactive buffer no longer holds its previous sample
            pair.inactive_time = None;
            ctx.renderer.refresh(pair.inactive_id(), &request);
        }
    }

    fn on_time_changed(&mut self, ctx: &mut SchedulerContext<'_>) {
        for oi in 0..self.pairs.len() {
            self.retarget(oi, ctx);
        }
        ctx.session.queue.prioritize(ctx.time);
    }

    fn on_load_event(&mut self, event: &LoadEvent, ctx: &mut SchedulerContext<'_>) {
        let Some(oi) = self.pair_of(event.frame) else {
            return;
        };
        let pair = &mut self.pairs[oi];
        if event.frame != pair.inactive_id() || pair.in_flight != Some(event.sample_time) {
            trace!("{}: unexpected event for @{}", pair.layer_id, event.sample_time);
            return;
        }

        match &event.kind {
            LoadEventKind::Start => return,
            LoadEventKind::End => {
                pair.in_flight = None;
                pair.inactive_time = Some(event.sample_time);
                if pair.latest_requested == Some(event.sample_time) {
                    pair.swap(ctx.renderer);
                } else {
                    trace!("{}: refresh @{} superseded", pair.layer_id, event.sample_time);
                }
            }
            LoadEventKind::Error(_) => {
                pair.in_flight = None;
                pair.inactive_time = None;
            }
        }

        // a failed target is not retried until the clock moves again
        let pair = &self.pairs[oi];
        let pending = pair
            .latest_requested
            .is_some_and(|t| pair.shown_time != Some(t) && t != event.sample_time);
        if pending {
            self.queue_latest(oi, ctx);
        }
    }

    fn apply_display(&mut self, displays: &IndexMap<String, LayerDisplay>, ctx: &mut SchedulerContext<'_>) {
        for oi in 0..self.pairs.len() {
            let pair = &mut self.pairs[oi];
            if let Some(d) = displays.get(&pair.layer_id) {
                pair.visible = d.visible;
                if pair.opacity != d.opacity {
                    pair.opacity = d.opacity;
                    if pair.displayed {
                        ctx.renderer.set_opacity(pair.active_id(), d.opacity);
                    }
                }
            }
            self.retarget(oi, ctx);
        }
    }

    fn layer_of(&self, frame: FrameId) -> Option<&str> {
        self.pair_of(frame).map(|oi| self.pairs[oi].layer_id.as_str())
    }

    fn overlays(&self) -> Vec<OverlaySummary> {
        self.pairs
            .iter()
            .map(|p| OverlaySummary {
                layer_id: p.layer_id.clone(),
                visible: p.visible,
                rendered_frames: p.buffers.len(),
                extent: p.extent,
            })
            .collect()
    }

    /// Judged from the buffers alone: the table counts every (overlay,
    /// sample) pair, but an overlay only ever fetches its current target, so
    /// intervals off the targets can stay `Loading` for good.
    fn is_settled(&self, session: &Session) -> bool {
        session.queue.is_idle()
            && self.pairs.iter().all(|p| {
                p.is_settled()
                    && p.latest_requested
                        .and_then(|t| session.intervals.get(t))
                        .is_none_or(|r| r.status != IntervalStatus::Error)
            })
    }

    fn teardown(&mut self, renderer: &mut dyn Renderer) {
        for pair in self.pairs.drain(..) {
            for id in pair.buffers {
                renderer.remove_frame(id);
            }
        }
    }
}

//! Eager strategy - one renderer frame per sample, all fetched up front.

use indexmap::IndexMap;
use log::{debug, trace};
use std::collections::HashMap;

use super::{LayerDisplay, OverlayPlan, Scheduler, SchedulerContext, StrategyKind};
use crate::core::frame_selector::{refresh_opacity, select_frame};
use crate::core::load_queue::LoadQueueItem;
use crate::core::session::Session;
use crate::entities::{
    Extent, FrameId, FrameRequest, LoadEvent, LoadId, OverlayFrame, OverlayGroup, OverlaySummary,
    Renderer,
};

#[derive(Debug, Default)]
pub struct EagerScheduler {
    groups: Vec<OverlayGroup>,
    /// frame -> (overlay index, frame index)
    index: HashMap<FrameId, (usize, usize)>,
    load_id: LoadId,
}

impl EagerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[OverlayGroup] {
        &self.groups
    }

    fn request(&self, overlay: usize, frame: usize) -> Option<(FrameId, FrameRequest)> {
        let group = self.groups.get(overlay)?;
        let f = group.frames.get(frame)?;
        Some((
            f.id,
            FrameRequest {
                load_id: self.load_id,
                layer_id: group.layer_id.clone(),
                sample_time: f.sample_time,
                extent: group.extent,
            },
        ))
    }

    fn select_all(&mut self, ctx: &mut SchedulerContext<'_>) {
        for group in &mut self.groups {
            select_frame(group, ctx.time, ctx.now, ctx.renderer);
        }
    }
}

fn new_group(plan: &OverlayPlan, extent: Extent) -> OverlayGroup {
    let mut group = OverlayGroup::new(&plan.layer_id, plan.kind, plan.resolved.resolution_time, extent);
    group.visible = plan.visible;
    group.opacity = plan.opacity;
    group
}

impl Scheduler for EagerScheduler {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Eager
    }

    fn build(&mut self, plans: &[OverlayPlan], ctx: &mut SchedulerContext<'_>) {
        self.load_id = ctx.session.load_id;
        self.groups.clear();
        self.index.clear();

        for (oi, plan) in plans.iter().enumerate() {
            let mut group = new_group(plan, ctx.extent);
            for (fi, &sample_time) in plan.resolved.samples.iter().enumerate() {
                let request = FrameRequest {
                    load_id: self.load_id,
                    layer_id: plan.layer_id.clone(),
                    sample_time,
                    extent: ctx.extent,
                };
                let id = ctx.renderer.create_frame(&request);
                group.frames.push(OverlayFrame { id, sample_time });
                self.index.insert(id, (oi, fi));
                ctx.session.queue.push(LoadQueueItem {
                    overlay_index: oi,
                    frame_index: fi,
                    sample_time,
                });
            }
            debug!("Eager overlay {}: {} frames", group.layer_id, group.frames.len());
            self.groups.push(group);
        }

        ctx.session.queue.prioritize(ctx.time);
        self.select_all(ctx);
    }

    fn dispatch(&mut self, ctx: &mut SchedulerContext<'_>) {
        while let Some(item) = ctx.session.queue.pop_ready() {
            match self.request(item.overlay_index, item.frame_index) {
                Some((id, request)) => ctx.renderer.load(id, &request),
                None => ctx.session.queue.complete(),
            }
        }
    }

    fn on_time_changed(&mut self, ctx: &mut SchedulerContext<'_>) {
        self.select_all(ctx);
        ctx.session.queue.prioritize(ctx.time);
    }

    fn on_load_event(&mut self, event: &LoadEvent, _ctx: &mut SchedulerContext<'_>) {
        if let Some((oi, fi)) = self.index.get(&event.frame) {
            trace!("Eager frame {}/{} @{}: {:?}", oi, fi, event.sample_time, event.kind);
        }
    }

    fn apply_display(&mut self, displays: &IndexMap<String, LayerDisplay>, ctx: &mut SchedulerContext<'_>) {
        for group in &mut self.groups {
            if let Some(d) = displays.get(&group.layer_id) {
                group.visible = d.visible;
                group.opacity = d.opacity;
            }
            select_frame(group, ctx.time, ctx.now, ctx.renderer);
            refresh_opacity(group, ctx.renderer);
        }
    }

    fn layer_of(&self, frame: FrameId) -> Option<&str> {
        let (oi, _) = self.index.get(&frame)?;
        self.groups.get(*oi).map(|g| g.layer_id.as_str())
    }

    fn overlays(&self) -> Vec<OverlaySummary> {
        self.groups
            .iter()
            .map(|g| OverlaySummary {
                layer_id: g.layer_id.clone(),
                visible: g.visible,
                rendered_frames: g.frames.len(),
                extent: g.extent,
            })
            .collect()
    }

    fn is_settled(&self, session: &Session) -> bool {
        session.queue.is_idle()
    }

    fn teardown(&mut self, renderer: &mut dyn Renderer) {
        for group in self.groups.drain(..) {
            for frame in group.frames {
                renderer.remove_frame(frame.id);
            }
        }
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::{ResolvedLayer, TimePolicy};
    use crate::core::test_support::MockRenderer;
    use crate::entities::{IntervalTable, LayerKind, Millis};

    fn plan(id: &str, samples: Vec<Millis>) -> OverlayPlan {
        OverlayPlan {
            layer_id: id.into(),
            kind: LayerKind::Observation,
            visible: true,
            opacity: 1.0,
            resolved: ResolvedLayer {
                begin_time: samples[0],
                end_time: *samples.last().unwrap(),
                resolution_time: 100,
                samples,
                policy: TimePolicy::FixedResolution,
            },
        }
    }

    #[test]
    fn test_build_creates_frame_per_sample() {
        let mut renderer = MockRenderer::new();
        let mut session = Session::new(LoadId(9), IntervalTable::new(), 2);
        let mut s = EagerScheduler::new();
        let plans = [plan("a", vec![0, 100, 200]), plan("b", vec![0, 100])];
        let mut ctx = SchedulerContext {
            session: &mut session,
            renderer: &mut renderer,
            time: 100,
            now: 10_000,
            extent: Extent::default(),
        };
        s.build(&plans, &mut ctx);
        s.dispatch(&mut ctx);

        assert_eq!(renderer.created.len(), 5);
        assert!(renderer.created.iter().all(|(_, r)| r.load_id == LoadId(9)));
        // two slots, items at the current time go first
        assert_eq!(renderer.loads.len(), 2);
        assert!(renderer.loads.iter().all(|(_, r)| r.sample_time == 100));
        // one visible frame per group
        assert_eq!(renderer.visible_frames().len(), 2);
        assert_eq!(s.layer_of(renderer.created[0].0), Some("a"));
        assert_eq!(s.overlays()[1].rendered_frames, 2);
    }

    #[test]
    fn test_time_change_moves_visibility() {
        let mut renderer = MockRenderer::new();
        let mut session = Session::new(LoadId(1), IntervalTable::new(), 8);
        let mut s = EagerScheduler::new();
        let plans = [plan("a", vec![0, 100, 200])];
        let mut ctx = SchedulerContext {
            session: &mut session,
            renderer: &mut renderer,
            time: 0,
            now: 10_000,
            extent: Extent::default(),
        };
        s.build(&plans, &mut ctx);
        ctx.time = 200;
        s.on_time_changed(&mut ctx);
        let shown = s.groups()[0].frames[2].id;
        assert_eq!(renderer.visible_frames(), vec![shown]);
    }

    #[test]
    fn test_apply_display_and_teardown() {
        let mut renderer = MockRenderer::new();
        let mut session = Session::new(LoadId(1), IntervalTable::new(), 8);
        let mut s = EagerScheduler::new();
        let plans = [plan("a", vec![0, 100])];
        let mut ctx = SchedulerContext {
            session: &mut session,
            renderer: &mut renderer,
            time: 0,
            now: 10_000,
            extent: Extent::default(),
        };
        s.build(&plans, &mut ctx);

        let mut displays = IndexMap::new();
        displays.insert("a".to_string(), LayerDisplay { visible: true, opacity: 0.3 });
        s.apply_display(&displays, &mut ctx);
        let first = s.groups()[0].frames[0].id;
        assert_eq!(renderer.opacity(first), 0.3);

        let mut ctx = SchedulerContext {
            session: &mut session,
            renderer: &mut renderer,
            time: 0,
            now: 10_000,
            extent: Extent::default(),
        };
        displays.insert("a".to_string(), LayerDisplay { visible: false, opacity: 0.3 });
        s.apply_display(&displays, &mut ctx);
        assert!(renderer.visible_frames().is_empty());

        s.teardown(&mut renderer);
        assert_eq!(renderer.removed.len(), 2);
        assert!(s.overlays().is_empty());
    }
}

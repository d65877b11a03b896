//! Animator - the engine facade a map host drives.
//!
//! Owns the time axis, the layer registry, the current load session and the
//! chosen materialization strategy. All state changes happen on the host's
//! thread through commands and `tick()`; renderers only report back through
//! the completion channel, which `pump()` drains.
//!
//! Flow:
//! - view/layer/axis commands schedule a debounced governor evaluation
//! - the evaluation either rebuilds the session under a new load id or just
//!   re-applies visibility and opacity
//! - completions update the interval table, free queue slots and let the
//!   strategy dispatch more work
//! - the transport steps the clock while playing

use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use std::time::Instant;

use super::debounced_update::DebouncedUpdate;
use super::event_bus::{EventBus, LoadErrorParams, Notification};
use super::governor::{Governor, ReloadCheck};
use super::player::Transport;
use super::prefs::MemoryPreferenceStore;
use super::resolver::resolve;
use super::scheduler::{LayerDisplay, OverlayPlan, Scheduler, SchedulerContext, Strategy, StrategyKind};
use super::session::Session;
use crate::config::AnimatorConfig;
use crate::entities::{
    Clock, Extent, IntervalSnapshot, IntervalTable, LayerConfig, LayerKind, LayerPref, LoadEvent,
    LoadEventKind, LoadEventSender, LoadId, Millis, OverlaySummary, PreferenceStore, Renderer,
    SystemClock, TimeAxis, load_event_channel,
};

pub struct Animator<R: Renderer> {
    config: AnimatorConfig,
    axis: TimeAxis,
    layers: IndexMap<String, LayerConfig>,
    renderer: R,
    clock: Box<dyn Clock>,
    prefs: Box<dyn PreferenceStore>,
    scheduler: Strategy,
    session: Session,
    governor: Governor,
    transport: Transport,
    bus: EventBus,
    /// Pending view evaluation, carrying the extent to evaluate with
    debounce: DebouncedUpdate<Extent>,
    extent: Extent,
    events_tx: LoadEventSender,
    events_rx: Receiver<LoadEvent>,
    /// Last settled state reported for the lazy strategy
    settled: bool,
}

impl<R: Renderer> Animator<R> {
    /// Create an animator. `make_renderer` receives the sender its fetches
    /// must report through.
    pub fn new<F>(config: AnimatorConfig, axis: TimeAxis, make_renderer: F) -> Self
    where
        F: FnOnce(LoadEventSender) -> R,
    {
        let (events_tx, events_rx) = load_event_channel(config.event_capacity);
        let renderer = make_renderer(events_tx.clone());
        info!(
            "Animator: strategy={} concurrency={} axis=[{}, {}] every {}",
            config.strategy,
            config.max_concurrency,
            axis.begin_time(),
            axis.end_time(),
            axis.resolution_time()
        );
        Self {
            scheduler: Strategy::from_kind(config.strategy),
            session: Session::empty(config.max_concurrency),
            transport: Transport::new(config.frame_delay_ms, config.period_delay_ms, config.loop_enabled),
            debounce: DebouncedUpdate::new(config.debounce_ms),
            config,
            axis,
            layers: IndexMap::new(),
            renderer,
            clock: Box::new(SystemClock),
            prefs: Box::new(MemoryPreferenceStore::new()),
            governor: Governor::new(),
            bus: EventBus::new(),
            extent: Extent::default(),
            events_tx,
            events_rx,
            settled: false,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prefs(mut self, prefs: Box<dyn PreferenceStore>) -> Self {
        self.prefs = prefs;
        self
    }

    // ---- accessors ----

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn current_time(&self) -> Millis {
        self.axis.current_time()
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.values()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerConfig> {
        self.layers.get(id)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Sender for load events; hand it to additional renderers
    pub fn event_sender(&self) -> LoadEventSender {
        self.events_tx.clone()
    }

    pub fn load_id(&self) -> LoadId {
        self.session.load_id
    }

    pub fn intervals(&self) -> &IntervalTable {
        &self.session.intervals
    }

    pub fn overlays(&self) -> Vec<OverlaySummary> {
        self.scheduler.overlays()
    }

    pub fn strategy(&self) -> StrategyKind {
        self.scheduler.kind()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Outstanding fetches of the current session
    pub fn in_flight(&self) -> usize {
        self.session.queue.in_flight()
    }

    /// Current session has nothing queued or in flight
    pub fn is_idle(&self) -> bool {
        self.session.queue.is_idle()
    }

    // ---- layer registry ----

    /// Register (or replace) a layer. Stored preferences override the
    /// configured visibility and opacity.
    pub fn add_layer(&mut self, mut layer: LayerConfig) {
        if let Some(pref) = self.prefs.layer_pref(&layer.id) {
            layer.visible = pref.visible;
            layer.opacity = pref.opacity;
        }
        debug!("Add layer {} ({:?}, visible={})", layer.id, layer.kind, layer.visible);
        if layer.kind != LayerKind::Static {
            self.governor.invalidate();
        }
        self.layers.insert(layer.id.clone(), layer);
        self.schedule_update();
    }

    pub fn remove_layer(&mut self, id: &str) -> bool {
        let Some(layer) = self.layers.shift_remove(id) else {
            warn!("remove_layer: unknown layer {}", id);
            return false;
        };
        debug!("Remove layer {}", id);
        if layer.kind != LayerKind::Static {
            self.governor.invalidate();
        }
        if !self.has_animated_layers() {
            self.clear_session();
        }
        self.schedule_update();
        true
    }

    pub fn set_layer_visibility(&mut self, id: &str, visible: bool) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            warn!("set_layer_visibility: unknown layer {}", id);
            return false;
        };
        layer.visible = visible;
        let pref = LayerPref { visible, opacity: layer.opacity };
        self.prefs.set_layer_pref(id, pref);
        self.schedule_update();
        true
    }

    /// Applied in place, never rebuilds the session
    pub fn set_layer_opacity(&mut self, id: &str, opacity: f32) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            warn!("set_layer_opacity: unknown layer {}", id);
            return false;
        };
        layer.opacity = opacity.clamp(0.0, 1.0);
        let pref = LayerPref { visible: layer.visible, opacity: layer.opacity };
        self.prefs.set_layer_pref(id, pref);
        self.apply_display();
        self.renderer.request_repaint();
        self.schedule_update();
        true
    }

    /// Switch materialization strategy; the next evaluation rebuilds
    pub fn set_strategy(&mut self, kind: StrategyKind) {
        if kind == self.scheduler.kind() {
            return;
        }
        info!("Strategy: {} -> {}", self.scheduler.kind(), kind);
        self.clear_session();
        self.scheduler = Strategy::from_kind(kind);
        self.config.strategy = kind;
        self.governor.invalidate();
        self.schedule_update();
    }

    // ---- time axis ----

    pub fn set_animation_time(&mut self, t: Millis) -> bool {
        let changed = self.axis.set_animation_time(t);
        if changed {
            self.on_time_changed();
        }
        changed
    }

    /// Step forward, wrapping to the beginning after the end
    pub fn next(&mut self) -> bool {
        let changed = self.axis.next();
        if changed {
            self.on_time_changed();
        }
        changed
    }

    /// Step back, wrapping to the end before the beginning
    pub fn previous(&mut self) -> bool {
        let changed = self.axis.previous();
        if changed {
            self.on_time_changed();
        }
        changed
    }

    pub fn set_begin_time(&mut self, begin_time: Millis) {
        self.axis.set_begin_time(begin_time);
        self.on_axis_changed();
    }

    pub fn set_end_time(&mut self, end_time: Millis) {
        self.axis.set_end_time(end_time);
        self.on_axis_changed();
    }

    pub fn set_resolution_time(&mut self, resolution_time: Millis) {
        self.axis.set_resolution_time(resolution_time);
        self.on_axis_changed();
    }

    fn on_axis_changed(&mut self) {
        debug!(
            "Axis changed: [{}, {}] every {} ({} intervals)",
            self.axis.begin_time(),
            self.axis.end_time(),
            self.axis.resolution_time(),
            self.axis.num_intervals()
        );
        self.governor.invalidate();
        self.bus.emit(Notification::TimeChanged { time: self.axis.current_time() });
        self.schedule_update();
    }

    // ---- transport ----

    pub fn play(&mut self, delay_ms: u64, period_delay_ms: u64) {
        self.transport.play(delay_ms, period_delay_ms);
        self.bus.emit(Notification::PlayStateChanged { playing: true });
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        self.bus.emit(Notification::PlayStateChanged { playing: false });
    }

    /// Pause and return to the beginning of the axis
    pub fn stop(&mut self) {
        self.pause();
        self.set_animation_time(self.axis.begin_time());
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.transport.set_loop_enabled(enabled);
    }

    // ---- view ----

    /// Map moved or zoomed. Evaluated once the debounce window is quiet.
    pub fn request_view_update(&mut self, extent: Extent) {
        self.debounce.schedule(extent);
    }

    pub fn request_view_update_at(&mut self, extent: Extent, now: Instant) {
        self.debounce.schedule_at(extent, now);
    }

    /// Evaluate a pending view update right away
    pub fn flush(&mut self) {
        if let Some(extent) = self.debounce.pending().copied() {
            self.debounce.cancel();
            self.evaluate(extent);
        }
    }

    fn schedule_update(&mut self) {
        let extent = self.debounce.pending().copied().unwrap_or(self.extent);
        self.debounce.schedule(extent);
    }

    // ---- driving ----

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One host-loop iteration: due evaluation, completions, playback step
    pub fn tick_at(&mut self, now: Instant) {
        if let Some(extent) = self.debounce.tick_at(now) {
            self.evaluate(extent);
        }
        self.pump();

        let was_playing = self.transport.is_playing();
        if self.transport.update(now, self.axis.at_end()) {
            self.next();
        } else if was_playing && !self.transport.is_playing() {
            self.bus.emit(Notification::PlayStateChanged { playing: false });
        }
    }

    /// Drain the completion channel. Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_load_event(event);
            handled += 1;
        }
        handled
    }

    fn handle_load_event(&mut self, event: LoadEvent) {
        if !self.session.is_current(event.load_id) {
            trace!(
                "Stale {:?} for @{} from {} (current {})",
                event.kind,
                event.sample_time,
                event.load_id,
                self.session.load_id
            );
            return;
        }

        let changed = match &event.kind {
            LoadEventKind::Start => self.session.intervals.on_load_start(event.sample_time),
            LoadEventKind::End => {
                self.session.queue.complete();
                self.session.intervals.on_load_end(event.sample_time)
            }
            LoadEventKind::Error(message) => {
                self.session.queue.complete();
                let layer_id = self.scheduler.layer_of(event.frame).unwrap_or_default().to_string();
                warn!("Load failed: {} @{}: {}", layer_id, event.sample_time, message);
                self.bus.emit(Notification::LoadError(LoadErrorParams {
                    load_id: event.load_id,
                    layer_id,
                    sample_time: event.sample_time,
                    message: message.clone(),
                }));
                self.session.intervals.on_load_error(event.sample_time)
            }
        };

        let time = self.axis.current_time();
        let now = self.clock.now_ms();
        let mut ctx = SchedulerContext {
            session: &mut self.session,
            renderer: &mut self.renderer,
            time,
            now,
            extent: self.extent,
        };
        self.scheduler.on_load_event(&event, &mut ctx);
        self.scheduler.dispatch(&mut ctx);

        if changed {
            self.publish_intervals();
        }
        if matches!(event.kind, LoadEventKind::End) {
            self.renderer.request_repaint();
        }
        self.check_finished();
    }

    fn check_finished(&mut self) {
        let load_id = self.session.load_id;
        if self.session.intervals.is_finished() && self.governor.mark_finished(load_id) {
            let (loaded, total) = self.session.intervals.progress();
            info!("Session {} loaded ({}/{})", load_id, loaded, total);
            self.bus.emit(Notification::Loaded { load_id });
        }

        if self.scheduler.kind() == StrategyKind::Lazy {
            let settled = !self.scheduler.overlays().is_empty() && self.scheduler.is_settled(&self.session);
            if settled && !self.settled {
                debug!("Session {} ready", load_id);
                self.bus.emit(Notification::Ready { load_id });
            }
            self.settled = settled;
        }
    }

    fn on_time_changed(&mut self) {
        let time = self.axis.current_time();
        let now = self.clock.now_ms();
        let mut ctx = SchedulerContext {
            session: &mut self.session,
            renderer: &mut self.renderer,
            time,
            now,
            extent: self.extent,
        };
        self.scheduler.on_time_changed(&mut ctx);
        self.scheduler.dispatch(&mut ctx);

        self.bus.emit(Notification::TimeChanged { time });
        self.check_finished();
        self.renderer.request_repaint();
    }

    // ---- governor ----

    fn has_animated_layers(&self) -> bool {
        self.layers.values().any(|l| l.kind != LayerKind::Static)
    }

    /// Visibility of every non-static layer
    fn animated_visibility(&self) -> IndexMap<String, bool> {
        self.layers
            .values()
            .filter(|l| l.kind != LayerKind::Static)
            .map(|l| (l.id.clone(), l.visible))
            .collect()
    }

    fn evaluate(&mut self, extent: Extent) {
        self.extent = extent;
        let visibility = self.animated_visibility();
        let overlays = self.scheduler.overlays();
        let check = ReloadCheck {
            visibility: &visibility,
            table_empty: self.session.intervals.is_empty(),
            overlays: &overlays,
            extent: &self.extent,
        };
        if self.governor.reload_needed(&check) {
            self.reload();
        } else {
            self.apply_display();
            self.renderer.request_repaint();
        }
    }

    /// Replace the session: new load id, fresh resolution, fresh frames
    fn reload(&mut self) {
        let now = self.clock.now_ms();
        let visibility = self.animated_visibility();
        let load_id = self.governor.begin_session(now, &visibility);
        self.scheduler.teardown(&mut self.renderer);

        let params = self.config.resolver_params(now);
        let plans: Vec<OverlayPlan> = self
            .layers
            .values()
            .filter(|l| l.visible && l.kind != LayerKind::Static)
            .filter_map(|l| {
                let resolved = resolve(&l.animation_spec(&self.axis), &self.axis, &params).animated()?;
                if resolved.samples.is_empty() {
                    debug!("Layer {}: no samples in window", l.id);
                    return None;
                }
                Some(OverlayPlan {
                    layer_id: l.id.clone(),
                    kind: l.kind,
                    visible: l.visible,
                    opacity: l.opacity,
                    resolved,
                })
            })
            .collect();

        let table = IntervalTable::build(
            plans.iter().map(|p| p.resolved.samples.as_slice()),
            self.axis.resolution_time(),
        );
        self.session = Session::new(load_id, table, self.config.max_concurrency);
        self.settled = false;
        info!(
            "Reload {}: {} overlays, {} intervals ({})",
            load_id,
            plans.len(),
            self.session.intervals.len(),
            self.scheduler.kind()
        );
        self.bus.emit(Notification::Reload { load_id });

        let mut ctx = SchedulerContext {
            session: &mut self.session,
            renderer: &mut self.renderer,
            time: self.axis.current_time(),
            now,
            extent: self.extent,
        };
        self.scheduler.build(&plans, &mut ctx);
        self.scheduler.dispatch(&mut ctx);

        self.publish_intervals();
        self.check_finished();
        self.renderer.request_repaint();
    }

    fn apply_display(&mut self) {
        let displays: IndexMap<String, LayerDisplay> = self
            .layers
            .values()
            .map(|l| (l.id.clone(), LayerDisplay { visible: l.visible, opacity: l.opacity }))
            .collect();
        let mut ctx = SchedulerContext {
            session: &mut self.session,
            renderer: &mut self.renderer,
            time: self.axis.current_time(),
            now: self.clock.now_ms(),
            extent: self.extent,
        };
        self.scheduler.apply_display(&displays, &mut ctx);
        self.scheduler.dispatch(&mut ctx);
        self.check_finished();
    }

    /// Drop every frame and start over from an empty session
    fn clear_session(&mut self) {
        self.scheduler.teardown(&mut self.renderer);
        self.session = Session::empty(self.config.max_concurrency);
        self.settled = false;
        self.renderer.request_repaint();
    }

    fn publish_intervals(&self) {
        self.bus.emit(Notification::IntervalsChanged {
            load_id: self.session.load_id,
            intervals: self.snapshot(),
        });
    }

    pub fn snapshot(&self) -> Vec<IntervalSnapshot> {
        self.session.intervals.snapshot()
    }
}

impl<R: Renderer> Drop for Animator<R> {
    fn drop(&mut self) {
        self.scheduler.teardown(&mut self.renderer);
    }
}

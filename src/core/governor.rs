//! Session/reload governor.
//!
//! Decides whether the current session still matches what the view asks
//! for, or must be rebuilt under a new load id. A pure pan/zoom that keeps
//! the extent and layer visibility must not rebuild.

use indexmap::IndexMap;
use log::{debug, trace};

use super::session::{FinishTracker, LoadIdAllocator};
use crate::entities::{Extent, LoadId, Millis, OverlaySummary};

/// Snapshot of everything `reload_needed` looks at
#[derive(Debug, Clone, Copy)]
pub struct ReloadCheck<'a> {
    /// Visibility of every animated layer, keyed by layer id
    pub visibility: &'a IndexMap<String, bool>,
    pub table_empty: bool,
    pub overlays: &'a [OverlaySummary],
    pub extent: &'a Extent,
}

#[derive(Debug, Clone, Default)]
pub struct Governor {
    ids: LoadIdAllocator,
    finish: FinishTracker,
    /// Visibility the current session was built with
    session_visibility: IndexMap<String, bool>,
    /// Set when the time axis or layer set changed under the session
    invalidated: bool,
}

impl Governor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next evaluation to rebuild
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn reload_needed(&self, check: &ReloadCheck<'_>) -> bool {
        let reason = if check.visibility.is_empty() {
            debug!("Reload check: no animated layers");
            return false;
        } else if self.invalidated {
            "session invalidated"
        } else if check.table_empty {
            // every visible layer trimmed to nothing: keep rebuilding until
            // the clock brings samples into the window
            trace!("Reload check: no samples in window");
            "interval table empty"
        } else if check.overlays.iter().any(|o| o.visible && o.rendered_frames == 0) {
            "visible overlay without frames"
        } else if check.overlays.iter().any(|o| o.extent != *check.extent) {
            "extent changed"
        } else if check.visibility.values().any(|&v| v) && self.visibility_changed(check.visibility) {
            "visibility changed"
        } else {
            debug!("Reload check: session still valid");
            return false;
        };
        debug!("Reload check: {}", reason);
        true
    }

    fn visibility_changed(&self, visibility: &IndexMap<String, bool>) -> bool {
        visibility.len() != self.session_visibility.len()
            || visibility
                .iter()
                .any(|(id, v)| self.session_visibility.get(id) != Some(v))
    }

    /// Start a new session: allocate its id and remember its inputs
    pub fn begin_session(&mut self, wall_clock: Millis, visibility: &IndexMap<String, bool>) -> LoadId {
        self.invalidated = false;
        self.session_visibility = visibility.clone();
        self.ids.next(wall_clock)
    }

    /// True the first time the given session is reported finished
    pub fn mark_finished(&mut self, load_id: LoadId) -> bool {
        self.finish.mark(load_id)
    }

    pub fn finished_id(&self) -> LoadId {
        self.finish.finished_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vis(pairs: &[(&str, bool)]) -> IndexMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn overlay(id: &str, visible: bool, frames: usize, extent: Extent) -> OverlaySummary {
        OverlaySummary { layer_id: id.into(), visible, rendered_frames: frames, extent }
    }

    #[test]
    fn test_no_layers_never_reloads() {
        let mut g = Governor::new();
        g.invalidate();
        let v = vis(&[]);
        let check = ReloadCheck { visibility: &v, table_empty: true, overlays: &[], extent: &Extent::default() };
        assert!(!g.reload_needed(&check));
    }

    #[test]
    fn test_empty_table_reloads() {
        let g = Governor::new();
        let v = vis(&[("radar", true)]);
        let check = ReloadCheck { visibility: &v, table_empty: true, overlays: &[], extent: &Extent::default() };
        assert!(g.reload_needed(&check));
    }

    #[test]
    fn test_unchanged_view_does_not_reload() {
        let mut g = Governor::new();
        let e = Extent::new(0.0, 0.0, 10.0, 10.0);
        let v = vis(&[("radar", true), ("sat", false)]);
        g.begin_session(1, &v);
        let overlays = [overlay("radar", true, 4, e)];
        let check = ReloadCheck { visibility: &v, table_empty: false, overlays: &overlays, extent: &e };
        assert!(!g.reload_needed(&check));

        let moved = Extent::new(1.0, 0.0, 11.0, 10.0);
        let check = ReloadCheck { extent: &moved, ..check };
        assert!(g.reload_needed(&check));
    }

    #[test]
    fn test_visibility_change() {
        let mut g = Governor::new();
        let e = Extent::default();
        g.begin_session(1, &vis(&[("radar", true), ("sat", false)]));
        let overlays = [overlay("radar", true, 4, e)];

        let v = vis(&[("radar", true), ("sat", true)]);
        let check = ReloadCheck { visibility: &v, table_empty: false, overlays: &overlays, extent: &e };
        assert!(g.reload_needed(&check));

        // everything hidden: nothing to rebuild for
        let v = vis(&[("radar", false), ("sat", false)]);
        let overlays = [overlay("radar", false, 4, e)];
        let check = ReloadCheck { visibility: &v, table_empty: false, overlays: &overlays, extent: &e };
        assert!(!g.reload_needed(&check));
    }

    #[test]
    fn test_visible_overlay_without_frames() {
        let mut g = Governor::new();
        let e = Extent::default();
        let v = vis(&[("radar", true)]);
        g.begin_session(1, &v);
        let overlays = [overlay("radar", true, 0, e)];
        let check = ReloadCheck { visibility: &v, table_empty: false, overlays: &overlays, extent: &e };
        assert!(g.reload_needed(&check));
    }

    #[test]
    fn test_invalidate_and_ids() {
        let mut g = Governor::new();
        let e = Extent::default();
        let v = vis(&[("radar", true)]);
        let first = g.begin_session(100, &v);
        let overlays = [overlay("radar", true, 3, e)];
        let check = ReloadCheck { visibility: &v, table_empty: false, overlays: &overlays, extent: &e };
        assert!(!g.reload_needed(&check));
        g.invalidate();
        assert!(g.reload_needed(&check));
        let second = g.begin_session(50, &v);
        assert!(second > first);
        assert!(!g.is_invalidated());
        assert!(g.mark_finished(second));
        assert!(!g.mark_finished(first));
    }
}

//! Frame selector - picks the visible frame of each overlay as the clock moves.
//!
//! Per group a `pointer` tracks the active frame. On a clock change to `t`:
//! - pointer reset to 0 when its frame lies after `t` (or nothing selected yet)
//! - then advanced while the next frame's time is < `t + resolution`
//!
//! Edge suppression: the last observation frame hides once `t` runs past
//! it, the first forecast frame hides while `t` is still before now.
//!
//! Opacity is only touched when the shown frame changes, so at most one
//! frame per group carries nonzero opacity at any time.

use log::trace;

use crate::entities::{LayerKind, Millis, OverlayGroup, Renderer};

/// New pointer for `times` at clock `t`. -1 only when `times` is empty.
pub fn advance_pointer(times: &[Millis], pointer: isize, t: Millis, resolution: Millis) -> isize {
    if times.is_empty() {
        return -1;
    }
    let mut p = pointer;
    if p < 0 || p as usize >= times.len() || times[p as usize] > t {
        p = 0;
    }
    while (p as usize + 1) < times.len() && times[p as usize + 1] < t + resolution {
        p += 1;
    }
    p
}

/// Whether the frame at `index` must stay hidden at clock `t`
pub fn is_suppressed(kind: LayerKind, times: &[Millis], index: usize, t: Millis, now: Millis) -> bool {
    match kind {
        LayerKind::Observation => index + 1 == times.len() && t > times[index],
        LayerKind::Forecast => index == 0 && t < now,
        LayerKind::Static => false,
    }
}

/// Frame index that should be visible, or None
pub fn target_frame(
    kind: LayerKind,
    times: &[Millis],
    pointer: isize,
    t: Millis,
    now: Millis,
) -> Option<usize> {
    if pointer < 0 {
        return None;
    }
    let idx = pointer as usize;
    (!is_suppressed(kind, times, idx, t, now)).then_some(idx)
}

/// Re-evaluate one group at clock `t`. Returns true if the shown frame changed.
pub fn select_frame(group: &mut OverlayGroup, t: Millis, now: Millis, renderer: &mut dyn Renderer) -> bool {
    let times = group.sample_times();
    group.pointer = advance_pointer(&times, group.pointer, t, group.resolution_time);

    let target = if group.visible {
        target_frame(group.kind, &times, group.pointer, t, now)
    } else {
        None
    };
    show_frame(group, target, renderer)
}

/// Move nonzero opacity to `target`. Returns true if anything changed.
pub fn show_frame(group: &mut OverlayGroup, target: Option<usize>, renderer: &mut dyn Renderer) -> bool {
    if target == group.shown {
        return false;
    }
    if let Some(old) = group.shown.and_then(|i| group.frames.get(i)) {
        renderer.set_opacity(old.id, 0.0);
    }
    if let Some(new) = target.and_then(|i| group.frames.get(i)) {
        renderer.set_opacity(new.id, group.display_opacity());
    }
    trace!("{}: frame {:?} -> {:?}", group.layer_id, group.shown, target);
    group.shown = target;
    true
}

/// Re-apply opacity to the shown frame after an opacity/visibility change
pub fn refresh_opacity(group: &mut OverlayGroup, renderer: &mut dyn Renderer) {
    if !group.visible {
        show_frame(group, None, renderer);
    } else if let Some(frame) = group.shown.and_then(|i| group.frames.get(i)) {
        renderer.set_opacity(frame.id, group.display_opacity());
    }
}

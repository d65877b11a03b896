//! Layer time resolver - turns one layer's time range into concrete samples.
//!
//! Policies, tried in priority order:
//! 1. **Capability resolution**: regular grid from the capability document,
//!    begin snapped onto the grid anchored at the capability begin.
//! 2. **Capability list**: explicit instants, near-duplicates merged.
//! 3. **Fixed resolution**: evenly spaced from begin to end.
//!
//! Results are clipped to the time axis, trimmed at the "now" edge by layer
//! kind, and thinned so no two samples are closer than the epsilon.
//! A layer with no usable resolution comes back as [`Resolution::Static`].

use log::{debug, warn};

use crate::entities::{LayerAnimationSpec, LayerKind, Millis, TimeAxis};

/// Which policy produced the samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePolicy {
    CapabilityResolution,
    CapabilityList,
    FixedResolution,
}

/// Session-wide inputs to resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverParams {
    /// Wall clock at session build
    pub now: Millis,
    /// Observations at or after `now - ignore_obs_offset` are not yet available
    pub ignore_obs_offset: Millis,
    /// Minimum spacing between two samples of one layer
    pub min_resolution: Millis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub begin_time: Millis,
    pub end_time: Millis,
    pub resolution_time: Millis,
    pub samples: Vec<Millis>,
    pub policy: TimePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Animated(ResolvedLayer),
    /// Excluded from scheduling
    Static,
}

impl Resolution {
    pub fn animated(self) -> Option<ResolvedLayer> {
        match self {
            Resolution::Animated(r) => Some(r),
            Resolution::Static => None,
        }
    }
}

/// Resolve one layer against the axis.
pub fn resolve(spec: &LayerAnimationSpec, axis: &TimeAxis, params: &ResolverParams) -> Resolution {
    if spec.kind == LayerKind::Static {
        return Resolution::Static;
    }

    let begin = spec.begin_time.max(axis.begin_time());
    let end = spec.end_time.min(axis.end_time());

    let resolved = if let Some(res) = spec.capab_resolution_time.filter(|&r| r > 0) {
        Some(capability_grid(spec, begin, end, res))
    } else if let Some(times) = &spec.capab_times {
        capability_list(spec, times, begin, end, axis)
    } else if let Some(res) = spec.resolution_time.filter(|&r| r > 0) {
        Some(ResolvedLayer {
            begin_time: begin,
            end_time: end,
            resolution_time: res,
            samples: grid(begin, end, res),
            policy: TimePolicy::FixedResolution,
        })
    } else {
        None
    };

    let Some(mut layer) = resolved else {
        warn!("No usable time resolution, treating layer as static");
        return Resolution::Static;
    };

    trim_by_kind(&mut layer, spec.kind, params);
    layer.samples = thin(&layer.samples, params.min_resolution);

    debug!(
        "Resolved {:?} via {:?}: {} samples in [{}, {}] every {}",
        spec.kind,
        layer.policy,
        layer.samples.len(),
        layer.begin_time,
        layer.end_time,
        layer.resolution_time
    );
    Resolution::Animated(layer)
}

/// Inclusive regular grid; empty when end < begin
fn grid(begin: Millis, end: Millis, res: Millis) -> Vec<Millis> {
    if end < begin || res <= 0 {
        return Vec::new();
    }
    let count = (end - begin) / res;
    (0..=count).map(|i| begin + i * res).collect()
}

fn capability_grid(spec: &LayerAnimationSpec, begin: Millis, end: Millis, res: Millis) -> ResolvedLayer {
    let anchor = spec.capab_begin_time.unwrap_or(0);
    let begin = if begin <= anchor {
        anchor
    } else {
        // next grid point at or after begin
        anchor + (begin - anchor + res - 1) / res * res
    };
    let end = spec.capab_end_time.map_or(end, |ce| end.min(ce));

    ResolvedLayer {
        begin_time: begin,
        end_time: end,
        resolution_time: res,
        samples: grid(begin, end, res),
        policy: TimePolicy::CapabilityResolution,
    }
}

fn capability_list(
    spec: &LayerAnimationSpec,
    times: &[Millis],
    begin: Millis,
    end: Millis,
    axis: &TimeAxis,
) -> Option<ResolvedLayer> {
    let merge_below = spec.resolution_time.unwrap_or(0);
    let merged = merge_close(times, merge_below);
    let samples: Vec<Millis> = merged.into_iter().filter(|&t| t >= begin && t <= end).collect();

    let resolution_time = spec
        .resolution_time
        .filter(|&r| r > 0)
        .or_else(|| samples.windows(2).map(|w| w[1] - w[0]).filter(|&d| d > 0).min())
        .or_else(|| Some(axis.resolution_time()).filter(|&r| r > 0))?;

    Some(ResolvedLayer {
        begin_time: begin,
        end_time: end,
        resolution_time,
        samples,
        policy: TimePolicy::CapabilityList,
    })
}

/// Collapse runs of instants closer than `threshold`; the latest of a run survives.
pub fn merge_close(times: &[Millis], threshold: Millis) -> Vec<Millis> {
    let mut out: Vec<Millis> = Vec::with_capacity(times.len());
    for &t in times {
        match out.last_mut() {
            Some(last) if t - *last < threshold => *last = t,
            _ => out.push(t),
        }
    }
    out
}

fn trim_by_kind(layer: &mut ResolvedLayer, kind: LayerKind, params: &ResolverParams) {
    match kind {
        LayerKind::Observation => {
            let cutoff = params.now - params.ignore_obs_offset;
            layer.samples.retain(|&t| t < cutoff);
        }
        LayerKind::Forecast => {
            let cutoff = params.now - layer.resolution_time;
            layer.samples.retain(|&t| t > cutoff);
        }
        LayerKind::Static => {}
    }
}

/// Drop samples closer than `epsilon` to the previously kept one
pub fn thin(samples: &[Millis], epsilon: Millis) -> Vec<Millis> {
    let mut cursor: Option<Millis> = None;
    let mut out = Vec::with_capacity(samples.len());
    for &t in samples {
        if cursor.is_some_and(|c| t - c < epsilon) {
            continue;
        }
        cursor = Some(t);
        out.push(t);
    }
    out
}

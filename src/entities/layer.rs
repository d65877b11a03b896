//! Layer descriptions: configuration as loaded, and the per-session
//! animation spec the time resolver works from.

use serde::{Deserialize, Serialize};

use super::time::{Millis, de_opt_duration, parse_recurrence};
use super::time_axis::TimeAxis;

/// Layer classification. Controls which edge of the window is trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Observation,
    Forecast,
    Static,
}

/// Raw time spec from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerTimeSpec {
    /// `"begin/end/PT15M"`
    Range { range: String },
    List { list: Vec<Millis> },
    /// Must stay last: every field is optional
    Grid {
        #[serde(default)]
        begin: Option<Millis>,
        #[serde(default)]
        end: Option<Millis>,
        #[serde(default, deserialize_with = "de_opt_duration")]
        resolution: Option<Millis>,
    },
}

/// Time information pre-parsed from a capability document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityTimes {
    pub times: Option<Vec<Millis>>,
    #[serde(deserialize_with = "de_opt_duration")]
    pub resolution: Option<Millis>,
    pub begin: Option<Millis>,
    pub end: Option<Millis>,
}

/// One animated (or static) overlay as configured by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    #[serde(default)]
    pub kind: LayerKind,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub time: Option<LayerTimeSpec>,
    #[serde(default)]
    pub capabilities: Option<CapabilityTimes>,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl LayerConfig {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            visible: true,
            opacity: 1.0,
            time: None,
            capabilities: None,
        }
    }

    pub fn with_time(mut self, time: LayerTimeSpec) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTimes) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Build the animation spec for a session. Missing bounds fall back to the axis.
    ///
    /// A malformed range string leaves the layer without a resolution; the
    /// resolver then degrades it to static.
    pub fn animation_spec(&self, axis: &TimeAxis) -> LayerAnimationSpec {
        let mut spec = LayerAnimationSpec {
            begin_time: axis.begin_time(),
            end_time: axis.end_time(),
            resolution_time: None,
            capab_times: None,
            capab_resolution_time: None,
            capab_begin_time: None,
            capab_end_time: None,
            kind: self.kind,
        };

        match &self.time {
            Some(LayerTimeSpec::Range { range }) => match parse_recurrence(range) {
                Ok((begin, end, resolution)) => {
                    spec.begin_time = begin;
                    spec.end_time = end;
                    spec.resolution_time = Some(resolution);
                }
                Err(e) => log::warn!("Layer {}: {}", self.id, e),
            },
            Some(LayerTimeSpec::Grid { begin, end, resolution }) => {
                spec.begin_time = begin.unwrap_or(spec.begin_time);
                spec.end_time = end.unwrap_or(spec.end_time);
                spec.resolution_time = *resolution;
            }
            Some(LayerTimeSpec::List { list }) => {
                spec.capab_times = Some(list.clone());
            }
            None => {}
        }

        if let Some(caps) = &self.capabilities {
            if caps.times.is_some() {
                spec.capab_times = caps.times.clone();
            }
            spec.capab_resolution_time = caps.resolution;
            spec.capab_begin_time = caps.begin;
            spec.capab_end_time = caps.end;
        }

        if let Some(times) = spec.capab_times.as_mut() {
            times.sort_unstable();
        }
        spec
    }
}

/// Per-session, immutable description of one layer's time range.
///
/// Exactly one of `capab_resolution_time`, `capab_times`, `resolution_time`
/// drives sample generation, tried in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAnimationSpec {
    pub begin_time: Millis,
    pub end_time: Millis,
    pub resolution_time: Option<Millis>,
    pub capab_times: Option<Vec<Millis>>,
    pub capab_resolution_time: Option<Millis>,
    pub capab_begin_time: Option<Millis>,
    pub capab_end_time: Option<Millis>,
    pub kind: LayerKind,
}

impl LayerAnimationSpec {
    /// Plain fixed-resolution spec
    pub fn fixed(begin_time: Millis, end_time: Millis, resolution_time: Millis, kind: LayerKind) -> Self {
        Self {
            begin_time,
            end_time,
            resolution_time: Some(resolution_time),
            capab_times: None,
            capab_resolution_time: None,
            capab_begin_time: None,
            capab_end_time: None,
            kind,
        }
    }
}

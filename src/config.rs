//! Engine settings and scenario files.
//!
//! `AnimatorConfig` carries the scheduling knobs; every field has a default
//! so partial JSON is accepted. A `Scenario` bundles settings, the time axis,
//! the view extent and the layer list for the demo binary.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::resolver::ResolverParams;
use crate::core::scheduler::StrategyKind;
use crate::entities::time::de_duration;
use crate::entities::{Extent, LayerConfig, Millis, TimeAxis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Outstanding fetches allowed at once
    pub max_concurrency: usize,
    /// Quiet window before a view change is evaluated
    pub debounce_ms: u64,
    /// Observations newer than `now - offset` are skipped
    #[serde(deserialize_with = "de_duration")]
    pub ignore_obs_offset_ms: Millis,
    /// Samples of one layer closer than this are thinned to the first.
    /// The default only drops exact duplicates; raise it to collapse
    /// capability lists with jittered timestamps.
    #[serde(deserialize_with = "de_duration")]
    pub min_resolution_ms: Millis,
    pub strategy: StrategyKind,
    /// Capacity of the completion channel
    pub event_capacity: usize,
    pub loop_enabled: bool,
    pub frame_delay_ms: u64,
    pub period_delay_ms: u64,
}

impl AnimatorConfig {
    /// Resolver inputs for a session built at `now`
    pub fn resolver_params(&self, now: Millis) -> ResolverParams {
        ResolverParams {
            now,
            ignore_obs_offset: self.ignore_obs_offset_ms,
            min_resolution: self.min_resolution_ms,
        }
    }
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            debounce_ms: 50,
            ignore_obs_offset_ms: 0,
            min_resolution_ms: 1,
            strategy: StrategyKind::Eager,
            event_capacity: 4096,
            loop_enabled: true,
            frame_delay_ms: 500,
            period_delay_ms: 1000,
        }
    }
}

/// Time axis as written in a scenario: a regular grid or explicit instants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisConfig {
    Times {
        times: Vec<Millis>,
    },
    Grid {
        begin: Millis,
        end: Millis,
        #[serde(deserialize_with = "de_duration")]
        resolution: Millis,
        /// Start position, defaults to `begin`
        #[serde(default)]
        start: Option<Millis>,
    },
}

impl AxisConfig {
    pub fn to_axis(&self) -> TimeAxis {
        match self {
            AxisConfig::Times { times } => TimeAxis::from_times(times.clone()),
            AxisConfig::Grid { begin, end, resolution, start } => {
                let mut axis = TimeAxis::new(*begin, *end, *resolution);
                if let Some(t) = start {
                    axis.set_animation_time(*t);
                }
                axis
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub animator: AnimatorConfig,
    pub axis: AxisConfig,
    #[serde(default)]
    pub extent: Extent,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let scenario = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))?;
        debug!(
            "Scenario {}: {} layers, strategy {}",
            path.display(),
            scenario.layers.len(),
            scenario.animator.strategy
        );
        Ok(scenario)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::time::MINUTE;
    use crate::entities::{LayerKind, LayerTimeSpec};

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: AnimatorConfig = serde_json::from_str(r#"{"max_concurrency": 2, "strategy": "lazy"}"#).unwrap();
        assert_eq!(cfg.max_concurrency, 2);
        assert_eq!(cfg.strategy, StrategyKind::Lazy);
        assert_eq!(cfg.debounce_ms, 50);
        assert_eq!(cfg.min_resolution_ms, 1);
    }

    #[test]
    fn test_iso_durations_in_config() {
        let cfg: AnimatorConfig =
            serde_json::from_str(r#"{"ignore_obs_offset_ms": "PT5M", "min_resolution_ms": 1000}"#).unwrap();
        assert_eq!(cfg.ignore_obs_offset_ms, 5 * MINUTE);
        assert_eq!(cfg.min_resolution_ms, 1000);
    }

    #[test]
    fn test_scenario_parse() {
        let raw = r#"{
            "axis": {"begin": 0, "end": 3600000, "resolution": "PT15M"},
            "extent": {"min_x": 0, "min_y": 0, "max_x": 10, "max_y": 10},
            "layers": [
                {"id": "radar", "kind": "observation", "time": {"range": "0/3600000/PT5M"}},
                {"id": "coast", "kind": "static", "opacity": 0.5}
            ]
        }"#;
        let s = Scenario::from_json(raw).unwrap();
        let axis = s.axis.to_axis();
        assert_eq!(axis.num_intervals(), 4);
        assert_eq!(axis.current_time(), 0);
        assert_eq!(s.layers.len(), 2);
        assert!(matches!(s.layers[0].time, Some(LayerTimeSpec::Range { .. })));
        assert_eq!(s.layers[1].kind, LayerKind::Static);
        assert_eq!(s.layers[1].opacity, 0.5);
        assert_eq!(s.animator, AnimatorConfig::default());
    }

    #[test]
    fn test_explicit_axis_times() {
        let s = Scenario::from_json(r#"{"axis": {"times": [300, 100, 200]}}"#).unwrap();
        let axis = s.axis.to_axis();
        assert_eq!(axis.times(), Some(&[100, 200, 300][..]));
    }

    #[test]
    fn test_demo_scenario_parses() {
        let s = Scenario::from_json(include_str!("../demos/radar_loop.json")).unwrap();
        assert_eq!(s.layers.len(), 4);
        assert_eq!(s.animator.ignore_obs_offset_ms, 5 * MINUTE);
        assert_eq!(s.axis.to_axis().num_intervals(), 12);
        let forecast = &s.layers[2];
        assert!(!forecast.visible);
        assert_eq!(forecast.capabilities.as_ref().and_then(|c| c.resolution), Some(60 * MINUTE));
    }

    #[test]
    fn test_missing_scenario_file() {
        assert!(Scenario::load(Path::new("/nonexistent/wxloop.json")).is_err());
    }
}

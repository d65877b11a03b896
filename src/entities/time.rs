//! Time primitives shared by the whole engine.
//!
//! All instants are milliseconds since the Unix epoch, all durations are
//! milliseconds. Configuration may spell durations as ISO-8601 periods
//! (`PT15M`, `P1DT6H`) and ranges as `begin/end/period` recurrences.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

/// Milliseconds since the Unix epoch (or a plain duration in ms).
pub type Millis = i64;

pub const SECOND: Millis = 1_000;
pub const MINUTE: Millis = 60 * SECOND;
pub const HOUR: Millis = 60 * MINUTE;
pub const DAY: Millis = 24 * HOUR;

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .expect("static period regex")
});

/// Malformed time specification
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpecError {
    BadPeriod(String),
    BadRecurrence(String),
    ZeroPeriod,
}

impl std::fmt::Display for TimeSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeSpecError::BadPeriod(s) => write!(f, "Invalid ISO-8601 period: {}", s),
            TimeSpecError::BadRecurrence(s) => write!(f, "Invalid time recurrence: {}", s),
            TimeSpecError::ZeroPeriod => write!(f, "Period must be positive"),
        }
    }
}

impl std::error::Error for TimeSpecError {}

/// Parse an ISO-8601 period (`PT5M`, `PT1H30M`, `P1D`, `PT0.5S`) to ms.
pub fn parse_period(s: &str) -> Result<Millis, TimeSpecError> {
    let caps = PERIOD_RE
        .captures(s.trim())
        .ok_or_else(|| TimeSpecError::BadPeriod(s.to_string()))?;

    let int = |i: usize| -> Millis {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<Millis>().ok())
            .unwrap_or(0)
    };
    let secs = caps
        .get(4)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let ms = int(1) * DAY + int(2) * HOUR + int(3) * MINUTE + (secs * SECOND as f64).round() as Millis;
    if ms <= 0 {
        return Err(TimeSpecError::ZeroPeriod);
    }
    Ok(ms)
}

/// Parse `begin/end/period` where begin and end are integer ms.
pub fn parse_recurrence(s: &str) -> Result<(Millis, Millis, Millis), TimeSpecError> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    let [begin, end, period] = parts.as_slice() else {
        return Err(TimeSpecError::BadRecurrence(s.to_string()));
    };
    let begin = begin
        .parse::<Millis>()
        .map_err(|_| TimeSpecError::BadRecurrence(s.to_string()))?;
    let end = end
        .parse::<Millis>()
        .map_err(|_| TimeSpecError::BadRecurrence(s.to_string()))?;
    Ok((begin, end, parse_period(period)?))
}

/// Serde helper: accept either an integer ms value or an ISO-8601 period.
pub fn de_duration<'de, D>(deserializer: D) -> Result<Millis, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Ms(Millis),
        Iso(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Ms(ms) => Ok(ms),
        Raw::Iso(s) => parse_period(&s).map_err(serde::de::Error::custom),
    }
}

/// Optional variant of [`de_duration`]
pub fn de_opt_duration<'de, D>(deserializer: D) -> Result<Option<Millis>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_duration")] Millis);
    Ok(Option::<Wrap>::deserialize(deserializer)?.map(|w| w.0))
}

/// Map extent a session was rendered for (projected coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("PT15M"), Ok(15 * MINUTE));
        assert_eq!(parse_period("PT1H30M"), Ok(90 * MINUTE));
        assert_eq!(parse_period("P1D"), Ok(DAY));
        assert_eq!(parse_period("PT0.5S"), Ok(500));
        assert!(parse_period("15M").is_err());
        assert_eq!(parse_period("PT0M"), Err(TimeSpecError::ZeroPeriod));
    }

    #[test]
    fn test_parse_recurrence() {
        assert_eq!(parse_recurrence("0/3600000/PT15M"), Ok((0, 3_600_000, 900_000)));
        assert!(matches!(parse_recurrence("0/PT15M"), Err(TimeSpecError::BadRecurrence(_))));
    }

    #[test]
    fn test_duration_serde() {
        #[derive(Deserialize)]
        struct S {
            #[serde(deserialize_with = "de_duration")]
            a: Millis,
            #[serde(default, deserialize_with = "de_opt_duration")]
            b: Option<Millis>,
        }
        let s: S = serde_json::from_str(r#"{"a": "PT5M", "b": 1000}"#).unwrap();
        assert_eq!(s.a, 5 * MINUTE);
        assert_eq!(s.b, Some(1000));
        let s: S = serde_json::from_str(r#"{"a": 42}"#).unwrap();
        assert_eq!(s.b, None);
    }
}

//! CF-convention attribute decoding: time units and packed values.

use std::ops::Range;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// A time coordinate encoded as `<unit> since <reference>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    pub epoch: DateTime<Utc>,
    pub unit_seconds: i64,
}

impl TimeAxis {
    pub fn parse(units: &str) -> Result<Self> {
        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| anyhow!("time units `{}` are not `<unit> since <date>`", units))?;

        let unit_seconds = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1,
            "minutes" | "minute" | "mins" | "min" => 60,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600,
            "days" | "day" | "d" => 86400,
            other => bail!("unsupported time unit `{}`", other),
        };

        Ok(TimeAxis {
            epoch: parse_reference(reference.trim())?,
            unit_seconds,
        })
    }

    pub fn decode(&self, value: f64) -> DateTime<Utc> {
        let millis = (value * self.unit_seconds as f64 * 1000.0).round() as i64;
        self.epoch + Duration::milliseconds(millis)
    }

    /// The inverse of [`TimeAxis::decode`], in (fractional) units.
    pub fn encode(&self, time: DateTime<Utc>) -> f64 {
        (time - self.epoch).num_milliseconds() as f64 / (self.unit_seconds as f64 * 1000.0)
    }

    /// Indices of the regular samples `t0 + i * step` (in axis units) that
    /// fall within `[start, end]`, clipped to `len`. `None` when no sample does.
    pub fn window(
        &self,
        t0: f64,
        step: f64,
        len: u64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Range<u64>> {
        if step <= 0.0 || len == 0 || start > end {
            return None;
        }

        let first = ((self.encode(start) - t0) / step).ceil().max(0.0);
        let last = ((self.encode(end) - t0) / step).floor();
        if last < 0.0 || first >= len as f64 {
            return None;
        }

        let i0 = first as u64;
        let i1 = (last as u64 + 1).min(len);
        (i0 < i1).then_some(i0..i1)
    }
}

fn parse_reference(reference: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(reference) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = reference
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    bail!("unrecognised time reference `{}`", reference)
}

/// Packing and missing-value attributes of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CfScaling {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub missing: Vec<f64>,
}

impl CfScaling {
    pub fn from_attributes(attributes: &Map<String, Value>) -> Self {
        let number = |name: &str| attributes.get(name).and_then(Value::as_f64);

        let mut missing = Vec::new();
        for name in ["_FillValue", "missing_value"] {
            match attributes.get(name) {
                Some(Value::Number(n)) => missing.extend(n.as_f64()),
                Some(Value::Array(values)) => {
                    missing.extend(values.iter().filter_map(Value::as_f64))
                }
                _ => {}
            }
        }

        CfScaling {
            scale_factor: number("scale_factor").unwrap_or(1.0),
            add_offset: number("add_offset").unwrap_or(0.0),
            missing,
        }
    }

    /// Unpacks a raw stored value; missing values become `NaN`.
    pub fn apply(&self, raw: Option<f64>) -> f64 {
        match raw {
            Some(v) if !self.missing.contains(&v) => v * self.scale_factor + self.add_offset,
            _ => f64::NAN,
        }
    }
}

// -- Tests -------------------------------------------------------------------

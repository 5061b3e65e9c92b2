use chrono::{DateTime, Utc};

use super::{FlowUnit, Source};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    pub time: DateTime<Utc>,
    /// `NaN` marks a missing value so that positions are preserved.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSeries {
    pub source: Source,
    pub unit: FlowUnit,
    pub points: Vec<FlowPoint>,
}

impl FlowSeries {
    pub fn new(source: Source, unit: FlowUnit, points: Vec<FlowPoint>) -> Self {
        FlowSeries {
            source,
            unit,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest non-missing value, if any.
    pub fn max_value(&self) -> Option<f64> {
        self.points
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
            .fold(None, |max, v| match max {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }
}

// -- Tests ----------------------------------------------------------------------------

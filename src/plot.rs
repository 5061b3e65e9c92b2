//! Draws the compared series on one time-series chart.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use plotters::{coord::Shift, coord::types::RangedDateTime, prelude::*};

use crate::reading::{ArchiveVersion, FlowSeries, Source};

const STROKE_WIDTH: u32 = 2;
const DASH_SIZE: u32 = 8;
const DASH_SPACING: u32 = 5;

/// Everything about the chart that is not the data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub size: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLook {
    pub color: RGBColor,
    pub dashed: bool,
}

pub fn series_style(source: Source) -> LineLook {
    match source {
        Source::Nwm(ArchiveVersion::V21) => LineLook {
            color: BLUE,
            dashed: false,
        },
        Source::Nwm(ArchiveVersion::V3) => LineLook {
            color: RED,
            dashed: false,
        },
        Source::Usgs => LineLook {
            color: BLACK,
            dashed: true,
        },
    }
}

/// Upper bound of the flow axis: 10% above the largest value, or 1 when
/// there is nothing to draw.
pub fn y_axis_max(series: &[FlowSeries]) -> f64 {
    series
        .iter()
        .filter_map(FlowSeries::max_value)
        .reduce(f64::max)
        .filter(|m| *m > 0.0)
        .map_or(1.0, |m| m * 1.1)
}

/// Splits a series into runs of consecutive finite values.
pub fn finite_segments(series: &FlowSeries) -> Vec<Vec<(DateTime<Utc>, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for p in &series.points {
        if p.value.is_finite() {
            current.push((p.time, p.value));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Writes the chart to `output`; SVG when the file name ends in `.svg`,
/// PNG otherwise.
pub fn render(series: &[FlowSeries], spec: &ChartSpec, output: &Path) -> Result<()> {
    let result = if is_svg(output) {
        draw(SVGBackend::new(output, spec.size).into_drawing_area(), series, spec)
    } else {
        draw(BitMapBackend::new(output, spec.size).into_drawing_area(), series, spec)
    };

    result.with_context(|| format!("Failed to draw chart to `{}`", output.display()))
}

fn draw<DB>(root: DrawingArea<DB, Shift>, series: &[FlowSeries], spec: &ChartSpec) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let days = (spec.end - spec.start).num_days().max(1) as usize;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            RangedDateTime::from(spec.start..spec.end),
            0.0..y_axis_max(series),
        )?;

    chart
        .configure_mesh()
        .x_desc("Date (Daily)")
        .y_desc("Streamflow (cms)")
        .x_labels(days + 1)
        .x_label_formatter(&|dt: &DateTime<Utc>| dt.format("%Y-%m-%d").to_string())
        .light_line_style(BLACK.mix(0.1))
        .draw()?;

    for s in series {
        let look = series_style(s.source);
        let style = look.color.stroke_width(STROKE_WIDTH);
        let segments = finite_segments(s);

        // The first (possibly empty) segment carries the legend entry
        let mut first = true;
        for segment in segments.into_iter().chain(std::iter::once(Vec::new())) {
            if !first && segment.is_empty() {
                continue;
            }

            let annotation = if look.dashed {
                chart.draw_series(DashedLineSeries::new(segment, DASH_SIZE, DASH_SPACING, style))?
            } else {
                chart.draw_series(LineSeries::new(segment, style))?
            };

            if first {
                annotation.label(s.source.label()).legend(move |(x, y)| {
                    if look.dashed {
                        PathElement::new(vec![(x, y), (x + 8, y)], style)
                    } else {
                        PathElement::new(vec![(x, y), (x + 20, y)], style)
                    }
                });
                first = false;
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

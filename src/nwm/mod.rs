//! Reads one reach's streamflow from a National Water Model retrospective
//! `chrtout` Zarr store.

pub mod cf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info, warn};

use crate::{
    cli::{create_progress_bar, create_spinner},
    error::RetrievalError,
    reading::{ArchiveVersion, FlowPoint, FlowSeries, FlowUnit, Source},
    zarr::{Store, ZarrArray},
};
use cf::{CfScaling, TimeAxis};

const TIME: &str = "time";
const FEATURE_ID: &str = "feature_id";
const STREAMFLOW: &str = "streamflow";

/// Extracts the streamflow of `reach_id` between `start` and `end`
/// (inclusive) from the archive behind `store`. Progress is drawn through
/// `progress` so that concurrent reads share the terminal.
pub async fn read_reach<S: Store>(
    store: &S,
    version: ArchiveVersion,
    reach_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    progress: &MultiProgress,
) -> Result<FlowSeries> {
    let spinner = create_spinner(progress, format!("Opening NWM {} archive", version));
    let time = ZarrArray::open(store, TIME).await?;
    let features = ZarrArray::open(store, FEATURE_ID).await?;
    let streamflow = ZarrArray::open(store, STREAMFLOW).await?;
    spinner.finish_and_clear();

    // Time window
    let units = time
        .attribute_str("units")
        .with_context(|| format!("`{}` has no units attribute", TIME))?;
    let axis = TimeAxis::parse(units)?;
    let len = time.shape().first().copied().unwrap_or(0);

    let hidden = ProgressBar::hidden();
    let head = time.read_region(&[0..len.min(2)], &hidden).await?;
    let t0 = head
        .first()
        .copied()
        .flatten()
        .ok_or(RetrievalError::WindowOutsideArchive { version })?;
    let step = match head.get(1).copied().flatten() {
        Some(t1) => t1 - t0,
        None => 1.0,
    };

    let window = axis
        .window(t0, step, len, start, end)
        .ok_or(RetrievalError::WindowOutsideArchive { version })?;
    debug!("NWM {} time indices {:?}", version, window);

    let stamps = time.read_region(&[window.clone()], &hidden).await?;

    // Feature index
    let bar = create_progress_bar(
        progress,
        0,
        format!("Locating reach {} in NWM {}", reach_id, version),
    );
    let feature = features
        .find_first(reach_id as f64, &bar)
        .await?
        .ok_or(RetrievalError::ReachNotFound { reach_id, version })?;
    bar.finish_and_clear();
    debug!("NWM {} reach {} at feature index {}", version, reach_id, feature);

    // Streamflow column
    let dims = streamflow
        .dimension_names()
        .unwrap_or_else(|| vec![TIME.to_string(), FEATURE_ID.to_string()]);
    let ranges = dims
        .iter()
        .map(|d| match d.as_str() {
            TIME => Ok(window.clone()),
            FEATURE_ID => Ok(feature..feature + 1),
            other => bail!("unexpected `{}` dimension `{}`", STREAMFLOW, other),
        })
        .collect::<Result<Vec<_>>>()?;

    let bar = create_progress_bar(progress, 0, format!("Reading NWM {} streamflow", version));
    let raw = streamflow.read_region(&ranges, &bar).await?;
    bar.finish_and_clear();

    let scaling = CfScaling::from_attributes(&streamflow.attributes);
    let unit = match streamflow.attribute_str("units") {
        Some(code) => FlowUnit::from_code(code).unwrap_or_else(|| {
            warn!("Unrecognised NWM units `{}`, assuming cms", code);
            FlowUnit::CubicMetersPerSecond
        }),
        None => FlowUnit::CubicMetersPerSecond,
    };

    let points: Vec<FlowPoint> = window
        .zip(stamps)
        .zip(raw)
        .map(|((i, stamp), value)| FlowPoint {
            time: axis.decode(stamp.unwrap_or(t0 + i as f64 * step)),
            value: scaling.apply(value),
        })
        .collect();

    info!("NWM {}: {} values for reach {}", version, points.len(), reach_id);

    Ok(FlowSeries::new(Source::Nwm(version), unit, points))
}

// -- Tests -------------------------------------------------------------------

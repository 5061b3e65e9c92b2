//! Gauge observations from the USGS Instantaneous Values web service.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    download::fetch_text,
    error::RetrievalError,
    reading::{FlowPoint, FlowSeries, FlowUnit, Source},
};

pub const IV_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";

/// Discharge, cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

#[derive(Debug, Deserialize)]
struct IvResponse {
    value: IvValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IvValue {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeries {
    source_info: Option<SourceInfo>,
    variable: Option<Variable>,
    #[serde(default)]
    values: Vec<ValueBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceInfo {
    site_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Variable {
    unit: Option<Unit>,
    no_data_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Unit {
    unit_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueBlock {
    #[serde(default)]
    value: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    value: String,
    date_time: String,
}

/// A gauge's series together with the station name the service reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSeries {
    pub site_name: Option<String>,
    pub series: FlowSeries,
}

pub fn build_iv_url(
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    parameter: &str,
) -> String {
    format!(
        "{}?format=json&sites={}&startDT={}&endDT={}&parameterCd={}",
        IV_BASE_URL,
        site,
        start.format("%Y-%m-%dT%H:%MZ"),
        end.format("%Y-%m-%dT%H:%MZ"),
        parameter
    )
}

/// Parses an IV JSON document into a series in the unit the service reports.
pub fn parse_iv_response(
    body: &str,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SiteSeries> {
    let response: IvResponse =
        serde_json::from_str(body).context("invalid USGS IV response")?;

    let no_data = || RetrievalError::NoUsgsData {
        site: site.to_string(),
        start,
        end,
    };

    let series = response.value.time_series.into_iter().next().ok_or_else(no_data)?;
    let observations = series
        .values
        .into_iter()
        .next()
        .map(|block| block.value)
        .unwrap_or_default();
    if observations.is_empty() {
        return Err(no_data().into());
    }

    let variable = series.variable.as_ref();
    let no_data_value = variable.and_then(|v| v.no_data_value);
    let unit = match variable
        .and_then(|v| v.unit.as_ref())
        .and_then(|u| u.unit_code.as_deref())
    {
        Some(code) => FlowUnit::from_code(code).unwrap_or_else(|| {
            warn!("Unrecognised USGS unit `{}`, assuming cfs", code);
            FlowUnit::CubicFeetPerSecond
        }),
        None => FlowUnit::CubicFeetPerSecond,
    };

    let mut points = Vec::with_capacity(observations.len());
    for observation in observations {
        let time = DateTime::parse_from_rfc3339(&observation.date_time)
            .with_context(|| format!("invalid USGS timestamp `{}`", observation.date_time))?
            .with_timezone(&Utc);

        let value = match observation.value.trim().parse::<f64>() {
            Ok(v) if Some(v) == no_data_value => f64::NAN,
            Ok(v) => v,
            Err(_) => {
                debug!("Unparseable USGS value `{}` at {}", observation.value, time);
                f64::NAN
            }
        };

        points.push(FlowPoint { time, value });
    }

    Ok(SiteSeries {
        site_name: series.source_info.and_then(|s| s.site_name),
        series: FlowSeries::new(Source::Usgs, unit, points),
    })
}

/// Retrieves the observations of `site` between `start` and `end`.
pub async fn read_site(
    client: &Client,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    parameter: &str,
) -> Result<SiteSeries> {
    let url = build_iv_url(site, start, end, parameter);
    debug!("Requesting {}", url);

    let body = fetch_text(client, &url).await?;
    let site_series = parse_iv_response(&body, site, start, end)?;

    info!(
        "USGS {}: {} values ({})",
        site,
        site_series.series.len(),
        site_series.series.unit.abbreviation()
    );

    Ok(site_series)
}

// -- Tests -------------------------------------------------------------------

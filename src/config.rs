//! Settings for one comparison run.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{
    cli::{command::make_plot_file_name, Cli},
    reading::ArchiveVersion,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CompareConfig {
    pub reach_id: i64,
    pub site_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub versions: Vec<ArchiveVersion>,
    pub parameter: String,
    pub hourly_usgs: bool,
    pub output: PathBuf,
    pub size: (u32, u32),
}

impl CompareConfig {
    /// Validates the parsed arguments before any request is made.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.start >= cli.end {
            bail!("start {} must be before end {}", cli.start, cli.end);
        }
        if cli.width == 0 || cli.height == 0 {
            bail!("chart size must be positive, got {}x{}", cli.width, cli.height);
        }

        let mut versions = if cli.archives.is_empty() {
            vec![ArchiveVersion::V21, ArchiveVersion::V3]
        } else {
            cli.archives.clone()
        };
        let mut seen = Vec::new();
        versions.retain(|v| {
            let first = !seen.contains(v);
            seen.push(*v);
            first
        });

        Ok(CompareConfig {
            reach_id: cli.reach,
            site_id: cli.site.trim().to_string(),
            start: cli.start,
            end: cli.end,
            versions,
            parameter: cli.parameter.clone(),
            hourly_usgs: !cli.raw_usgs,
            output: cli
                .output
                .clone()
                .unwrap_or_else(|| make_plot_file_name(cli.reach)),
            size: (cli.width, cli.height),
        })
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or RFC 3339.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt.and_utc());
    }

    Err(format!(
        "`{}` is not a date (YYYY-MM-DD), a UTC date-time (YYYY-MM-DDTHH:MM:SS) or RFC 3339",
        s
    ))
}

// -- Tests -------------------------------------------------------------------

//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use clap::{command, Parser};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::{config::parse_datetime, reading::ArchiveVersion, usgs::PARAM_DISCHARGE};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Plots NWM retrospective streamflow for a reach against the observations
/// of a USGS gauge
pub struct Cli {
    /// NWM reach (feature) identifier
    #[arg(long, default_value_t = 18514402)]
    pub reach: i64,

    /// USGS site number
    #[arg(long, default_value = "02378500")]
    pub site: String,

    /// Start of the window (YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS in UTC, or RFC 3339)
    #[arg(long, default_value = "2020-08-24T00:00:00", value_parser = parse_datetime)]
    pub start: DateTime<Utc>,

    /// End of the window, inclusive
    #[arg(long, default_value = "2020-09-03T23:59:59", value_parser = parse_datetime)]
    pub end: DateTime<Utc>,

    /// NWM archive to read; repeat for several [default: all]
    #[arg(long = "archive", value_enum)]
    pub archives: Vec<ArchiveVersion>,

    /// USGS parameter code (72137 for tidally filtered discharge)
    #[arg(long, default_value = PARAM_DISCHARGE)]
    pub parameter: String,

    /// Plot the USGS series at its native resolution instead of hourly means
    #[arg(long)]
    pub raw_usgs: bool,

    /// Chart file; `.svg` selects SVG output [default: ~/streamflow-<reach>-<date>.png]
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Chart width in pixels
    #[arg(long, default_value_t = 1000)]
    pub width: u32,

    /// Chart height in pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,
}

/// Creates a spinner drawn through `progress`.
pub fn create_spinner(progress: &MultiProgress, message: String) -> ProgressBar {
    let bar = progress.add(ProgressBar::new_spinner().with_message(message));
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar drawn through `progress`.
pub fn create_progress_bar(progress: &MultiProgress, size: u64, message: String) -> ProgressBar {
    progress.add(
        ProgressBar::new(size).with_message(message).with_style(
            ProgressStyle::with_template(
                "[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} chunks {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("##-"),
        ),
    )
}

// -- Tests -------------------------------------------------------------------

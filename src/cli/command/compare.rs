use std::future::Future;

use anyhow::Result;
use futures::future::{try_join, try_join_all};
use indicatif::MultiProgress;
use log::info;

use crate::{
    cli::create_spinner,
    config::CompareConfig,
    download::http_client,
    normalize::{normalize, resample_hourly},
    nwm,
    plot::{self, ChartSpec},
    reading::{ArchiveVersion, FlowSeries},
    usgs::{self, SiteSeries},
    zarr::{HttpStore, Store},
};

/// Retrieves every configured series, aligns them and writes the chart.
/// Returns the path of the chart file.
pub async fn compare(config: &CompareConfig) -> Result<String> {
    let client = http_client()?;
    let progress = MultiProgress::new();

    let stores: Vec<_> = config
        .versions
        .iter()
        .map(|&version| (version, HttpStore::new(client.clone(), version.store_url())))
        .collect();
    let gauge = usgs::read_site(
        &client,
        &config.site_id,
        config.start,
        config.end,
        &config.parameter,
    );

    let (series, spec) = prepare(config, &stores, gauge, &progress).await?;

    let bar = create_spinner(&progress, "Rendering chart...".to_string());
    plot::render(&series, &spec, &config.output)?;
    bar.finish_with_message("Chart rendered");

    Ok(config.output.to_string_lossy().to_string())
}

/// Reads the reach from every archive in `stores` while `gauge` resolves,
/// then aligns the series and describes the chart to draw.
pub async fn prepare<S, G>(
    config: &CompareConfig,
    stores: &[(ArchiveVersion, S)],
    gauge: G,
    progress: &MultiProgress,
) -> Result<(Vec<FlowSeries>, ChartSpec)>
where
    S: Store,
    G: Future<Output = Result<SiteSeries>>,
{
    let archives = try_join_all(stores.iter().map(|(version, store)| {
        nwm::read_reach(
            store,
            *version,
            config.reach_id,
            config.start,
            config.end,
            progress,
        )
    }));

    let (mut series, site) = try_join(archives, gauge).await?;

    let observed = if config.hourly_usgs {
        resample_hourly(&site.series)
    } else {
        site.series
    };
    series.push(observed);

    let series = normalize(series);
    info!(
        "Plotting {} series of {} values",
        series.len(),
        series.first().map_or(0, |s| s.len())
    );

    let spec = ChartSpec {
        title: chart_title(site.site_name.as_deref(), &config.site_id, config.reach_id),
        start: config.start,
        end: config.end,
        size: config.size,
    };

    Ok((series, spec))
}

fn chart_title(site_name: Option<&str>, site_id: &str, reach_id: i64) -> String {
    let site = site_name.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(site_id);
    format!("Daily Streamflow at {} (NWMID#{})", site, reach_id)
}

// -- Tests -------------------------------------------------------------------

//! Failures that can happen while retrieving a series from either source.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::reading::ArchiveVersion;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reach {reach_id} is not present in the NWM {version} archive")]
    ReachNotFound {
        reach_id: i64,
        version: ArchiveVersion,
    },

    #[error("requested window lies outside the NWM {version} time axis")]
    WindowOutsideArchive { version: ArchiveVersion },

    #[error("no USGS data available for site {site} from {start} to {end}")]
    NoUsgsData {
        site: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("array metadata not found at `{key}`")]
    MissingArray { key: String },
}

//! Fetches remote objects over HTTP.

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode};

use crate::error::RetrievalError;

/// Builds the client shared by every request of a run.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Downloads the body at `url`. Returns `None` when the object does not
/// exist; S3 answers 403 rather than 404 for absent keys in buckets that
/// do not allow listing.
pub async fn fetch_optional(client: &Client, url: &str) -> Result<Option<Vec<u8>>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
        log::debug!("{} -> {} (treated as absent)", url, status);
        return Ok(None);
    }
    if !status.is_success() {
        return Err(RetrievalError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })?;
        body.extend_from_slice(&chunk);
    }

    log::debug!("{} -> {} bytes", url, body.len());

    Ok(Some(body))
}

/// Downloads the body at `url` as text. Any non-2xx status is an error.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RetrievalError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let text = response
        .text()
        .await
        .map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })?;

    Ok(text)
}

// -- Tests -------------------------------------------------------------------

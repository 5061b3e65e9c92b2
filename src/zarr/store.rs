//! Key/value access to a Zarr hierarchy.

use anyhow::Result;
use reqwest::Client;

use crate::download::fetch_optional;

/// A read-only Zarr store.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Returns the object stored under `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// A store served over plain HTTPS, such as a public S3 bucket.
pub struct HttpStore {
    client: Client,
    root: String,
}

impl HttpStore {
    pub fn new(client: Client, root: &str) -> Self {
        HttpStore {
            client,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, key: &str) -> String {
        format!("{}/{}", self.root, key.trim_start_matches('/'))
    }
}

impl Store for HttpStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        fetch_optional(&self.client, &self.url(key)).await
    }
}

#[cfg(test)]
pub use memory::MemoryStore;


// -- Tests -------------------------------------------------------------------

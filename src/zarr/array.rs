//! Reading regions of a single Zarr array.

use std::ops::Range;

use anyhow::{bail, Context, Result};
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use serde_json::{Map, Value};

use super::{metadata::ArrayMetadata, store::Store};
use crate::error::RetrievalError;

/// Chunks fetched at once.
const MAX_CONCURRENT_CHUNKS: usize = 8;

pub struct ZarrArray<'a, S: Store> {
    store: &'a S,
    path: String,
    pub metadata: ArrayMetadata,
    pub attributes: Map<String, Value>,
}

impl<'a, S: Store> ZarrArray<'a, S> {
    /// Opens the array at `path` by reading its `.zarray` and `.zattrs`.
    pub async fn open(store: &'a S, path: &str) -> Result<Self> {
        let path = path.trim_matches('/').to_string();
        let key = format!("{}/.zarray", path);

        let bytes = store
            .get(&key)
            .await?
            .ok_or_else(|| RetrievalError::MissingArray { key: key.clone() })?;
        let metadata = ArrayMetadata::from_json(&bytes).with_context(|| format!("`{}`", key))?;

        let attributes = match store.get(&format!("{}/.zattrs", path)).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("invalid `{}/.zattrs`", path))?,
            None => Map::new(),
        };

        log::debug!("opened `{}` {:?}", path, metadata);

        Ok(ZarrArray {
            store,
            path,
            metadata,
            attributes,
        })
    }

    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Dimension names from the xarray `_ARRAY_DIMENSIONS` attribute.
    pub fn dimension_names(&self) -> Option<Vec<String>> {
        self.attributes
            .get("_ARRAY_DIMENSIONS")?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect()
    }

    /// Reads the hyper-rectangle `ranges` and returns its values in row-major
    /// order. Elements equal to the fill value come back as `None`.
    pub async fn read_region(
        &self,
        ranges: &[Range<u64>],
        progress: &ProgressBar,
    ) -> Result<Vec<Option<f64>>> {
        let shape = &self.metadata.shape;
        let chunks = &self.metadata.chunks;

        if ranges.len() != shape.len() {
            bail!(
                "`{}` has {} dimensions, {} ranges given",
                self.path,
                shape.len(),
                ranges.len()
            );
        }
        for (d, r) in ranges.iter().enumerate() {
            if r.start > r.end || r.end > shape[d] {
                bail!(
                    "range {:?} out of bounds for dimension {} of `{}` (length {})",
                    r,
                    d,
                    self.path,
                    shape[d]
                );
            }
        }

        let out_shape: Vec<u64> = ranges.iter().map(|r| r.end - r.start).collect();
        let total: u64 = out_shape.iter().product();
        if total == 0 {
            return Ok(Vec::new());
        }
        let out_strides = row_major_strides(&out_shape);

        let first: Vec<u64> = ranges
            .iter()
            .zip(chunks)
            .map(|(r, c)| r.start / c)
            .collect();
        let last: Vec<u64> = ranges
            .iter()
            .zip(chunks)
            .map(|(r, c)| (r.end - 1) / c + 1)
            .collect();

        let mut grid = Vec::new();
        for_each_index(&first, &last, |coords| grid.push(coords.to_vec()));
        progress.set_length(grid.len() as u64);

        let mut fetched = stream::iter(grid)
            .map(|coords| async move {
                let values = self.read_chunk(&coords).await;
                (coords, values)
            })
            .buffered(MAX_CONCURRENT_CHUNKS);

        let chunk_strides = self.metadata.chunk_strides();
        let mut out = vec![None; total as usize];

        while let Some((coords, values)) = fetched.next().await {
            let values = values?;

            let origin: Vec<u64> = coords.iter().zip(chunks).map(|(c, n)| c * n).collect();
            let lo: Vec<u64> = ranges
                .iter()
                .zip(&origin)
                .map(|(r, o)| r.start.max(*o))
                .collect();
            let hi: Vec<u64> = ranges
                .iter()
                .zip(origin.iter().zip(chunks))
                .map(|(r, (o, n))| r.end.min(o + n))
                .collect();

            for_each_index(&lo, &hi, |index| {
                let mut src = 0u64;
                let mut dst = 0u64;
                for d in 0..index.len() {
                    src += (index[d] - origin[d]) * chunk_strides[d];
                    dst += (index[d] - ranges[d].start) * out_strides[d];
                }
                out[dst as usize] = values
                    .as_deref()
                    .and_then(|bytes| self.metadata.element(bytes, src as usize));
            });

            progress.inc(1);
        }

        Ok(out)
    }

    /// Scans a one-dimensional array chunk by chunk and returns the index of
    /// the first element equal to `target`.
    pub async fn find_first(&self, target: f64, progress: &ProgressBar) -> Result<Option<u64>> {
        if self.metadata.shape.len() != 1 {
            bail!("`{}` is not one-dimensional", self.path);
        }
        let len = self.metadata.shape[0];
        let chunk = self.metadata.chunks[0];
        let nchunks = len.div_ceil(chunk);
        progress.set_length(nchunks);

        let mut fetched = stream::iter(0..nchunks)
            .map(|c| async move { (c, self.read_chunk(&[c]).await) })
            .buffered(MAX_CONCURRENT_CHUNKS);

        while let Some((c, values)) = fetched.next().await {
            let values = values?;
            let valid = (len - c * chunk).min(chunk) as usize;

            if let Some(bytes) = values.as_deref() {
                if let Some(pos) =
                    (0..valid).find(|&i| self.metadata.element(bytes, i) == Some(target))
                {
                    return Ok(Some(c * chunk + pos as u64));
                }
            }
            progress.inc(1);
        }

        Ok(None)
    }

    /// Fetches and decompresses one chunk, keeping it in stored byte form.
    /// `None` when the chunk is absent, meaning every element is fill.
    async fn read_chunk(&self, coords: &[u64]) -> Result<Option<Vec<u8>>> {
        let key = format!("{}/{}", self.path, self.metadata.chunk_key(coords));

        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let bytes = match &self.metadata.compressor {
            Some(compressor) => compressor
                .decode(&raw)
                .with_context(|| format!("decoding chunk `{}`", key))?,
            None => raw,
        };

        let expected = self.metadata.chunk_len() * self.metadata.dtype.size;
        if bytes.len() != expected {
            bail!(
                "chunk `{}` has {} bytes, expected {}",
                key,
                bytes.len(),
                expected
            );
        }

        Ok(Some(bytes))
    }
}

fn row_major_strides(shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![1u64; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Calls `f` for every index in the box `[lo, hi)`, last dimension fastest.
fn for_each_index(lo: &[u64], hi: &[u64], mut f: impl FnMut(&[u64])) {
    if lo.iter().zip(hi).any(|(l, h)| l >= h) {
        return;
    }

    let mut index = lo.to_vec();
    loop {
        f(&index);

        let mut d = index.len();
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            index[d] += 1;
            if index[d] < hi[d] {
                break;
            }
            index[d] = lo[d];
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use serde_json::json;

    use super::*;
    use crate::zarr::store::MemoryStore;

    // 5 x 7 grid where value = 10 * row + col, chunked 2 x 3
    fn grid_store() -> MemoryStore {
        let values: Vec<i64> = (0..5)
            .flat_map(|r| (0..7).map(move |c| 10 * r + c))
            .collect();
        let mut store = MemoryStore::default();
        store.insert_array(
            "grid",
            &[5, 7],
            &[2, 3],
            "<i4",
            json!(-1),
            &values,
            json!({"_ARRAY_DIMENSIONS": ["row", "col"], "units": "m3 s-1"}),
            None,
        );
        store
    }

    #[test]
    fn should_iterate_box_in_row_major_order() {
        let mut seen = Vec::new();
        for_each_index(&[1, 0], &[3, 2], |i| seen.push(i.to_vec()));
        assert_eq!(seen, vec![vec![1, 0], vec![1, 1], vec![2, 0], vec![2, 1]]);

        let mut count = 0;
        for_each_index(&[0, 2], &[3, 2], |_| count += 1);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn should_read_attributes_and_dimensions() {
        let store = grid_store();
        let array = ZarrArray::open(&store, "grid").await.unwrap();

        assert_eq!(array.shape(), &[5, 7]);
        assert_eq!(array.attribute_str("units"), Some("m3 s-1"));
        assert_eq!(
            array.dimension_names(),
            Some(vec!["row".to_string(), "col".to_string()])
        );
    }

    #[tokio::test]
    async fn should_read_region_across_chunk_boundaries() {
        let store = grid_store();
        let array = ZarrArray::open(&store, "grid").await.unwrap();

        let region = array
            .read_region(&[1..4, 2..5], &ProgressBar::hidden())
            .await
            .unwrap();

        let expected: Vec<Option<f64>> = (1..4)
            .flat_map(|r| (2..5).map(move |c| Some((10 * r + c) as f64)))
            .collect();
        assert_eq!(region, expected);
    }

    #[tokio::test]
    async fn should_only_fetch_intersecting_chunks() {
        let store = grid_store();
        let array = ZarrArray::open(&store, "grid").await.unwrap();

        let column = array
            .read_region(&[0..5, 4..5], &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(
            column,
            vec![Some(4.0), Some(14.0), Some(24.0), Some(34.0), Some(44.0)]
        );

        let mut chunk_requests: Vec<String> = store
            .requested()
            .into_iter()
            .filter(|k| !k.contains(".z"))
            .collect();
        chunk_requests.sort();
        assert_eq!(chunk_requests, vec!["grid/0.1", "grid/1.1", "grid/2.1"]);
    }

    #[tokio::test]
    async fn should_map_fill_and_missing_chunks_to_none() {
        let mut store = MemoryStore::default();
        store.insert_array(
            "flow",
            &[4],
            &[2],
            "<i4",
            json!(-999900),
            &[5, -999900, -999900, -999900],
            json!({}),
            Some(-999900),
        );
        let array = ZarrArray::open(&store, "flow").await.unwrap();

        let values = array
            .read_region(&[0..4], &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(values, vec![Some(5.0), None, None, None]);
        assert!(store.requested().contains(&"flow/1".to_string()));
    }

    #[tokio::test]
    async fn should_read_fortran_ordered_chunk() {
        let mut store = MemoryStore::default();
        store.insert(
            "f/.zarray",
            json!({
                "zarr_format": 2, "shape": [2, 3], "chunks": [2, 3], "dtype": "<i4",
                "compressor": null, "fill_value": null, "order": "F", "filters": null
            })
            .to_string()
            .into_bytes(),
        );
        // column-major storage of [[1, 2, 3], [4, 5, 6]]
        let bytes: Vec<u8> = [1i32, 4, 2, 5, 3, 6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        store.insert("f/0.0", bytes);

        let array = ZarrArray::open(&store, "f").await.unwrap();
        let values = array
            .read_region(&[0..2, 0..3], &ProgressBar::hidden())
            .await
            .unwrap();

        let flat: Vec<f64> = values.into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[tokio::test]
    async fn should_reject_out_of_bounds_region() {
        let store = grid_store();
        let array = ZarrArray::open(&store, "grid").await.unwrap();

        assert!(array
            .read_region(&[0..6, 0..1], &ProgressBar::hidden())
            .await
            .is_err());
        assert!(array
            .read_region(&[0..1], &ProgressBar::hidden())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn should_reject_chunk_of_wrong_size() {
        let mut store = grid_store();
        store.insert("grid/0.0", vec![0u8; 5]);
        let array = ZarrArray::open(&store, "grid").await.unwrap();

        let err = array
            .read_region(&[0..1, 0..1], &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 24"));
    }

    #[tokio::test]
    async fn should_find_first_matching_element() {
        let mut store = MemoryStore::default();
        let ids: Vec<i64> = vec![101, 202, 303, 404, 505];
        store.insert_array("feature_id", &[5], &[2], "<i4", json!(0), &ids, json!({}), None);
        let array = ZarrArray::open(&store, "feature_id").await.unwrap();

        assert_eq!(
            array.find_first(404.0, &ProgressBar::hidden()).await.unwrap(),
            Some(3)
        );
        assert_eq!(
            array.find_first(999.0, &ProgressBar::hidden()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn should_report_missing_array() {
        let store = MemoryStore::default();
        let err = ZarrArray::open(&store, "nothing").await.err().unwrap();

        assert!(matches!(
            err.downcast_ref::<RetrievalError>(),
            Some(RetrievalError::MissingArray { .. })
        ));
    }
}

//! Array metadata from `.zarray`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use super::{codec::Compressor, dtype::DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
/// Memory layout of elements within a chunk.
pub enum Order {
    #[default]
    C,
    F,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    zarr_format: u8,
    shape: Vec<u64>,
    chunks: Vec<u64>,
    dtype: String,
    compressor: Option<Value>,
    #[serde(default)]
    fill_value: Value,
    #[serde(default)]
    order: Order,
    #[serde(default)]
    filters: Option<Vec<Value>>,
    #[serde(default)]
    dimension_separator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMetadata {
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: DataType,
    pub compressor: Option<Compressor>,
    pub fill_value: Option<f64>,
    pub order: Order,
    pub separator: char,
}

impl ArrayMetadata {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawMetadata = serde_json::from_slice(bytes).context("invalid .zarray JSON")?;

        if raw.zarr_format != 2 {
            bail!("unsupported zarr format {}", raw.zarr_format);
        }
        if raw.shape.len() != raw.chunks.len() {
            bail!(
                "shape has {} dimensions but chunks has {}",
                raw.shape.len(),
                raw.chunks.len()
            );
        }
        if raw.chunks.iter().any(|&c| c == 0) {
            bail!("chunk dimensions must be positive");
        }
        if raw.filters.as_ref().is_some_and(|f| !f.is_empty()) {
            bail!("array filters are not supported");
        }

        let separator = match raw.dimension_separator.as_deref() {
            None | Some(".") => '.',
            Some("/") => '/',
            Some(other) => bail!("unsupported dimension separator `{}`", other),
        };

        let compressor = raw
            .compressor
            .as_ref()
            .filter(|c| !c.is_null())
            .map(Compressor::from_config)
            .transpose()?;

        Ok(ArrayMetadata {
            dtype: DataType::parse(&raw.dtype)?,
            fill_value: parse_fill_value(&raw.fill_value)?,
            shape: raw.shape,
            chunks: raw.chunks,
            compressor,
            order: raw.order,
            separator,
        })
    }

    /// Number of elements in one (full-size) chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunks.iter().product::<u64>() as usize
    }

    /// Store key of the chunk at grid position `coords`, relative to the array.
    pub fn chunk_key(&self, coords: &[u64]) -> String {
        if coords.is_empty() {
            return "0".to_string();
        }
        coords
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(&self.separator.to_string())
    }

    /// Decodes element `index` of a chunk's stored bytes; the fill value
    /// and out-of-range indices give `None`.
    pub fn element(&self, chunk: &[u8], index: usize) -> Option<f64> {
        let size = self.dtype.size;
        let bytes = chunk.get(index * size..(index + 1) * size)?;
        let value = self.dtype.decode(bytes);

        match self.fill_value {
            Some(f) if value == f || (f.is_nan() && value.is_nan()) => None,
            _ => Some(value),
        }
    }

    /// Flat offset of each dimension's step inside a chunk.
    pub fn chunk_strides(&self) -> Vec<u64> {
        let ndim = self.chunks.len();
        let mut strides = vec![1u64; ndim];

        match self.order {
            Order::C => {
                for d in (0..ndim.saturating_sub(1)).rev() {
                    strides[d] = strides[d + 1] * self.chunks[d + 1];
                }
            }
            Order::F => {
                for d in 1..ndim {
                    strides[d] = strides[d - 1] * self.chunks[d - 1];
                }
            }
        }

        strides
    }
}

fn parse_fill_value(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(Some(f64::NAN)),
            "Infinity" => Ok(Some(f64::INFINITY)),
            "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
            other => bail!("unsupported fill value `{}`", other),
        },
        other => bail!("unsupported fill value `{}`", other),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use serde_json::json;

    use super::*;

    fn metadata(extra: Value) -> Result<ArrayMetadata> {
        let mut base = json!({
            "zarr_format": 2,
            "shape": [367439, 2776738],
            "chunks": [672, 30000],
            "dtype": "<i4",
            "compressor": {"id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0},
            "fill_value": -999900,
            "order": "C",
            "filters": null
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        ArrayMetadata::from_json(base.to_string().as_bytes())
    }

    #[test]
    fn should_parse_streamflow_metadata() {
        let m = metadata(json!({})).unwrap();

        assert_eq!(m.shape, vec![367439, 2776738]);
        assert_eq!(m.chunks, vec![672, 30000]);
        assert_eq!(m.dtype.size, 4);
        assert_eq!(m.compressor, Some(Compressor::Blosc));
        assert_eq!(m.fill_value, Some(-999900.0));
        assert_eq!(m.order, Order::C);
        assert_eq!(m.separator, '.');
    }

    #[test]
    fn should_build_chunk_keys() {
        let m = metadata(json!({})).unwrap();
        assert_eq!(m.chunk_key(&[12, 3]), "12.3");

        let m = metadata(json!({"dimension_separator": "/"})).unwrap();
        assert_eq!(m.chunk_key(&[12, 3]), "12/3");
    }

    #[test]
    fn should_compute_chunk_strides() {
        let m = metadata(json!({"shape": [10, 10, 10], "chunks": [2, 3, 4]})).unwrap();
        assert_eq!(m.chunk_strides(), vec![12, 4, 1]);
        assert_eq!(m.chunk_len(), 24);

        let m = metadata(json!({"shape": [10, 10, 10], "chunks": [2, 3, 4], "order": "F"}))
            .unwrap();
        assert_eq!(m.chunk_strides(), vec![1, 2, 6]);
    }

    #[test]
    fn should_decode_single_elements_from_chunk_bytes() {
        let m = metadata(json!({})).unwrap();
        let chunk: Vec<u8> = [7i32, -999900, 12]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        assert_eq!(m.element(&chunk, 0), Some(7.0));
        assert_eq!(m.element(&chunk, 1), None);
        assert_eq!(m.element(&chunk, 2), Some(12.0));
        assert_eq!(m.element(&chunk, 3), None);

        let m = metadata(json!({"dtype": ">f8", "fill_value": "NaN"})).unwrap();
        let chunk: Vec<u8> = [f64::NAN, 2.5].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(m.element(&chunk, 0), None);
        assert_eq!(m.element(&chunk, 1), Some(2.5));
    }

    #[test]
    fn should_parse_special_fill_values() {
        let m = metadata(json!({"dtype": "<f8", "fill_value": "NaN"})).unwrap();
        assert!(m.fill_value.unwrap().is_nan());

        let m = metadata(json!({"fill_value": null, "compressor": null})).unwrap();
        assert_eq!(m.fill_value, None);
        assert_eq!(m.compressor, None);
    }

    #[test]
    fn should_reject_unsupported_layouts() {
        assert!(metadata(json!({"zarr_format": 3})).is_err());
        assert!(metadata(json!({"filters": [{"id": "delta", "dtype": "<i4"}]})).is_err());
        assert!(metadata(json!({"chunks": [672]})).is_err());
        assert!(metadata(json!({"dimension_separator": "-"})).is_err());
    }
}

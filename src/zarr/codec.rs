//! Chunk compressors named by the `compressor.id` field of `.zarray`.

use std::io::Read;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::{GzDecoder, ZlibDecoder};
use serde_json::Value;

use super::blosc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Blosc,
    Zlib,
    Gzip,
    Zstd,
    Lz4,
}

impl Compressor {
    /// Reads the compressor from its `.zarray` JSON object.
    pub fn from_config(config: &Value) -> Result<Self> {
        let id = config
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("compressor has no `id`"))?;

        match id {
            "blosc" => Ok(Compressor::Blosc),
            "zlib" => Ok(Compressor::Zlib),
            "gzip" => Ok(Compressor::Gzip),
            "zstd" => Ok(Compressor::Zstd),
            "lz4" => Ok(Compressor::Lz4),
            other => bail!("unsupported compressor `{}`", other),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compressor::Blosc => blosc::decompress(data),
            Compressor::Zlib => {
                let mut out = Vec::new();
                ZlibDecoder::new(data)
                    .read_to_end(&mut out)
                    .context("zlib chunk")?;
                Ok(out)
            }
            Compressor::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .context("gzip chunk")?;
                Ok(out)
            }
            Compressor::Zstd => zstd::stream::decode_all(data).context("zstd chunk"),
            // numcodecs prefixes the lz4 block with its decompressed size
            Compressor::Lz4 => lz4_flex::block::decompress_size_prepended(data)
                .map_err(|e| anyhow!("lz4 chunk: {}", e)),
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use std::io::Write;

    use flate2::{
        write::{GzEncoder, ZlibEncoder},
        Compression,
    };
    use serde_json::json;

    use super::*;
    use crate::zarr::blosc::tests::{encode_frame, CODE_LZ4};

    fn payload() -> Vec<u8> {
        (0..512u32).flat_map(|v| (v % 17).to_le_bytes()).collect()
    }

    #[test]
    fn should_read_compressor_ids() {
        let blosc = json!({"id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1});
        assert_eq!(Compressor::from_config(&blosc).unwrap(), Compressor::Blosc);
        assert_eq!(
            Compressor::from_config(&json!({"id": "zstd", "level": 1})).unwrap(),
            Compressor::Zstd
        );
    }

    #[test]
    fn should_reject_unknown_compressor() {
        let err = Compressor::from_config(&json!({"id": "bz2"})).unwrap_err();
        assert!(err.to_string().contains("bz2"));
        assert!(Compressor::from_config(&json!({"level": 1})).is_err());
    }

    #[test]
    fn should_decode_zlib_and_gzip() {
        let data = payload();

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(&data).unwrap();
        assert_eq!(Compressor::Zlib.decode(&zlib.finish().unwrap()).unwrap(), data);

        let mut gzip = GzEncoder::new(Vec::new(), Compression::default());
        gzip.write_all(&data).unwrap();
        assert_eq!(Compressor::Gzip.decode(&gzip.finish().unwrap()).unwrap(), data);
    }

    #[test]
    fn should_decode_zstd_frame() {
        let data = payload();
        let compressed = zstd::stream::encode_all(&data[..], 3).unwrap();
        assert_eq!(Compressor::Zstd.decode(&compressed).unwrap(), data);
    }

    #[test]
    fn should_decode_size_prefixed_lz4() {
        let data = payload();
        let compressed = lz4_flex::block::compress_prepend_size(&data);
        assert_eq!(Compressor::Lz4.decode(&compressed).unwrap(), data);
    }

    #[test]
    fn should_delegate_blosc() {
        let data = payload();
        let frame = encode_frame(&data, 4, 2048, CODE_LZ4, true, true);
        assert_eq!(Compressor::Blosc.decode(&frame).unwrap(), data);
    }
}

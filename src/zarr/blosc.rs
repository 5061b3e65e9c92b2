//! Decoder for blosc1 frames as written by numcodecs.
//!
//! Frame layout: a 16-byte header (version, codec version, flags, typesize,
//! nbytes, blocksize, cbytes), then one little-endian `u32` start offset per
//! block, then the blocks. Each block holds one or `typesize` streams, each
//! prefixed with its compressed length. A stream whose compressed length
//! equals its decompressed length is stored raw.

use std::io::Read;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::ZlibDecoder;

const HEADER_LEN: usize = 16;

const FLAG_SHUFFLE: u8 = 0x01;
const FLAG_MEMCPYED: u8 = 0x02;
const FLAG_BITSHUFFLE: u8 = 0x04;
const FLAG_NOSPLIT: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerCodec {
    Lz4,
    Zlib,
    Zstd,
}

impl InnerCodec {
    fn from_flags(flags: u8) -> Result<Self> {
        match flags >> 5 {
            1 => Ok(InnerCodec::Lz4),
            3 => Ok(InnerCodec::Zlib),
            4 => Ok(InnerCodec::Zstd),
            0 => bail!("unsupported blosc codec `blosclz`"),
            2 => bail!("unsupported blosc codec `snappy`"),
            other => bail!("unknown blosc codec code {}", other),
        }
    }

    fn decompress(&self, src: &[u8], len: usize) -> Result<Vec<u8>> {
        let out = match self {
            InnerCodec::Lz4 => lz4_flex::block::decompress(src, len)
                .map_err(|e| anyhow!("lz4 stream: {}", e))?,
            InnerCodec::Zlib => {
                let mut out = Vec::with_capacity(len);
                ZlibDecoder::new(src)
                    .read_to_end(&mut out)
                    .context("zlib stream")?;
                out
            }
            InnerCodec::Zstd => zstd::bulk::decompress(src, len).context("zstd stream")?,
        };

        if out.len() != len {
            bail!(
                "blosc stream decompressed to {} bytes, expected {}",
                out.len(),
                len
            );
        }

        Ok(out)
    }
}

struct Header {
    flags: u8,
    typesize: usize,
    nbytes: usize,
    blocksize: usize,
    cbytes: usize,
}

impl Header {
    fn parse(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_LEN {
            bail!("blosc frame shorter than its header ({} bytes)", src.len());
        }

        Ok(Header {
            flags: src[2],
            typesize: (src[3] as usize).max(1),
            nbytes: read_u32(src, 4)? as usize,
            blocksize: read_u32(src, 8)? as usize,
            cbytes: read_u32(src, 12)? as usize,
        })
    }

    /// Streams per block. The writer records its split choice in the
    /// no-split flag (c-blosc >= 1.14); the block size plays no part here.
    fn stream_count(&self, leftover: bool) -> usize {
        if self.flags & FLAG_NOSPLIT == 0 && !leftover {
            self.typesize
        } else {
            1
        }
    }
}

pub fn decompress(src: &[u8]) -> Result<Vec<u8>> {
    let header = Header::parse(src)?;

    if header.cbytes > src.len() {
        bail!(
            "blosc frame truncated: header says {} bytes, got {}",
            header.cbytes,
            src.len()
        );
    }

    if header.flags & FLAG_MEMCPYED != 0 {
        let end = HEADER_LEN + header.nbytes;
        if src.len() < end {
            bail!("blosc frame truncated");
        }
        return Ok(src[HEADER_LEN..end].to_vec());
    }

    if header.flags & FLAG_BITSHUFFLE != 0 {
        bail!("unsupported blosc bit-shuffle filter");
    }
    if header.nbytes == 0 {
        return Ok(Vec::new());
    }
    if header.blocksize == 0 {
        bail!("blosc frame has zero block size");
    }

    let codec = InnerCodec::from_flags(header.flags)?;
    let shuffled = header.flags & FLAG_SHUFFLE != 0 && header.typesize > 1;

    let nblocks = header.nbytes.div_ceil(header.blocksize);
    let leftover = header.nbytes % header.blocksize;
    let mut out = Vec::with_capacity(header.nbytes);

    for block in 0..nblocks {
        let is_leftover = block == nblocks - 1 && leftover > 0;
        let block_len = if is_leftover {
            leftover
        } else {
            header.blocksize
        };
        let start = read_u32(src, HEADER_LEN + 4 * block)? as usize;

        let data = decompress_block(src, start, block_len, is_leftover, &header, codec)
            .with_context(|| format!("blosc block {}", block))?;

        if shuffled {
            out.extend(unshuffle(&data, header.typesize));
        } else {
            out.extend(data);
        }
    }

    Ok(out)
}

fn decompress_block(
    src: &[u8],
    start: usize,
    block_len: usize,
    leftover: bool,
    header: &Header,
    codec: InnerCodec,
) -> Result<Vec<u8>> {
    let nstreams = header.stream_count(leftover);
    let stream_len = block_len / nstreams;

    let mut pos = start;
    let mut block = Vec::with_capacity(block_len);

    for _ in 0..nstreams {
        let csize = read_u32(src, pos)? as i32;
        pos += 4;

        if csize <= 0 {
            bail!("unsupported blosc stream size {}", csize);
        }
        let csize = csize as usize;
        let stream = src
            .get(pos..pos + csize)
            .ok_or_else(|| anyhow!("blosc stream runs past end of frame"))?;

        if csize == stream_len {
            block.extend_from_slice(stream);
        } else {
            block.extend(codec.decompress(stream, stream_len)?);
        }
        pos += csize;
    }

    Ok(block)
}

/// Reverses the byte shuffle: byte `j` of element `i` was stored at
/// `j * count + i`. Trailing bytes that do not fill an element are left as is.
fn unshuffle(src: &[u8], typesize: usize) -> Vec<u8> {
    let count = src.len() / typesize;
    let mut out = vec![0u8; src.len()];

    for i in 0..count {
        for j in 0..typesize {
            out[i * typesize + j] = src[j * count + i];
        }
    }
    let tail = count * typesize;
    out[tail..].copy_from_slice(&src[tail..]);

    out
}

fn read_u32(src: &[u8], offset: usize) -> Result<u32> {
    let bytes = src
        .get(offset..offset + 4)
        .ok_or_else(|| anyhow!("blosc frame truncated at offset {}", offset))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {

    use std::io::Write;

    use flate2::{write::ZlibEncoder, Compression};

    use super::*;

    pub const CODE_LZ4: u8 = 1;
    pub const CODE_ZLIB: u8 = 3;
    pub const CODE_ZSTD: u8 = 4;

    fn shuffle(src: &[u8], typesize: usize) -> Vec<u8> {
        let count = src.len() / typesize;
        let mut out = vec![0u8; src.len()];
        for i in 0..count {
            for j in 0..typesize {
                out[j * count + i] = src[i * typesize + j];
            }
        }
        let tail = count * typesize;
        out[tail..].copy_from_slice(&src[tail..]);
        out
    }

    fn compress_stream(code: u8, src: &[u8]) -> Vec<u8> {
        match code {
            CODE_LZ4 => lz4_flex::block::compress(src),
            CODE_ZLIB => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(src).unwrap();
                encoder.finish().unwrap()
            }
            CODE_ZSTD => zstd::bulk::compress(src, 3).unwrap(),
            _ => unreachable!(),
        }
    }

    /// Builds a blosc1 frame the way c-blosc lays it out.
    pub fn encode_frame(
        data: &[u8],
        typesize: usize,
        blocksize: usize,
        code: u8,
        shuffle_bytes: bool,
        split: bool,
    ) -> Vec<u8> {
        let mut flags = code << 5;
        if shuffle_bytes {
            flags |= FLAG_SHUFFLE;
        }
        if !split {
            flags |= FLAG_NOSPLIT;
        }
        let header = Header {
            flags,
            typesize,
            nbytes: data.len(),
            blocksize,
            cbytes: 0,
        };

        let nblocks = data.len().div_ceil(blocksize);
        let mut blocks: Vec<Vec<u8>> = Vec::new();

        for (index, block) in data.chunks(blocksize).enumerate() {
            let leftover = index == nblocks - 1 && data.len() % blocksize > 0;
            let block = if shuffle_bytes {
                shuffle(block, typesize)
            } else {
                block.to_vec()
            };
            let nstreams = header.stream_count(leftover);
            let mut encoded = Vec::new();
            for stream in block.chunks(block.len() / nstreams) {
                let compressed = compress_stream(code, stream);
                if compressed.len() >= stream.len() {
                    encoded.extend((stream.len() as u32).to_le_bytes());
                    encoded.extend_from_slice(stream);
                } else {
                    encoded.extend((compressed.len() as u32).to_le_bytes());
                    encoded.extend(compressed);
                }
            }
            blocks.push(encoded);
        }

        let mut frame = vec![2, 1, flags, typesize as u8];
        frame.extend((data.len() as u32).to_le_bytes());
        frame.extend((blocksize as u32).to_le_bytes());
        frame.extend(0u32.to_le_bytes());

        let mut offset = HEADER_LEN + 4 * nblocks;
        for block in &blocks {
            frame.extend((offset as u32).to_le_bytes());
            offset += block.len();
        }
        for block in blocks {
            frame.extend(block);
        }

        let cbytes = frame.len() as u32;
        frame[12..16].copy_from_slice(&cbytes.to_le_bytes());
        frame
    }

    fn int_bytes(count: i32) -> Vec<u8> {
        (0..count).flat_map(|v| (v * 7).to_le_bytes()).collect()
    }

    #[test]
    fn should_copy_memcpyed_frame() {
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut frame = vec![2, 1, FLAG_MEMCPYED, 4];
        frame.extend(8u32.to_le_bytes());
        frame.extend(8u32.to_le_bytes());
        frame.extend(24u32.to_le_bytes());
        frame.extend(payload);

        assert_eq!(decompress(&frame).unwrap(), payload.to_vec());
    }

    #[test]
    fn should_decode_split_shuffled_lz4() {
        let data = int_bytes(256);
        let frame = encode_frame(&data, 4, 1024, CODE_LZ4, true, true);

        assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn should_split_small_blocks_when_flag_allows() {
        // 32-byte block of i32: one raw 8-byte stream per byte plane
        let data = int_bytes(8);
        let mut frame = vec![2, 1, CODE_LZ4 << 5, 4];
        frame.extend(32u32.to_le_bytes());
        frame.extend(32u32.to_le_bytes());
        frame.extend(0u32.to_le_bytes());
        frame.extend(20u32.to_le_bytes());
        for stream in data.chunks(8) {
            frame.extend(8u32.to_le_bytes());
            frame.extend_from_slice(stream);
        }
        let cbytes = frame.len() as u32;
        frame[12..16].copy_from_slice(&cbytes.to_le_bytes());

        assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn should_decode_zstd_with_leftover_block() {
        let data = int_bytes(250);
        let frame = encode_frame(&data, 4, 512, CODE_ZSTD, true, false);

        assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn should_decode_unshuffled_zlib() {
        let data = int_bytes(300);
        let frame = encode_frame(&data, 4, 4096, CODE_ZLIB, false, true);

        assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn should_reject_bitshuffle_and_blosclz() {
        let mut frame = encode_frame(&int_bytes(64), 4, 256, CODE_LZ4, false, false);
        frame[2] |= FLAG_BITSHUFFLE;
        assert!(decompress(&frame).is_err());

        let mut frame = encode_frame(&int_bytes(64), 4, 256, CODE_LZ4, false, false);
        frame[2] &= 0x1f;
        let err = decompress(&frame).unwrap_err();
        assert!(err.to_string().contains("blosclz"));
    }

    #[test]
    fn should_reject_truncated_frame() {
        let frame = encode_frame(&int_bytes(64), 4, 256, CODE_LZ4, true, true);
        assert!(decompress(&frame[..frame.len() - 3]).is_err());
        assert!(decompress(&frame[..10]).is_err());
    }

    #[test]
    fn should_unshuffle_with_trailing_bytes() {
        let data: Vec<u8> = (0..11).collect();
        assert_eq!(unshuffle(&shuffle(&data, 4), 4), data);
    }
}

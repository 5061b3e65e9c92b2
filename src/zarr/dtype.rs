//! Numpy-style type strings (`<i4`, `>f8`, `|u1`) and element decoding.

use anyhow::{anyhow, bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Signed,
    Unsigned,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    pub kind: Kind,
    pub size: usize,
    pub big_endian: bool,
}

impl DataType {
    pub fn parse(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let byte_order = chars.next().ok_or_else(|| anyhow!("empty dtype"))?;
        let kind = match chars.next() {
            Some('i') => Kind::Signed,
            Some('u') => Kind::Unsigned,
            Some('f') => Kind::Float,
            _ => bail!("unsupported dtype `{}`", s),
        };
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| anyhow!("unsupported dtype `{}`", s))?;

        let big_endian = match byte_order {
            '<' => false,
            '>' => true,
            '|' if size == 1 => false,
            _ => bail!("unsupported dtype `{}`", s),
        };

        let valid_size = match kind {
            Kind::Float => matches!(size, 4 | 8),
            Kind::Signed | Kind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        };
        if !valid_size {
            bail!("unsupported dtype `{}`", s);
        }

        Ok(DataType {
            kind,
            size,
            big_endian,
        })
    }

    /// Decodes one element from the first `self.size` bytes of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> f64 {
        match (self.kind, self.size) {
            (Kind::Signed, 1) => bytes[0] as i8 as f64,
            (Kind::Unsigned, 1) => bytes[0] as f64,
            (Kind::Signed, 2) => i16::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Unsigned, 2) => u16::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Signed, 4) => i32::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Unsigned, 4) => u32::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Signed, 8) => i64::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Unsigned, 8) => u64::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Float, 4) => f32::from_le_bytes(self.ordered(bytes)) as f64,
            (Kind::Float, 8) => f64::from_le_bytes(self.ordered(bytes)),
            _ => f64::NAN,
        }
    }

    // Copies the element into little-endian order
    fn ordered<const N: usize>(&self, bytes: &[u8]) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[..N]);
        if self.big_endian {
            out.reverse();
        }
        out
    }
}

// -- Tests -------------------------------------------------------------------

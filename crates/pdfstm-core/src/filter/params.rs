//! Filter kinds and their typed configuration.
//!
//! A [`FilterSpec`] fully describes one filter instance: its kind, direction
//! and parameters. Specs are built directly, or translated from a PDF-style
//! [`DecodeParms`] key/value map with [`FilterKind::specs`].

use crate::crypt::SecretKey;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Direction a codec runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Produce the filter's encoded form
    Encode,
    /// Recover the original bytes
    Decode,
}

/// Filter kinds known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Identity
    Null,
    /// ASCIIHexDecode
    AsciiHex,
    /// ASCII85Decode
    Ascii85,
    /// RunLengthDecode
    RunLength,
    /// FlateDecode (zlib/deflate)
    Flate,
    /// LZWDecode
    Lzw,
    /// TIFF/PNG predictor
    Predictor,
    /// AES-CBC crypt filter
    AesV2,
    /// RC4 crypt filter
    V2,
    /// MD5 digest
    Md5,
}

impl FilterKind {
    /// Parse filter kind from a PDF filter name or abbreviation
    ///
    /// `Crypt` is not accepted here because the method depends on parameters;
    /// see [`FilterKind::specs_for_name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Null" | "Identity" => Some(FilterKind::Null),
            "ASCIIHexDecode" | "AHx" => Some(FilterKind::AsciiHex),
            "ASCII85Decode" | "A85" => Some(FilterKind::Ascii85),
            "RunLengthDecode" | "RL" => Some(FilterKind::RunLength),
            "FlateDecode" | "Fl" => Some(FilterKind::Flate),
            "LZWDecode" | "LZW" => Some(FilterKind::Lzw),
            "Predictor" => Some(FilterKind::Predictor),
            "AESV2" => Some(FilterKind::AesV2),
            "V2" => Some(FilterKind::V2),
            "MD5" => Some(FilterKind::Md5),
            _ => None,
        }
    }

    /// Get the canonical name for this filter
    pub fn to_name(&self) -> &'static str {
        match self {
            FilterKind::Null => "Null",
            FilterKind::AsciiHex => "ASCIIHexDecode",
            FilterKind::Ascii85 => "ASCII85Decode",
            FilterKind::RunLength => "RunLengthDecode",
            FilterKind::Flate => "FlateDecode",
            FilterKind::Lzw => "LZWDecode",
            FilterKind::Predictor => "Predictor",
            FilterKind::AesV2 => "AESV2",
            FilterKind::V2 => "V2",
            FilterKind::Md5 => "MD5",
        }
    }

    /// Resolves a PDF filter name, including `Crypt`, into filter specs
    pub fn specs_for_name(name: &str, direction: Direction, parms: &DecodeParms) -> Result<Vec<FilterSpec>> {
        let kind = match name {
            "Crypt" => match parms.get_name("CFM").unwrap_or("V2") {
                "AESV2" | "AESV3" => FilterKind::AesV2,
                "V2" => FilterKind::V2,
                "None" | "Identity" => FilterKind::Null,
                other => {
                    return Err(Error::invalid_parameter(
                        "Crypt",
                        format!("unsupported crypt method '{}'", other),
                    ))
                }
            },
            _ => FilterKind::from_name(name)
                .ok_or_else(|| Error::invalid_argument(format!("unknown filter '{}'", name)))?,
        };
        kind.specs(direction, parms)
    }

    /// Translates key/value parameters into the specs for this kind
    ///
    /// A `Predictor` above 1 on `FlateDecode` or `LZWDecode` adds a predictor
    /// stage: after the decompressor when decoding, before the compressor when
    /// encoding. The returned specs are in data-flow order.
    pub fn specs(&self, direction: Direction, parms: &DecodeParms) -> Result<Vec<FilterSpec>> {
        let spec = match self {
            FilterKind::Null => FilterSpec::Null,
            FilterKind::AsciiHex => FilterSpec::AsciiHex(direction),
            FilterKind::Ascii85 => FilterSpec::Ascii85(direction),
            FilterKind::RunLength => FilterSpec::RunLength(direction),
            FilterKind::Flate => FilterSpec::Flate {
                direction,
                params: FlateParams {
                    level: parms.get_int("Level", 6, "FlateDecode")?.try_into().map_err(|_| {
                        Error::invalid_parameter("FlateDecode", "Level must be between 0 and 9")
                    })?,
                },
            },
            FilterKind::Lzw => FilterSpec::Lzw {
                direction,
                params: LzwParams {
                    early_change: parms.get_int("EarlyChange", 1, "LZWDecode")? != 0,
                },
            },
            FilterKind::Predictor => FilterSpec::Predictor {
                direction,
                params: PredictorParams::from_parms(parms)?,
            },
            FilterKind::AesV2 => FilterSpec::AesV2 {
                direction,
                params: CryptParams::from_parms(parms, "AESV2")?,
            },
            FilterKind::V2 => FilterSpec::V2 {
                direction,
                params: CryptParams::from_parms(parms, "V2")?,
            },
            FilterKind::Md5 => FilterSpec::Md5,
        };

        let predictor = match self {
            FilterKind::Flate | FilterKind::Lzw => parms.get_int("Predictor", 1, self.to_name())?,
            _ => 1,
        };
        if predictor <= 1 {
            return Ok(vec![spec]);
        }

        let stage = FilterSpec::Predictor {
            direction,
            params: PredictorParams::from_parms(parms)?,
        };
        Ok(match direction {
            Direction::Decode => vec![spec, stage],
            Direction::Encode => vec![stage, spec],
        })
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_name())
    }
}

/// Parameters for the Flate filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlateParams {
    /// Compression level, 0 (store) to 9 (best)
    pub level: u32,
}

impl Default for FlateParams {
    fn default() -> Self {
        Self { level: 6 }
    }
}

/// Parameters for the LZW filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwParams {
    /// Widen codes one code early (PDF `EarlyChange 1`, the default)
    pub early_change: bool,
}

impl Default for LzwParams {
    fn default() -> Self {
        Self { early_change: true }
    }
}

/// Parameters for the predictor filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    /// 1 = none, 2 = TIFF, 10..=15 = PNG (None, Sub, Up, Average, Paeth, Optimum)
    pub predictor: u8,
    /// Number of color components per sample
    pub colors: u8,
    /// Number of bits per color component (1, 2, 4, 8 or 16)
    pub bits_per_component: u8,
    /// Number of samples per row
    pub columns: u32,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    /// Creates predictor parameters
    pub fn new(predictor: u8, colors: u8, bits_per_component: u8, columns: u32) -> Self {
        Self {
            predictor,
            colors,
            bits_per_component,
            columns,
        }
    }

    fn from_parms(parms: &DecodeParms) -> Result<Self> {
        let narrow = |key: &str, default: i64| -> Result<u8> {
            parms
                .get_int(key, default, "Predictor")?
                .try_into()
                .map_err(|_| Error::invalid_parameter("Predictor", format!("{} out of range", key)))
        };
        Ok(Self {
            predictor: narrow("Predictor", 1)?,
            colors: narrow("Colors", 1)?,
            bits_per_component: narrow("BitsPerComponent", 8)?,
            columns: parms
                .get_int("Columns", 1, "Predictor")?
                .try_into()
                .map_err(|_| Error::invalid_parameter("Predictor", "Columns out of range"))?,
        })
    }

    /// Bytes in one row of samples, excluding any PNG tag byte
    ///
    /// Saturates at `usize::MAX` on targets where the row cannot be addressed.
    pub fn row_bytes(&self) -> usize {
        let bits = u64::from(self.colors) * u64::from(self.bits_per_component) * u64::from(self.columns);
        usize::try_from(bits.div_ceil(8)).unwrap_or(usize::MAX)
    }

    /// Bytes per complete pixel, at least 1
    pub fn pixel_bytes(&self) -> usize {
        ((self.colors as usize * self.bits_per_component as usize + 7) / 8).max(1)
    }

    /// Rejects parameter combinations the predictor cannot run with
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.predictor, 1 | 2 | 10..=15) {
            return Err(Error::invalid_parameter(
                "Predictor",
                format!("unsupported predictor {}", self.predictor),
            ));
        }
        if self.colors == 0 {
            return Err(Error::invalid_parameter("Predictor", "Colors must be at least 1"));
        }
        if !matches!(self.bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(Error::invalid_parameter(
                "Predictor",
                format!("unsupported BitsPerComponent {}", self.bits_per_component),
            ));
        }
        if self.columns == 0 {
            return Err(Error::invalid_parameter("Predictor", "Columns must be at least 1"));
        }
        Ok(())
    }
}

/// Parameters for the crypt filters
#[derive(Clone, PartialEq, Eq)]
pub struct CryptParams {
    /// Cipher key; wiped on drop
    pub key: SecretKey,
    /// AES initialization vector for encoding; random when absent
    pub iv: Option<[u8; 16]>,
}

impl std::fmt::Debug for CryptParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptParams")
            .field("key", &"[REDACTED]")
            .field("iv", &self.iv)
            .finish()
    }
}

impl CryptParams {
    /// Creates parameters from a key
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Zeroizing::new(key.into()),
            iv: None,
        }
    }

    /// Sets the initialization vector used when encrypting
    pub fn with_iv(mut self, iv: [u8; 16]) -> Self {
        self.iv = Some(iv);
        self
    }

    fn from_parms(parms: &DecodeParms, filter: &'static str) -> Result<Self> {
        let key = parms
            .get_bytes("Key")
            .ok_or_else(|| Error::invalid_parameter(filter, "missing Key"))?;
        let iv = match parms.get_bytes("IV") {
            None => None,
            Some(iv) => Some(iv.try_into().map_err(|_| {
                Error::invalid_parameter(filter, format!("IV must be 16 bytes, got {}", iv.len()))
            })?),
        };
        Ok(Self {
            key: Zeroizing::new(key.to_vec()),
            iv,
        })
    }
}

/// Complete description of one filter instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Identity
    Null,
    /// ASCII hexadecimal
    AsciiHex(Direction),
    /// ASCII base-85
    Ascii85(Direction),
    /// Run-length
    RunLength(Direction),
    /// zlib/deflate
    Flate {
        /// Direction
        direction: Direction,
        /// Parameters
        params: FlateParams,
    },
    /// Lempel-Ziv-Welch
    Lzw {
        /// Direction
        direction: Direction,
        /// Parameters
        params: LzwParams,
    },
    /// TIFF/PNG predictor
    Predictor {
        /// Direction
        direction: Direction,
        /// Parameters
        params: PredictorParams,
    },
    /// AES-CBC crypt filter
    AesV2 {
        /// Direction
        direction: Direction,
        /// Parameters
        params: CryptParams,
    },
    /// RC4 crypt filter
    V2 {
        /// Direction
        direction: Direction,
        /// Parameters
        params: CryptParams,
    },
    /// MD5 digest (encode only)
    Md5,
}

impl FilterSpec {
    /// The kind of filter this spec builds
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterSpec::Null => FilterKind::Null,
            FilterSpec::AsciiHex(_) => FilterKind::AsciiHex,
            FilterSpec::Ascii85(_) => FilterKind::Ascii85,
            FilterSpec::RunLength(_) => FilterKind::RunLength,
            FilterSpec::Flate { .. } => FilterKind::Flate,
            FilterSpec::Lzw { .. } => FilterKind::Lzw,
            FilterSpec::Predictor { .. } => FilterKind::Predictor,
            FilterSpec::AesV2 { .. } => FilterKind::AesV2,
            FilterSpec::V2 { .. } => FilterKind::V2,
            FilterSpec::Md5 => FilterKind::Md5,
        }
    }

    /// The direction of this spec
    pub fn direction(&self) -> Direction {
        match self {
            FilterSpec::Null | FilterSpec::Md5 => Direction::Encode,
            FilterSpec::AsciiHex(d) | FilterSpec::Ascii85(d) | FilterSpec::RunLength(d) => *d,
            FilterSpec::Flate { direction, .. }
            | FilterSpec::Lzw { direction, .. }
            | FilterSpec::Predictor { direction, .. }
            | FilterSpec::AesV2 { direction, .. }
            | FilterSpec::V2 { direction, .. } => *direction,
        }
    }

    /// Name used in logs and errors, e.g. `ASCII85Encode`
    pub fn name(&self) -> &'static str {
        use Direction::{Decode, Encode};
        match (self.kind(), self.direction()) {
            (FilterKind::Null, _) => "Null",
            (FilterKind::AsciiHex, Encode) => "ASCIIHexEncode",
            (FilterKind::AsciiHex, Decode) => "ASCIIHexDecode",
            (FilterKind::Ascii85, Encode) => "ASCII85Encode",
            (FilterKind::Ascii85, Decode) => "ASCII85Decode",
            (FilterKind::RunLength, Encode) => "RunLengthEncode",
            (FilterKind::RunLength, Decode) => "RunLengthDecode",
            (FilterKind::Flate, Encode) => "FlateEncode",
            (FilterKind::Flate, Decode) => "FlateDecode",
            (FilterKind::Lzw, Encode) => "LZWEncode",
            (FilterKind::Lzw, Decode) => "LZWDecode",
            (FilterKind::Predictor, Encode) => "PredictorEncode",
            (FilterKind::Predictor, Decode) => "PredictorDecode",
            (FilterKind::AesV2, Encode) => "AESV2Encrypt",
            (FilterKind::AesV2, Decode) => "AESV2Decrypt",
            (FilterKind::V2, Encode) => "V2Encrypt",
            (FilterKind::V2, Decode) => "V2Decrypt",
            (FilterKind::Md5, _) => "MD5",
        }
    }
}

/// Value stored in a [`DecodeParms`] map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParmValue {
    /// Integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// Name value (a PDF `/Name`)
    Name(String),
    /// Byte string value
    Bytes(Vec<u8>),
}

/// Key/value filter parameters, the equivalent of a PDF `DecodeParms` dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeParms {
    entries: BTreeMap<String, ParmValue>,
}

impl DecodeParms {
    /// Creates an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry
    pub fn set(mut self, key: impl Into<String>, value: ParmValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces an entry in place
    pub fn insert(&mut self, key: impl Into<String>, value: ParmValue) {
        self.entries.insert(key.into(), value);
    }

    /// Looks up a raw entry
    pub fn get(&self, key: &str) -> Option<&ParmValue> {
        self.entries.get(key)
    }

    /// Returns true if no entries are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_int(&self, key: &str, default: i64, filter: &'static str) -> Result<i64> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(ParmValue::Int(v)) => Ok(*v),
            Some(ParmValue::Bool(b)) => Ok(i64::from(*b)),
            Some(other) => Err(Error::invalid_parameter(
                filter,
                format!("{} must be an integer, got {:?}", key, other),
            )),
        }
    }

    fn get_name(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ParmValue::Name(name)) => Some(name),
            _ => None,
        }
    }

    fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(ParmValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

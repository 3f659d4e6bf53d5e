//! Stream filters: the codec state machines of the pipeline.
//!
//! A [`Filter`] is built from a [`FilterSpec`] and driven with
//! [`Filter::apply`], which moves bytes from an input [`Buffer`] to an output
//! [`Buffer`] and reports what it needs next:
//!
//! | Result                        | Meaning                                          |
//! |-------------------------------|--------------------------------------------------|
//! | `Ok(FilterStatus::NeedInput)` | input exhausted, more may follow                  |
//! | `Ok(FilterStatus::NeedOutput)`| output full, drain it and call again             |
//! | `Ok(FilterStatus::Done)`      | `finish` was set and everything has been emitted |
//! | `Err(_)`                      | malformed input or internal failure              |
//!
//! The produced bytes depend only on the input and on when `finish` is set,
//! never on how the caller splits the data between calls.
//!
//! # Example
//!
//! ```
//! use pdfstm_core::filter::{transform, Direction, FilterSpec};
//!
//! let encoded = transform(&FilterSpec::Ascii85(Direction::Encode), b"\0\0\0\0A").unwrap();
//! assert_eq!(encoded, b"z5l~>");
//! ```

mod a85;
mod aesv2;
mod ahex;
mod codec;
mod flate;
mod lzw;
mod md5;
mod params;
mod predictor;
mod rl;
mod v2;

pub use params::{
    CryptParams, DecodeParms, Direction, FilterKind, FilterSpec, FlateParams, LzwParams,
    ParmValue, PredictorParams,
};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use codec::Driven;
use tracing::{debug, trace};

/// Progress reported by [`Filter::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStatus {
    /// Everything has been emitted after `finish`
    Done,
    /// Input is exhausted; supply more and call again
    NeedInput,
    /// Output is full; drain it and call again with the same input
    NeedOutput,
}

/// Concrete codec state, one variant per filter kind and direction
enum Codec {
    Null,
    AsciiHexEncode(Driven<ahex::HexEncoder>),
    AsciiHexDecode(Driven<ahex::HexDecoder>),
    Ascii85Encode(Driven<a85::A85Encoder>),
    Ascii85Decode(Driven<a85::A85Decoder>),
    RunLengthEncode(Driven<rl::RunLengthEncoder>),
    RunLengthDecode(Driven<rl::RunLengthDecoder>),
    Flate(flate::FlateCodec),
    LzwEncode(Driven<lzw::LzwEncoder>),
    LzwDecode(Driven<lzw::LzwDecoder>),
    Predictor(Driven<predictor::PredictorCodec>),
    AesEncrypt(Driven<aesv2::AesEncryptor>),
    AesDecrypt(Driven<aesv2::AesDecryptor>),
    V2(v2::Rc4Codec),
    Md5(Driven<md5::Md5Codec>),
}

impl Codec {
    fn new(spec: &FilterSpec) -> Result<Self> {
        use Direction::{Decode, Encode};
        Ok(match spec {
            FilterSpec::Null => Codec::Null,
            FilterSpec::AsciiHex(Encode) => Codec::AsciiHexEncode(Driven::new(Default::default())),
            FilterSpec::AsciiHex(Decode) => Codec::AsciiHexDecode(Driven::new(Default::default())),
            FilterSpec::Ascii85(Encode) => Codec::Ascii85Encode(Driven::new(Default::default())),
            FilterSpec::Ascii85(Decode) => Codec::Ascii85Decode(Driven::new(Default::default())),
            FilterSpec::RunLength(Encode) => {
                Codec::RunLengthEncode(Driven::new(Default::default()))
            }
            FilterSpec::RunLength(Decode) => {
                Codec::RunLengthDecode(Driven::new(Default::default()))
            }
            FilterSpec::Flate { direction, params } => {
                Codec::Flate(flate::FlateCodec::new(*direction, params)?)
            }
            FilterSpec::Lzw {
                direction: Encode,
                params,
            } => Codec::LzwEncode(Driven::new(lzw::LzwEncoder::new(params))),
            FilterSpec::Lzw {
                direction: Decode,
                params,
            } => Codec::LzwDecode(Driven::new(lzw::LzwDecoder::new(params))),
            FilterSpec::Predictor { direction, params } => {
                Codec::Predictor(Driven::new(predictor::PredictorCodec::new(*direction, params)?))
            }
            FilterSpec::AesV2 {
                direction: Encode,
                params,
            } => Codec::AesEncrypt(Driven::new(aesv2::AesEncryptor::new(params)?)),
            FilterSpec::AesV2 {
                direction: Decode,
                params,
            } => Codec::AesDecrypt(Driven::new(aesv2::AesDecryptor::new(params)?)),
            FilterSpec::V2 { params, .. } => Codec::V2(v2::Rc4Codec::new(params)?),
            FilterSpec::Md5 => Codec::Md5(Driven::new(md5::Md5Codec::default())),
        })
    }

    fn apply(&mut self, input: &mut Buffer, output: &mut Buffer, finish: bool) -> Result<FilterStatus> {
        match self {
            Codec::Null => copy_through(input, output, finish),
            Codec::AsciiHexEncode(c) => c.apply(input, output, finish),
            Codec::AsciiHexDecode(c) => c.apply(input, output, finish),
            Codec::Ascii85Encode(c) => c.apply(input, output, finish),
            Codec::Ascii85Decode(c) => c.apply(input, output, finish),
            Codec::RunLengthEncode(c) => c.apply(input, output, finish),
            Codec::RunLengthDecode(c) => c.apply(input, output, finish),
            Codec::Flate(c) => c.apply(input, output, finish),
            Codec::LzwEncode(c) => c.apply(input, output, finish),
            Codec::LzwDecode(c) => c.apply(input, output, finish),
            Codec::Predictor(c) => c.apply(input, output, finish),
            Codec::AesEncrypt(c) => c.apply(input, output, finish),
            Codec::AesDecrypt(c) => c.apply(input, output, finish),
            Codec::V2(c) => c.apply(input, output, finish),
            Codec::Md5(c) => c.apply(input, output, finish),
        }
    }
}

/// Identity transfer shared by the Null filter
fn copy_through(input: &mut Buffer, output: &mut Buffer, finish: bool) -> Result<FilterStatus> {
    output.transfer_from(input);
    if !input.is_empty() {
        Ok(FilterStatus::NeedOutput)
    } else if finish {
        Ok(FilterStatus::Done)
    } else {
        Ok(FilterStatus::NeedInput)
    }
}

/// A configured filter instance
///
/// Filter-private state (dictionaries, row buffers, cipher handles) is
/// released when the filter is dropped; key material is wiped.
pub struct Filter {
    spec: FilterSpec,
    codec: Codec,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").field("spec", &self.spec).finish_non_exhaustive()
    }
}

impl Filter {
    /// Initializes a filter from its spec
    ///
    /// Missing or out-of-range parameters fail with
    /// [`Error::InvalidParameter`].
    pub fn new(spec: FilterSpec) -> Result<Self> {
        let codec = Codec::new(&spec)?;
        debug!("Initialized {} filter", spec.name());
        Ok(Self { spec, codec })
    }

    /// Moves bytes from `input` to `output`
    ///
    /// `finish` tells the filter no further input will arrive. See the
    /// module documentation for the meaning of each result.
    pub fn apply(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
        finish: bool,
    ) -> Result<FilterStatus> {
        debug_assert!(input.is_consistent() && output.is_consistent());
        let status = self.codec.apply(input, output, finish);
        debug_assert!(input.is_consistent() && output.is_consistent());
        if let Err(e) = &status {
            trace!("{} filter failed: {}", self.spec.name(), e);
        }
        status
    }

    /// Returns the filter to its freshly initialized state
    pub fn reset(&mut self) -> Result<()> {
        self.codec = Codec::new(&self.spec)?;
        debug!("Reset {} filter", self.spec.name());
        Ok(())
    }

    /// The spec this filter was built from
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// The kind of this filter
    pub fn kind(&self) -> FilterKind {
        self.spec.kind()
    }

    /// Name used in logs and errors
    pub fn name(&self) -> &'static str {
        self.spec.name()
    }

    /// Whether a byte offset in the output equals the same offset in the input
    ///
    /// Only such filters let a stream seek without replaying from the start.
    pub fn is_seek_transparent(&self) -> bool {
        matches!(self.spec, FilterSpec::Null)
    }
}

/// Runs `data` through a single filter in one shot
pub fn transform(spec: &FilterSpec, data: &[u8]) -> Result<Vec<u8>> {
    let mut filter = Filter::new(spec.clone())?;
    let mut input = Buffer::from_slice(data);
    let mut output = Buffer::new(4096);
    let mut result = Vec::with_capacity(data.len());

    loop {
        let status = filter.apply(&mut input, &mut output, true)?;
        result.extend_from_slice(output.unread());
        output.rewind();
        match status {
            FilterStatus::Done => return Ok(result),
            FilterStatus::NeedOutput => continue,
            FilterStatus::NeedInput => {
                return Err(Error::filter(filter.name(), "requested input after finish"))
            }
        }
    }
}

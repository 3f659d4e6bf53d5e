//! RunLengthDecode filter
//!
//! Length byte `0..=127` is followed by `len + 1` literal bytes, `129..=255`
//! by a single byte repeated `257 - len` times; `128` marks end of data.

use super::codec::{ByteCodec, Spill};
use crate::error::{Error, Result};

const EOD: u8 = 128;
const MAX_RUN: usize = 128;

/// Splits input into repeat runs (2..=128) and literal runs (1..=128)
#[derive(Debug, Default)]
pub(crate) struct RunLengthEncoder {
    literal: Vec<u8>,
    last: Option<u8>,
    count: usize,
}

impl RunLengthEncoder {
    fn emit_literal(&mut self, out: &mut Spill) {
        if !self.literal.is_empty() {
            out.push((self.literal.len() - 1) as u8);
            out.extend(&self.literal);
            self.literal.clear();
        }
    }

    /// Closes the run of `last`, either as a repeat or as a literal byte
    fn close_run(&mut self, out: &mut Spill) {
        let Some(byte) = self.last.take() else {
            return;
        };
        if self.count >= 2 {
            self.emit_literal(out);
            out.extend(&[(257 - self.count) as u8, byte]);
        } else {
            self.literal.push(byte);
            if self.literal.len() == MAX_RUN {
                self.emit_literal(out);
            }
        }
        self.count = 0;
    }
}

impl ByteCodec for RunLengthEncoder {
    const NAME: &'static str = "RunLengthEncode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        if self.last == Some(byte) && self.count < MAX_RUN {
            self.count += 1;
            return Ok(());
        }
        self.close_run(out);
        self.last = Some(byte);
        self.count = 1;
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        self.close_run(out);
        self.emit_literal(out);
        out.push(EOD);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Length,
    Literal(usize),
    Repeat(usize),
    Eod,
}

/// Expands literal and repeat runs until the EOD byte
#[derive(Debug, Default)]
pub(crate) struct RunLengthDecoder {
    state: DecodeState,
}

impl ByteCodec for RunLengthDecoder {
    const NAME: &'static str = "RunLengthDecode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.state = match self.state {
            DecodeState::Length => match byte {
                0..=127 => DecodeState::Literal(byte as usize + 1),
                EOD => DecodeState::Eod,
                _ => DecodeState::Repeat(257 - byte as usize),
            },
            DecodeState::Literal(remaining) => {
                out.push(byte);
                if remaining > 1 {
                    DecodeState::Literal(remaining - 1)
                } else {
                    DecodeState::Length
                }
            }
            DecodeState::Repeat(count) => {
                out.extend(&[byte; MAX_RUN][..count]);
                DecodeState::Length
            }
            DecodeState::Eod => {
                return Err(Error::bad_data(Self::NAME, "data after end-of-data marker"));
            }
        };
        Ok(())
    }

    fn flush(&mut self, _out: &mut Spill) -> Result<()> {
        match self.state {
            DecodeState::Length | DecodeState::Eod => Ok(()),
            DecodeState::Literal(remaining) => Err(Error::bad_data(
                Self::NAME,
                format!("literal run truncated, {} bytes missing", remaining),
            )),
            DecodeState::Repeat(_) => Err(Error::bad_data(
                Self::NAME,
                "repeat run is missing its byte",
            )),
        }
    }
}

//! Shared machinery for filters that transform one byte at a time.
//!
//! Most PDF codecs are naturally written as "take a byte, maybe produce some
//! bytes". [`ByteCodec`] captures that shape and [`Driven`] adapts it to the
//! buffer-boundary contract of [`Filter::apply`](super::Filter::apply): output
//! that does not fit is parked in a [`Spill`] and handed out on the next call,
//! so a codec never has to care how its caller chunks the data.

use super::FilterStatus;
use crate::buffer::Buffer;
use crate::error::{Error, Result};

/// Line length used by the ASCII encoders
pub(crate) const LINE_WIDTH: usize = 79;

/// PDF whitespace: NUL, TAB, LF, FF, CR and SPACE
pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

/// A codec fed one input byte at a time
pub(crate) trait ByteCodec {
    /// Filter name used in errors
    const NAME: &'static str;

    /// Consumes one input byte, appending any output to `out`
    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()>;

    /// Emits buffered state after the last input byte
    fn flush(&mut self, out: &mut Spill) -> Result<()>;
}

/// Output produced by a codec but not yet delivered to the caller
#[derive(Debug, Default)]
pub(crate) struct Spill {
    buf: Vec<u8>,
    pos: usize,
}

impl Spill {
    pub(crate) fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Moves pending bytes into `output`; true once nothing is left
    pub(crate) fn drain_into(&mut self, output: &mut Buffer) -> bool {
        if self.pos < self.buf.len() {
            self.pos += output.write_slice(&self.buf[self.pos..]);
        }
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            true
        } else {
            false
        }
    }
}

/// Adapts a [`ByteCodec`] to the apply contract
#[derive(Debug)]
pub(crate) struct Driven<C> {
    codec: C,
    spill: Spill,
    flushed: bool,
}

impl<C: ByteCodec> Driven<C> {
    pub(crate) fn new(codec: C) -> Self {
        Self {
            codec,
            spill: Spill::default(),
            flushed: false,
        }
    }

    pub(crate) fn apply(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
        finish: bool,
    ) -> Result<FilterStatus> {
        loop {
            if !self.spill.drain_into(output) {
                return Ok(FilterStatus::NeedOutput);
            }
            if self.flushed {
                if !input.is_empty() {
                    return Err(Error::filter(C::NAME, "input supplied after finish"));
                }
                return Ok(FilterStatus::Done);
            }
            match input.pop() {
                Some(byte) => self.codec.feed(byte, &mut self.spill)?,
                None if finish => {
                    self.codec.flush(&mut self.spill)?;
                    self.flushed = true;
                }
                None => return Ok(FilterStatus::NeedInput),
            }
        }
    }
}

/// Tracks the output column for encoders that wrap lines
#[derive(Debug, Default)]
pub(crate) struct LineWrap {
    column: usize,
}

impl LineWrap {
    /// Writes `unit` without splitting it across lines
    pub(crate) fn put(&mut self, unit: &[u8], out: &mut Spill) {
        if self.column + unit.len() > LINE_WIDTH {
            out.push(b'\n');
            self.column = 0;
        }
        out.extend(unit);
        self.column += unit.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Doubles every byte and appends a marker at the end
    struct Doubler;

    impl ByteCodec for Doubler {
        const NAME: &'static str = "Doubler";

        fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
            out.extend(&[byte, byte]);
            Ok(())
        }

        fn flush(&mut self, out: &mut Spill) -> Result<()> {
            out.push(b'.');
            Ok(())
        }
    }

    #[test]
    fn test_driven_backpressure() {
        let mut driven = Driven::new(Doubler);
        let mut input = Buffer::from_slice(b"ab");
        let mut output = Buffer::new(3);

        assert_eq!(
            driven.apply(&mut input, &mut output, false).unwrap(),
            FilterStatus::NeedOutput
        );
        assert_eq!(output.unread(), b"aab");
        output.rewind();

        assert_eq!(
            driven.apply(&mut input, &mut output, false).unwrap(),
            FilterStatus::NeedInput
        );
        assert_eq!(output.unread(), b"b");

        assert_eq!(
            driven.apply(&mut input, &mut output, true).unwrap(),
            FilterStatus::Done
        );
        assert_eq!(output.unread(), b"b.");
    }

    #[test]
    fn test_driven_flush_is_idempotent() {
        let mut driven = Driven::new(Doubler);
        let mut input = Buffer::new(0);
        let mut output = Buffer::new(8);

        assert_eq!(
            driven.apply(&mut input, &mut output, true).unwrap(),
            FilterStatus::Done
        );
        assert_eq!(
            driven.apply(&mut input, &mut output, true).unwrap(),
            FilterStatus::Done
        );
        assert_eq!(output.unread(), b".");
    }

    #[test]
    fn test_driven_rejects_input_after_finish() {
        let mut driven = Driven::new(Doubler);
        let mut output = Buffer::new(8);
        driven.apply(&mut Buffer::new(0), &mut output, true).unwrap();
        assert!(driven
            .apply(&mut Buffer::from_slice(b"x"), &mut output, true)
            .is_err());
    }

    #[test]
    fn test_line_wrap_keeps_units_whole() {
        let mut wrap = LineWrap::default();
        let mut spill = Spill::default();
        for _ in 0..78 {
            wrap.put(b"x", &mut spill);
        }
        wrap.put(b"~>", &mut spill);

        let mut out = Buffer::new(128);
        assert!(spill.drain_into(&mut out));
        assert_eq!(out.available(), 81);
        assert_eq!(&out.unread()[78..], b"\n~>");
    }

    #[test]
    fn test_whitespace() {
        for b in [0u8, 9, 10, 12, 13, 32] {
            assert!(is_whitespace(b));
        }
        assert!(!is_whitespace(b'a'));
    }
}

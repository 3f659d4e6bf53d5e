//! ASCII85Decode filter
//!
//! Four input bytes become five characters in `!`..`u`. An all-zero group is
//! written as `z`, a final group of `n` bytes as `n + 1` characters, and the
//! data ends with `~>`.

use super::codec::{is_whitespace, ByteCodec, LineWrap, Spill};
use crate::error::{Error, Result};

/// Encodes 4-byte groups as base-85 characters
#[derive(Debug, Default)]
pub(crate) struct A85Encoder {
    group: [u8; 4],
    len: usize,
    wrap: LineWrap,
}

impl A85Encoder {
    fn put_group(&mut self, chars: usize, out: &mut Spill) {
        let mut value = u32::from_be_bytes(self.group);
        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (value % 85) as u8 + b'!';
            value /= 85;
        }
        for &c in &digits[..chars] {
            self.wrap.put(&[c], out);
        }
    }
}

impl ByteCodec for A85Encoder {
    const NAME: &'static str = "ASCII85Encode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.group[self.len] = byte;
        self.len += 1;
        if self.len == 4 {
            if self.group == [0; 4] {
                self.wrap.put(b"z", out);
            } else {
                self.put_group(5, out);
            }
            self.len = 0;
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        if self.len > 0 {
            self.group[self.len..].fill(0);
            self.put_group(self.len + 1, out);
            self.len = 0;
        }
        self.wrap.put(b"~>", out);
        Ok(())
    }
}

/// Decodes base-85 groups, skipping whitespace, until `~>`
#[derive(Debug, Default)]
pub(crate) struct A85Decoder {
    value: u64,
    count: usize,
    tilde: bool,
    eod: bool,
}

impl A85Decoder {
    fn emit(&mut self, bytes: usize, out: &mut Spill) -> Result<()> {
        let value = u32::try_from(self.value)
            .map_err(|_| Error::bad_data(Self::NAME, "group value exceeds 32 bits"))?;
        out.extend(&value.to_be_bytes()[..bytes]);
        self.value = 0;
        self.count = 0;
        Ok(())
    }

    /// Pads a partial final group with `u` and emits `count - 1` bytes
    fn finish_group(&mut self, out: &mut Spill) -> Result<()> {
        match self.count {
            0 => Ok(()),
            1 => Err(Error::bad_data(
                Self::NAME,
                "final group has a single character",
            )),
            n => {
                for _ in n..5 {
                    self.value = self.value * 85 + 84;
                }
                self.emit(n - 1, out)
            }
        }
    }
}

impl ByteCodec for A85Decoder {
    const NAME: &'static str = "ASCII85Decode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        if self.eod || is_whitespace(byte) {
            return Ok(());
        }
        if self.tilde {
            if byte != b'>' {
                return Err(Error::bad_data(
                    Self::NAME,
                    format!("expected '>' after '~', found '{}'", byte.escape_ascii()),
                ));
            }
            self.eod = true;
            return Ok(());
        }

        match byte {
            b'~' => {
                self.finish_group(out)?;
                self.tilde = true;
            }
            b'z' if self.count == 0 => out.extend(&[0; 4]),
            b'z' => {
                return Err(Error::bad_data(Self::NAME, "'z' inside a group"));
            }
            b'!'..=b'u' => {
                self.value = self.value * 85 + u64::from(byte - b'!');
                self.count += 1;
                if self.count == 5 {
                    self.emit(4, out)?;
                }
            }
            _ => {
                return Err(Error::bad_data(
                    Self::NAME,
                    format!("invalid character '{}'", byte.escape_ascii()),
                ))
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        if self.tilde {
            return Ok(());
        }
        self.finish_group(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::{transform, Direction, FilterSpec};

    fn encode(data: &[u8]) -> Vec<u8> {
        transform(&FilterSpec::Ascii85(Direction::Encode), data).unwrap()
    }

    fn decode(data: &[u8]) -> crate::Result<Vec<u8>> {
        transform(&FilterSpec::Ascii85(Direction::Decode), data)
    }

    #[test]
    fn test_encode_known() {
        assert_eq!(encode(b"Man "), b"9jqo^~>");
        assert_eq!(encode(b"sure."), b"F*2M7/c~>");
    }

    #[test]
    fn test_zero_group() {
        assert_eq!(encode(&[0, 0, 0, 0]), b"z~>");
        assert_eq!(encode(&[0, 0, 0, 0, 0x41]), b"z5l~>");
        // A partial group of zeros is not abbreviated
        assert_eq!(encode(&[0, 0]), b"!!!~>");
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(b""), b"~>");
    }

    #[test]
    fn test_encode_wraps_lines() {
        let encoded = encode(&[0xFF; 80]);
        for line in encoded.split(|&b| b == b'\n') {
            assert!(line.len() <= 79);
        }
        assert!(encoded.ends_with(b"~>"));
    }

    #[test]
    fn test_decode_known() {
        assert_eq!(decode(b"9jqo^~>").unwrap(), b"Man ");
        assert_eq!(decode(b"F*2M7/c~>").unwrap(), b"sure.");
        assert_eq!(decode(b"z5l~>").unwrap(), vec![0, 0, 0, 0, 0x41]);
    }

    #[test]
    fn test_decode_whitespace_and_missing_eod() {
        assert_eq!(decode(b"9j\nqo ^").unwrap(), b"Man ");
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode(b"9jzqo^~>").is_err());
        assert!(decode(b"9jqo^v~>").is_err());
        assert!(decode(b"9jqo^9~>").is_err());
        assert!(decode(b"uuuuu~>").is_err());
        assert!(decode(b"9j~x").is_err());
    }
}

//! ASCIIHexDecode filter

use super::codec::{is_whitespace, ByteCodec, LineWrap, Spill};
use crate::error::{Error, Result};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Writes each byte as two uppercase hex digits, terminated by `>`
#[derive(Debug, Default)]
pub(crate) struct HexEncoder {
    wrap: LineWrap,
}

impl ByteCodec for HexEncoder {
    const NAME: &'static str = "ASCIIHexEncode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.wrap.put(
            &[HEX_DIGITS[(byte >> 4) as usize], HEX_DIGITS[(byte & 0x0F) as usize]],
            out,
        );
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        self.wrap.put(b">", out);
        Ok(())
    }
}

/// Parses hex digit pairs, skipping whitespace, until `>`
#[derive(Debug, Default)]
pub(crate) struct HexDecoder {
    high: Option<u8>,
    eod: bool,
}

impl HexDecoder {
    /// An odd trailing digit stands for its high nibble
    fn emit_pending(&mut self, out: &mut Spill) {
        if let Some(high) = self.high.take() {
            out.push(high << 4);
        }
    }
}

impl ByteCodec for HexDecoder {
    const NAME: &'static str = "ASCIIHexDecode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        if self.eod || is_whitespace(byte) {
            return Ok(());
        }
        if byte == b'>' {
            self.emit_pending(out);
            self.eod = true;
            return Ok(());
        }

        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => {
                return Err(Error::bad_data(
                    Self::NAME,
                    format!("invalid hex digit '{}'", byte.escape_ascii()),
                ))
            }
        };
        match self.high.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => self.high = Some(nibble),
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        if !self.eod {
            self.emit_pending(out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::{transform, Direction, FilterSpec};

    fn encode(data: &[u8]) -> Vec<u8> {
        transform(&FilterSpec::AsciiHex(Direction::Encode), data).unwrap()
    }

    fn decode(data: &[u8]) -> crate::Result<Vec<u8>> {
        transform(&FilterSpec::AsciiHex(Direction::Decode), data)
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(b"Hello"), b"48656C6C6F>");
        assert_eq!(encode(b""), b">");
    }

    #[test]
    fn test_encode_wraps_lines() {
        let encoded = encode(&[0xAB; 50]);
        let lines: Vec<&[u8]> = encoded.split(|&b| b == b'\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 78);
        assert_eq!(lines[1].len(), 23);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"48656C6C6F>").unwrap(), b"Hello");
        assert_eq!(decode(b"48 65\n6c 6c\t6f>").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_odd_length() {
        assert_eq!(decode(b"414>").unwrap(), vec![0x41, 0x40]);
        assert_eq!(decode(b"7").unwrap(), vec![0x70]);
    }

    #[test]
    fn test_decode_ignores_data_after_eod() {
        assert_eq!(decode(b"41>zz").unwrap(), b"A");
    }

    #[test]
    fn test_decode_missing_eod() {
        assert_eq!(decode(b"4142").unwrap(), b"AB");
    }

    #[test]
    fn test_decode_invalid_digit() {
        let err = decode(b"4G>").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadData);
        assert!(err.to_string().contains("'G'"));
    }
}

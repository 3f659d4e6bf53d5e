//! V2 (RC4) crypt filter
//!
//! RC4 is symmetric and length-preserving, so encoding and decoding are the
//! same keystream XOR applied to whatever fits in the output.

use super::params::CryptParams;
use super::FilterStatus;
use crate::buffer::Buffer;
use crate::crypt::Rc4Cipher;
use crate::error::Result;

pub(crate) struct Rc4Codec {
    cipher: Rc4Cipher,
}

impl Rc4Codec {
    pub(crate) fn new(params: &CryptParams) -> Result<Self> {
        Ok(Self {
            cipher: Rc4Cipher::new(&params.key)?,
        })
    }

    pub(crate) fn apply(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
        finish: bool,
    ) -> Result<FilterStatus> {
        let n = input.available().min(output.free());
        let chunk = &mut output.spare_mut()[..n];
        chunk.copy_from_slice(&input.unread()[..n]);
        self.cipher.apply(chunk);
        output.commit(n);
        input.consume(n);

        Ok(if !input.is_empty() {
            FilterStatus::NeedOutput
        } else if finish {
            FilterStatus::Done
        } else {
            FilterStatus::NeedInput
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{transform, Direction, FilterSpec};

    #[test]
    fn test_roundtrip() {
        let spec = FilterSpec::V2 {
            direction: Direction::Encode,
            params: CryptParams::new(b"Key".to_vec().repeat(2)),
        };
        let encrypted = transform(&spec, b"Plaintext").unwrap();
        assert_eq!(encrypted.len(), 9);

        let decrypt = FilterSpec::V2 {
            direction: Direction::Decode,
            params: CryptParams::new(b"KeyKey".to_vec()),
        };
        assert_eq!(transform(&decrypt, &encrypted).unwrap(), b"Plaintext");
    }

    #[test]
    fn test_keystream_continues_across_calls() {
        let params = CryptParams::new(b"Secret".to_vec());
        let mut codec = Rc4Codec::new(&params).unwrap();
        let mut input = Buffer::from_slice(b"Attack at dawn");
        let mut output = Buffer::new(5);
        let mut encrypted = Vec::new();

        loop {
            let status = codec.apply(&mut input, &mut output, true).unwrap();
            encrypted.extend_from_slice(output.unread());
            output.rewind();
            if status == FilterStatus::Done {
                break;
            }
        }
        assert_eq!(
            encrypted,
            [0x45, 0xA0, 0x1F, 0x64, 0x5F, 0xC3, 0x5B, 0x38, 0x35, 0x52, 0x54, 0x4B, 0x9B, 0xF5]
        );
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(Rc4Codec::new(&CryptParams::new(b"abc".to_vec())).is_err());
    }
}

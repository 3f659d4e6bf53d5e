//! MD5 digest filter: swallows its input and emits the 16-byte digest at finish.

use super::codec::{ByteCodec, Spill};
use crate::crypt::Md5Digest;
use crate::error::Result;

#[derive(Default)]
pub(crate) struct Md5Codec {
    digest: Md5Digest,
}

impl ByteCodec for Md5Codec {
    const NAME: &'static str = "MD5";

    fn feed(&mut self, byte: u8, _out: &mut Spill) -> Result<()> {
        self.digest.write(&[byte]);
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        out.extend(&self.digest.read());
        Ok(())
    }
}

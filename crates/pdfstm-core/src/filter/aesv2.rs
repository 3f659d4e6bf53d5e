//! AESV2 crypt filter
//!
//! Encrypted data is the 16-byte initialization vector followed by the
//! AES-CBC ciphertext of the PKCS#7-padded plaintext.

use super::codec::{ByteCodec, Spill};
use super::params::CryptParams;
use crate::crypt::{AesCbcDecryptor, AesCbcEncryptor, SecretKey, AES_BLOCK_SIZE};
use crate::error::{Error, Result};

/// Encrypts plaintext block by block, IV first
pub(crate) struct AesEncryptor {
    cipher: AesCbcEncryptor,
    iv: [u8; AES_BLOCK_SIZE],
    iv_sent: bool,
    block: [u8; AES_BLOCK_SIZE],
    len: usize,
}

impl AesEncryptor {
    pub(crate) fn new(params: &CryptParams) -> Result<Self> {
        let iv = params.iv.unwrap_or_else(rand::random);
        Ok(Self {
            cipher: AesCbcEncryptor::new(&params.key, &iv)?,
            iv,
            iv_sent: false,
            block: [0; AES_BLOCK_SIZE],
            len: 0,
        })
    }

    fn send_iv(&mut self, out: &mut Spill) {
        if !self.iv_sent {
            out.extend(&self.iv);
            self.iv_sent = true;
        }
    }
}

impl ByteCodec for AesEncryptor {
    const NAME: &'static str = "AESV2Encrypt";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.send_iv(out);
        self.block[self.len] = byte;
        self.len += 1;
        if self.len == AES_BLOCK_SIZE {
            self.cipher.encrypt_block(&mut self.block);
            out.extend(&self.block);
            self.len = 0;
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        self.send_iv(out);
        let pad = (AES_BLOCK_SIZE - self.len) as u8;
        self.block[self.len..].fill(pad);
        self.cipher.encrypt_block(&mut self.block);
        out.extend(&self.block);
        self.len = 0;
        Ok(())
    }
}

/// Decrypts ciphertext, holding the last block back until the padding is known
pub(crate) struct AesDecryptor {
    key: SecretKey,
    cipher: Option<AesCbcDecryptor>,
    block: [u8; AES_BLOCK_SIZE],
    len: usize,
    held: Option<[u8; AES_BLOCK_SIZE]>,
}

impl AesDecryptor {
    pub(crate) fn new(params: &CryptParams) -> Result<Self> {
        // Reject bad keys at init rather than after the IV arrives
        AesCbcDecryptor::new(&params.key, &[0; AES_BLOCK_SIZE])?;
        Ok(Self {
            key: params.key.clone(),
            cipher: None,
            block: [0; AES_BLOCK_SIZE],
            len: 0,
            held: None,
        })
    }
}

impl ByteCodec for AesDecryptor {
    const NAME: &'static str = "AESV2Decrypt";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.block[self.len] = byte;
        self.len += 1;
        if self.len < AES_BLOCK_SIZE {
            return Ok(());
        }
        self.len = 0;

        match &mut self.cipher {
            None => self.cipher = Some(AesCbcDecryptor::new(&self.key, &self.block)?),
            Some(cipher) => {
                cipher.decrypt_block(&mut self.block);
                if let Some(previous) = self.held.replace(self.block) {
                    out.extend(&previous);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        if self.len != 0 {
            return Err(Error::bad_data(
                Self::NAME,
                format!("{} trailing bytes do not form a block", self.len),
            ));
        }
        if self.cipher.is_none() {
            // No data at all decrypts to nothing
            return Ok(());
        }
        let last = self
            .held
            .take()
            .ok_or_else(|| Error::bad_data(Self::NAME, "missing padding block"))?;

        let pad = last[AES_BLOCK_SIZE - 1] as usize;
        if pad == 0 || pad > AES_BLOCK_SIZE || last[AES_BLOCK_SIZE - pad..].iter().any(|&b| b as usize != pad) {
            return Err(Error::bad_data(Self::NAME, "invalid padding"));
        }
        out.extend(&last[..AES_BLOCK_SIZE - pad]);
        Ok(())
    }
}

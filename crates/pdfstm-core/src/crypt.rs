//! Cipher and digest handles used by the encryption filters.
//!
//! The filters never implement AES, RC4 or MD5 themselves; they drive these
//! handles block by block (AES), byte run by byte run (RC4) or by feeding
//! input incrementally (MD5). The primitives come from the RustCrypto crates.

use crate::error::{Error, Result};
use aes::cipher::consts::{U10, U11, U12, U13, U14, U15, U16, U5, U6, U7, U8, U9};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use md5::{Digest, Md5};
use rc4::Rc4;
use zeroize::Zeroizing;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Size of an MD5 digest in bytes
pub const MD5_DIGEST_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-CBC encryption handle (128-bit or 256-bit key)
pub enum AesCbcEncryptor {
    /// AES-128 (AESV2)
    Aes128(Aes128CbcEnc),
    /// AES-256
    Aes256(Aes256CbcEnc),
}

impl AesCbcEncryptor {
    /// Creates an encryptor from a 16 or 32 byte key and a 16 byte IV
    pub fn new(key: &[u8], iv: &[u8; AES_BLOCK_SIZE]) -> Result<Self> {
        match key.len() {
            16 => Aes128CbcEnc::new_from_slices(key, iv)
                .map(Self::Aes128)
                .map_err(|e| Error::invalid_parameter("AESV2", format!("{:?}", e))),
            32 => Aes256CbcEnc::new_from_slices(key, iv)
                .map(Self::Aes256)
                .map_err(|e| Error::invalid_parameter("AESV2", format!("{:?}", e))),
            n => Err(Error::invalid_parameter(
                "AESV2",
                format!("key must be 16 or 32 bytes, got {}", n),
            )),
        }
    }

    /// Encrypts one block in place, chaining from the previous block
    pub fn encrypt_block(&mut self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Self::Aes128(c) => c.encrypt_block_mut(block),
            Self::Aes256(c) => c.encrypt_block_mut(block),
        }
    }
}

/// AES-CBC decryption handle (128-bit or 256-bit key)
pub enum AesCbcDecryptor {
    /// AES-128 (AESV2)
    Aes128(Aes128CbcDec),
    /// AES-256
    Aes256(Aes256CbcDec),
}

impl AesCbcDecryptor {
    /// Creates a decryptor from a 16 or 32 byte key and a 16 byte IV
    pub fn new(key: &[u8], iv: &[u8; AES_BLOCK_SIZE]) -> Result<Self> {
        match key.len() {
            16 => Aes128CbcDec::new_from_slices(key, iv)
                .map(Self::Aes128)
                .map_err(|e| Error::invalid_parameter("AESV2", format!("{:?}", e))),
            32 => Aes256CbcDec::new_from_slices(key, iv)
                .map(Self::Aes256)
                .map_err(|e| Error::invalid_parameter("AESV2", format!("{:?}", e))),
            n => Err(Error::invalid_parameter(
                "AESV2",
                format!("key must be 16 or 32 bytes, got {}", n),
            )),
        }
    }

    /// Decrypts one block in place
    pub fn decrypt_block(&mut self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Self::Aes128(c) => c.decrypt_block_mut(block),
            Self::Aes256(c) => c.decrypt_block_mut(block),
        }
    }
}

/// RC4 keystream handle (the V2 crypt method)
pub struct Rc4Cipher {
    inner: Box<dyn StreamCipher + Send>,
}

impl Rc4Cipher {
    /// Creates a cipher keyed with 5 to 16 bytes
    pub fn new(key: &[u8]) -> Result<Self> {
        macro_rules! keyed {
            ($($len:literal => $size:ty),* $(,)?) => {
                match key.len() {
                    $($len => Box::new(
                        Rc4::<$size>::new_from_slice(key)
                            .map_err(|e| Error::invalid_parameter("V2", format!("{:?}", e)))?,
                    ) as Box<dyn StreamCipher + Send>,)*
                    n => {
                        return Err(Error::invalid_parameter(
                            "V2",
                            format!("key must be 5 to 16 bytes, got {}", n),
                        ))
                    }
                }
            };
        }

        let inner = keyed!(
            5 => U5, 6 => U6, 7 => U7, 8 => U8, 9 => U9, 10 => U10,
            11 => U11, 12 => U12, 13 => U13, 14 => U14, 15 => U15, 16 => U16,
        );
        Ok(Self { inner })
    }

    /// XORs the next keystream bytes into `data`
    pub fn apply(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }
}

/// Incremental MD5 digest handle
#[derive(Clone, Default)]
pub struct Md5Digest {
    hasher: Md5,
}

impl Md5Digest {
    /// Creates an empty digest
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more data
    pub fn write(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Produces the digest and resets the handle
    pub fn read(&mut self) -> [u8; MD5_DIGEST_SIZE] {
        self.hasher.finalize_reset().into()
    }
}

/// Key material that is wiped from memory when dropped
pub type SecretKey = Zeroizing<Vec<u8>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_block_roundtrip() {
        let key = [7u8; 16];
        let iv = [1u8; 16];
        let plain = *b"sixteen byte blk";

        let mut enc = AesCbcEncryptor::new(&key, &iv).unwrap();
        let mut block = plain;
        enc.encrypt_block(&mut block);
        assert_ne!(block, plain);

        let mut dec = AesCbcDecryptor::new(&key, &iv).unwrap();
        dec.decrypt_block(&mut block);
        assert_eq!(block, plain);
    }

    #[test]
    fn test_aes_rejects_bad_key() {
        assert!(AesCbcEncryptor::new(&[0u8; 15], &[0u8; 16]).is_err());
        assert!(AesCbcDecryptor::new(&[0u8; 24], &[0u8; 16]).is_err());
    }

    #[test]
    fn test_rc4_known_vector() {
        let mut cipher = Rc4Cipher::new(b"Secret").unwrap();
        let mut data = *b"Attack at dawn";
        cipher.apply(&mut data);
        assert_eq!(
            data,
            [0x45, 0xA0, 0x1F, 0x64, 0x5F, 0xC3, 0x5B, 0x38, 0x35, 0x52, 0x54, 0x4B, 0x9B, 0xF5]
        );
    }

    #[test]
    fn test_rc4_key_length() {
        assert!(Rc4Cipher::new(b"four").is_err());
        assert!(Rc4Cipher::new(&[0u8; 17]).is_err());
        assert!(Rc4Cipher::new(&[0u8; 5]).is_ok());
    }

    #[test]
    fn test_md5_digest() {
        let mut digest = Md5Digest::new();
        digest.write(b"a");
        digest.write(b"bc");
        assert_eq!(
            digest.read(),
            [
                0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1,
                0x7f, 0x72
            ]
        );
    }
}

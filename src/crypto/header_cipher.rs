//! Media Protector - Header Cipher
//!
//! AES-128-CTR keystream applied to at most the first [`HEADER_LEN`] bytes
//! of a plaintext. CTR is symmetric, so the same transform both protects and
//! unprotects a header given the same key and nonce.

use ctr::cipher::{KeyIvInit, StreamCipher};

use super::keys::{ContainerKey, NONCE_LEN};
use crate::error::{ProtectorError, ProtectorResult};

/// Size of the header region that is ever encrypted
pub const HEADER_LEN: usize = 1024;

/// AES-128 in CTR mode with a full 128-bit big-endian counter block
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Keystream limited to the header region.
///
/// Feed it the logical stream in order; bytes past the header region pass
/// through untouched.
pub struct HeaderCipher {
    cipher: Aes128Ctr,
    remaining: usize,
}

impl HeaderCipher {
    pub fn new(key: &ContainerKey, nonce: &[u8; NONCE_LEN]) -> ProtectorResult<Self> {
        let cipher = Aes128Ctr::new_from_slices(key.expose(), nonce)
            .map_err(|_| ProtectorError::CipherInit("invalid AES-128-CTR key or nonce length".into()))?;

        Ok(Self {
            cipher,
            remaining: HEADER_LEN,
        })
    }

    /// Transform the leading part of `buf` that still lies in the header
    /// region. Returns how many bytes were transformed.
    pub fn apply(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.remaining);
        if n > 0 {
            self.cipher.apply_keystream(&mut buf[..n]);
            self.remaining -= n;
        }
        n
    }

    /// Bytes of header region left to transform
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nist_ctr_vector() {
        // SP 800-38A F.5.1, first block
        let key: [u8; 16] = hex::decode("2b7e151628aed2a6abf7158809cf4f3c")
            .unwrap()
            .try_into()
            .unwrap();
        let nonce: [u8; 16] = hex::decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff")
            .unwrap()
            .try_into()
            .unwrap();
        let mut block = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let mut cipher = HeaderCipher::new(&ContainerKey::new(key), &nonce).unwrap();
        cipher.apply(&mut block);

        assert_eq!(hex::encode(block), "874d6191b620e3261bef6864990db6ce");
    }

    #[test]
    fn test_stops_at_header_boundary() {
        let key = ContainerKey::builtin();
        let nonce = [7u8; NONCE_LEN];
        let mut data = vec![0u8; HEADER_LEN + 100];

        let mut cipher = HeaderCipher::new(&key, &nonce).unwrap();
        assert_eq!(cipher.apply(&mut data), HEADER_LEN);
        assert_eq!(cipher.remaining(), 0);
        assert!(data[HEADER_LEN..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_chunked_matches_single_pass() {
        let key = ContainerKey::builtin();
        let nonce = [3u8; NONCE_LEN];
        let original: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();

        let mut whole = original.clone();
        HeaderCipher::new(&key, &nonce).unwrap().apply(&mut whole);

        let mut pieces = original.clone();
        let mut cipher = HeaderCipher::new(&key, &nonce).unwrap();
        for chunk in pieces.chunks_mut(77) {
            cipher.apply(chunk);
        }

        assert_eq!(whole, pieces);

        // Symmetric: applying again restores the plaintext
        HeaderCipher::new(&key, &nonce).unwrap().apply(&mut whole);
        assert_eq!(whole, original);
    }
}

//! Media Protector - Key Material
//!
//! The container key is a single fixed 128-bit value shared by every
//! installation. This is a known weak-confidentiality property of the format:
//! containers hide media from casual discovery, they do not resist anyone
//! holding the binary. A passphrase-derived key is available as an explicit
//! opt-in and produces containers the built-in key cannot read.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, Secret};

use crate::error::{ProtectorError, ProtectorResult};

/// Key length for AES-128
pub const KEY_LEN: usize = 16;

/// Nonce length stored at the start of every container (full CTR block)
pub const NONCE_LEN: usize = 16;

/// Built-in process-wide key
const BUILTIN_KEY: [u8; KEY_LEN] = *b"mprot-header-key";

/// Fixed application salt for the opt-in passphrase key
const PASSPHRASE_SALT: &[u8] = b"MEDIA_PROTECTOR_SALT_v1";

/// Secure key wrapper with automatic zeroization
pub struct ContainerKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl ContainerKey {
    /// Create a key from raw bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// The fixed key every installation shares
    pub fn builtin() -> Self {
        Self::new(BUILTIN_KEY)
    }

    /// Derive a key from a passphrase using Argon2id
    pub fn from_passphrase(passphrase: &str) -> ProtectorResult<Self> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let params = Params::new(19 * 1024, 2, 1, Some(KEY_LEN))
            .map_err(|e| ProtectorError::KeyDerivationFailed(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), PASSPHRASE_SALT, &mut key)
            .map_err(|e| ProtectorError::KeyDerivationFailed(e.to_string()))?;

        let derived = Self::new(key);
        zeroize::Zeroize::zeroize(&mut key);
        Ok(derived)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }
}

impl Default for ContainerKey {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContainerKey([REDACTED])")
    }
}

/// Generate a fresh random nonce from the OS CSPRNG
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

//! Media Protector - Cryptographic Core
//!
//! One primitive: AES-128-CTR over the header region of a file.

pub mod keys;
pub mod header_cipher;

pub use keys::*;
pub use header_cipher::*;

//! Media Protector - Configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProtectorError, ProtectorResult};
use crate::files::write_atomic;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTECTOR CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Protector configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectorConfig {
    /// Preview decode threads
    pub preview_workers: usize,
    /// Max previews kept in memory
    pub preview_cache_capacity: usize,
    /// Integer downsampling factor applied to decoded previews
    pub preview_sample_factor: u32,
    /// Allocation cap handed to the image decoder
    pub preview_max_decode_bytes: u64,
    /// Unprotect into the recorded original location when known
    pub restore_to_original: bool,
    /// Original-path table file; in-memory when unset
    pub path_store: Option<PathBuf>,
    /// Derive the container key from this passphrase instead of the built-in key
    pub key_passphrase: Option<String>,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            preview_workers: 4,
            preview_cache_capacity: 30,
            preview_sample_factor: 4,
            preview_max_decode_bytes: 256 * 1024 * 1024,
            restore_to_original: false,
            path_store: None,
            key_passphrase: None,
        }
    }
}

impl ProtectorConfig {
    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> ProtectorResult<Self> {
        let data = fs::read(path.as_ref())?;
        let config: ProtectorConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, or defaults if it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ProtectorResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<()> {
        self.validate()?;
        let data = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &data)
    }

    pub fn validate(&self) -> ProtectorResult<()> {
        if self.preview_workers == 0 {
            return Err(ProtectorError::Config("preview_workers must be at least 1".into()));
        }
        if self.preview_cache_capacity == 0 {
            return Err(ProtectorError::Config("preview_cache_capacity must be at least 1".into()));
        }
        if self.preview_sample_factor == 0 {
            return Err(ProtectorError::Config("preview_sample_factor must be at least 1".into()));
        }
        if matches!(&self.key_passphrase, Some(p) if p.is_empty()) {
            return Err(ProtectorError::Config("key_passphrase must not be empty".into()));
        }
        Ok(())
    }
}

//! Media Protector - Error Types

use thiserror::Error;

/// Result type for protector operations
pub type ProtectorResult<T> = Result<T, ProtectorError>;

/// Protector error types
#[derive(Error, Debug)]
pub enum ProtectorError {
    // ═══════════════════════════════════════════════════════════════
    // CODEC ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid container: {0}")]
    Format(String),

    #[error("Cipher initialisation failed: {0}")]
    CipherInit(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // WORKER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("A batch is already running on this pipeline")]
    BatchInProgress,

    #[error("Worker has shut down")]
    WorkerClosed,

    #[error("Batch cancelled before completion")]
    Cancelled,

    // ═══════════════════════════════════════════════════════════════
    // PREVIEW ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Preview decode failed: {0}")]
    PreviewFailed(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIG / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ProtectorError {
    /// The input is not a usable container (too short, or not a container at all)
    pub fn is_format_error(&self) -> bool {
        matches!(self, ProtectorError::Format(_))
    }
}

impl From<serde_json::Error> for ProtectorError {
    fn from(e: serde_json::Error) -> Self {
        ProtectorError::SerializationError(e.to_string())
    }
}

impl From<image::ImageError> for ProtectorError {
    fn from(e: image::ImageError) -> Self {
        ProtectorError::ImageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_classification() {
        let io = ProtectorError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!io.is_format_error());
        assert!(ProtectorError::Format("too short".into()).is_format_error());
        assert!(!ProtectorError::BatchInProgress.is_format_error());
    }
}

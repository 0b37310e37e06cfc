//! # Media Protector
//!
//! Hides media files from casual discovery by scrambling their leading bytes,
//! while keeping them streamable for preview and playback.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    MEDIA PROTECTOR                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  BATCH      │  │  PREVIEW    │  │  DIRECTORY      │  │
//! │  │  PIPELINE   │  │  CACHE (LRU)│  │  SCAN           │  │
//! │  └──────┬──────┘  └──────┬──────┘  └─────────────────┘  │
//! │         │                │                               │
//! │  ┌──────┴──────┐  ┌──────┴──────────────────────────┐   │
//! │  │  CODEC      │  │  RANDOM-ACCESS READER           │   │
//! │  │  protect /  │  │  cached header + tail passthru  │   │
//! │  │  unprotect  │  └─────────────────────────────────┘   │
//! │  └──────┬──────┘                                         │
//! │  ┌──────┴───────────────────────────────────────────┐   │
//! │  │        AES-128-CTR over the first 1024 bytes      │   │
//! │  └──────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Container Format
//!
//! ```text
//! [nonce: 16][AES-128-CTR(header): min(N, 1024)][plaintext tail]
//! ```
//!
//! ## Security Model
//!
//! - Obfuscation, not confidentiality: only the header region is encrypted
//! - One fixed built-in key unless a passphrase key is configured
//! - Fresh random nonce per container
//! - No integrity check
//! - Decrypted headers held in zeroized memory, never written to disk

pub mod api;
pub mod classify;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod files;
pub mod path_store;
pub mod pipeline;
pub mod preview;
pub mod reader;
pub mod scan;

pub use api::{ContainerInfo, MediaProtector};
pub use classify::{classify, MediaKind, CONTAINER_SUFFIX};
pub use codec::Codec;
pub use config::ProtectorConfig;
pub use error::{ProtectorError, ProtectorResult};
pub use pipeline::{BatchEvent, BatchHandle, BatchOperation, BatchPipeline, BatchSummary};
pub use preview::{DisplaySlot, Preview, PreviewCache, PreviewRequest};
pub use reader::{MediaReader, MediaSource, PlainSource};
pub use scan::ScanMode;

/// Media Protector version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

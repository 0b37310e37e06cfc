//! Preview decoding
//!
//! Protected files are decoded straight from a [`MediaReader`](crate::reader::MediaReader),
//! so no plaintext copy ever reaches the disk.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageReader, Limits};

use crate::classify::{classify_path, content_kind, MediaKind};
use crate::codec::Codec;
use crate::error::{ProtectorError, ProtectorResult};
use crate::reader::{open_media_source, MediaSource};

/// Turns a file into a preview-sized image
pub trait PreviewDecoder: Send + Sync {
    fn decode(&self, path: &Path, is_protected: bool) -> ProtectorResult<DynamicImage>;
}

/// Pulls one representative frame out of a video
pub trait FrameExtractor: Send + Sync {
    /// The decodable frame nearest to position zero, if any
    fn extract_frame(&self, source: &mut dyn MediaSource) -> ProtectorResult<Option<DynamicImage>>;
}

/// Extractor for builds without a video backend; videos keep their placeholder
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrameExtractor;

impl FrameExtractor for NoFrameExtractor {
    fn extract_frame(&self, _source: &mut dyn MediaSource) -> ProtectorResult<Option<DynamicImage>> {
        Ok(None)
    }
}

/// Default decoder: images via `image`, videos via a [`FrameExtractor`]
pub struct MediaDecoder {
    codec: Arc<Codec>,
    sample_factor: u32,
    max_decode_bytes: u64,
    frames: Arc<dyn FrameExtractor>,
}

impl MediaDecoder {
    pub fn new(codec: Arc<Codec>, sample_factor: u32, max_decode_bytes: u64) -> Self {
        Self {
            codec,
            sample_factor: sample_factor.max(1),
            max_decode_bytes,
            frames: Arc::new(NoFrameExtractor),
        }
    }

    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>) -> Self {
        self.frames = frames;
        self
    }

    fn decode_still(&self, source: Box<dyn MediaSource>) -> ProtectorResult<DynamicImage> {
        let mut reader = ImageReader::new(BufReader::new(source)).with_guessed_format()?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decode_bytes);
        reader.limits(limits);

        Ok(reader.decode()?)
    }

    fn decode_frame(&self, mut source: Box<dyn MediaSource>) -> ProtectorResult<DynamicImage> {
        self.frames
            .extract_frame(source.as_mut())?
            .ok_or_else(|| ProtectorError::PreviewFailed("no decodable video frame".into()))
    }
}

impl PreviewDecoder for MediaDecoder {
    fn decode(&self, path: &Path, is_protected: bool) -> ProtectorResult<DynamicImage> {
        let kind = if is_protected {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(content_kind)
                .unwrap_or(MediaKind::Unknown)
        } else {
            classify_path(path)
        };

        let source = open_media_source(path, is_protected, self.codec.key())?;
        let image = match kind {
            MediaKind::Image => self.decode_still(source)?,
            MediaKind::Video => self.decode_frame(source)?,
            _ => {
                return Err(ProtectorError::PreviewFailed(format!(
                    "{} is not a recognized media file",
                    path.display()
                )))
            }
        };

        Ok(downsample(image, self.sample_factor))
    }
}

/// Shrink both dimensions by an integer factor, never below one pixel
pub fn downsample(image: DynamicImage, factor: u32) -> DynamicImage {
    if factor <= 1 {
        return image;
    }
    let (width, height) = image.dimensions();
    image.thumbnail((width / factor).max(1), (height / factor).max(1))
}

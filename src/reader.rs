//! Media Protector - Random-Access Reader
//!
//! Presents a container as its logical plaintext `[0, size)` for consumers
//! that seek, such as video playback and frame extraction. The decrypted
//! header is cached once in memory; every other byte is read straight from
//! the container, offset by the nonce. No plaintext copy is ever written.
//!
//! A reader serves one consumer at a time (`&mut self` on every read).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use zeroize::Zeroizing;

use crate::classify::{content_kind, MediaKind};
use crate::codec::read_nonce;
use crate::crypto::{ContainerKey, HeaderCipher, HEADER_LEN, NONCE_LEN};
use crate::error::{ProtectorError, ProtectorResult};

/// Random-access byte source a playback component can attach to.
///
/// `read_at` past the end returns `Ok(0)`, never an error.
pub trait MediaSource: Read + Seek + Send {
    /// Read up to `buf.len()` bytes at logical `position`
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Logical size in bytes
    fn size(&self) -> u64;
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTAINER READER
// ═══════════════════════════════════════════════════════════════════════════

/// Random-access plaintext view of a container file
pub struct MediaReader {
    file: File,
    header: Zeroizing<Vec<u8>>,
    logical_size: u64,
    position: u64,
    kind: MediaKind,
}

impl MediaReader {
    /// Open a container and decrypt its header region into memory
    pub fn open<P: AsRef<Path>>(path: P, key: &ContainerKey) -> ProtectorResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let raw_size = file.metadata()?.len();
        let logical_size = raw_size.checked_sub(NONCE_LEN as u64).ok_or_else(|| {
            ProtectorError::Format(format!(
                "{} is too short to be a container ({} bytes)",
                path.display(),
                raw_size
            ))
        })?;

        let nonce = read_nonce(&mut file, path)?;

        let header_len = logical_size.min(HEADER_LEN as u64) as usize;
        let mut header = Zeroizing::new(vec![0u8; header_len]);
        file.read_exact(&mut header)?;
        HeaderCipher::new(key, &nonce)?.apply(&mut header);

        let kind = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(content_kind)
            .unwrap_or(MediaKind::Unknown);

        Ok(Self {
            file,
            header,
            logical_size,
            position: 0,
            kind,
        })
    }

    /// Logical size (container length minus the nonce)
    pub fn size(&self) -> u64 {
        self.logical_size
    }

    /// Kind of media inside, from the container's display name
    pub fn media_kind(&self) -> MediaKind {
        self.kind
    }

    /// Read at a logical offset.
    ///
    /// Bytes below the header boundary come from the cached plaintext header,
    /// the rest from the container file; one call may span both. Returns
    /// `Ok(0)` at or past the end.
    pub fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        if position >= self.logical_size || buf.is_empty() {
            return Ok(0);
        }

        let wanted = (buf.len() as u64).min(self.logical_size - position) as usize;
        let mut filled = 0;

        if position < self.header.len() as u64 {
            let start = position as usize;
            filled = wanted.min(self.header.len() - start);
            buf[..filled].copy_from_slice(&self.header[start..start + filled]);
        }

        if filled < wanted {
            let raw_offset = position + filled as u64 + NONCE_LEN as u64;
            filled += read_fully_at(&mut self.file, raw_offset, &mut buf[filled..wanted])?;
        }

        Ok(filled)
    }

    /// Release the underlying file handle
    pub fn close(self) {}
}

impl MediaSource for MediaReader {
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        MediaReader::read_at(self, position, buf)
    }

    fn size(&self) -> u64 {
        self.logical_size
    }
}

impl Read for MediaReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = MediaReader::read_at(self, self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for MediaReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.logical_size, pos)?;
        Ok(self.position)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PLAIN SOURCE
// ═══════════════════════════════════════════════════════════════════════════

/// Unprotected file behind the same [`MediaSource`] interface
pub struct PlainSource {
    file: File,
    size: u64,
    position: u64,
}

impl PlainSource {
    pub fn open<P: AsRef<Path>>(path: P) -> ProtectorResult<Self> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            position: 0,
        })
    }
}

impl MediaSource for PlainSource {
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        if position >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let wanted = (buf.len() as u64).min(self.size - position) as usize;
        read_fully_at(&mut self.file, position, &mut buf[..wanted])
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Read for PlainSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = MediaSource::read_at(self, self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for PlainSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.size, pos)?;
        Ok(self.position)
    }
}

/// Open `path` as a media source, decrypting when it is a container
pub fn open_media_source<P: AsRef<Path>>(
    path: P,
    protected: bool,
    key: &ContainerKey,
) -> ProtectorResult<Box<dyn MediaSource>> {
    if protected {
        Ok(Box::new(MediaReader::open(path, key)?))
    } else {
        Ok(Box::new(PlainSource::open(path)?))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Fill as much of `buf` as the file holds from `offset`
fn read_fully_at(file: &mut File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn resolve_seek(current: u64, size: u64, pos: SeekFrom) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
    };

    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 253) as u8).collect()
    }

    fn container_of(data: &[u8], name: &str) -> (TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, Codec::default().protect_bytes(data).unwrap()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_logical_size_and_end_of_stream() {
        let data = sample(2000);
        let (_dir, path) = container_of(&data, "clip.mp4.mprot");

        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();
        assert_eq!(reader.size(), 2000);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read_at(2000, &mut buf).unwrap(), 0);
        assert_eq!(reader.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_cross_region_read() {
        let data = sample(4000);
        let (_dir, path) = container_of(&data, "clip.mp4.mprot");
        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();

        let mut buf = [0u8; 20];
        assert_eq!(reader.read_at(1020, &mut buf).unwrap(), 20);
        assert_eq!(&buf[..4], &data[1020..1024]);
        assert_eq!(&buf[4..], &data[1024..1040]);
    }

    #[test]
    fn test_read_clamps_to_remaining() {
        let data = sample(1500);
        let (_dir, path) = container_of(&data, "a.mp4.mprot");
        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(reader.read_at(1490, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &data[1490..]);
    }

    #[test]
    fn test_small_file_lives_in_header() {
        let data = sample(100);
        let (_dir, path) = container_of(&data, "tiny.png.mprot");
        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();

        let mut buf = vec![0u8; 500];
        assert_eq!(reader.read_at(0, &mut buf).unwrap(), 100);
        assert_eq!(&buf[..100], &data[..]);
        assert_eq!(reader.media_kind(), MediaKind::Image);
    }

    #[test]
    fn test_empty_container() {
        let (_dir, path) = container_of(&[], "empty.mp4.mprot");
        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();

        assert_eq!(reader.size(), 0);
        assert_eq!(reader.read_at(0, &mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_too_short_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp4.mprot");
        fs::write(&path, [0u8; 10]).unwrap();

        let err = MediaReader::open(&path, &ContainerKey::builtin()).err().unwrap();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_read_and_seek_stream_whole_file() {
        let data = sample(3000);
        let (_dir, path) = container_of(&data, "clip.mp4.mprot");
        let mut reader = MediaReader::open(&path, &ContainerKey::builtin()).unwrap();

        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, data);

        assert_eq!(reader.seek(SeekFrom::End(-10)).unwrap(), 2990);
        let mut tail = Vec::new();
        reader.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, &data[2990..]);

        reader.seek(SeekFrom::Start(1000)).unwrap();
        reader.seek(SeekFrom::Current(-1)).unwrap();
        let mut one = [0u8; 1];
        reader.read_exact(&mut one).unwrap();
        assert_eq!(one[0], data[999]);

        assert!(reader.seek(SeekFrom::Current(-5000)).is_err());
    }

    #[test]
    fn test_plain_and_protected_sources_agree() {
        let data = sample(2500);
        let dir = tempdir().unwrap();
        let plain = dir.path().join("clip.mp4");
        let protected = dir.path().join("clip.mp4.mprot");
        fs::write(&plain, &data).unwrap();
        Codec::default().protect(&plain, &protected).unwrap();

        let key = ContainerKey::builtin();
        let mut a = open_media_source(&plain, false, &key).unwrap();
        let mut b = open_media_source(&protected, true, &key).unwrap();
        assert_eq!(a.size(), b.size());

        let (mut x, mut y) = ([0u8; 300], [0u8; 300]);
        for offset in [0u64, 900, 1023, 2400] {
            let n = a.read_at(offset, &mut x).unwrap();
            assert_eq!(b.read_at(offset, &mut y).unwrap(), n);
            assert_eq!(&x[..n], &y[..n]);
        }
    }
}

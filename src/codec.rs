//! Media Protector - Container Codec
//!
//! Container layout:
//! ```text
//! [NONCE  16B          ][random per protect call]
//! [HEADER min(N,1024)B ][AES-128-CTR(key, nonce) of the first plaintext bytes]
//! [TAIL   N-1024B      ][original bytes, unmodified]
//! ```
//!
//! Container length is always the original length plus 16. Only the header
//! is transformed, which keeps protection O(1) in the file size and lets
//! readers serve the tail straight from disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::crypto::{generate_nonce, ContainerKey, HeaderCipher, NONCE_LEN};
use crate::error::{ProtectorError, ProtectorResult};
use crate::reader::MediaReader;

/// Sequential decrypted view of a container file
pub type DecryptingStream = HeaderTransform<BufReader<File>>;

// ---------------------------------------------------------------------------
// HeaderTransform
// ---------------------------------------------------------------------------

/// Reader adapter that runs the header keystream over the bytes it yields.
///
/// Used in both directions: wrapping plaintext it produces container bytes
/// (after the nonce), wrapping container bytes it produces plaintext.
pub struct HeaderTransform<R> {
    inner: R,
    cipher: HeaderCipher,
}

impl<R> HeaderTransform<R> {
    pub fn new(inner: R, cipher: HeaderCipher) -> Self {
        Self { inner, cipher }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for HeaderTransform<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply(&mut buf[..n]);
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Produces and consumes containers under one key
#[derive(Debug, Default)]
pub struct Codec {
    key: ContainerKey,
}

impl Codec {
    pub fn new(key: ContainerKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    /// Write a container for `source` to `dest`.
    ///
    /// The source is left in place. Returns the container length.
    pub fn protect<P: AsRef<Path>, Q: AsRef<Path>>(&self, source: P, dest: Q) -> ProtectorResult<u64> {
        let (source, dest) = (source.as_ref(), dest.as_ref());
        refuse_same_file(source, dest)?;

        let reader = BufReader::new(File::open(source)?);
        let output = create_output(dest)?;

        discard_on_error(dest, write_then_sync(output, |w| self.protect_stream(reader, w)))
    }

    /// Restore the plaintext of the container at `source` into `dest`.
    ///
    /// Returns the plaintext length.
    pub fn unprotect<P: AsRef<Path>, Q: AsRef<Path>>(&self, source: P, dest: Q) -> ProtectorResult<u64> {
        let (source, dest) = (source.as_ref(), dest.as_ref());
        refuse_same_file(source, dest)?;

        // Validate before creating the destination
        let mut stream = self.open_decrypting_stream(source)?;
        let output = create_output(dest)?;

        discard_on_error(
            dest,
            write_then_sync(output, |w| Ok(io::copy(&mut stream, w)?)),
        )
    }

    /// Open a container as a sequential plaintext stream.
    ///
    /// Nothing is materialised: header bytes are decrypted as they are read,
    /// tail bytes pass through.
    pub fn open_decrypting_stream<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<DecryptingStream> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let nonce = read_nonce(&mut reader, path)?;
        let cipher = HeaderCipher::new(&self.key, &nonce)?;

        Ok(HeaderTransform::new(reader, cipher))
    }

    /// Open a container for random-access reads
    pub fn open_reader<P: AsRef<Path>>(&self, path: P) -> ProtectorResult<MediaReader> {
        MediaReader::open(path, &self.key)
    }

    /// Encode a plaintext stream into `writer` with a fresh nonce.
    ///
    /// Returns the number of container bytes written.
    pub fn protect_stream<R: Read, W: Write>(&self, reader: R, mut writer: W) -> ProtectorResult<u64> {
        let nonce = generate_nonce();
        let cipher = HeaderCipher::new(&self.key, &nonce)?;

        writer.write_all(&nonce)?;
        let copied = io::copy(&mut HeaderTransform::new(reader, cipher), &mut writer)?;
        writer.flush()?;

        Ok(NONCE_LEN as u64 + copied)
    }

    /// Encode plaintext in memory
    pub fn protect_bytes(&self, plaintext: &[u8]) -> ProtectorResult<Vec<u8>> {
        let mut output = Vec::with_capacity(NONCE_LEN + plaintext.len());
        self.protect_stream(plaintext, &mut output)?;
        Ok(output)
    }

    /// Decode a container held in memory
    pub fn unprotect_bytes(&self, container: &[u8]) -> ProtectorResult<Vec<u8>> {
        if container.len() < NONCE_LEN {
            return Err(ProtectorError::Format(format!(
                "{} bytes is shorter than the {}-byte nonce",
                container.len(),
                NONCE_LEN
            )));
        }

        let (nonce, body) = container.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| ProtectorError::Format("invalid nonce".into()))?;

        let mut plaintext = body.to_vec();
        HeaderCipher::new(&self.key, &nonce)?.apply(&mut plaintext);
        Ok(plaintext)
    }
}

/// Read the nonce at the start of a container file
pub fn read_container_nonce<P: AsRef<Path>>(path: P) -> ProtectorResult<[u8; NONCE_LEN]> {
    let path = path.as_ref();
    read_nonce(&mut File::open(path)?, path)
}

pub(crate) fn read_nonce<R: Read>(reader: &mut R, path: &Path) -> ProtectorResult<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    reader.read_exact(&mut nonce).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ProtectorError::Format(format!(
            "{} is shorter than the {}-byte nonce",
            path.display(),
            NONCE_LEN
        )),
        _ => ProtectorError::Io(e),
    })?;
    Ok(nonce)
}

/// Open `dest` for writing, refusing to replace anything already there
fn create_output(dest: &Path) -> ProtectorResult<File> {
    Ok(OpenOptions::new().write(true).create_new(true).open(dest)?)
}

fn write_then_sync<F>(output: File, write: F) -> ProtectorResult<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> ProtectorResult<u64>,
{
    let mut writer = BufWriter::new(output);
    let written = write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(written)
}

fn discard_on_error(dest: &Path, result: ProtectorResult<u64>) -> ProtectorResult<u64> {
    if result.is_err() {
        if let Err(e) = fs::remove_file(dest) {
            log::warn!("Could not remove partial output {}: {}", dest.display(), e);
        }
    }
    result
}

fn refuse_same_file(source: &Path, dest: &Path) -> ProtectorResult<()> {
    let same = source == dest
        || matches!(
            (fs::canonicalize(source), fs::canonicalize(dest)),
            (Ok(a), Ok(b)) if a == b
        );

    if same {
        return Err(ProtectorError::Format(format!(
            "refusing to transform {} onto itself",
            source.display()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HEADER_LEN;
    use tempfile::tempdir;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[test]
    fn test_roundtrip_bytes_all_boundaries() {
        let codec = Codec::default();

        for len in [0, 1, 15, 16, 17, 1023, 1024, 1025, 2000, 5000] {
            let plaintext = sample(len);
            let container = codec.protect_bytes(&plaintext).unwrap();

            assert_eq!(container.len(), len + NONCE_LEN);
            assert_eq!(codec.unprotect_bytes(&container).unwrap(), plaintext, "len {}", len);
        }
    }

    #[test]
    fn test_only_header_is_transformed() {
        let codec = Codec::default();
        let plaintext = sample(3000);
        let container = codec.protect_bytes(&plaintext).unwrap();

        assert_ne!(&container[NONCE_LEN..NONCE_LEN + HEADER_LEN], &plaintext[..HEADER_LEN]);
        assert_eq!(&container[NONCE_LEN + HEADER_LEN..], &plaintext[HEADER_LEN..]);
    }

    #[test]
    fn test_fresh_nonce_per_protect() {
        let codec = Codec::default();
        let plaintext = sample(512);

        let a = codec.protect_bytes(&plaintext).unwrap();
        let b = codec.protect_bytes(&plaintext).unwrap();

        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
        assert_ne!(&a[NONCE_LEN..], &b[NONCE_LEN..]);
        assert_eq!(codec.unprotect_bytes(&a).unwrap(), plaintext);
        assert_eq!(codec.unprotect_bytes(&b).unwrap(), plaintext);
    }

    #[test]
    fn test_protect_unprotect_file_2000_bytes() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();

        let original = dir.path().join("photo.jpg");
        let container = dir.path().join("photo.jpg.mprot");
        let restored = dir.path().join("restored.jpg");

        let data = sample(2000);
        fs::write(&original, &data).unwrap();

        assert_eq!(codec.protect(&original, &container).unwrap(), 2016);
        assert_eq!(fs::metadata(&container).unwrap().len(), 2016);
        assert!(original.exists(), "protect must not delete its source");

        assert_eq!(codec.unprotect(&container, &restored).unwrap(), 2000);
        assert_eq!(fs::read(&restored).unwrap(), data);
    }

    #[test]
    fn test_short_file_is_format_error() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();

        let short = dir.path().join("short.mprot");
        let out = dir.path().join("short");
        fs::write(&short, [1u8; NONCE_LEN - 1]).unwrap();

        let err = codec.unprotect(&short, &out).unwrap_err();
        assert!(err.is_format_error());
        assert!(!out.exists());

        assert!(codec.unprotect_bytes(&[0u8; 3]).unwrap_err().is_format_error());
    }

    #[test]
    fn test_nonce_only_container_is_empty_file() {
        let codec = Codec::default();
        assert_eq!(codec.unprotect_bytes(&[9u8; NONCE_LEN]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();

        let err = codec
            .protect(dir.path().join("missing.jpg"), dir.path().join("missing.jpg.mprot"))
            .unwrap_err();
        assert!(matches!(err, ProtectorError::Io(_)));
        assert!(!dir.path().join("missing.jpg.mprot").exists());
    }

    #[test]
    fn test_refuses_to_overwrite_source() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        fs::write(&path, sample(100)).unwrap();

        assert!(codec.unprotect(&path, &path).unwrap_err().is_format_error());
        assert_eq!(fs::read(&path).unwrap(), sample(100));
    }

    #[test]
    fn test_existing_destination_is_kept() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();
        let photo = dir.path().join("IMG_0001.jpg");
        let container = dir.path().join("IMG_0001.jpg.mprot");

        fs::write(&photo, b"first photo").unwrap();
        codec.protect(&photo, &container).unwrap();
        let first = fs::read(&container).unwrap();

        fs::write(&photo, b"second photo").unwrap();
        let err = codec.protect(&photo, &container).unwrap_err();
        assert!(matches!(&err, ProtectorError::Io(e) if e.kind() == io::ErrorKind::AlreadyExists));
        assert_eq!(fs::read(&container).unwrap(), first);

        // Unprotect onto the existing plain file is refused too
        assert!(codec.unprotect(&container, &photo).is_err());
        assert_eq!(fs::read(&photo).unwrap(), b"second photo");
    }

    #[test]
    fn test_decrypting_stream_small_reads() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();
        let container = dir.path().join("clip.mp4.mprot");

        let data = sample(4096);
        fs::write(&container, codec.protect_bytes(&data).unwrap()).unwrap();

        let mut stream = codec.open_decrypting_stream(&container).unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 100];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }

        assert_eq!(out, data);
    }

    #[test]
    fn test_other_key_does_not_restore() {
        let builtin = Codec::default();
        let other = Codec::new(ContainerKey::new([0x42; 16]));
        let plaintext = sample(64);

        let container = builtin.protect_bytes(&plaintext).unwrap();
        assert_ne!(other.unprotect_bytes(&container).unwrap(), plaintext);
    }

    #[test]
    fn test_read_container_nonce() {
        let codec = Codec::default();
        let dir = tempdir().unwrap();
        let container = dir.path().join("a.png.mprot");

        let bytes = codec.protect_bytes(b"png").unwrap();
        fs::write(&container, &bytes).unwrap();

        assert_eq!(&read_container_nonce(&container).unwrap()[..], &bytes[..NONCE_LEN]);
    }
}

//! Helper module to compute a CRC32 checksum
//!
//! Borrowed from zip-rs:
//! <https://github.com/mvdnes/zip-rs/commit/b3c836d9c32efa120cdd5366280f940d3c3b985c>

use std::io;
use std::io::prelude::*;

use camino::Utf8PathBuf;
use crc32fast::Hasher;

use crate::result::ZipError;

fn as_io_error(e: ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Reader that validates the CRC32 when it reaches the EOF.
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    provided_checksum: u32,
    path: Utf8PathBuf,
}

impl<R> Crc32Reader<R> {
    pub fn new(inner: R, provided_checksum: u32, path: Utf8PathBuf) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            provided_checksum,
            path,
        }
    }

    /// Returns true if the final checksum matches the one provided by `new()`
    fn check_matches(&self) -> bool {
        self.provided_checksum == self.hasher.clone().finalize()
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() && !self.check_matches() => {
                return Err(as_io_error(ZipError::CrcMismatch(self.path.clone())))
            }
            Ok(n) => n,
            Err(e) => return Err(e),
        };
        self.hasher.update(&buf[0..count]);
        Ok(count)
    }
}

/// Reader that checks the number of bytes produced against an expected
/// count when it reaches EOF.
///
/// Mac Archive Utility truncates `uncompressed_size` modulo 2^32 the same as
/// everything else, so a perfectly valid stream can legitimately inflate to
/// more bytes than the central directory promised — by some exact multiple
/// of 2^32. That case calls `on_resolved` with the true count instead of
/// failing, so the caller can both accept the stream and remember the real
/// size for next time. Anything else (short or long by a non-multiple) is a
/// genuine size mismatch.
pub struct SizeValidatingReader<R, F> {
    inner: R,
    expected: u64,
    seen: u64,
    path: Utf8PathBuf,
    on_resolved: Option<F>,
}

const MAC_SIZE_MODULUS: u64 = 1 << 32;

impl<R, F: FnMut(u64)> SizeValidatingReader<R, F> {
    pub fn new(inner: R, expected: u64, path: Utf8PathBuf, on_resolved: F) -> Self {
        SizeValidatingReader {
            inner,
            expected,
            seen: 0,
            path,
            on_resolved: Some(on_resolved),
        }
    }

    fn check_matches(&mut self) -> io::Result<()> {
        if self.seen == self.expected {
            return Ok(());
        }
        if self.seen > self.expected && (self.seen - self.expected) % MAC_SIZE_MODULUS == 0 {
            if let Some(mut f) = self.on_resolved.take() {
                f(self.seen);
            }
            return Ok(());
        }
        Err(as_io_error(ZipError::SizeMismatch {
            path: self.path.clone(),
            expected: self.expected,
            actual: self.seen,
        }))
    }
}

impl<R: Read, F: FnMut(u64)> Read for SizeValidatingReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.check_matches()?;
                return Ok(0);
            }
            Ok(n) => n,
            Err(e) => return Err(e),
        };
        self.seen += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    fn test_path() -> Utf8PathBuf {
        Utf8PathBuf::from("test.txt")
    }

    #[test]
    fn size_validating_reader_accepts_exact_count() {
        let data: &[u8] = b"1234";
        let mut buf = [0u8; 4];
        let mut resolved = None;
        let mut reader = SizeValidatingReader::new(data, 4, test_path(), |n| resolved = Some(n));
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.read(&mut [0u8; 1]).unwrap(), 0);
        assert_eq!(resolved, None);
    }

    #[test]
    fn size_validating_reader_rejects_short_count() {
        let data: &[u8] = b"12";
        let mut reader = SizeValidatingReader::new(data, 4, test_path(), |_| {});
        let mut buf = Vec::new();
        assert!(reader.read_to_end(&mut buf).is_err());
    }

    #[test]
    fn size_validating_reader_accepts_truncated_size_wraparound() {
        // Pretend the real stream produced 2^32 + 3 bytes, but the CDH's
        // truncated uncompressed_size only promised 3.
        let data: &[u8] = b"123";
        let expected = 3u64;
        let mut resolved = None;
        {
            let mut reader = SizeValidatingReader::new(data, expected, test_path(), |n| resolved = Some(n));
            reader.seen = (1u64 << 32) + 3 - 3; // simulate having already read the bulk of it
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).unwrap();
        }
        assert_eq!(resolved, Some(1u64 << 32));
    }
}

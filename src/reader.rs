//! Random-access byte sources a [`crate::archive::Archive`] can be built on.
//!
//! piz's original design reads a single `&[u8]` (a buffer, or a memory map).
//! That's still the common case ([`SliceReader`]), but the locator/Mac
//! resolver needs to seek around a file far larger than we'd want to hold in
//! memory, so we also provide [`FileReader`], and let callers bring their own
//! by implementing [`Reader`] directly.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::result::*;

/// A random-access source of ZIP archive bytes.
///
/// Implementations need only provide [`Reader::size`] and
/// [`Reader::stream_at`]; [`Reader::read_at`] has a default built by draining
/// a stream, mirroring the "at minimum `createReadStream`" contract this
/// trait is modeled on.
///
/// Every stream returned by `stream_at` must be independent: dropping it
/// (whether read to completion or cancelled early) must not affect any
/// other stream, and must not close whatever descriptor backs the `Reader`.
/// Implementations achieve this by handing out an owned handle per stream
/// (a cloned file descriptor, a borrowed slice) rather than sharing mutable
/// position state.
pub trait Reader: Send + Sync {
    /// Total size of the underlying source, in bytes. Fixed for the reader's lifetime.
    fn size(&self) -> u64;

    /// Open an independent byte stream over `[offset, offset + len)`.
    ///
    /// A zero-length request must return immediately-ended, empty stream
    /// without touching the backing descriptor. The returned stream is not
    /// tied to `&self`'s borrow: it owns whatever it needs (a cloned
    /// descriptor, a copied slice) so an `Archive` can keep reading entries
    /// or mutating its own bookkeeping while streams opened earlier are
    /// still being drained elsewhere.
    fn stream_at(&self, offset: u64, len: u64) -> ZipResult<Box<dyn Read + Send>>;

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Zero-length reads return an empty buffer without I/O.
    fn read_at(&self, offset: u64, len: usize) -> ZipResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut stream = self.stream_at(offset, len as u64)?;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ZipError::InvalidArchive("Unexpected end of file"),
            _ => ZipError::Io(e),
        })?;
        Ok(buf)
    }
}

/// A `Reader` backed by an in-memory buffer (owned or borrowed).
///
/// Grounded on piz's original `ZipArchive::new(mapping: &[u8])` entrypoint;
/// use this for small archives read fully into memory, or bytes from a
/// memory map (`memmap2::Mmap` derefs to `&[u8]`).
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl Reader for SliceReader<'_> {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn stream_at(&self, offset: u64, len: u64) -> ZipResult<Box<dyn Read + Send>> {
        if len == 0 {
            return Ok(Box::new(io::Cursor::new(Vec::new())));
        }
        let start = crate::arch::usize(offset)?;
        let len = crate::arch::usize(len)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(ZipError::InvalidArchive("Read past end of archive"))?;
        Ok(Box::new(io::Cursor::new(self.data[start..end].to_vec())))
    }
}

/// An owned in-memory buffer, for callers who'd rather not juggle a lifetime.
pub struct OwnedReader {
    data: Vec<u8>,
}

impl OwnedReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Reader for OwnedReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn stream_at(&self, offset: u64, len: u64) -> ZipResult<Box<dyn Read + Send>> {
        SliceReader::new(&self.data).stream_at(offset, len)
    }
}

/// A `Reader` backed by a `File`, serving positional reads via cloned
/// descriptors so a cancelled stream never closes the archive's own handle.
pub struct FileReader {
    file: File,
    size: u64,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> ZipResult<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> ZipResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl Reader for FileReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn stream_at(&self, offset: u64, len: u64) -> ZipResult<Box<dyn Read + Send>> {
        if len == 0 {
            return Ok(Box::new(io::Cursor::new(Vec::new())));
        }
        offset
            .checked_add(len)
            .filter(|&end| end <= self.size)
            .ok_or(ZipError::InvalidArchive("Read past end of archive"))?;
        let mut clone = self.file.try_clone()?;
        clone.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(clone.take(len)))
    }
}

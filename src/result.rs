//! Error types and the related `Result<T>`

use camino::Utf8PathBuf;
use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    /// The ZIP archive contained invalid data per the spec.
    #[error("Invalid Zip archive: {0}")]
    InvalidArchive(&'static str),

    /// Decoding a UTF-8 name or comment failed
    #[error("Invalid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// The ZIP archive uses an unsupported feature
    #[error("Unsupported Zip archive: {0}")]
    UnsupportedArchive(String),

    /// The ZIP archive is prepended with some unknown bytes.
    /// (Construct the archive from a pre-sliced buffer if this is unwanted.)
    #[error("Archive prepended with {0} unknown bytes")]
    PrependedWithUnknownBytes(usize),

    /// The ZIP archive contained a nonsensical file hierarchy
    /// (duplicate entries, bad paths, etc.)
    #[error("Archive contained a strange file hierarchy: {0}")]
    Hierarchy(String),

    /// A file wasn't found at the provided path
    #[error("No file in the archive with the path {0}")]
    NoSuchFile(Utf8PathBuf),

    /// A user-provided path (not one from a ZIP archive) was invalid.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A cast from a 64-bit int to a usize failed while mapping the file,
    /// probably on a 32-bit system.
    ///
    /// Future work could include a version of the reader that uses multiple
    /// file streams instead of a memory map to work with large files in 32 bits.
    #[error("Zip archive too large for address space")]
    InsufficientAddressSpace,

    /// Decryption was requested, or the entry is encrypted and decryption
    /// was not explicitly disabled.
    #[error("Decryption is not supported")]
    DecryptionUnsupported,

    /// The decompressed byte count didn't match the stored CRC-32.
    #[error("CRC-32 mismatch for {0}")]
    CrcMismatch(Utf8PathBuf),

    /// A stored (uncompressed) entry's compressed and uncompressed sizes disagreed,
    /// or an inflated stream produced a different number of bytes than expected.
    #[error("Size mismatch for {path}: expected {expected}, got {actual}")]
    SizeMismatch {
        path: Utf8PathBuf,
        expected: u64,
        actual: u64,
    },

    /// A Mac-truncated entry's Data Descriptor could not be located.
    #[error("Couldn't locate Data Descriptor for {0}")]
    MissingDataDescriptor(Utf8PathBuf),

    /// `start`/`end` of a streamed read were out of range or inverted.
    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    /// An `Entry` was passed to the wrong archive's `open_read_stream`.
    #[error("Entry does not belong to this archive")]
    WrongArchive,

    /// We identified an archive as a Mac Archive Utility ZIP and a later
    /// expectation about its layout (that followed from that identification)
    /// was violated.
    #[error("Misidentified Mac OS Archive Utility ZIP")]
    MisidentifiedMacArchive,

    /// Guards against unreachable branches in the maybe-Mac state machine.
    /// Should never happen; if it does, it's a bug in this crate.
    #[error("Logic failure, this is a bug: {0}")]
    Logic(&'static str),
}

//! zipreader is a Zip archive reader built to keep working when the archive
//! isn't quite spec compliant — most notably archives produced by macOS's
//! built-in Archive Utility, which silently truncates offsets, sizes, and
//! the entry count instead of switching to ZIP64 once they overflow.
//!
//! ```no_run
//! # use std::fs::{self, File};
//! # use std::io;
//! # use zipreader::archive::{Archive, StreamOptions};
//! # use zipreader::tree::{as_tree, FileTree};
//! // For smaller files,
//! let bytes = fs::read("foo.zip")?;
//! let mut archive = Archive::from_slice(&bytes)?;
//!
//! // We can iterate through the entries in the archive directly...
//! //
//! //     for entry in archive.read_entries()? {
//! //         let mut reader = archive.open_read_stream(&entry, StreamOptions::full())?;
//! //         // Read away!
//! //     }
//! //
//! // ...but ZIP doesn't guarantee that entries are in any particular order,
//! // that there aren't duplicates, that an entry has a valid file path, etc.
//! // Let's do some validation and organize them into a tree of files and folders.
//! let entries = archive.read_entries()?;
//! let tree = as_tree(entries)?;
//!
//! // With that done, we can get a file (or directory)'s metadata from its path.
//! let metadata = tree.lookup("some/specific/file")?;
//! // And read the file out, if we'd like:
//! let mut reader = archive.open_read_stream(metadata, StreamOptions::full())?;
//! let mut save_to = File::create(&metadata.path)?;
//! io::copy(&mut reader, &mut save_to)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Larger archives can be read from a plain [`std::fs::File`] via
//! [`archive::Archive::open_path`] rather than loaded fully into memory;
//! [`Archive::open`](archive::Archive::open) accepts any [`reader::Reader`],
//! including a memory map (`memmap2::Mmap` derefs to `&[u8]`, so it works
//! with [`SliceReader`](reader::SliceReader) directly).
//!
//! Zip is an interesting archive format: unlike compressed tarballs often
//! seen in Linux land (`*.tar.gz`, `*.tar.zst`, ...), each file in a Zip
//! archive is compressed independently, with a central directory telling us
//! where to find each file. This allows us to extract multiple files
//! simultaneously so long as we can read from multiple places at once -
//! every stream [`archive::Archive::open_read_stream`] hands back is `Send`.
//!
//! This crate additionally reconciles three dialects of the central
//! directory footer that can appear in the wild: plain PKZIP, ZIP64 (for
//! archives or entries past the 32-bit/16-bit limits), and macOS's built-in
//! Archive Utility, which silently wraps those same limits modulo 2^32 (or
//! 2^16 for the entry count) instead of switching to ZIP64. See
//! [`archive::Archive::is_mac_archive`] and the [`mac`] module for details.

pub mod anchor;
pub mod archive;
pub mod mac;
pub mod reader;
pub mod result;
pub mod tree;

mod arch;
mod crc_reader;
mod spec;

pub use archive::{Archive, ArchiveOptions, CompressionMethod, Entry, StreamOptions};
pub use reader::{FileReader, OwnedReader, Reader, SliceReader};
pub use result::{ZipError, ZipResult};
pub use tree::{as_tree, Directory, DirectoryContents, DirectoryEntry, FileTree};

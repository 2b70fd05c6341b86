//! End-to-end scenarios, built as in-memory fixtures rather than shelling
//! out to a fixture-generating script (no binary test archives are checked
//! into this repo).

use std::io::Read;

use anyhow::Result;
use camino::Utf8PathBuf;

use zipreader::archive::{Archive, ArchiveOptions, StreamOptions};
use zipreader::mac::MacState;
use zipreader::reader::{OwnedReader, Reader, SliceReader};
use zipreader::result::ZipError;
use zipreader::tree::{as_tree, FileTree};

use fixtures::*;

#[test]
fn plain_archive_four_entries() -> Result<()> {
    let bytes = ArchiveBuilder::new()
        .dir("test_files/")
        .file("test_files/1.txt", b"one")
        .file("test_files/2.txt", b"two")
        .file("test_files/3.txt", b"three")
        .build();

    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;
    assert_eq!(entries.len(), 4);
    assert_eq!(archive.is_mac_archive(), MacState::SpecCompliant);

    let paths: Vec<_> = entries.iter().map(|e| e.path.as_str().to_owned()).collect();
    assert_eq!(
        paths,
        vec!["test_files/", "test_files/1.txt", "test_files/2.txt", "test_files/3.txt"]
    );

    let tree = as_tree(entries)?;
    for (name, want) in [("test_files/1.txt", "one"), ("test_files/2.txt", "two"), ("test_files/3.txt", "three")] {
        let entry = tree.lookup(name)?;
        let mut stream = archive.open_read_stream(entry, StreamOptions::full())?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out)?;
        assert_eq!(out, want.as_bytes());
    }
    Ok(())
}

/// A `Reader` that synthesizes a large file on demand instead of holding it
/// in memory, standing in for the "ZIP64 archive with an 8 GB entry" scenario
/// without actually allocating gigabytes in a test process.
struct SyntheticLargeFileReader {
    prefix: Vec<u8>,
    large_start: u64,
    large_len: u64,
    suffix: Vec<u8>,
}

impl Reader for SyntheticLargeFileReader {
    fn size(&self) -> u64 {
        self.prefix.len() as u64 + self.large_len + self.suffix.len() as u64
    }

    fn stream_at(&self, offset: u64, len: u64) -> zipreader::result::ZipResult<Box<dyn Read + Send>> {
        // Only the large entry's synthetic body needs lazy generation; the
        // rest of the archive (headers, central directory) is small enough
        // to just copy.
        let suffix_start = self.prefix.len() as u64 + self.large_len;
        if offset >= self.large_start && offset + len <= suffix_start {
            let skip = offset - self.large_start;
            return Ok(Box::new(SyntheticByteStream {
                remaining: len,
                produced: skip,
            }));
        }
        OwnedReader::new(self.to_concrete_bytes()).stream_at(offset, len)
    }
}

impl SyntheticLargeFileReader {
    fn to_concrete_bytes(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend((0..self.large_len).map(|i| synthetic_byte(i)));
        out.extend_from_slice(&self.suffix);
        out
    }
}

fn synthetic_byte(index: u64) -> u8 {
    (index % 251) as u8
}

struct SyntheticByteStream {
    remaining: u64,
    produced: u64,
}

impl Read for SyntheticByteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = (buf.len() as u64).min(self.remaining) as usize;
        for slot in buf.iter_mut().take(n) {
            *slot = synthetic_byte(self.produced);
            self.produced += 1;
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[test]
fn zip64_archive_with_custom_reader() -> Result<()> {
    // A modest stand-in for "8 GB" so the test stays fast; what's under test
    // is that a custom Reader's lazily-produced bytes flow through the
    // decompression/size-check pipeline untouched, which doesn't depend on
    // the actual byte count.
    const LARGE_LEN: u64 = 200_000;

    let large_contents: Vec<u8> = (0..LARGE_LEN).map(synthetic_byte).collect();
    let bytes = ArchiveBuilder::new()
        .force_zip64()
        .file("a.txt", b"hello a\n")
        .file("large.bin", &large_contents)
        .file("b.txt", b"hello b\n")
        .build();

    // Figure out where in `bytes` the large entry's body actually landed so
    // we can carve `prefix`/`suffix` out around it.
    let large_body_start = find_large_body_offset(&bytes, &large_contents);
    let reader = SyntheticLargeFileReader {
        prefix: bytes[..large_body_start as usize].to_vec(),
        large_start: large_body_start,
        large_len: LARGE_LEN,
        suffix: bytes[large_body_start as usize + LARGE_LEN as usize..].to_vec(),
    };

    let mut archive = Archive::open(reader)?;
    let entries = archive.read_entries()?;
    let large = entries.iter().find(|e| e.path == Utf8PathBuf::from("large.bin")).unwrap();
    let mut stream = archive.open_read_stream(large, StreamOptions::range(0, 256))?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out)?;
    let expected: Vec<u8> = (0..256).map(synthetic_byte).collect();
    assert_eq!(out, expected);
    Ok(())
}

fn find_large_body_offset(bytes: &[u8], needle: &[u8]) -> u64 {
    bytes
        .windows(needle.len().min(64))
        .position(|w| w == &needle[..w.len()])
        .expect("synthetic body not found in built archive") as u64
}

#[test]
fn partial_ranges_stored_and_deflated() -> Result<()> {
    let bytes = ArchiveBuilder::new()
        .file("stored.txt", b"abcdefghij")
        .deflated_file("deflated.txt", b"abcdefghij")
        .build();
    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;

    for name in ["stored.txt", "deflated.txt"] {
        let entry = entries.iter().find(|e| e.path == Utf8PathBuf::from(name)).unwrap();
        for (start, end, want) in [
            (Some(0), Some(5), &b"abcde"[..]),
            (Some(2), None, &b"cdefghij"[..]),
            (None, Some(3), &b"abc"[..]),
        ] {
            let options = StreamOptions {
                start,
                end,
                ..StreamOptions::full()
            };
            let mut stream = archive.open_read_stream(entry, options)?;
            let mut out = Vec::new();
            stream.read_to_end(&mut out)?;
            assert_eq!(out, want, "{name} range {start:?}..{end:?}");
        }
    }
    Ok(())
}

#[test]
fn mac_archive_with_folders_is_detected() -> Result<()> {
    let bytes = ArchiveBuilder::new()
        .mac_dialect()
        .dir("photos/")
        .file("photos/a.jpg", b"jpegbytes")
        .file("photos/b.jpg", b"morejpegbytes")
        .build();

    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;
    assert_eq!(entries.len(), 3);
    assert_ne!(archive.is_mac_archive(), MacState::SpecCompliant);

    let tree = as_tree(entries)?;
    assert!(tree.lookup("photos/a.jpg").is_ok());
    assert!(tree.lookup("photos/b.jpg").is_ok());
    Ok(())
}

#[test]
fn mac_archive_entry_count_boundary_below_65535() -> Result<()> {
    let count = 65534;
    let mut builder = ArchiveBuilder::new().mac_dialect();
    for i in 0..count {
        builder = builder.file(&format!("{i}.txt"), format!("{i}\n").as_bytes());
    }
    let bytes = builder.build();
    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;
    assert_eq!(entries.len(), count as usize);
    Ok(())
}

#[test]
fn mac_archive_entry_count_boundary_above_65535() -> Result<()> {
    let count = 65536u32;
    let mut builder = ArchiveBuilder::new().mac_dialect();
    for i in 0..count {
        builder = builder.file(&format!("{i}.txt"), format!("{i}\n").as_bytes());
    }
    let bytes = builder.build();
    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;
    assert_eq!(entries.len(), count as usize);
    assert_eq!(archive.is_mac_archive(), MacState::DefiniteMac);
    Ok(())
}

#[test]
fn mac_archive_entry_reads_through_the_signature_check() -> Result<()> {
    let bytes = ArchiveBuilder::new()
        .mac_dialect()
        .file("a.jpg", b"jpegbytes")
        .build();

    let mut archive = Archive::from_slice(&bytes)?;
    let entries = archive.read_entries()?;
    assert_ne!(archive.is_mac_archive(), MacState::SpecCompliant);

    let entry = entries.iter().find(|e| e.path == Utf8PathBuf::from("a.jpg")).unwrap();
    let mut stream = archive.open_read_stream(entry, StreamOptions::full())?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out)?;
    assert_eq!(out, b"jpegbytes");
    Ok(())
}

#[test]
fn relative_path_traversal_is_rejected() -> Result<()> {
    let bytes = ArchiveBuilder::new().file("../evil", b"pwned").build();
    let mut archive = Archive::from_slice(&bytes)?;
    // `ArchiveOptions::validate_filenames` defaults on, so a `..` component
    // is rejected as soon as the entry is read, before `as_tree` even runs.
    match archive.read_entries() {
        Err(ZipError::InvalidPath(msg)) => assert!(msg.contains("..")),
        other => panic!("expected an invalid-path error for a path-traversal entry, got {other:?}"),
    }
    Ok(())
}

#[test]
fn relative_path_traversal_passes_through_when_filename_validation_disabled() -> Result<()> {
    let bytes = ArchiveBuilder::new().file("../evil", b"pwned").build();
    let mut archive = Archive::with_options(
        SliceReader::new(&bytes),
        ArchiveOptions {
            validate_filenames: false,
            ..ArchiveOptions::default()
        },
    )?;
    let entries = archive.read_entries()?;
    match as_tree(entries) {
        Err(ZipError::Hierarchy(msg)) => assert!(msg.contains("..")),
        other => panic!("expected a hierarchy error for a path-traversal entry, got {other:?}"),
    }
    Ok(())
}

#[test]
fn backslash_path_rejected_with_strict_filenames() -> Result<()> {
    let bytes = ArchiveBuilder::new().file("dir\\evil.txt", b"x").build();
    let mut archive = Archive::with_options(
        SliceReader::new(&bytes),
        ArchiveOptions {
            strict_filenames: true,
            ..ArchiveOptions::default()
        },
    )?;
    match archive.read_entry() {
        Err(ZipError::InvalidPath(_)) => {}
        other => panic!("expected an invalid-path error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn corrupt_central_directory_signature_is_rejected() -> Result<()> {
    let mut bytes = ArchiveBuilder::new().file("a.txt", b"x").build();
    // Flip a byte in the central directory file header's magic number
    // (`PK\x01\x02`); the local file header shares the `PK` prefix, so
    // search past the first occurrence to land on the central directory's.
    const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
    let cd_magic_pos = bytes
        .windows(4)
        .position(|w| w == CENTRAL_DIRECTORY_MAGIC)
        .expect("central directory header not found");
    bytes[cd_magic_pos] ^= 0xFF;

    // Locating the archive and buffering its central directory doesn't
    // itself parse any CDH, so the corruption only surfaces once an entry
    // is actually read.
    let mut archive = Archive::from_slice(&bytes)?;
    match archive.read_entry() {
        Err(ZipError::InvalidArchive(msg)) => {
            assert!(msg.contains("Central Directory File Header signature"))
        }
        other => panic!("expected a central directory signature error, got {other:?}"),
    }
    Ok(())
}

//! The archive-level reading API: [`Archive`], [`Entry`], and the pipeline
//! that turns a central directory entry into a validated byte stream.
//!
//! Structurally this follows piz's original `ZipArchive`/`FileMetadata`
//! (`read()` building a `Crc32Reader` over an optional `DeflateDecoder`), but
//! `Entry` is now an owned value (not borrowed from the archive's mapping,
//! since a [`Reader`] need not be an in-memory slice) and every entry is
//! additionally checked against the Mac Archive Utility truncation rules
//! from [`crate::mac`] as it's read.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use flate2::read::DeflateDecoder;
use log::{debug, trace, warn};

use crate::anchor::{self, Anchored};
use crate::arch::usize as to_usize;
use crate::crc_reader::{Crc32Reader, SizeValidatingReader};
use crate::mac::{self, MacState};
use crate::reader::Reader;
use crate::result::*;
use crate::spec::{self, CentralDirectoryEntry, LocalFileHeader};

/// The compression method used to store a file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed.
    None,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    /// This is the most common format used by ZIP archives.
    Deflate,
    /// The file is compressed with a yet-unsupported format.
    /// (The u16 indicates the internal format code.)
    Unsupported(u16),
}

impl From<u16> for CompressionMethod {
    fn from(method: u16) -> Self {
        match method {
            0 => CompressionMethod::None,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unsupported(other),
        }
    }
}

/// Options controlling how an [`Archive`] is opened and its entries validated.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Reject entry paths containing a backslash rather than silently
    /// treating it as a path separator. Off by default, matching most
    /// real-world ZIP archives (which come from Windows tools that use
    /// backslashes internally despite the spec mandating forward slashes).
    pub strict_filenames: bool,
    /// Decode filenames per the general-purpose UTF-8 flag, Unicode Path
    /// extra field, and CP437 fallback. When false, names are decoded with
    /// a lossy UTF-8 conversion of the raw bytes instead.
    pub decode_strings: bool,
    /// Reject a stored (uncompressed) entry whose compressed and
    /// uncompressed sizes disagree.
    pub validate_entry_sizes: bool,
    /// Reject absolute paths and `..` components in entry filenames as soon
    /// as the entry is read, rather than leaving that check to
    /// [`crate::tree::as_tree`].
    pub validate_filenames: bool,
    /// Apply the Mac Archive Utility truncation heuristics at all. Disabling
    /// this treats every archive as spec-compliant, which will surface as
    /// ordinary parse/size/CRC errors on a genuinely Mac-truncated archive.
    pub support_mac_archive: bool,
    /// Allow unknown bytes (e.g. a self-extracting installer stub) before
    /// the archive proper. When false, a nonzero prefix is rejected with
    /// [`ZipError::PrependedWithUnknownBytes`].
    pub allow_prepended_data: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            strict_filenames: false,
            decode_strings: true,
            validate_entry_sizes: true,
            validate_filenames: true,
            support_mac_archive: true,
            allow_prepended_data: true,
        }
    }
}

/// Options controlling a single [`Archive::open_read_stream`] call.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Byte offset into the entry's *decompressed* content to start at.
    pub start: Option<u64>,
    /// Byte offset into the entry's decompressed content to stop before.
    pub end: Option<u64>,
    /// Force decompression on or off. `None` decompresses exactly when the
    /// entry's compression method requires it (the default behavior).
    pub decompress: Option<bool>,
    /// Force decryption on or off. Decryption is never actually supported;
    /// this only controls whether an encrypted entry is rejected outright.
    pub decrypt: Option<bool>,
    /// Force CRC-32 validation on or off. `None` validates exactly on full
    /// (non-partial) reads, since a partial read can't be checked against a
    /// whole-content checksum.
    pub validate_crc32: Option<bool>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            decompress: None,
            decrypt: None,
            validate_crc32: None,
        }
    }
}

impl StreamOptions {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn range(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    fn is_full_range(&self, size: u64) -> bool {
        self.start.unwrap_or(0) == 0 && self.end.unwrap_or(size) >= size
    }
}

/// Metadata for a file or directory in the archive, taken from its central
/// directory entry (and reconciled against the local file header / Mac
/// Archive Utility truncation rules the first time it's actually read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's path, decoded per the general-purpose flags (UTF-8 or
    /// CP437) and overridden by an Info-ZIP Unicode Path extra field if
    /// present and its checksum over the raw name matches.
    pub path: Utf8PathBuf,
    /// Uncompressed size in bytes, as currently believed (see [`crate::mac`]
    /// for when this can change after the fact).
    pub size: u64,
    /// Compressed size in bytes, as currently believed.
    pub compressed_size: u64,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    /// True if the file is encrypted; decryption is never supported.
    pub encrypted: bool,
    pub last_modified: NaiveDateTime,
    /// Unix permission bits, if the file was archived on a Unix OS.
    pub unix_mode: Option<u16>,

    pub(crate) header_offset: u64,
    pub(crate) index: usize,
    pub(crate) archive_id: u64,
    /// Raw on-disk filename length from the central directory, used to
    /// cross-check the local file header's own filename length when
    /// verifying the Mac Archive Utility signature.
    pub(crate) cd_filename_len: u16,
}

impl Entry {
    /// Returns true if the given entry is a directory.
    ///
    /// `Path::ends_with()` doesn't consider separators, so we check the raw
    /// string instead.
    pub fn is_dir(&self) -> bool {
        self.size == 0 && self.path.as_str().ends_with('/')
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    fn from_cde(
        cde: &CentralDirectoryEntry<'_>,
        index: usize,
        archive_id: u64,
        options: &ArchiveOptions,
    ) -> ZipResult<Self> {
        let fields = spec::raw_extra_fields(cde.extra_field)?;

        let sentinels = spec::apply_zip64_extra(
            &fields,
            cde.uncompressed_size == 0xFFFF_FFFF,
            cde.compressed_size == 0xFFFF_FFFF,
            cde.header_offset == 0xFFFF_FFFF,
        )?;

        let size = sentinels
            .uncompressed_size
            .unwrap_or(cde.uncompressed_size as u64);
        let compressed_size = sentinels
            .compressed_size
            .unwrap_or(cde.compressed_size as u64);
        let header_offset = sentinels.header_offset.unwrap_or(cde.header_offset as u64);

        let path = decode_path(cde.path, cde.flags, &fields, options)?;

        let encrypted = spec::is_encrypted(cde.flags);
        if spec::is_strongly_encrypted(cde.flags) {
            return Err(ZipError::DecryptionUnsupported);
        }

        let compression_method = CompressionMethod::from(cde.compression_method);
        if options.validate_entry_sizes
            && compression_method == CompressionMethod::None
            && compressed_size != size
        {
            return Err(ZipError::SizeMismatch {
                path,
                expected: size,
                actual: compressed_size,
            });
        }

        let last_modified = spec::parse_msdos(cde.last_modified_time, cde.last_modified_date);

        // External file attributes' high 16 bits are Unix mode, when the
        // "version made by" host OS byte says Unix (3) -- Mac Archive
        // Utility included.
        let unix_mode = if (cde.source_version >> 8) == 3 {
            Some((cde.external_file_attributes >> 16) as u16)
        } else {
            None
        };

        Ok(Entry {
            path,
            size,
            compressed_size,
            compression_method,
            crc32: cde.crc32,
            encrypted,
            last_modified,
            unix_mode,
            header_offset,
            index,
            archive_id,
            cd_filename_len: cde.path.len() as u16,
        })
    }
}

/// Rejects an absolute path or a `..` component in an entry's decoded path.
fn validate_filename(path: &Utf8Path) -> ZipResult<()> {
    let s = path.as_str();
    if s.starts_with('/') {
        return Err(ZipError::InvalidPath(format!("Path {s} is absolute")));
    }
    // A Windows drive-letter prefix ("C:\foo") is also absolute, regardless
    // of the platform this crate is running on.
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(ZipError::InvalidPath(format!("Path {s} has a drive prefix")));
    }
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                return Err(ZipError::InvalidPath(format!("Path {s} is absolute")));
            }
            Utf8Component::ParentDir => {
                return Err(ZipError::InvalidPath(format!(
                    "Path {s} contains a parent directory reference (..)"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Decodes a raw on-disk filename into a validated [`Utf8PathBuf`],
/// honoring the UTF-8 general-purpose flag, an Info-ZIP Unicode Path extra
/// field override, and otherwise falling back to CP437.
fn decode_path(
    raw: &[u8],
    flags: u16,
    fields: &[spec::RawExtraField<'_>],
    options: &ArchiveOptions,
) -> ZipResult<Utf8PathBuf> {
    let decoded = if !options.decode_strings {
        String::from_utf8_lossy(raw).into_owned()
    } else if let Some(unicode) = spec::unicode_path_override(fields, raw) {
        unicode
    } else if spec::is_utf8(flags) {
        std::str::from_utf8(raw)
            .map_err(ZipError::Encoding)?
            .to_owned()
    } else {
        codepage_437::FromCp437::from_cp437(raw.to_vec(), &codepage_437::CP437_CONTROL)
    };

    if options.strict_filenames && decoded.contains('\\') {
        return Err(ZipError::InvalidPath(format!(
            "Path {decoded} contains a backslash"
        )));
    }
    // Normalize backslashes the way most real-world tools (and piz before
    // us) do when strict filename checking isn't requested.
    let normalized = if decoded.contains('\\') {
        decoded.replace('\\', "/")
    } else {
        decoded
    };

    let path = Utf8PathBuf::from(normalized);
    if options.validate_filenames {
        validate_filename(&path)?;
    }
    Ok(path)
}

static NEXT_ARCHIVE_ID: AtomicU64 = AtomicU64::new(1);

/// The fields of a local file header we actually need, read out into owned
/// values so callers aren't stuck holding the backing buffer alive.
struct LocalHeaderInfo {
    flags: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    filename_len: u16,
    /// Where this entry's data begins: just past the header and its
    /// trailing filename/extra field.
    data_offset: u64,
}

/// A ZIP archive open for reading.
///
/// Built from any [`Reader`]; see [`Archive::from_slice`] and
/// [`Archive::from_file`] for the common cases. Reads its central directory
/// up front (buffered into memory, since the whole point of Mac Archive
/// Utility detection is that we can't trust it enough to stream it), then
/// hands out [`Entry`] values one at a time via [`Archive::read_entry`].
pub struct Archive<R> {
    reader: R,
    anchored: Anchored,
    central_directory: Vec<u8>,
    cursor: usize,
    entries_read: usize,
    options: ArchiveOptions,
    archive_id: u64,

    /// Entries read so far, indexed by [`Entry::index`]. Shared via `Arc` so
    /// an open read stream can enlarge a size after the fact without tying
    /// its lifetime to `&self`.
    entries: Arc<Mutex<Vec<Entry>>>,
    mac_state: Mutex<MacState>,
}

impl<R: Reader> Archive<R> {
    /// Opens an archive from any [`Reader`].
    pub fn open(reader: R) -> ZipResult<Self> {
        Self::with_options(reader, ArchiveOptions::default())
    }

    pub fn with_options(reader: R, options: ArchiveOptions) -> ZipResult<Self> {
        let anchored = anchor::locate(&reader, options.support_mac_archive, options.allow_prepended_data)?;
        trace!("{:?}", anchored);

        let cd_len = to_usize(anchored.cd_size)?;
        let central_directory = reader.read_at(anchored.cd_offset, cd_len)?;

        let archive_id = NEXT_ARCHIVE_ID.fetch_add(1, Ordering::Relaxed);

        Ok(Archive {
            reader,
            mac_state: Mutex::new(anchored.mac_state),
            anchored,
            central_directory,
            cursor: 0,
            entries_read: 0,
            options,
            archive_id,
            entries: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Total entries, as currently believed. Only certain (guaranteed not to
    /// change as more entries are read) once [`Archive::entries_count_certain`]
    /// returns true.
    pub fn entries_count(&self) -> u64 {
        self.anchored.entry_count
    }

    pub fn entries_count_certain(&self) -> bool {
        self.anchored.entry_count_certain
    }

    pub fn is_mac_archive(&self) -> MacState {
        *self.mac_state.lock().expect("mac_state mutex poisoned")
    }

    /// Reads and returns the next entry from the central directory, or
    /// `None` once every entry has been read. Mirrors a pull-based iterator
    /// rather than eagerly parsing every entry at open time, since a
    /// Mac-truncated archive's apparent entry count can itself be wrong.
    pub fn read_entry(&mut self) -> ZipResult<Option<Entry>> {
        if self.cursor >= self.central_directory.len() {
            return Ok(None);
        }

        let mut rest = &self.central_directory[self.cursor..];
        let before = rest.len();
        let cde = CentralDirectoryEntry::parse_and_consume(&mut rest)?;
        self.cursor += before - rest.len();

        let index = self.entries_read;
        self.entries_read += 1;

        let fields = spec::raw_extra_fields(cde.extra_field)?;
        let mut entry = Entry::from_cde(&cde, index, self.archive_id, &self.options)?;

        self.reconcile_mac_state(&cde, &fields, &mut entry, index == 0);

        if !self.anchored.compressed_sizes_certain
            && entry.compression_method != CompressionMethod::None
        {
            let lfh = self.read_local_header(entry.header_offset)?;
            let remaining_entries = self.anchored.entry_count.saturating_sub(index as u64 + 1);
            match anchor::resolve_compressed_size(
                &self.reader,
                lfh.data_offset,
                entry.compressed_size,
                entry.crc32,
                false,
                self.anchored.cd_offset,
                remaining_entries,
            )? {
                Some(resolved) => entry.compressed_size = resolved.compressed_size,
                None => return Err(ZipError::MissingDataDescriptor(entry.path.clone())),
            }
        }

        debug!("{:?}", entry);
        let mut entries = self.entries.lock().expect("entries mutex poisoned");
        entries.push(entry.clone());
        Ok(Some(entry))
    }

    /// Reads every remaining entry at once.
    pub fn read_entries(&mut self) -> ZipResult<Vec<Entry>> {
        let mut out = Vec::new();
        while let Some(entry) = self.read_entry()? {
            out.push(entry);
        }
        Ok(out)
    }

    /// Applies the per-entry Mac Archive Utility evidence checks: does this
    /// entry's shape match what Archive Utility writes, and does its
    /// header offset prove truncation outright the way the anchor's own
    /// footer-vs-layout check did?
    fn reconcile_mac_state(
        &self,
        cde: &CentralDirectoryEntry<'_>,
        fields: &[spec::RawExtraField<'_>],
        entry: &mut Entry,
        is_first_entry: bool,
    ) {
        if !self.options.support_mac_archive {
            return;
        }

        let mut state = self.mac_state.lock().expect("mac_state mutex poisoned");
        if *state == MacState::SpecCompliant {
            return;
        }

        let shaped = mac::entry_is_mac_shaped(cde, fields);
        // Mac's very first entry is always written with file_header_offset
        // 0, even though it should logically be somewhere past the start of
        // the archive proper; that's expected, not evidence either way.
        if is_first_entry && entry.header_offset == 0 {
            if shaped {
                state.escalate();
            }
            return;
        }

        if shaped {
            // A following entry's header offset, compared against where we
            // actually found the previous one's data to end, would let us
            // force Mac detection the same way the anchor module does for
            // the central directory itself. We don't track a full running
            // offset cursor here (entries are read from the already-located
            // central directory, not walked via local headers), so shape
            // alone is what promotes an undecided archive.
            state.escalate();
        } else if state.is_undecided() {
            state.demote();
        }
    }

    /// Reads and parses the local file header at `header_offset`.
    fn read_local_header(&self, header_offset: u64) -> ZipResult<LocalHeaderInfo> {
        // We don't know the local header's path/extra-field length ahead of
        // time, so read a chunk big enough for any legal one (fixed part
        // plus two 64KiB fields), clipped to what's actually left in the
        // archive before the footer.
        let max_header_len = (spec::LFH_MIN_LENGTH + 2 * 65535)
            .min(self.anchored.footer_offset.saturating_sub(header_offset));
        let header_bytes = self
            .reader
            .read_at(header_offset, to_usize(max_header_len)?)?;
        let mut header_slice = header_bytes.as_slice();
        let lfh = LocalFileHeader::parse_and_consume(&mut header_slice)?;
        Ok(LocalHeaderInfo {
            flags: lfh.flags,
            crc32: lfh.crc32,
            compressed_size: lfh.compressed_size,
            uncompressed_size: lfh.uncompressed_size,
            filename_len: lfh.path.len() as u16,
            data_offset: header_offset + lfh.record_length,
        })
    }

    /// Opens a validated read stream for the given entry's content.
    ///
    /// Pipeline: locate and validate the local file header (including the
    /// Mac Archive Utility signature check, once the archive is suspected),
    /// reject encryption, decompress per `compression_method`, then wrap in
    /// a size check and a CRC-32 check (the latter skipped for partial
    /// ranges, which can't be checked against a whole-content checksum).
    pub fn open_read_stream(
        &self,
        entry: &Entry,
        options: StreamOptions,
    ) -> ZipResult<Box<dyn Read + Send>> {
        if entry.archive_id != self.archive_id {
            return Err(ZipError::WrongArchive);
        }
        if options.decrypt == Some(true) || (entry.encrypted && options.decrypt != Some(false)) {
            return Err(ZipError::DecryptionUnsupported);
        }

        let lfh = self.read_local_header(entry.header_offset)?;

        if cfg!(feature = "check-local-metadata") {
            // Local headers for streamed entries (general-purpose bit 3) carry
            // zeroed size/CRC fields; the real values live in the trailing
            // Data Descriptor, which the central directory already reflects.
            let streamed = lfh.flags & (1 << 3) != 0;
            if !streamed {
                let truncated_compressed = entry.compressed_size % (1u64 << 32);
                let truncated_size = entry.size % (1u64 << 32);
                let mismatched = (lfh.compressed_size as u64 != truncated_compressed
                    && lfh.compressed_size != 0xFFFF_FFFF)
                    || (lfh.uncompressed_size as u64 != truncated_size
                        && lfh.uncompressed_size != 0xFFFF_FFFF)
                    || (lfh.crc32 != entry.crc32 && lfh.crc32 != 0);
                if mismatched {
                    return Err(ZipError::InvalidArchive(
                        "Local file header doesn't match central directory entry",
                    ));
                }
            }
        }

        // Archive Utility always streams (general-purpose bit 3), so every
        // local header it writes has zeroed size/CRC fields; a suspected
        // Mac entry whose local header doesn't show that signature is
        // either misidentified or the archive's Mac-ness hasn't actually
        // been confirmed yet.
        let mac_state_now = self.is_mac_archive();
        if mac_state_now != MacState::SpecCompliant {
            let mac_signature_matches = lfh.crc32 == 0
                && lfh.compressed_size == 0
                && lfh.uncompressed_size == 0
                && lfh.filename_len == entry.cd_filename_len;
            if !mac_signature_matches {
                if mac_state_now == MacState::DefiniteMac {
                    return Err(ZipError::MisidentifiedMacArchive);
                } else if mac_state_now == MacState::MaybeMac {
                    self.mac_state.lock().expect("mac_state mutex poisoned").demote();
                } else {
                    return Err(ZipError::Logic(
                        "Mac signature check reached with an already-resolved SpecCompliant state",
                    ));
                }
            }
        }

        let data_offset = lfh.data_offset;
        let mut data_len = entry.compressed_size;
        if data_offset
            .checked_add(data_len)
            .filter(|&end| end <= self.anchored.footer_offset)
            .is_none()
        {
            // The remaining-space fallback from the Mac compressed-size
            // resolver: a truncated compressed_size that claims to run past
            // the footer is recovered as "everything up to the footer",
            // which is exactly right for the last entry of a Mac archive.
            // Only applied once the archive is already suspected Mac; for an
            // otherwise spec-compliant archive this is genuine corruption.
            if self.is_mac_archive() != MacState::SpecCompliant && self.anchored.footer_offset > data_offset {
                data_len = self.anchored.footer_offset - data_offset;
                debug!(
                    "{}: compressed size ran past the footer; using remaining {} bytes",
                    entry.path, data_len
                );
                self.mac_state.lock().expect("mac_state mutex poisoned").escalate();
            } else {
                return Err(ZipError::InvalidArchive(
                    "Entry data runs past the central directory",
                ));
            }
        }

        let raw = self.reader.stream_at(data_offset, data_len)?;

        let full_range = options.is_full_range(entry.size);
        let is_partial = !full_range;

        let want_decompress = options
            .decompress
            .unwrap_or(entry.compression_method != CompressionMethod::None);
        if want_decompress && !matches!(entry.compression_method, CompressionMethod::None | CompressionMethod::Deflate) {
            return Err(ZipError::UnsupportedArchive(format!(
                "Compression method {:?} is not supported",
                entry.compression_method
            )));
        }
        if !want_decompress && is_partial && entry.compression_method != CompressionMethod::None {
            return Err(ZipError::InvalidRange(
                "Cannot request a partial byte range without decompressing a compressed entry".to_string(),
            ));
        }
        let want_crc32 = options.validate_crc32.unwrap_or(!is_partial);
        if want_crc32 && is_partial {
            return Err(ZipError::InvalidRange(
                "Cannot validate a CRC-32 checksum against a partial byte range".to_string(),
            ));
        }

        let decompressed: Box<dyn Read + Send> = if want_decompress {
            match entry.compression_method {
                CompressionMethod::None => raw,
                CompressionMethod::Deflate => Box::new(DeflateDecoder::new(raw)),
                CompressionMethod::Unsupported(_) => unreachable!("checked above"),
            }
        } else {
            raw
        };

        if full_range {
            let path = entry.path.clone();
            let warn_path = path.clone();
            let reader_path = path.clone();
            let expected_size = entry.size;
            let index = entry.index;
            let entries = Arc::clone(&self.entries);
            let validated: Box<dyn Read + Send> = Box::new(SizeValidatingReader::new(
                decompressed,
                expected_size,
                reader_path,
                move |actual| {
                    warn!(
                        "{warn_path}: decompressed to {actual} bytes (expected {expected_size}); \
                         treating as Mac Archive Utility truncation"
                    );
                    if let Ok(mut entries) = entries.lock() {
                        if let Some(stored) = entries.get_mut(index) {
                            stored.size = actual;
                        }
                    }
                },
            ));
            if want_crc32 {
                Ok(Box::new(Crc32Reader::new(validated, entry.crc32, path)))
            } else {
                Ok(validated)
            }
        } else {
            Ok(Box::new(ranged(
                decompressed,
                options.start.unwrap_or(0),
                options.end,
            )))
        }
    }
}

impl<'a> Archive<crate::reader::SliceReader<'a>> {
    /// Opens an archive read fully into memory, or from a memory map
    /// (`memmap2::Mmap` derefs to `&[u8]`).
    pub fn from_slice(data: &'a [u8]) -> ZipResult<Self> {
        Self::open(crate::reader::SliceReader::new(data))
    }
}

impl Archive<crate::reader::FileReader> {
    /// Opens an archive backed by a `File`, reading it positionally rather
    /// than loading it all into memory up front.
    pub fn open_path<P: AsRef<std::path::Path>>(path: P) -> ZipResult<Self> {
        Self::open(crate::reader::FileReader::open(path)?)
    }

    pub fn from_file(file: std::fs::File) -> ZipResult<Self> {
        Self::open(crate::reader::FileReader::from_file(file)?)
    }
}

/// Skips `start` bytes, then yields up to `end - start` (or everything, if
/// `end` is `None`).
fn ranged<R: Read + Send + 'static>(
    mut inner: R,
    start: u64,
    end: Option<u64>,
) -> impl Read + Send {
    let mut to_skip = start;
    let mut skip_buf = [0u8; 4096];
    while to_skip > 0 {
        let want = to_skip.min(skip_buf.len() as u64) as usize;
        match inner.read(&mut skip_buf[..want]) {
            Ok(0) => break,
            Ok(n) => to_skip -= n as u64,
            Err(_) => break,
        }
    }
    let remaining = end.map(|e| e.saturating_sub(start));
    match remaining {
        Some(limit) => Box::new(inner.take(limit)) as Box<dyn Read + Send>,
        None => Box::new(inner) as Box<dyn Read + Send>,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::SliceReader;

    fn store_entry_archive(name: &str, contents: &[u8]) -> Vec<u8> {
        let mut archive = Vec::new();
        let lfh_offset = 0u32;

        archive.extend_from_slice(&spec::LOCAL_FILE_HEADER_MAGIC);
        archive.extend_from_slice(&20u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes()); // store
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(contents);
        let crc = hasher.finalize();
        archive.extend_from_slice(&crc.to_le_bytes());
        archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(name.as_bytes());
        archive.extend_from_slice(contents);

        let cd_offset = archive.len() as u32;
        archive.extend_from_slice(&spec::CENTRAL_DIRECTORY_MAGIC);
        archive.extend_from_slice(&20u16.to_le_bytes());
        archive.extend_from_slice(&20u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&crc.to_le_bytes());
        archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u32.to_le_bytes());
        archive.extend_from_slice(&lfh_offset.to_le_bytes());
        archive.extend_from_slice(name.as_bytes());

        let cd_size = (archive.len() as u32) - cd_offset;
        archive.extend_from_slice(&spec::EOCDR_MAGIC);
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&1u16.to_le_bytes());
        archive.extend_from_slice(&1u16.to_le_bytes());
        archive.extend_from_slice(&cd_size.to_le_bytes());
        archive.extend_from_slice(&cd_offset.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());

        archive
    }

    #[test]
    fn reads_single_stored_entry() {
        let bytes = store_entry_archive("hello.txt", b"hello world");
        let mut archive = Archive::open(SliceReader::new(&bytes)).unwrap();
        let entry = archive.read_entry().unwrap().unwrap();
        assert_eq!(entry.path, Utf8PathBuf::from("hello.txt"));
        assert_eq!(entry.size, 11);
        assert!(archive.read_entry().unwrap().is_none());

        let mut stream = archive.open_read_stream(&entry, StreamOptions::full()).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn ranged_read_returns_subset() {
        let bytes = store_entry_archive("hello.txt", b"hello world");
        let mut archive = Archive::open(SliceReader::new(&bytes)).unwrap();
        let entry = archive.read_entry().unwrap().unwrap();
        let mut stream = archive
            .open_read_stream(&entry, StreamOptions::range(6, 11))
            .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"world");
    }

    #[test]
    fn wrong_archive_entry_is_rejected() {
        let bytes_a = store_entry_archive("a.txt", b"aaa");
        let bytes_b = store_entry_archive("b.txt", b"bbb");
        let mut archive_a = Archive::open(SliceReader::new(&bytes_a)).unwrap();
        let entry_a = archive_a.read_entry().unwrap().unwrap();
        let archive_b = Archive::open(SliceReader::new(&bytes_b)).unwrap();
        let err = archive_b.open_read_stream(&entry_a, StreamOptions::full());
        assert!(matches!(err, Err(ZipError::WrongArchive)));
    }

    #[test]
    fn backslash_path_rejected_when_strict() {
        let cde_path = b"dir\\file.txt";
        let fields: Vec<spec::RawExtraField<'_>> = Vec::new();
        let options = ArchiveOptions {
            strict_filenames: true,
            ..ArchiveOptions::default()
        };
        let err = decode_path(cde_path, 1 << 11, &fields, &options);
        assert!(err.is_err());
    }

    #[test]
    fn backslash_path_normalized_when_not_strict() {
        let cde_path = b"dir\\file.txt";
        let fields: Vec<spec::RawExtraField<'_>> = Vec::new();
        let options = ArchiveOptions::default();
        let path = decode_path(cde_path, 1 << 11, &fields, &options).unwrap();
        assert_eq!(path, Utf8PathBuf::from("dir/file.txt"));
    }

    #[test]
    fn absolute_path_rejected_by_default() {
        let cde_path = b"/etc/passwd";
        let fields: Vec<spec::RawExtraField<'_>> = Vec::new();
        let options = ArchiveOptions::default();
        match decode_path(cde_path, 1 << 11, &fields, &options) {
            Err(ZipError::InvalidPath(_)) => {}
            other => panic!("expected an invalid-path error, got {other:?}"),
        }
    }

    #[test]
    fn parent_dir_traversal_rejected_by_default() {
        let cde_path = b"../evil.txt";
        let fields: Vec<spec::RawExtraField<'_>> = Vec::new();
        let options = ArchiveOptions::default();
        match decode_path(cde_path, 1 << 11, &fields, &options) {
            Err(ZipError::InvalidPath(_)) => {}
            other => panic!("expected an invalid-path error, got {other:?}"),
        }
    }
}

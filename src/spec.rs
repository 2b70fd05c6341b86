//! Code specific to the ZIP file format specification.
//!
//! We try to keep the nitty gritty here, and higher-level stuff in the
//! [`crate::anchor`] and [`crate::archive`] modules. (This pattern, like
//! several others, was inspired by the [Zip crate](https://crates.io/crates/zip).)
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! [_Zip Files: History, Explanation and Implementation_]
//! is also a fantastic resource and a great read.
//!
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT
//! [_Zip Files: History, Explanation and Implementation_]: https://www.hanshq.net/zip.html

use std::convert::TryInto;

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;

use crate::arch::usize;
use crate::result::*;

// Magic numbers denoting various sections of a ZIP archive

/// End of central directory magic number
pub const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
/// Zip64 end of central directory magic number
pub const ZIP64_EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 6, 6];
/// Zip64 end of central directory locator magic number
pub const ZIP64_EOCDR_LOCATOR_MAGIC: [u8; 4] = [b'P', b'K', 6, 7];
/// Central directory file header magic number
pub const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
/// Local file header magic number
pub const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];
/// Data descriptor magic number
pub const DATA_DESCRIPTOR_MAGIC: [u8; 4] = [b'P', b'K', 7, 8];

/// Minimum size of a Central Directory File Header, magic number through
/// header-offset field, not counting the trailing filename/extra/comment.
pub const CDH_MIN_LENGTH: u64 = 46;
/// Minimum size of a Local File Header, not counting the trailing filename/extra.
pub const LFH_MIN_LENGTH: u64 = 30;
/// Size of a Data Descriptor record.
pub const DATA_DESCRIPTOR_LENGTH: u64 = 16;

/// Zip64 Extended Information Extra Field id.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Info-ZIP Unicode Path Extra Field id.
pub const UNICODE_PATH_EXTRA_ID: u16 = 0x7075;
/// The 8-byte extra field Mac Archive Utility stamps onto every CDH entry.
pub const MAC_EXTRA_ID: u16 = 22613; // 0x5855

/// The largest a single CDH can be in a Mac archive: 46 fixed bytes, a
/// filename of up to 65535 bytes, and the one mandatory 12-byte extra field
/// header+data Mac always writes (id + len + 8 bytes of data). Mac archives
/// never add file comments.
pub const CDH_MAX_LENGTH_MAC: u64 = CDH_MIN_LENGTH + 65535 + 12;

/// Reads a little-endian u64 from the front of the provided slice, shrinking it.
pub fn read_u64(input: &mut &[u8]) -> u64 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u64>());
    *input = rest;
    u64::from_le_bytes(int_bytes.try_into().expect("less than eight bytes for u64"))
}

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
pub fn read_u32(input: &mut &[u8]) -> u32 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u32>());
    *input = rest;
    u32::from_le_bytes(int_bytes.try_into().expect("less than four bytes for u32"))
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
pub fn read_u16(input: &mut &[u8]) -> u16 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u16>());
    *input = rest;
    u16::from_le_bytes(int_bytes.try_into().expect("less than two bytes for u16"))
}

/// Data from the End of central directory record
///
/// Found at the back of the ZIP archive and provides offsets for finding
/// its central directory, along with lots of stuff that stopped being
/// relevant when we stopped breaking ZIP archives onto multiple floppies.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory<'a> {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub file_comment: &'a [u8],
}

impl<'a> EndOfCentralDirectory<'a> {
    /// Size of the fixed portion (magic through comment-length), before the comment.
    pub const FIXED_LENGTH: usize = 22;

    pub fn parse(mut eocdr: &'a [u8]) -> ZipResult<Self> {
        // 4.3.16  End of central directory record:
        //
        // end of central dir signature    4 bytes  (0x06054b50)
        // number of this disk             2 bytes
        // number of the disk with the
        // start of the central directory  2 bytes
        // total number of entries in
        // the central dir on this disk    2 bytes
        // total number of entries in
        // the central dir                 2 bytes
        // size of the central directory   4 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        4 bytes
        // zipfile comment length          2 bytes
        if eocdr.len() < Self::FIXED_LENGTH || eocdr[..4] != EOCDR_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid End Of Central Directory Record signature",
            ));
        }
        eocdr = &eocdr[4..];
        let disk_number = read_u16(&mut eocdr);
        let disk_with_central_directory = read_u16(&mut eocdr);
        let entries_on_this_disk = read_u16(&mut eocdr);
        let entries = read_u16(&mut eocdr);
        let central_directory_size = read_u32(&mut eocdr);
        let central_directory_offset = read_u32(&mut eocdr);
        let comment_length = read_u16(&mut eocdr);
        let file_comment = eocdr
            .get(..usize(comment_length)?)
            .ok_or(ZipError::InvalidArchive(
                "End Of Central Directory Record comment runs past end of buffer",
            ))?;

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment,
        })
    }

    /// `true` when any field hit its u16/u32 sentinel and ZIP64 info should
    /// be consulted, per spec.md 4.3.
    pub fn is_zip64(&self) -> bool {
        self.entries == 0xFFFF
            || self.central_directory_offset == 0xFFFFFFFF
            || self.central_directory_size == 0xFFFFFFFF
    }
}

/// Searches backward through `tail` (the trailing `min(size, 22 + 65535)`
/// bytes of the archive) to find the End of central directory record.
///
/// It should be right at the end of the file, but its variable-length
/// trailing comment means we can't jump to a known offset, and that same
/// comment could itself contain a spurious signature. A candidate is only
/// accepted when its 16-bit comment-length field is consistent with how far
/// from the end of `tail` it sits.
pub fn find_eocdr(tail: &[u8]) -> ZipResult<usize> {
    if tail.len() < EndOfCentralDirectory::FIXED_LENGTH {
        return Err(ZipError::InvalidArchive(
            "End of Central Directory Record not found",
        ));
    }
    let mut search_end = tail.len();
    while let Some(rel) = memchr::memmem::rfind(&tail[..search_end], &EOCDR_MAGIC) {
        if rel + EndOfCentralDirectory::FIXED_LENGTH <= tail.len() {
            let comment_length = u16::from_le_bytes([tail[rel + 20], tail[rel + 21]]) as usize;
            if comment_length == tail.len() - rel - EndOfCentralDirectory::FIXED_LENGTH {
                return Ok(rel);
            }
        }
        // A false-positive magic number inside an earlier comment; keep
        // searching further back.
        search_end = rel + 3;
    }
    Err(ZipError::InvalidArchive(
        "End of Central Directory Record not found",
    ))
}

/// Data from the Zip64 end of central directory locator
///
/// This should immediately precede the End of central directory record on
/// Zip64 files and tell us where to find the Zip64 end of central directory record.
#[derive(Debug, Clone)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_central_directory: u32,
    pub zip64_eocdr_offset: u64,
    pub disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIZE_IN_FILE: usize = 20;

    pub fn parse(mapping: &[u8]) -> Option<Self> {
        // 4.3.15 Zip64 end of central directory locator
        //
        // zip64 end of central dir locator
        // signature                       4 bytes  (0x07064b50)
        // number of the disk with the
        // start of the zip64 end of
        // central directory               4 bytes
        // relative offset of the zip64
        // end of central directory record 8 bytes
        // total number of disks           4 bytes
        if mapping.len() < Self::SIZE_IN_FILE || mapping[..4] != ZIP64_EOCDR_LOCATOR_MAGIC {
            return None;
        }
        let mut mapping = &mapping[4..];
        let disk_with_central_directory = read_u32(&mut mapping);
        let zip64_eocdr_offset = read_u64(&mut mapping);
        let disks = read_u32(&mut mapping);

        Some(Self {
            disk_with_central_directory,
            zip64_eocdr_offset,
            disks,
        })
    }
}

/// Data from the Zip64 end of central directory record
#[derive(Debug, Clone)]
pub struct Zip64EndOfCentralDirectory<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub entries_on_this_disk: u64,
    pub entries: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub extensible_data: &'a [u8],
}

impl<'a> Zip64EndOfCentralDirectory<'a> {
    const FIXED_SIZE_IN_FILE: usize = 56;

    pub fn parse(mut eocdr: &'a [u8]) -> ZipResult<Self> {
        // 4.3.14  Zip64 end of central directory record
        //
        // zip64 end of central dir
        // signature                       4 bytes  (0x06064b50)
        // size of zip64 end of central
        // directory record                8 bytes
        // version made by                 2 bytes
        // version needed to extract       2 bytes
        // number of this disk             4 bytes
        // number of the disk with the
        // start of the central directory  4 bytes
        // total number of entries in the
        // central directory on this disk  8 bytes
        // total number of entries in the
        // central directory               8 bytes
        // size of the central directory   8 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        8 bytes
        // zip64 extensible data sector    (variable size)
        if eocdr.len() < Self::FIXED_SIZE_IN_FILE || eocdr[..4] != ZIP64_EOCDR_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid Zip64 End Of Central Directory Record signature",
            ));
        }
        eocdr = &eocdr[4..];
        let eocdr_size = read_u64(&mut eocdr);
        let source_version = read_u16(&mut eocdr);
        let minimum_extract_version = read_u16(&mut eocdr);
        let disk_number = read_u32(&mut eocdr);
        let disk_with_central_directory = read_u32(&mut eocdr);
        let entries_on_this_disk = read_u64(&mut eocdr);
        let entries = read_u64(&mut eocdr);
        let central_directory_size = read_u64(&mut eocdr);
        let central_directory_offset = read_u64(&mut eocdr);

        // 4.3.14.1 The value stored into the "size of zip64 end of central
        // directory record" SHOULD be the size of the remaining record and
        // SHOULD NOT include the leading 12 bytes.
        //
        // Size = SizeOfFixedFields + SizeOfVariableData - 12.
        let eocdr_size = usize(eocdr_size)?;
        if (eocdr_size + 12) < Self::FIXED_SIZE_IN_FILE {
            return Err(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ));
        }
        let extensible_data_length = eocdr_size + 12 - Self::FIXED_SIZE_IN_FILE;
        let extensible_data = eocdr
            .get(..extensible_data_length)
            .ok_or(ZipError::InvalidArchive(
                "Invalid extensible data length in Zip64 End Of Central Directory Record",
            ))?;

        Ok(Self {
            source_version,
            minimum_extract_version,
            disk_number,
            disk_with_central_directory,
            entries,
            entries_on_this_disk,
            central_directory_size,
            central_directory_offset,
            extensible_data,
        })
    }
}

/// Data from a central directory file header (CDH).
///
/// Each of these records describes one file or folder stored in the archive.
#[derive(Debug, Clone)]
pub struct CentralDirectoryEntry<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
    pub file_comment: &'a [u8],
    /// Size in bytes of this record, magic number through comment, inclusive.
    pub record_length: u64,
}

impl<'a> CentralDirectoryEntry<'a> {
    /// Parses one CDH from the front of `entry`, advancing it past the record.
    pub fn parse_and_consume(entry: &mut &'a [u8]) -> ZipResult<Self> {
        // 4.3.12  Central directory structure:
        //
        //   central file header signature   4 bytes  (0x02014b50)
        //   version made by                 2 bytes
        //   version needed to extract       2 bytes
        //   general purpose bit flag        2 bytes
        //   compression method              2 bytes
        //   last mod file time              2 bytes
        //   last mod file date              2 bytes
        //   crc-32                          4 bytes
        //   compressed size                 4 bytes
        //   uncompressed size               4 bytes
        //   file name length                2 bytes
        //   extra field length              2 bytes
        //   file comment length             2 bytes
        //   disk number start               2 bytes
        //   internal file attributes        2 bytes
        //   external file attributes        4 bytes
        //   relative offset of local header 4 bytes
        //
        //   file name (variable size)
        //   extra field (variable size)
        //   file comment (variable size)
        if entry.len() < usize(CDH_MIN_LENGTH)? || entry[..4] != CENTRAL_DIRECTORY_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid Central Directory File Header signature",
            ));
        }
        let start_len = entry.len();
        *entry = &entry[4..];
        let source_version = read_u16(entry);
        let minimum_extract_version = read_u16(entry);
        let flags = read_u16(entry);
        let compression_method = read_u16(entry);
        let last_modified_time = read_u16(entry);
        let last_modified_date = read_u16(entry);
        let crc32 = read_u32(entry);
        let compressed_size = read_u32(entry);
        let uncompressed_size = read_u32(entry);
        let path_length = usize(read_u16(entry))?;
        let extra_field_length = usize(read_u16(entry))?;
        let file_comment_length = usize(read_u16(entry))?;
        let disk_number = read_u16(entry);
        let internal_file_attributes = read_u16(entry);
        let external_file_attributes = read_u32(entry);
        let header_offset = read_u32(entry);

        let trailer_len = path_length + extra_field_length + file_comment_length;
        if entry.len() < trailer_len {
            return Err(ZipError::InvalidArchive(
                "Central Directory File Header runs past end of central directory",
            ));
        }
        let (path, remaining) = entry.split_at(path_length);
        let (extra_field, remaining) = remaining.split_at(extra_field_length);
        let (file_comment, remaining) = remaining.split_at(file_comment_length);
        *entry = remaining;

        let record_length = (start_len - entry.len()) as u64;

        Ok(Self {
            source_version,
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number,
            internal_file_attributes,
            external_file_attributes,
            header_offset,
            path,
            extra_field,
            file_comment,
            record_length,
        })
    }
}

/// Data from a local file header (LFH).
///
/// Each file's actual contents is preceded by one of these. Local headers
/// allow "streaming" decompression without consulting the central
/// directory, a feature this crate doesn't use, preferring the CDH's more
/// trustworthy metadata and only validating the LFH matches.
#[derive(Debug, Clone)]
pub struct LocalFileHeader<'a> {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub path: &'a [u8],
    pub extra_field: &'a [u8],
    /// Size in bytes of this record, magic number through extra field, inclusive.
    pub record_length: u64,
}

impl<'a> LocalFileHeader<'a> {
    pub fn parse_and_consume(header: &mut &'a [u8]) -> ZipResult<Self> {
        // 4.3.7  Local file header:
        //
        // local file header signature     4 bytes  (0x04034b50)
        // version needed to extract       2 bytes
        // general purpose bit flag        2 bytes
        // compression method              2 bytes
        // last mod file time              2 bytes
        // last mod file date              2 bytes
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        // file name length                2 bytes
        // extra field length              2 bytes
        //
        // file name (variable size)
        // extra field (variable size)
        if header.len() < usize(LFH_MIN_LENGTH)? || header[..4] != LOCAL_FILE_HEADER_MAGIC {
            return Err(ZipError::InvalidArchive(
                "Invalid Local File Header signature",
            ));
        }
        let start_len = header.len();
        *header = &header[4..];
        let minimum_extract_version = read_u16(header);
        let flags = read_u16(header);
        let compression_method = read_u16(header);
        let last_modified_time = read_u16(header);
        let last_modified_date = read_u16(header);
        let crc32 = read_u32(header);
        let compressed_size = read_u32(header);
        let uncompressed_size = read_u32(header);
        let path_length = usize(read_u16(header))?;
        let extra_field_length = usize(read_u16(header))?;

        let trailer_len = path_length + extra_field_length;
        if header.len() < trailer_len {
            return Err(ZipError::InvalidArchive(
                "Local File Header runs past end of buffer",
            ));
        }
        let (path, remaining) = header.split_at(path_length);
        let (extra_field, remaining) = remaining.split_at(extra_field_length);
        *header = remaining;

        let record_length = (start_len - header.len()) as u64;

        Ok(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            path,
            extra_field,
            record_length,
        })
    }
}

/// Data from a Data Descriptor, the 16-byte record some archives (notably
/// Mac's) append after file data when sizes weren't known at the time the
/// Local File Header was written.
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub fn parse(mut data: &[u8]) -> Option<Self> {
        if data.len() < usize(DATA_DESCRIPTOR_LENGTH).ok()? || data[..4] != DATA_DESCRIPTOR_MAGIC {
            return None;
        }
        data = &data[4..];
        Some(Self {
            crc32: read_u32(&mut data),
            compressed_size: read_u32(&mut data),
            uncompressed_size: read_u32(&mut data),
        })
    }
}

/// Extracts the "is this text UTF-8?" bit from the 16-bit general-purpose flags.
pub fn is_utf8(flags: u16) -> bool {
    // Bit 11: Language encoding flag (EFS). If this bit is set, the filename
    // and comment fields for this file MUST be encoded using UTF-8.
    flags & (1 << 11) != 0
}

/// Extracts the "is this file encrypted?" bit from the 16-bit general-purpose flags.
pub fn is_encrypted(flags: u16) -> bool {
    // Bit 0: If set, indicates that the file is encrypted
    flags & 1 != 0
}

/// Extracts the strong-encryption bit (bit 6) from the general-purpose flags.
pub fn is_strongly_encrypted(flags: u16) -> bool {
    flags & (1 << 6) != 0
}

/// One `(id, data)` entry from a CDH's or LFH's extra field blob.
pub type RawExtraField<'a> = (u16, &'a [u8]);

/// Splits a CDH/LFH "extra field" blob into its ordered `(id, data)` entries.
///
/// 4.5.1 In order to allow different programs and different types of
/// information to be stored in the 'extra' field in .ZIP files, the
/// following structure MUST be used for all programs storing data in this
/// field: `header1+data1 + header2+data2 . . .` where each header is a
/// 2-byte id followed by a 2-byte data length.
pub fn raw_extra_fields(mut extra_field: &[u8]) -> ZipResult<Vec<RawExtraField<'_>>> {
    let mut fields = Vec::new();
    while !extra_field.is_empty() {
        if extra_field.len() < 4 {
            return Err(ZipError::InvalidArchive("Truncated extra field header"));
        }
        let kind = read_u16(&mut extra_field);
        let field_len = usize(read_u16(&mut extra_field))?;
        if extra_field.len() < field_len {
            return Err(ZipError::InvalidArchive(
                "Extra field data runs past end of buffer",
            ));
        }
        let (data, remaining) = extra_field.split_at(field_len);
        fields.push((kind, data));
        extra_field = remaining;
    }
    Ok(fields)
}

/// The three fields the Zip64 Extended Information Extra Field can replace,
/// each `None` unless the corresponding CDH/LFH field held its u32 sentinel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Zip64Sentinels {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub header_offset: Option<u64>,
}

/// Applies the Zip64 Extended Information Extra Field (id `0x0001`) found
/// among `fields`, if any, filling in whichever of `sentinels`' members are
/// present (`Some`) in the *order* the spec defines: uncompressed size,
/// compressed size, then header offset. A field that's present but doesn't
/// cover every requested sentinel is read partially and left there — this
/// crate, like the source it's grounded on, treats the field as optional
/// even where the surrounding sentinels suggest it's required.
pub fn apply_zip64_extra(
    fields: &[RawExtraField<'_>],
    want_uncompressed: bool,
    want_compressed: bool,
    want_header_offset: bool,
) -> ZipResult<Zip64Sentinels> {
    let mut out = Zip64Sentinels::default();
    for &(kind, mut data) in fields {
        if kind != ZIP64_EXTRA_ID {
            continue;
        }
        if want_uncompressed && data.len() >= 8 {
            out.uncompressed_size = Some(read_u64(&mut data));
        }
        if want_compressed && data.len() >= 8 {
            out.compressed_size = Some(read_u64(&mut data));
        }
        if want_header_offset && data.len() >= 8 {
            out.header_offset = Some(read_u64(&mut data));
        }
        break;
    }
    Ok(out)
}

/// Validates and extracts the UTF-8 payload of an Info-ZIP Unicode Path
/// Extra Field (id `0x7075`), if present and its CRC-32 (over the *raw*
/// on-disk filename bytes) checks out.
pub fn unicode_path_override(fields: &[RawExtraField<'_>], raw_path: &[u8]) -> Option<String> {
    for &(kind, data) in fields {
        if kind != UNICODE_PATH_EXTRA_ID || data.len() < 5 {
            continue;
        }
        let version = data[0];
        if version != 1 {
            continue;
        }
        let stored_crc = u32::from_le_bytes(data[1..5].try_into().expect("4 bytes"));
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(raw_path);
        if hasher.finalize() != stored_crc {
            continue;
        }
        if let Ok(s) = std::str::from_utf8(&data[5..]) {
            return Some(s.to_owned());
        }
    }
    None
}

/// Returns `true` if `fields` contains exactly one Mac Archive Utility extra
/// field (id `22613`, 8 bytes of data), the signature Mac stamps on every
/// non-symlink entry it writes.
pub fn has_single_mac_extra(fields: &[RawExtraField<'_>]) -> bool {
    let matches: Vec<_> = fields
        .iter()
        .filter(|&&(kind, data)| kind == MAC_EXTRA_ID && data.len() == 8)
        .collect();
    matches.len() == 1
}

/// Decodes MS-DOS date/time fields (as found in a CDH or LFH) into a UTC-naive timestamp.
///
/// - `time` bits 0-4: seconds / 2; bits 5-10: minutes; bits 11-15: hours.
/// - `date` bits 0-4: day; bits 5-8: month - 1; bits 9-15: year - 1980.
///
/// Archives occasionally carry nonsensical date/time fields; rather than
/// fail the whole entry over cosmetic metadata, we fall back to the MS-DOS
/// epoch and log a warning.
pub fn parse_msdos(time: u16, date: u16) -> NaiveDateTime {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; always interpreted as a positive value.
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds))
        .unwrap_or_else(|| {
            warn!("Invalid MS-DOS timestamp (date=0x{date:04x}, time=0x{time:04x}); using epoch");
            NaiveDate::from_ymd_opt(1980, 1, 1)
                .expect("1980-01-01 is a valid date")
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eocdr_roundtrip_zero_comment() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&EOCDR_MAGIC);
        bytes.extend_from_slice(&0u16.to_le_bytes()); // disk
        bytes.extend_from_slice(&0u16.to_le_bytes()); // disk w/ cd
        bytes.extend_from_slice(&3u16.to_le_bytes()); // entries this disk
        bytes.extend_from_slice(&3u16.to_le_bytes()); // entries
        bytes.extend_from_slice(&100u32.to_le_bytes()); // cd size
        bytes.extend_from_slice(&50u32.to_le_bytes()); // cd offset
        bytes.extend_from_slice(&0u16.to_le_bytes()); // comment length

        let pos = find_eocdr(&bytes).unwrap();
        assert_eq!(pos, 0);
        let eocdr = EndOfCentralDirectory::parse(&bytes[pos..]).unwrap();
        assert_eq!(eocdr.entries, 3);
        assert_eq!(eocdr.central_directory_offset, 50);
        assert!(!eocdr.is_zip64());
    }

    #[test]
    fn eocdr_with_comment_disambiguates_false_signature_in_comment() {
        let mut bytes = Vec::new();
        // A spurious signature sitting inside where the comment will be.
        let fake_signature_in_comment = EOCDR_MAGIC.to_vec();

        bytes.extend_from_slice(&EOCDR_MAGIC);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(fake_signature_in_comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&fake_signature_in_comment);

        let pos = find_eocdr(&bytes).unwrap();
        assert_eq!(pos, 0);
    }

    #[test]
    fn eocdr_not_found_errors() {
        let bytes = vec![0u8; 21];
        assert!(find_eocdr(&bytes).is_err());
    }

    #[test]
    fn zip64_extra_fills_only_sentinels() {
        let mut data = Vec::new();
        data.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&5_000_000_000u64.to_le_bytes());
        let fields = raw_extra_fields(&data).unwrap();

        // Only uncompressed_size was requested (compressed size wasn't sentineled).
        let sentinels = apply_zip64_extra(&fields, true, false, false).unwrap();
        assert_eq!(sentinels.uncompressed_size, Some(5_000_000_000));
        assert_eq!(sentinels.compressed_size, None);
    }

    #[test]
    fn unicode_path_requires_matching_crc() {
        let raw_path = b"caf\xe9.txt"; // CP437-ish, not valid UTF-8
        let correct = "café.txt";
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(raw_path);
        let crc = hasher.finalize();

        let mut data = Vec::new();
        data.push(1u8);
        data.extend_from_slice(&crc.to_le_bytes());
        data.extend_from_slice(correct.as_bytes());

        let fields = vec![(UNICODE_PATH_EXTRA_ID, data.as_slice())];
        assert_eq!(
            unicode_path_override(&fields, raw_path),
            Some(correct.to_owned())
        );

        // Wrong CRC (filename was renamed without updating the extra field): ignored.
        assert_eq!(unicode_path_override(&fields, b"different.txt"), None);
    }

    #[test]
    fn dos_time_roundtrip() {
        // 2023-06-15 13:37:42 (seconds truncate to even values)
        let date = ((2023 - 1980) << 9) | (6 << 5) | 15;
        let time = (13 << 11) | (37 << 5) | (42 / 2);
        let parsed = parse_msdos(time as u16, date as u16);
        assert_eq!(
            parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2023-06-15 13:37:42"
        );
    }

    #[test]
    fn dos_time_invalid_falls_back_to_epoch() {
        // Month 0 is invalid.
        let date = ((2023 - 1980) << 9) | (0 << 5) | 15;
        let parsed = parse_msdos(0, date as u16);
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "1980-01-01");
    }

    #[test]
    fn mac_extra_field_detection() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAC_EXTRA_ID.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        let fields = raw_extra_fields(&data).unwrap();
        assert!(has_single_mac_extra(&fields));

        // Two copies shouldn't count as a valid single field.
        let mut doubled = data.clone();
        doubled.extend_from_slice(&data);
        let fields = raw_extra_fields(&doubled).unwrap();
        assert!(!has_single_mac_extra(&fields));
    }
}

//! Locating the central directory, and detecting Mac Archive Utility's
//! silent truncation of it.
//!
//! A spec-compliant ZIP reader trusts the End Of Central Directory Record
//! (EOCDR): it names the central directory's offset, size, and entry count
//! directly, or (past the 32-bit/16-bit sentinels) points at a ZIP64 EOCDR
//! that does. Archive Utility breaks that contract — it wraps offsets,
//! sizes, and the entry count modulo 2^32 (2^16 for the count) instead of
//! switching to ZIP64, with nothing in the footer admitting it happened.
//!
//! This module reconciles the footer's claims against the file's actual
//! layout (grounded on `bearcove/rc-zip`'s own offset-reconciliation in
//! `EndOfCentralDirectory::new`, which handles the related but distinct
//! problem of archives with unknown bytes prepended) and, where they
//! disagree by a clean multiple of the truncation modulus, concludes the
//! archive is Mac-truncated and recovers the true values.

use log::{debug, warn};

use crate::mac::{self, MacState};
use crate::reader::Reader;
use crate::result::*;
use crate::spec::{
    self, CentralDirectoryEntry, CDH_MAX_LENGTH_MAC, EndOfCentralDirectory,
    Zip64EndOfCentralDirectory, Zip64EndOfCentralDirectoryLocator,
};

/// How far back from the end of the file we're willing to scan for the EOCDR:
/// its fixed portion, plus the largest possible comment.
const EOCDR_SEARCH_WINDOW: u64 = EndOfCentralDirectory::FIXED_LENGTH as u64 + 0xFFFF;

/// The modulus Mac Archive Utility truncates 32-bit offsets and sizes by.
const MAC_32_MODULUS: u64 = 1 << 32;
/// The modulus Mac Archive Utility truncates the entry count by.
const MAC_16_MODULUS: u64 = 1 << 16;

/// The resolved location of the central directory, and what we now believe
/// about whether the archive is Mac-truncated.
#[derive(Debug, Clone)]
pub struct Anchored {
    pub cd_offset: u64,
    pub cd_size: u64,
    pub entry_count: u64,
    /// Offset where entry data and the central directory must end: the
    /// Zip64 EOCDR's offset if present, else the plain EOCDR's.
    pub footer_offset: u64,
    /// Bytes of unknown data found before the archive proper, as with a
    /// self-extracting installer. Every stated offset is shifted by this much.
    pub global_offset: i64,
    pub mac_state: MacState,
    /// Whether `cd_size` is known correct, or only a best-effort reconstruction.
    pub cd_size_certain: bool,
    /// Whether `entry_count` is known correct, or only a best-effort reconstruction.
    pub entry_count_certain: bool,
    /// Whether every entry's `compressed_size` can be trusted as read, or
    /// whether entries far enough past `cd_offset` might themselves be
    /// truncated and need resolving against a trailing Data Descriptor
    /// (see [`resolve_compressed_size`]).
    pub compressed_sizes_certain: bool,
}

/// Shape of the first central directory entry, cached across the probe/search
/// steps so the final certainty bookkeeping doesn't need to re-read it.
#[derive(Debug, Clone, Copy)]
struct FirstEntryShape {
    compressed_size: u64,
    filename_len: u64,
    extra_field_count: u64,
}

/// Locates the central directory and classifies the archive's Mac-ness.
pub fn locate<R: Reader + ?Sized>(
    reader: &R,
    support_mac_archive: bool,
    allow_prepended_data: bool,
) -> ZipResult<Anchored> {
    let size = reader.size();
    if size < EndOfCentralDirectory::FIXED_LENGTH as u64 {
        return Err(ZipError::InvalidArchive("Archive too small to contain an End of Central Directory Record"));
    }

    let window = EOCDR_SEARCH_WINDOW.min(size);
    let tail_start = size - window;
    let tail = reader.read_at(tail_start, crate::arch::usize(window)?)?;
    let eocdr_pos_in_tail = spec::find_eocdr(&tail)?;
    let eocdr_offset = tail_start + eocdr_pos_in_tail as u64;
    let eocdr = EndOfCentralDirectory::parse(&tail[eocdr_pos_in_tail..])?;

    // A Zip64 locator, if present, sits immediately before the EOCDR.
    let locator_offset = eocdr_offset.checked_sub(Zip64EndOfCentralDirectoryLocator::SIZE_IN_FILE as u64);
    let locator = match locator_offset {
        Some(off) => {
            let bytes = reader.read_at(off, Zip64EndOfCentralDirectoryLocator::SIZE_IN_FILE)?;
            Zip64EndOfCentralDirectoryLocator::parse(&bytes)
        }
        None => None,
    };

    let (mut cd_offset, mut cd_size, mut entry_count, footer_offset, zip64_seen) = match &locator {
        Some(loc) => {
            if loc.zip64_eocdr_offset >= locator_offset.unwrap() {
                return Err(ZipError::InvalidArchive(
                    "Zip64 End of Central Directory Record offset points outside the archive",
                ));
            }
            // We don't yet know the record's true length (it carries a
            // variable-length extensible data sector), so read everything
            // from its start to the locator that should follow it.
            let zip64_header = reader.read_at(
                loc.zip64_eocdr_offset,
                crate::arch::usize(locator_offset.unwrap() - loc.zip64_eocdr_offset)?,
            )?;
            let zip64 = Zip64EndOfCentralDirectory::parse(&zip64_header)?;
            (
                zip64.central_directory_offset,
                zip64.central_directory_size,
                zip64.entries,
                // Entry data and the central directory end where the
                // Zip64 EOCDR begins, not where its locator does — the
                // EOCDR record itself sits between the two.
                loc.zip64_eocdr_offset,
                true,
            )
        }
        None => (
            eocdr.central_directory_offset as u64,
            eocdr.central_directory_size as u64,
            eocdr.entries as u64,
            eocdr_offset,
            false,
        ),
    };

    // Sentinels claiming Zip64 info with no locator to back them up: either a
    // corrupt/non-compliant archive, or Archive Utility's truncated 0xFFFF.
    let suspicious_without_zip64 = support_mac_archive && !zip64_seen && eocdr.is_zip64();

    let mut mac_state = MacState::SpecCompliant;
    let mut cd_size_certain = true;
    let mut entry_count_certain = true;
    let mut compressed_sizes_certain = true;
    let mut global_offset: i64 = 0;

    // Step 1: a genuine Zip64 record, a footer comment, Mac support being
    // disabled, or offsets that don't even line up with the footer modulo
    // 2^32 all rule out the Mac algorithm outright — nothing Archive Utility
    // writes could explain any of those. Fall back to the ordinary
    // prepended-bytes reconciliation used for self-extracting stubs.
    let aligns_mod_32 = cd_offset.wrapping_add(cd_size) % MAC_32_MODULUS == footer_offset % MAC_32_MODULUS;
    let mac_algorithm_applies =
        support_mac_archive && !zip64_seen && eocdr.file_comment.is_empty() && aligns_mod_32;

    if !mac_algorithm_applies && !suspicious_without_zip64 {
        reconcile_prepended_bytes(&mut cd_offset, cd_size, footer_offset, size, &mut global_offset);
        if !allow_prepended_data && global_offset != 0 {
            return Err(ZipError::PrependedWithUnknownBytes(global_offset.unsigned_abs() as usize));
        }
        if cd_offset >= size || cd_offset > footer_offset {
            return Err(ZipError::InvalidArchive(
                "Central directory offset points outside the archive",
            ));
        }
        return Ok(Anchored {
            cd_offset,
            cd_size,
            entry_count,
            footer_offset,
            global_offset,
            mac_state,
            cd_size_certain,
            entry_count_certain,
            compressed_sizes_certain,
        });
    }

    if suspicious_without_zip64 {
        mac_state = MacState::MaybeMac;
    }

    // Step 2: an archive claiming to be empty has no room near the footer
    // for even a single CDH.
    if entry_count == 0 && cd_offset.saturating_add(spec::CDH_MIN_LENGTH) > footer_offset {
        if cd_size != 0 {
            return Err(ZipError::InvalidArchive(
                "Empty archive has a nonzero central directory size",
            ));
        }
        return Ok(Anchored {
            cd_offset,
            cd_size,
            entry_count,
            footer_offset,
            global_offset,
            mac_state: MacState::SpecCompliant,
            cd_size_certain,
            entry_count_certain,
            compressed_sizes_certain,
        });
    }

    // Step 3: cd_size can't possibly fit entry_count headers. If there's
    // room to grow it up to the footer, do so and treat this as Mac
    // truncation outright; otherwise the footer is simply unparseable.
    if cd_size < entry_count.saturating_mul(spec::CDH_MIN_LENGTH) {
        let available = footer_offset.saturating_sub(cd_offset);
        if available < entry_count.saturating_mul(spec::CDH_MIN_LENGTH) {
            return Err(ZipError::InvalidArchive(
                "Central directory size can't fit its claimed entry count",
            ));
        }
        debug!("central directory size {cd_size} can't fit {entry_count} entries; growing to {available}");
        cd_size = available;
        cd_size_certain = false;
        mac_state = MacState::DefiniteMac;
    }

    // Step 4: the claimed entry count is "impossibly low" if even the
    // loosest (largest-CDH) interpretation of the remaining central
    // directory bytes needs more entries than that to fit. Archive Utility
    // truncates the EOCDR's entry count mod 2^16 without ever emitting a
    // Zip64 record, so this is the only signal available once an archive
    // crosses 65535 entries: the footer can read anything from 0 to 65535
    // with no sentinel in sight.
    if !mac_state.is_mac() && cd_offset <= footer_offset {
        let cd_region_len = footer_offset - cd_offset;
        let min_possible_count = cd_region_len / CDH_MAX_LENGTH_MAC;
        if min_possible_count > entry_count {
            debug!(
                "entry count {entry_count} is too low to explain {cd_region_len} bytes of central directory; treating as Mac Archive Utility truncation"
            );
            let diff = min_possible_count - entry_count;
            let bump = (diff + MAC_16_MODULUS - 1) / MAC_16_MODULUS * MAC_16_MODULUS;
            entry_count += bump;
            mac_state = MacState::DefiniteMac;
        }
    }

    if cd_offset >= size || cd_offset > footer_offset {
        return Err(ZipError::InvalidArchive(
            "Central directory offset points outside the archive",
        ));
    }

    // Steps 5 & 6: does the CDH at the stated offset look ordinary? If so,
    // trust the offset outright (whatever steps 2-4 already concluded about
    // size/count stands). If it looks Mac-shaped, or nothing parses there at
    // all, search backward in 4 GiB strides for an offset whose CDH does
    // match the signature — the stated offset may itself have wrapped.
    let mut first_entry_shape = None;
    match probe_cdh(reader, cd_offset, footer_offset) {
        Some((false, _)) => {
            return Ok(Anchored {
                cd_offset,
                cd_size,
                entry_count,
                footer_offset,
                global_offset,
                mac_state,
                cd_size_certain,
                entry_count_certain,
                compressed_sizes_certain,
            });
        }
        Some((true, shape)) => {
            if mac_state == MacState::SpecCompliant {
                mac_state = MacState::MaybeMac;
            }
            first_entry_shape = Some(shape);
        }
        None => {
            let min_cd_len = cd_size.max(entry_count.saturating_mul(spec::CDH_MIN_LENGTH));
            let upper_bound = footer_offset.saturating_sub(min_cd_len);
            let residue = cd_offset % MAC_32_MODULUS;
            let mut candidate = largest_candidate_at_or_below(upper_bound, residue, MAC_32_MODULUS);
            let mut found = None;
            while let Some(pos) = candidate {
                if let Some((true, shape)) = probe_cdh(reader, pos, footer_offset) {
                    found = Some((pos, shape));
                    break;
                }
                candidate = pos.checked_sub(MAC_32_MODULUS).and_then(|prev| {
                    largest_candidate_at_or_below(prev, residue, MAC_32_MODULUS)
                });
            }
            match found {
                Some((true_offset, shape)) => {
                    debug!(
                        "central directory offset wraps by {} bytes: treating as Mac Archive Utility truncation",
                        true_offset as i128 - cd_offset as i128
                    );
                    cd_offset = true_offset;
                    cd_size = footer_offset - cd_offset;
                    cd_size_certain = false;
                    mac_state = MacState::DefiniteMac;
                    first_entry_shape = Some(shape);
                }
                None => {
                    if entry_count > 0 || cd_size > 0 {
                        return Err(ZipError::InvalidArchive(
                            "Could not locate a central directory matching the footer's claims",
                        ));
                    }
                }
            }
        }
    }

    // Recount entries by walking the central directory when the stated count
    // can't be trusted outright: either the 0xFFFF sentinel with no Zip64
    // record behind it, or we've already proven the archive is Mac-truncated
    // (which also truncates the count, just at a different modulus).
    if suspicious_without_zip64 || mac_state.is_mac() {
        match recount_entries(reader, cd_offset, footer_offset) {
            Ok((actual_count, exact)) => {
                if actual_count != entry_count {
                    let diff = actual_count as i128 - entry_count as i128;
                    if diff > 0 && diff as u64 % MAC_16_MODULUS == 0 {
                        mac_state = MacState::DefiniteMac;
                    }
                    entry_count = actual_count;
                }
                entry_count_certain = exact;
                if exact && mac_state.is_undecided() {
                    // We recounted cleanly and found nothing inconsistent:
                    // the 0xFFFF was just an ordinary Zip64 signal we failed
                    // to resolve, not evidence of Mac truncation.
                    mac_state.demote();
                }
            }
            Err(e) => {
                warn!("failed to recount central directory entries: {e}");
                entry_count_certain = false;
            }
        }
    }

    // Step 7: even once cd_offset/cd_size/entry_count are pinned down, an
    // individual entry's compressed_size can still have wrapped if there's
    // enough room between the first entry's data and the central directory
    // for a whole extra 4 GiB stride to hide in.
    if let Some(shape) = first_entry_shape {
        let min_total_data_size = entry_count
            .saturating_mul(spec::CDH_MIN_LENGTH)
            .saturating_add(shape.compressed_size)
            .saturating_add(shape.filename_len)
            .saturating_add(shape.extra_field_count.saturating_mul(16));
        if min_total_data_size.saturating_add(MAC_32_MODULUS) <= cd_offset {
            compressed_sizes_certain = false;
        }
    }

    // Step 8: cd_size is only as certain as the offset reconciliation that
    // produced it; once any Mac evidence is in play, treat it as provisional
    // until the archive module walks every entry and confirms it lines up.
    if mac_state.is_mac() || suspicious_without_zip64 {
        cd_size_certain = false;
        cd_size = footer_offset - cd_offset;
    }

    Ok(Anchored {
        cd_offset,
        cd_size,
        entry_count,
        footer_offset,
        global_offset,
        mac_state,
        cd_size_certain,
        entry_count_certain,
        compressed_sizes_certain,
    })
}

/// Reconciles the stated CD offset against where the footer actually sits,
/// for archives the Mac algorithm doesn't apply to: footer_offset - cd_size
/// is where the CD *must* start if cd_size is right. A spec-compliant
/// archive with unknown bytes prepended (e.g. a self-extracting installer
/// stub) shows up here as a nonzero `global_offset`.
fn reconcile_prepended_bytes(
    cd_offset: &mut u64,
    cd_size: u64,
    footer_offset: u64,
    size: u64,
    global_offset: &mut i64,
) {
    if footer_offset < cd_size {
        return;
    }
    let expected_offset = footer_offset - cd_size;
    if expected_offset != *cd_offset && expected_offset < size {
        *global_offset = expected_offset as i64 - *cd_offset as i64;
        *cd_offset = expected_offset;
    }
}

/// Reads and parses the CDH at `offset` (if any fits before `ceiling`),
/// returning whether it matches Archive Utility's signature and the shape
/// details the compressed-size certainty check in `locate` needs.
fn probe_cdh<R: Reader + ?Sized>(reader: &R, offset: u64, ceiling: u64) -> Option<(bool, FirstEntryShape)> {
    if offset >= ceiling {
        return None;
    }
    let peek_len = CDH_MAX_LENGTH_MAC.min(ceiling - offset);
    let bytes = reader.read_at(offset, crate::arch::usize(peek_len).ok()?).ok()?;
    let mut cursor = bytes.as_slice();
    let cde = CentralDirectoryEntry::parse_and_consume(&mut cursor).ok()?;
    let fields = spec::raw_extra_fields(cde.extra_field).ok()?;
    let shaped = mac::entry_is_mac_shaped(&cde, &fields);
    Some((
        shaped,
        FirstEntryShape {
            compressed_size: cde.compressed_size as u64,
            filename_len: cde.path.len() as u64,
            extra_field_count: fields.len() as u64,
        },
    ))
}

/// The largest value `<= upper` that's congruent to `residue` modulo
/// `modulus`, or `None` if no such non-negative value exists.
fn largest_candidate_at_or_below(upper: u64, residue: u64, modulus: u64) -> Option<u64> {
    if residue > upper {
        return None;
    }
    let upper_residue = upper % modulus;
    if upper_residue >= residue {
        Some(upper - (upper_residue - residue))
    } else {
        upper.checked_sub(modulus - (residue - upper_residue))
    }
}

/// Walks the central directory from `cd_offset`, parsing one CDH at a time,
/// until it reaches `footer_offset` exactly (the clean case, `exact = true`)
/// or runs out of room/hits a parse error first (best-effort, `exact = false`).
fn recount_entries<R: Reader + ?Sized>(
    reader: &R,
    cd_offset: u64,
    footer_offset: u64,
) -> ZipResult<(u64, bool)> {
    if footer_offset < cd_offset {
        return Err(ZipError::InvalidArchive(
            "Central directory offset sits past the footer",
        ));
    }
    let region = reader.read_at(cd_offset, crate::arch::usize(footer_offset - cd_offset)?)?;
    let mut cursor = region.as_slice();
    let mut count = 0u64;
    while !cursor.is_empty() {
        match CentralDirectoryEntry::parse_and_consume(&mut cursor) {
            Ok(_) => count += 1,
            Err(_) => return Ok((count, false)),
        }
    }
    Ok((count, true))
}

/// The outcome of resolving one entry's true compressed size against the
/// footer, for archives where [`Anchored::compressed_sizes_certain`] is false.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedCompressedSize {
    pub compressed_size: u64,
}

/// Works out an entry's true compressed size when the central directory
/// entry's own field might itself be truncated mod 2^32.
///
/// `file_data_offset` is where this entry's data begins, just past its local
/// file header. `entries_remaining` excludes this entry itself. Returns
/// `Ok(None)` when decompressing would be needed to find the answer and no
/// Data Descriptor matching `expected_crc32` could be found before the
/// central directory — the caller should treat that as a missing Data
/// Descriptor.
pub fn resolve_compressed_size<R: Reader + ?Sized>(
    reader: &R,
    file_data_offset: u64,
    stated_compressed_size: u64,
    expected_crc32: u32,
    is_stored: bool,
    cd_offset: u64,
    entries_remaining: u64,
) -> ZipResult<Option<ResolvedCompressedSize>> {
    let remaining_space = cd_offset.saturating_sub(file_data_offset);

    // Not enough room left before the central directory for even one more
    // full 4 GiB stride: the stated size can't have wrapped.
    if remaining_space < MAC_32_MODULUS {
        return Ok(Some(ResolvedCompressedSize {
            compressed_size: stated_compressed_size,
        }));
    }

    // The last entry's data must run right up to the central directory.
    if entries_remaining == 0 {
        if remaining_space % MAC_32_MODULUS != 0 {
            return Err(ZipError::Logic(
                "Last entry's data doesn't fill a whole number of 4 GiB strides before the central directory",
            ));
        }
        return Ok(Some(ResolvedCompressedSize {
            compressed_size: remaining_space,
        }));
    }

    // Stored data is never transformed, so its size can't disagree with
    // what's actually on disk the way a compressed size can.
    if is_stored {
        return Ok(Some(ResolvedCompressedSize {
            compressed_size: stated_compressed_size,
        }));
    }

    // Search forward in 4 GiB strides for a trailing Data Descriptor whose
    // CRC-32 matches: streamed entries (general-purpose bit 3) always have
    // one right after the compressed data, and Archive Utility always
    // streams.
    let mut candidate = stated_compressed_size;
    loop {
        let probe_offset = file_data_offset
            .checked_add(candidate)
            .filter(|&o| o.saturating_add(spec::DATA_DESCRIPTOR_LENGTH) <= cd_offset);
        let probe_offset = match probe_offset {
            Some(o) => o,
            None => return Ok(None),
        };
        let bytes = reader.read_at(probe_offset, crate::arch::usize(spec::DATA_DESCRIPTOR_LENGTH)?)?;
        if let Some(dd) = spec::DataDescriptor::parse(&bytes) {
            if dd.crc32 == expected_crc32 {
                return Ok(Some(ResolvedCompressedSize {
                    compressed_size: candidate,
                }));
            }
        }
        match candidate.checked_add(MAC_32_MODULUS) {
            Some(next) if file_data_offset.saturating_add(next) < cd_offset => candidate = next,
            _ => return Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::SliceReader;

    fn build_plain_archive(entries: &[&str]) -> Vec<u8> {
        let mut cd = Vec::new();
        let mut bodies = Vec::new();
        let mut offsets = Vec::new();

        for name in entries {
            offsets.push(bodies.len() as u32);
            bodies.extend_from_slice(&spec::LOCAL_FILE_HEADER_MAGIC);
            bodies.extend_from_slice(&20u16.to_le_bytes()); // version needed
            bodies.extend_from_slice(&0u16.to_le_bytes()); // flags
            bodies.extend_from_slice(&0u16.to_le_bytes()); // method (store)
            bodies.extend_from_slice(&0u16.to_le_bytes()); // time
            bodies.extend_from_slice(&0u16.to_le_bytes()); // date
            bodies.extend_from_slice(&0u32.to_le_bytes()); // crc32
            bodies.extend_from_slice(&0u32.to_le_bytes()); // compressed size
            bodies.extend_from_slice(&0u32.to_le_bytes()); // uncompressed size
            bodies.extend_from_slice(&(name.len() as u16).to_le_bytes());
            bodies.extend_from_slice(&0u16.to_le_bytes()); // extra len
            bodies.extend_from_slice(name.as_bytes());
        }

        for (name, &offset) in entries.iter().zip(offsets.iter()) {
            cd.extend_from_slice(&spec::CENTRAL_DIRECTORY_MAGIC);
            cd.extend_from_slice(&(3u16 << 8 | 20).to_le_bytes()); // version made by
            cd.extend_from_slice(&20u16.to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes());
            cd.extend_from_slice(&0u32.to_le_bytes());
            cd.extend_from_slice(&0u32.to_le_bytes());
            cd.extend_from_slice(&0u32.to_le_bytes());
            cd.extend_from_slice(&(name.len() as u16).to_le_bytes());
            cd.extend_from_slice(&0u16.to_le_bytes()); // extra len
            cd.extend_from_slice(&0u16.to_le_bytes()); // comment len
            cd.extend_from_slice(&0u16.to_le_bytes()); // disk number
            cd.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            cd.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            cd.extend_from_slice(&offset.to_le_bytes());
            cd.extend_from_slice(name.as_bytes());
        }

        let cd_offset = bodies.len() as u32;
        let cd_size = cd.len() as u32;

        let mut archive = bodies;
        archive.extend_from_slice(&cd);
        archive.extend_from_slice(&spec::EOCDR_MAGIC);
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&cd_size.to_le_bytes());
        archive.extend_from_slice(&cd_offset.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes()); // comment len
        archive
    }

    #[test]
    fn locates_plain_archive() {
        let bytes = build_plain_archive(&["a.txt", "b.txt"]);
        let reader = SliceReader::new(&bytes);
        let anchored = locate(&reader, true, true).unwrap();
        assert_eq!(anchored.entry_count, 2);
        assert_eq!(anchored.mac_state, MacState::SpecCompliant);
        assert!(anchored.cd_size_certain);
        assert!(anchored.entry_count_certain);
        assert!(anchored.compressed_sizes_certain);
        assert_eq!(anchored.global_offset, 0);
    }

    #[test]
    fn rejects_truncated_input() {
        let reader = SliceReader::new(&[0u8; 4]);
        assert!(locate(&reader, true, true).is_err());
    }

    #[test]
    fn largest_candidate_picks_nearest_matching_residue() {
        assert_eq!(largest_candidate_at_or_below(100, 10, 32), Some(74));
        assert_eq!(largest_candidate_at_or_below(5, 10, 32), None);
        assert_eq!(largest_candidate_at_or_below(10, 10, 32), Some(10));
    }

    #[test]
    fn resolve_compressed_size_trusts_stated_value_with_no_room_to_wrap() {
        let data = vec![0u8; 64];
        let reader = SliceReader::new(&data);
        let resolved = resolve_compressed_size(&reader, 0, 10, 0, false, 64, 3).unwrap();
        assert_eq!(resolved.unwrap().compressed_size, 10);
    }

    #[test]
    fn resolve_compressed_size_last_entry_fills_remaining_space() {
        let data = vec![0u8; (MAC_32_MODULUS + 100) as usize];
        let reader = SliceReader::new(&data);
        let resolved =
            resolve_compressed_size(&reader, 0, 10, 0, false, MAC_32_MODULUS + 100, 0).unwrap();
        assert_eq!(resolved.unwrap().compressed_size, MAC_32_MODULUS + 100);
    }

    #[test]
    fn resolve_compressed_size_finds_matching_data_descriptor() {
        let stated_size = 10u64;
        let true_size = MAC_32_MODULUS + stated_size;
        let cd_offset = true_size + spec::DATA_DESCRIPTOR_LENGTH;
        let mut data = vec![0u8; crate::arch::usize(cd_offset).unwrap()];
        let dd_offset = crate::arch::usize(true_size).unwrap();
        data[dd_offset..dd_offset + 4].copy_from_slice(&spec::DATA_DESCRIPTOR_MAGIC);
        data[dd_offset + 4..dd_offset + 8].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let reader = SliceReader::new(&data);
        let resolved =
            resolve_compressed_size(&reader, 0, stated_size, 0xDEAD_BEEF, false, cd_offset, 1)
                .unwrap();
        assert_eq!(resolved.unwrap().compressed_size, true_size);
    }
}

//! The Mac Archive Utility state machine.
//!
//! macOS's built-in Archive Utility writes otherwise spec-compliant ZIP
//! archives, but truncates sizes, offsets, and the entry count modulo 2^32
//! (or 2^16 for the count) instead of switching to ZIP64 once those fields
//! overflow. Nothing in the footer announces this; it can only be inferred
//! from internal inconsistencies as entries are read. We model that
//! inference as three mutually exclusive states rather than a pile of
//! independent booleans, so a caller can never act on "maybe" and "definitely
//! not" at once.

use crate::spec::{self, CentralDirectoryEntry, RawExtraField};

/// What we currently believe about an archive's Mac-ness.
///
/// `MaybeMac` is the default when `anchor` can't rule either way out; reading
/// more entries either confirms it (`DefiniteMac`) or rules it out
/// (`SpecCompliant`). Once an archive leaves `MaybeMac` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacState {
    /// Nothing about this archive looks Mac-truncated.
    SpecCompliant,
    /// Consistent with Mac truncation so far, but not proven.
    MaybeMac,
    /// At least one entry forced the conclusion: sizes/offsets/counts in the
    /// footer and central directory are taken to be truncated mod 2^32/2^16.
    DefiniteMac,
}

impl MacState {
    pub fn is_mac(self) -> bool {
        matches!(self, MacState::DefiniteMac)
    }

    pub fn is_undecided(self) -> bool {
        matches!(self, MacState::MaybeMac)
    }

    /// Escalate `MaybeMac` to `DefiniteMac`. A no-op if already decided
    /// either way (an already-`SpecCompliant` archive can't be re-escalated;
    /// finding that out is a caller bug, not an archive bug, hence no error
    /// return here — see `entry_forces_mac` for the actual gate).
    pub fn escalate(&mut self) {
        if *self == MacState::MaybeMac {
            *self = MacState::DefiniteMac;
        }
    }

    /// Demote `MaybeMac` to `SpecCompliant`: an entry came back perfectly
    /// ordinary, so the weaker signals that got us into `MaybeMac` (e.g. a
    /// suspicious `entries == 0xFFFF`) don't hold up.
    pub fn demote(&mut self) {
        if *self == MacState::MaybeMac {
            *self = MacState::SpecCompliant;
        }
    }
}

/// The fixed version-made-by value Archive Utility stamps on every entry it
/// writes: upper byte 3 (Unix), lower byte 21 (spec version 2.1).
const MAC_VERSION_MADE_BY: u16 = (3 << 8) | 21;

/// Per-entry signature check: does this central directory entry look like
/// something Archive Utility would have written?
///
/// This never *proves* an archive is Mac-truncated on its own; it only says
/// "consistent with it". Proof comes from an actual numeric inconsistency
/// (see [`entry_forces_mac`]).
pub fn entry_is_mac_shaped(entry: &CentralDirectoryEntry<'_>, fields: &[RawExtraField<'_>]) -> bool {
    if entry.source_version != MAC_VERSION_MADE_BY {
        return false;
    }
    let is_zip64_sized = entry.compressed_size == 0xFFFF_FFFF
        || entry.uncompressed_size == 0xFFFF_FFFF
        || entry.header_offset == 0xFFFF_FFFF;
    if is_zip64_sized {
        return false;
    }
    if !entry.file_comment.is_empty() {
        return false;
    }
    spec::has_single_mac_extra(fields)
}

/// Does this entry *force* the conclusion that the archive is Mac-truncated?
///
/// This only returns true for a concrete inconsistency a spec-compliant
/// writer could never produce: a central directory offset, compressed size,
/// or uncompressed size that the ordinary reading of the file layout proves
/// wrong by some multiple of 2^32 (or an entry count provably wrong by a
/// multiple of 2^16). Anything weaker belongs in [`entry_is_mac_shaped`].
pub fn entry_forces_mac(stated: u64, observed_low_bits: u64, modulus: u64) -> bool {
    stated != observed_low_bits && stated % modulus == observed_low_bits % modulus
}

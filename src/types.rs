//! Identity types for the statistics chain.
//!
//! A record is identified by `{module, instance, name}` plus a class string
//! and a kind tag. Identity strings live in fixed-capacity, NUL-padded
//! kernel fields, so equality here is bounded-length and NUL-aware rather
//! than plain `str` equality.

use std::fmt;
use std::sync::Arc;

use crate::filter::FilterSet;

/// Capacity of a kernel identity field, in bytes, including the NUL
/// terminator.
pub const IDENT_LEN: usize = 31;

/// A fixed-capacity, NUL-padded identity string.
///
/// Mirrors the fixed `char` arrays the kernel stores module/name/class in.
/// Construction truncates oversized input to the field capacity; like
/// `strncpy`, a full-capacity value is stored without a NUL terminator.
///
/// ## Comparison Rules
///
/// [`Ident::matches_bounded`] compares byte-by-byte over the full declared
/// capacity, stopping early only at a NUL or a mismatch. Two strings that
/// agree for the whole capacity compare equal even if a longer needle would
/// diverge past it — this matches comparing fixed-size C fields with
/// `strncmp(a, b, IDENT_LEN)`, and is why the comparison cannot rely on the
/// first NUL: a full field has none.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ident {
    buf: [u8; IDENT_LEN],
}

impl Ident {
    /// Create an identity string, truncating to the field capacity.
    pub fn new(s: &str) -> Self {
        let mut buf = [0u8; IDENT_LEN];
        let bytes = s.as_bytes();
        let len = bytes.len().min(IDENT_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Ident { buf }
    }

    /// The string contents up to the first NUL.
    pub fn as_str(&self) -> &str {
        let end = self.buf.iter().position(|&b| b == 0).unwrap_or(IDENT_LEN);
        // Truncation can split a multibyte character at the capacity edge;
        // kernel identity strings are ASCII, so treat that as empty rather
        // than carrying broken bytes around.
        std::str::from_utf8(&self.buf[..end]).unwrap_or("")
    }

    /// Bounded, NUL-aware comparison against a needle byte string.
    ///
    /// Semantics of `strncmp(field, needle, IDENT_LEN) == 0`: compare at
    /// most `IDENT_LEN` bytes, treat positions past the needle's end as NUL,
    /// and stop at the first NUL seen in the field.
    pub fn matches_bounded(&self, needle: &[u8]) -> bool {
        for i in 0..IDENT_LEN {
            let a = self.buf[i];
            let b = needle.get(i).copied().unwrap_or(0);
            if a != b {
                return false;
            }
            if a == 0 {
                return true;
            }
        }
        true
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ident({:?})", self.as_str())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::new(s)
    }
}

/// The identity triple a record read is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Module the record belongs to (e.g. `cpu_stat`).
    pub module: Ident,
    /// Instance number, `>= 0`.
    pub instance: i32,
    /// Record name within the module.
    pub name: Ident,
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.instance, self.name)
    }
}

/// Kind tag of a record's data section.
///
/// Only [`RecordKind::Named`] records carry named typed values; lookups on
/// every other kind fail with `NotNamedRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Name/value pairs of typed counters and strings.
    Named,
    /// Opaque module-defined binary data.
    Raw,
    /// I/O statistics block.
    Io,
    /// Event timer block.
    Timer,
    /// Interrupt statistics block.
    Intr,
}

impl RecordKind {
    /// Whether this kind supports named-value lookup.
    pub fn is_named(&self) -> bool {
        matches!(self, RecordKind::Named)
    }
}

/// One entry of a chain snapshot: resolved identity plus metadata.
///
/// Data is not included; it is populated only by an explicit read.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    /// Identity triple used for reads.
    pub id: RecordId,
    /// Class string (e.g. `misc`, `disk`).
    pub class: Ident,
    /// Data section kind.
    pub kind: RecordKind,
    /// Snapshot timestamp: nanoseconds from an arbitrary origin, monotonic,
    /// not wall-clock. Updated by reads.
    pub snaptime: i64,
}

/// An owned snapshot of the statistics chain for one refresh generation.
///
/// The kernel rebuilds its chain on every refresh; previously held record
/// references become invalid. `Chain` materializes the chain into an owned
/// sequence so traversal never touches kernel memory, and stamps it with the
/// generation it was taken in so stale views are detectable.
#[derive(Debug, Clone)]
pub struct Chain {
    generation: u64,
    entries: Arc<Vec<RecordInfo>>,
}

impl Chain {
    pub(crate) fn new(generation: u64, entries: Vec<RecordInfo>) -> Self {
        Chain {
            generation,
            entries: Arc::new(entries),
        }
    }

    /// Generation this snapshot was taken in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `index`, if any.
    pub fn entry(&self, index: usize) -> Option<&RecordInfo> {
        self.entries.get(index)
    }

    /// The single stateless walk primitive.
    ///
    /// Scans forward from `start` and returns the index of the first entry
    /// the filter set matches. Both access modes are built on this: the
    /// stateless selector walks from the head, the cursor walks from the
    /// position after its current one.
    pub(crate) fn find_match(&self, start: usize, filters: &FilterSet) -> Option<usize> {
        self.entries[start.min(self.entries.len())..]
            .iter()
            .position(|info| filters.matches(info))
            .map(|offset| start + offset)
    }
}

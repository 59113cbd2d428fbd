//! Boundary to the external statistics facility.
//!
//! The kernel facility is an external collaborator reached through exactly
//! four operations: open, close, refresh the chain, read one record. The
//! registry drives everything through this trait and never assumes anything
//! about what lives behind it.
//!
//! Contract notes:
//! - `open` acquires the external resource and is paired with exactly one
//!   `close`; close idempotency is not guaranteed, so the registry calls it
//!   once.
//! - `refresh_chain` returns the chain's current contents and invalidates
//!   every previously returned generation.
//! - `read_record` fails with [`Error::NotFound`] when the identity no
//!   longer resolves and surfaces any other failure verbatim. No retries
//!   happen anywhere in this crate; retry policy belongs behind this trait.
//!
//! [`Error::NotFound`]: crate::Error::NotFound

use crate::error::Result;
use crate::types::{RecordId, RecordInfo};
use crate::value::RawValue;

/// One named typed value inside a record's data section.
#[derive(Debug, Clone)]
pub struct NamedValue {
    /// Value key, unique within the record.
    pub name: String,
    /// Raw tagged payload.
    pub value: RawValue,
}

/// Data section payload of a record.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Name/value pairs, for [`RecordKind::Named`] records.
    ///
    /// [`RecordKind::Named`]: crate::types::RecordKind::Named
    Named(Vec<NamedValue>),
    /// Opaque bytes, for every other kind.
    Raw(Vec<u8>),
}

/// A record's data, populated by an explicit read.
#[derive(Debug, Clone)]
pub struct RecordData {
    /// Snapshot time of the read: nanoseconds from an arbitrary monotonic
    /// origin.
    pub snaptime: i64,
    /// The data payload.
    pub payload: Payload,
}

impl RecordData {
    /// Find a named value by key.
    pub fn lookup(&self, name: &str) -> Option<&NamedValue> {
        match &self.payload {
            Payload::Named(values) => values.iter().find(|v| v.name == name),
            Payload::Raw(_) => None,
        }
    }
}

/// The external statistics facility.
///
/// Implementations are not required to be thread-safe; the registry
/// serializes every call behind its session lock.
pub trait Backend: Send + 'static {
    /// Acquire the external resource.
    fn open(&mut self) -> Result<()>;

    /// Release the external resource. Called exactly once.
    fn close(&mut self) -> Result<()>;

    /// Return the chain's current contents.
    fn refresh_chain(&mut self) -> Result<Vec<RecordInfo>>;

    /// Populate one record's data.
    fn read_record(&mut self, id: &RecordId) -> Result<RecordData>;
}

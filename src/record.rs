//! Read-only record handles.
//!
//! A [`RecordHandle`] is a thin view over one chain entry, bound to the
//! refresh generation it was produced in. Identity accessors are pure; data
//! access goes through [`RecordHandle::ensure_read`], which fetches the
//! record's data at most once per handle.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::RecordData;
use crate::error::{Error, Result};
use crate::registry::Shared;
use crate::types::{RecordInfo, RecordKind};
use crate::value::{self, RawValue};

/// A read-only view over one chain record.
///
/// Produced by `Registry::find` and `Registry::scan`. The handle is bound
/// to the chain generation it was resolved in; once a newer refresh has
/// happened, a handle whose data was never fetched refuses to read rather
/// than resolving against a rebuilt chain.
pub struct RecordHandle {
    shared: Arc<Shared>,
    generation: u64,
    info: RecordInfo,
    data: Mutex<Option<RecordData>>,
}

impl RecordHandle {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64, info: RecordInfo) -> Self {
        RecordHandle {
            shared,
            generation,
            info,
            data: Mutex::new(None),
        }
    }

    /// Instance number.
    pub fn instance(&self) -> i32 {
        self.info.id.instance
    }

    /// Module string.
    pub fn module(&self) -> &str {
        self.info.id.module.as_str()
    }

    /// Class string.
    pub fn class(&self) -> &str {
        self.info.class.as_str()
    }

    /// Record name.
    pub fn name(&self) -> &str {
        self.info.id.name.as_str()
    }

    /// Record kind.
    pub fn kind(&self) -> RecordKind {
        self.info.kind
    }

    /// Snapshot time: nanoseconds from an arbitrary monotonic origin, not
    /// wall-clock. Reflects the data read once one has happened.
    pub fn snaptime(&self) -> i64 {
        self.data
            .lock()
            .as_ref()
            .map(|d| d.snaptime)
            .unwrap_or(self.info.snaptime)
    }

    /// Fetch the record's data if it has not been fetched yet.
    ///
    /// Idempotent within the handle's generation: repeated calls after a
    /// successful read are no-ops. Fails with [`Error::StaleHandle`] when
    /// the chain has been refreshed since the handle was produced and no
    /// data was fetched before that.
    pub fn ensure_read(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.is_some() {
            return Ok(());
        }
        let current = self.shared.generation();
        if current != self.generation {
            return Err(Error::StaleHandle {
                held: self.generation,
                current,
            });
        }
        *data = Some(self.shared.read_record(&self.info.id)?);
        Ok(())
    }

    /// Look up the raw tagged value stored under `name`.
    ///
    /// Fails with [`Error::NotNamedRecord`] for record kinds without named
    /// values and [`Error::NotFound`] when the key does not exist. Triggers
    /// the read if the data has not been fetched yet.
    pub fn lookup(&self, name: &str) -> Result<RawValue> {
        if !self.info.kind.is_named() {
            return Err(Error::NotNamedRecord(self.info.id.to_string()));
        }
        self.ensure_read()?;
        let data = self.data.lock();
        // ensure_read just populated this.
        let data = data
            .as_ref()
            .ok_or_else(|| Error::Backend("record data missing after read".into()))?;
        data.lookup(name)
            .map(|v| v.value.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Decode the value stored under `name` as a 32-bit signed integer.
    pub fn int32(&self, name: &str) -> Result<i32> {
        value::decode_i32(name, &self.lookup(name)?)
    }

    /// Decode the value stored under `name` as a 32-bit unsigned integer.
    pub fn uint32(&self, name: &str) -> Result<u32> {
        value::decode_u32(name, &self.lookup(name)?)
    }

    /// Decode the value stored under `name` as a 64-bit signed integer.
    pub fn int64(&self, name: &str) -> Result<i64> {
        value::decode_i64(name, &self.lookup(name)?)
    }

    /// Decode the value stored under `name` as a 64-bit unsigned integer.
    pub fn uint64(&self, name: &str) -> Result<u64> {
        value::decode_u64(name, &self.lookup(name)?)
    }

    /// Decode the value stored under `name` as a string.
    ///
    /// Both raw string encodings decode to the same result.
    pub fn string(&self, name: &str) -> Result<String> {
        value::decode_string(name, &self.lookup(name)?)
    }
}

impl std::fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHandle")
            .field("id", &self.info.id)
            .field("class", &self.info.class)
            .field("kind", &self.info.kind)
            .field("generation", &self.generation)
            .finish()
    }
}

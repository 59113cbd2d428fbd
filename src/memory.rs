//! In-memory backend.
//!
//! A self-contained fake registry with no kernel behind it. It backs the
//! crate's tests and doc examples, and gives off-host consumers something
//! real to run against.
//!
//! Snaptime is a monotonic counter: it ticks on every refresh and read, so
//! successive reads observe strictly increasing snapshot times the way the
//! real facility's nanosecond counter does.
//!
//! # Example
//!
//! ```
//! use kstat_reader::memory::MemoryBackend;
//! use kstat_reader::value::RawValue;
//!
//! let mut backend = MemoryBackend::new();
//! backend.add_named(
//!     "cpu_stat",
//!     0,
//!     "cpu_stat0",
//!     "misc",
//!     vec![("idle".into(), RawValue::uint64(42))],
//! );
//! ```

use crate::backend::{Backend, NamedValue, Payload, RecordData};
use crate::error::{Error, Result};
use crate::types::{Ident, RecordId, RecordInfo, RecordKind};
use crate::value::RawValue;

struct MemoryRecord {
    info: RecordInfo,
    payload: Payload,
}

/// An in-memory statistics chain.
///
/// Records are appended in chain order. Pass the populated backend to
/// [`Registry::open`].
///
/// [`Registry::open`]: crate::Registry::open
pub struct MemoryBackend {
    records: Vec<MemoryRecord>,
    clock: i64,
    opened: bool,
    closed: bool,
}

impl MemoryBackend {
    /// An empty chain.
    pub fn new() -> Self {
        MemoryBackend {
            records: Vec::new(),
            clock: 0,
            opened: false,
            closed: false,
        }
    }

    /// Append a named record with the given values.
    pub fn add_named(
        &mut self,
        module: &str,
        instance: i32,
        name: &str,
        class: &str,
        values: Vec<(String, RawValue)>,
    ) {
        let payload = Payload::Named(
            values
                .into_iter()
                .map(|(name, value)| NamedValue { name, value })
                .collect(),
        );
        self.push(module, instance, name, class, RecordKind::Named, payload);
    }

    /// Append a raw record with an opaque payload.
    pub fn add_raw(
        &mut self,
        module: &str,
        instance: i32,
        name: &str,
        class: &str,
        bytes: Vec<u8>,
    ) {
        self.push(module, instance, name, class, RecordKind::Raw, Payload::Raw(bytes));
    }

    fn push(
        &mut self,
        module: &str,
        instance: i32,
        name: &str,
        class: &str,
        kind: RecordKind,
        payload: Payload,
    ) {
        self.clock += 1;
        self.records.push(MemoryRecord {
            info: RecordInfo {
                id: RecordId {
                    module: Ident::new(module),
                    instance,
                    name: Ident::new(name),
                },
                class: Ident::new(class),
                kind,
                snaptime: self.clock,
            },
            payload,
        });
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Backend("close called twice".into()));
        }
        self.closed = true;
        Ok(())
    }

    fn refresh_chain(&mut self) -> Result<Vec<RecordInfo>> {
        if !self.opened || self.closed {
            return Err(Error::Backend("backend is not open".into()));
        }
        self.clock += 1;
        Ok(self.records.iter().map(|r| r.info.clone()).collect())
    }

    fn read_record(&mut self, id: &RecordId) -> Result<RecordData> {
        if !self.opened || self.closed {
            return Err(Error::Backend("backend is not open".into()));
        }
        self.clock += 1;
        let snaptime = self.clock;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.info.id == *id)
            .ok_or_else(|| Error::NotFound(format!("no such record: {id}")))?;
        record.info.snaptime = snaptime;
        Ok(RecordData {
            snaptime,
            payload: record.payload.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_returns_chain_order() {
        let mut backend = MemoryBackend::new();
        backend.add_named("cpu_stat", 0, "cpu_stat0", "misc", vec![]);
        backend.add_named("cpu_stat", 1, "cpu_stat1", "misc", vec![]);
        backend.open().unwrap();
        let chain = backend.refresh_chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].id.instance, 0);
        assert_eq!(chain[1].id.instance, 1);
    }

    #[test]
    fn test_read_unknown_record_is_not_found() {
        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        let id = RecordId {
            module: Ident::new("ghost"),
            instance: 0,
            name: Ident::new("ghost0"),
        };
        assert!(backend.read_record(&id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_snaptime_is_monotonic_across_reads() {
        let mut backend = MemoryBackend::new();
        backend.add_named("cpu_stat", 0, "cpu_stat0", "misc", vec![]);
        backend.open().unwrap();
        let id = backend.refresh_chain().unwrap()[0].id;
        let first = backend.read_record(&id).unwrap().snaptime;
        let second = backend.read_record(&id).unwrap().snaptime;
        assert!(second > first);
    }
}

//! Main registry entry point.
//!
//! This module provides the `Registry` struct, the primary entry point for
//! all chain access. It owns the backend session and exposes the two access
//! modes: the stateless selector (`find`/`scan`) and the stateful cursor
//! (`find_next`/`read`/`data_lookup*`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{Backend, RecordData};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::filter::{by_instance, by_module, by_name, FilterSet};
use crate::record::RecordHandle;
use crate::scan::Scan;
use crate::types::{Chain, RecordId};
use crate::value::RawValue;

/// The backend session shared between the registry, its cursor, record
/// handles and scan producers.
///
/// # Thread Safety
///
/// The external facility is not safe for uncoordinated concurrent access,
/// so every backend call is serialized behind the session lock. This is
/// what lets a scan producer interleave with foreground calls without ever
/// racing them: the producer holds the lock only for the duration of one
/// record read.
pub(crate) struct Shared {
    session: Mutex<Session>,

    /// Refresh generation counter.
    ///
    /// Incremented on every chain refresh. Record handles are stamped with
    /// the generation they were resolved in, which makes stale handles
    /// detectable instead of silently reading through a rebuilt chain.
    generation: AtomicU64,
}

struct Session {
    backend: Box<dyn Backend>,
    closed: bool,
}

impl Shared {
    fn new(backend: Box<dyn Backend>) -> Self {
        Shared {
            session: Mutex::new(Session {
                backend,
                closed: false,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Refresh the chain and stamp the snapshot with a fresh generation.
    pub(crate) fn refresh(&self) -> Result<Chain> {
        let mut session = self.session.lock();
        if session.closed {
            return Err(Error::Closed);
        }
        let entries = session.backend.refresh_chain()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(generation, records = entries.len(), "chain refreshed");
        Ok(Chain::new(generation, entries))
    }

    /// Read one record's data through the session lock.
    pub(crate) fn read_record(&self, id: &RecordId) -> Result<RecordData> {
        let mut session = self.session.lock();
        if session.closed {
            return Err(Error::Closed);
        }
        session.backend.read_record(id)
    }

    fn close(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.closed {
            return Err(Error::Closed);
        }
        session.closed = true;
        session.backend.close()
    }
}

/// A handle on the statistics registry.
///
/// Opens the external facility at construction and closes it exactly once,
/// when [`Registry::close`] consumes the value.
///
/// # Example
///
/// ```
/// use kstat_reader::prelude::*;
/// use kstat_reader::memory::MemoryBackend;
/// use kstat_reader::value::RawValue;
///
/// # fn main() -> Result<()> {
/// let mut backend = MemoryBackend::new();
/// backend.add_named(
///     "cpu_stat",
///     0,
///     "cpu_stat0",
///     "misc",
///     vec![("idle".into(), RawValue::uint64(42))],
/// );
///
/// let registry = Registry::open(backend)?;
/// let record = registry.find([by_module("cpu_stat")])?;
/// assert_eq!(record.uint64("idle")?, 42);
/// registry.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    shared: Arc<Shared>,
    cursor: Cursor,
}

impl Registry {
    /// Open the registry over the given backend.
    pub fn open(backend: impl Backend) -> Result<Self> {
        let mut backend: Box<dyn Backend> = Box::new(backend);
        backend.open()?;
        tracing::debug!("registry opened");
        let shared = Arc::new(Shared::new(backend));
        let cursor = Cursor::new(Arc::clone(&shared));
        Ok(Registry { shared, cursor })
    }

    /// Close the registry.
    ///
    /// Consumes the value, so the session cannot be used afterwards. The
    /// backend's close runs exactly once; a scan still in flight observes
    /// the closed session on its next read and winds down.
    pub fn close(self) -> Result<()> {
        self.shared.close()?;
        tracing::debug!("registry closed");
        Ok(())
    }

    // =========================================================================
    // Stateless access: selector
    // =========================================================================

    /// Find the first record matching the filter set.
    ///
    /// Refreshes the chain, walks it from the head and returns the first
    /// match as an already-read [`RecordHandle`]; a read failure propagates
    /// to the caller. Filters are released before returning, on success and
    /// failure alike. With identical filters and an unchanged chain, two
    /// calls return records with identical identity.
    pub fn find(&self, filters: impl Into<FilterSet>) -> Result<RecordHandle> {
        let mut filters = filters.into();
        let result = self.find_first(&filters);
        filters.release_all();
        result
    }

    fn find_first(&self, filters: &FilterSet) -> Result<RecordHandle> {
        let chain = self.shared.refresh()?;
        let index = chain
            .find_match(0, filters)
            .ok_or_else(|| Error::NotFound("no matching record".into()))?;
        let info = chain
            .entry(index)
            .cloned()
            .ok_or_else(|| Error::Backend("walk produced an out-of-range index".into()))?;
        let handle = RecordHandle::new(Arc::clone(&self.shared), chain.generation(), info);
        handle.ensure_read()?;
        Ok(handle)
    }

    /// Stream every record matching the filter set.
    ///
    /// Returns a lazy, finite sequence backed by a producer thread; see
    /// [`Scan`]. A record whose read fails is skipped and logged at `warn`
    /// rather than aborting the remaining scan — use
    /// [`Registry::scan_with_errors`] to observe those failures instead.
    pub fn scan(&self, filters: impl Into<FilterSet>) -> Result<Scan> {
        self.scan_with_errors(filters, |id: &RecordId, err: &Error| {
            tracing::warn!(record = %id, error = %err, "skipping unreadable record in scan");
        })
    }

    /// Stream every matching record, routing per-record read failures to a
    /// caller-supplied sink.
    ///
    /// The sink runs on the producer thread, once per failed record, with
    /// the record's identity and the error. Matching records that do read
    /// successfully are still produced.
    pub fn scan_with_errors(
        &self,
        filters: impl Into<FilterSet>,
        on_read_error: impl FnMut(&RecordId, &Error) + Send + 'static,
    ) -> Result<Scan> {
        let filters = filters.into();
        // A refresh failure surfaces here; the set's drop guard still
        // releases the filters.
        let chain = self.shared.refresh()?;
        Ok(Scan::spawn(
            Arc::clone(&self.shared),
            chain,
            filters,
            Box::new(on_read_error),
        ))
    }

    // =========================================================================
    // Stateful access: cursor
    // =========================================================================

    /// Advance the cursor to the next record matching the given identity.
    ///
    /// Legacy single-cursor form: `""` for module or name and `-1` for
    /// instance are wildcards. The cursor walks forward from its current
    /// position; on exhausting the chain it returns [`Error::NotFound`] and
    /// the next call restarts from the head, so a filter matching K records
    /// cycles back to the first match on the (K+1)-th successful call.
    pub fn find_next(&mut self, module: &str, name: &str, instance: i32) -> Result<()> {
        let mut filters = FilterSet::new();
        if !module.is_empty() {
            filters.push(by_module(module));
        }
        if !name.is_empty() {
            filters.push(by_name(name));
        }
        if instance >= 0 {
            filters.push(by_instance(instance));
        }
        self.cursor.find_next(filters)
    }

    /// Advance the cursor with an explicit filter set.
    pub fn find_next_with(&mut self, filters: impl Into<FilterSet>) -> Result<()> {
        self.cursor.find_next(filters.into())
    }

    /// Fetch the current record's data and clear the cursor's dirty flag.
    ///
    /// Fails with [`Error::NotFound`] when the cursor has no position.
    pub fn read(&mut self) -> Result<()> {
        self.cursor.read()
    }

    /// Instance number at the cursor, `-1` when no position is set.
    pub fn instance(&self) -> i32 {
        self.cursor.instance()
    }

    /// Snapshot time at the cursor, `-1` when no position is set.
    pub fn snaptime(&self) -> i64 {
        self.cursor.snaptime()
    }

    /// Raw tagged value stored under `name` at the cursor.
    ///
    /// Performs an implicit [`Registry::read`] if the position has not been
    /// read since the cursor last advanced.
    pub fn data_lookup(&mut self, name: &str) -> Result<RawValue> {
        self.cursor.data_lookup(name)
    }

    /// Decode the value under `name` at the cursor as a 32-bit signed
    /// integer.
    pub fn data_lookup_int32(&mut self, name: &str) -> Result<i32> {
        self.cursor.data_lookup_i32(name)
    }

    /// Decode the value under `name` at the cursor as a 32-bit unsigned
    /// integer.
    pub fn data_lookup_uint32(&mut self, name: &str) -> Result<u32> {
        self.cursor.data_lookup_u32(name)
    }

    /// Decode the value under `name` at the cursor as a 64-bit signed
    /// integer.
    pub fn data_lookup_int64(&mut self, name: &str) -> Result<i64> {
        self.cursor.data_lookup_i64(name)
    }

    /// Decode the value under `name` at the cursor as a 64-bit unsigned
    /// integer.
    pub fn data_lookup_uint64(&mut self, name: &str) -> Result<u64> {
        self.cursor.data_lookup_u64(name)
    }

    /// Decode the value under `name` at the cursor as a string.
    pub fn data_lookup_string(&mut self, name: &str) -> Result<String> {
        self.cursor.data_lookup_string(name)
    }
}

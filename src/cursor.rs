//! Stateful single-position search.
//!
//! The cursor remembers one chain position across calls and derives all of
//! its traversal from the same stateless walk primitive the selector uses;
//! only the starting index differs.
//!
//! ## State Machine
//!
//! States: `Unset` (no position) and `Positioned(index, dirty)` over a held
//! chain snapshot.
//!
//! ```text
//! find_next: Unset       --match--> Positioned(i, dirty=true)
//!            Positioned  --match--> Positioned(j > i, dirty=true)
//!            any         --chain exhausted--> Unset + NotFound
//! read:      Positioned(i, _) --> Positioned(i, dirty=false)
//! ```
//!
//! The snapshot is fetched once, on the first `find_next`, and never
//! re-fetched: exhaustion resets the position but keeps the snapshot, so
//! the call after a `NotFound` restarts from the head of the identical
//! snapshot. A filter matching K records therefore yields K successes, one
//! `NotFound`, and then the first match again.

use std::sync::Arc;

use crate::backend::RecordData;
use crate::error::{Error, Result};
use crate::filter::FilterSet;
use crate::registry::Shared;
use crate::types::{Chain, RecordInfo};
use crate::value::{self, RawValue};

pub(crate) struct Cursor {
    shared: Arc<Shared>,
    chain: Option<Chain>,
    position: Option<usize>,
    data: Option<RecordData>,
    dirty: bool,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Cursor {
            shared,
            chain: None,
            position: None,
            data: None,
            dirty: true,
        }
    }

    /// Advance to the next record matching the filter set.
    ///
    /// Releases the filters on every exit path.
    pub(crate) fn find_next(&mut self, mut filters: FilterSet) -> Result<()> {
        let result = self.advance(&filters);
        filters.release_all();
        result
    }

    fn advance(&mut self, filters: &FilterSet) -> Result<()> {
        // First search on this cursor takes the snapshot; it is never
        // re-fetched afterwards.
        if self.chain.is_none() {
            self.chain = Some(self.shared.refresh()?);
        }
        let chain = self
            .chain
            .as_ref()
            .ok_or_else(|| Error::Backend("chain snapshot missing".into()))?;

        let start = self.position.map_or(0, |p| p + 1);
        match chain.find_match(start, filters) {
            Some(index) => {
                self.position = Some(index);
                self.data = None;
                self.dirty = true;
                Ok(())
            }
            None => {
                // Exhausted: reset so the next search restarts at the head.
                self.position = None;
                self.data = None;
                self.dirty = true;
                Err(Error::NotFound("no matching record".into()))
            }
        }
    }

    fn current(&self) -> Option<&RecordInfo> {
        let chain = self.chain.as_ref()?;
        chain.entry(self.position?)
    }

    /// Fetch the current record's data and clear the dirty flag.
    pub(crate) fn read(&mut self) -> Result<()> {
        let info = self
            .current()
            .ok_or_else(|| Error::NotFound("cursor has no position".into()))?;
        let data = self.shared.read_record(&info.id)?;
        self.data = Some(data);
        self.dirty = false;
        Ok(())
    }

    /// Instance number of the current position, `-1` when unset.
    pub(crate) fn instance(&self) -> i32 {
        self.current().map_or(-1, |info| info.id.instance)
    }

    /// Snapshot time of the current position, `-1` when unset.
    pub(crate) fn snaptime(&self) -> i64 {
        match (&self.data, self.current()) {
            (Some(data), Some(_)) => data.snaptime,
            (None, Some(info)) => info.snaptime,
            _ => -1,
        }
    }

    /// Look up the raw tagged value stored under `name` at the current
    /// position, reading the record first if the position is dirty.
    pub(crate) fn data_lookup(&mut self, name: &str) -> Result<RawValue> {
        let info = self
            .current()
            .ok_or_else(|| Error::NotFound("cursor has no position".into()))?;
        if !info.kind.is_named() {
            return Err(Error::NotNamedRecord(info.id.to_string()));
        }
        if self.dirty || self.data.is_none() {
            self.read()?;
        }
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| Error::Backend("record data missing after read".into()))?;
        data.lookup(name)
            .map(|v| v.value.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub(crate) fn data_lookup_i32(&mut self, name: &str) -> Result<i32> {
        value::decode_i32(name, &self.data_lookup(name)?)
    }

    pub(crate) fn data_lookup_u32(&mut self, name: &str) -> Result<u32> {
        value::decode_u32(name, &self.data_lookup(name)?)
    }

    pub(crate) fn data_lookup_i64(&mut self, name: &str) -> Result<i64> {
        value::decode_i64(name, &self.data_lookup(name)?)
    }

    pub(crate) fn data_lookup_u64(&mut self, name: &str) -> Result<u64> {
        value::decode_u64(name, &self.data_lookup(name)?)
    }

    pub(crate) fn data_lookup_string(&mut self, name: &str) -> Result<String> {
        value::decode_string(name, &self.data_lookup(name)?)
    }
}

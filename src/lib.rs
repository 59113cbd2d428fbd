//! # kstat-reader
//!
//! Read-only access to a live kernel statistics registry: a chain of named
//! statistic records, each holding a set of typed counters and gauges.
//!
//! ## Quick Start
//!
//! ```
//! use kstat_reader::prelude::*;
//! use kstat_reader::memory::MemoryBackend;
//! use kstat_reader::value::RawValue;
//!
//! # fn main() -> Result<()> {
//! let mut backend = MemoryBackend::new();
//! backend.add_named(
//!     "cpu_stat",
//!     0,
//!     "cpu_stat0",
//!     "misc",
//!     vec![("anonfree".into(), RawValue::uint64(7))],
//! );
//!
//! let registry = Registry::open(backend)?;
//!
//! // Find the first match.
//! let record = registry.find([by_module("cpu_stat")])?;
//! assert_eq!(record.uint64("anonfree")?, 7);
//!
//! // Or stream every match.
//! for record in registry.scan([by_module("cpu_stat")])? {
//!     let _ = record.uint64("anonfree")?;
//! }
//!
//! registry.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Access Modes
//!
//! Two access modes share one traversal primitive:
//!
//! 1. **Selector** — stateless, reentrant: [`Registry::find`] returns the
//!    first match, [`Registry::scan`] streams all matches lazily.
//! 2. **Cursor** — stateful: [`Registry::find_next`] remembers its chain
//!    position across calls and restarts from the head after exhausting the
//!    chain.
//!
//! ## Decoding
//!
//! Values are tagged with one of six kinds; typed accessors decode strictly.
//! Requesting a different numeric width than the stored tag fails with
//! [`Error::TypeMismatch`] even when widening would be lossless. The two raw
//! string encodings (inline buffer, indirect string) both satisfy a string
//! request.
//!
//! ## Backends
//!
//! The kernel facility sits behind the [`backend::Backend`] trait;
//! [`memory::MemoryBackend`] is a self-contained in-memory chain for tests
//! and off-host use.

#![warn(missing_docs)]

pub mod backend;
mod cursor;
pub mod filter;
pub mod memory;
mod record;
mod registry;
mod scan;
pub mod types;
pub mod value;

pub mod prelude;

mod error;

// Re-export main entry points
pub use error::{Error, Result};
pub use record::RecordHandle;
pub use registry::Registry;
pub use scan::Scan;

// Re-export the filter surface at the crate root; call sites read like the
// original variadic API.
pub use filter::{by_class, by_instance, by_module, by_name, Filter, FilterSet};

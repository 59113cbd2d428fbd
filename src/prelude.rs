//! Convenient imports for kstat-reader.
//!
//! Re-exports the most commonly used items so you can get started with a
//! single import:
//!
//! ```
//! use kstat_reader::prelude::*;
//! ```

// Main entry point
pub use crate::registry::Registry;

// Error handling
pub use crate::error::{Error, Result};

// Filters
pub use crate::filter::{by_class, by_instance, by_module, by_name, FilterSet};

// Records and values
pub use crate::record::RecordHandle;
pub use crate::types::{RecordId, RecordInfo, RecordKind};
pub use crate::value::{RawValue, TypedValue};

//! Record filters and filter-set composition.
//!
//! A filter is a predicate over one identity attribute of a chain entry.
//! The string filters own a duplicated copy of their match bytes, mirroring
//! the native match strings the original facility allocates, and expose a
//! `release` so those resources are returned deterministically rather than
//! at some unspecified point later.
//!
//! Filters compose by conjunction in a [`FilterSet`]: an owned collection
//! whose release is guaranteed on every exit path — success, no-match, or a
//! scan abandoned mid-stream — because the set releases itself on drop.
//!
//! # Example
//!
//! ```
//! use kstat_reader::filter::{by_module, by_instance, FilterSet};
//!
//! let set: FilterSet = vec![by_module("cpu_stat"), by_instance(1)].into();
//! ```

use crate::error::Result;
use crate::types::RecordInfo;

/// A predicate over a single record's identity attributes.
///
/// `release` returns any filter-owned resources and must be idempotent; a
/// released filter matches nothing.
pub trait Filter: Send {
    /// Whether this filter matches the given chain entry.
    fn matches(&self, record: &RecordInfo) -> bool;

    /// Release filter-owned resources. Idempotent.
    fn release(&mut self) -> Result<()>;
}

/// Which identity string a string filter compares against.
#[derive(Debug, Clone, Copy)]
enum StringField {
    Module,
    Class,
    Name,
}

/// Filter on one of the string identity fields.
///
/// Owns a duplicated copy of the match bytes; comparison is the bounded,
/// NUL-aware comparison fixed-capacity kernel fields require.
struct StringFilter {
    field: StringField,
    // None once released.
    pattern: Option<Box<[u8]>>,
}

impl StringFilter {
    fn new(field: StringField, pattern: &str) -> Self {
        StringFilter {
            field,
            pattern: Some(pattern.as_bytes().into()),
        }
    }
}

impl Filter for StringFilter {
    fn matches(&self, record: &RecordInfo) -> bool {
        let Some(pattern) = self.pattern.as_deref() else {
            return false;
        };
        let field = match self.field {
            StringField::Module => &record.id.module,
            StringField::Class => &record.class,
            StringField::Name => &record.id.name,
        };
        field.matches_bounded(pattern)
    }

    fn release(&mut self) -> Result<()> {
        self.pattern = None;
        Ok(())
    }
}

/// Filter on the instance number. Exact equality, owns no resources.
struct InstanceFilter {
    instance: i32,
}

impl Filter for InstanceFilter {
    fn matches(&self, record: &RecordInfo) -> bool {
        record.id.instance == self.instance
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Match records whose module field equals `module`.
pub fn by_module(module: &str) -> Box<dyn Filter> {
    Box::new(StringFilter::new(StringField::Module, module))
}

/// Match records whose class field equals `class`.
pub fn by_class(class: &str) -> Box<dyn Filter> {
    Box::new(StringFilter::new(StringField::Class, class))
}

/// Match records whose name field equals `name`.
pub fn by_name(name: &str) -> Box<dyn Filter> {
    Box::new(StringFilter::new(StringField::Name, name))
}

/// Match records with exactly this instance number.
pub fn by_instance(instance: i32) -> Box<dyn Filter> {
    Box::new(InstanceFilter { instance })
}

/// An owned conjunction of filters.
///
/// `matches` is true iff every sub-filter matches; the empty set matches
/// every record. Evaluation short-circuits left to right, but `matches` has
/// no side effects so callers cannot observe the order.
///
/// Release discipline: [`FilterSet::release_all`] runs every filter's
/// release exactly once, regardless of individual failures, and the set
/// also releases itself on drop. Release failures never block the primary
/// result; they are logged and discarded.
pub struct FilterSet {
    filters: Vec<Box<dyn Filter>>,
    released: bool,
}

impl FilterSet {
    /// The empty filter set, which matches every record.
    pub fn new() -> Self {
        FilterSet {
            filters: Vec::new(),
            released: false,
        }
    }

    /// Add a filter to the conjunction.
    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Number of filters in the set.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the set is empty (and so matches everything).
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether every filter in the set matches the given entry.
    pub fn matches(&self, record: &RecordInfo) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Release every filter in the set.
    ///
    /// Runs each release even when earlier ones fail; failures are logged,
    /// never propagated. Safe to call more than once, releases only once.
    pub fn release_all(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for filter in &mut self.filters {
            if let Err(err) = filter.release() {
                tracing::warn!(error = %err, "filter release failed");
            }
        }
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FilterSet {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl From<Vec<Box<dyn Filter>>> for FilterSet {
    fn from(filters: Vec<Box<dyn Filter>>) -> Self {
        FilterSet {
            filters,
            released: false,
        }
    }
}

impl<const N: usize> From<[Box<dyn Filter>; N]> for FilterSet {
    fn from(filters: [Box<dyn Filter>; N]) -> Self {
        Vec::from(filters).into()
    }
}

impl FromIterator<Box<dyn Filter>> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Box<dyn Filter>>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

//! End-to-end tests for the registry's two access modes.
//!
//! Everything runs against the in-memory backend: a chain of three named
//! `cpu_stat` records (instances 0, 1, 2), one named `cpu_info` record and
//! one raw `unix` record.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kstat_reader::backend::{Backend, RecordData};
use kstat_reader::memory::MemoryBackend;
use kstat_reader::prelude::*;
use kstat_reader::value::RawValue;
use kstat_reader::Filter;

fn cpu_chain() -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    for instance in 0..3 {
        backend.add_named(
            "cpu_stat",
            instance,
            &format!("cpu_stat{instance}"),
            "misc",
            vec![
                ("idle".into(), RawValue::uint64(100 + instance as u64)),
                ("load".into(), RawValue::int32(-3)),
                ("ncpus".into(), RawValue::uint32(8)),
                ("snap_ns".into(), RawValue::int64(1_000_000_007)),
                ("brand".into(), RawValue::char_buf("sparcv9")),
                ("vendor".into(), RawValue::string("sparcv9")),
            ],
        );
    }
    backend.add_named(
        "cpu_info",
        0,
        "cpu_info0",
        "misc",
        vec![("clock_MHz".into(), RawValue::int32(2400))],
    );
    backend.add_raw("unix", 0, "sysinfo", "misc", vec![0xde, 0xad]);
    backend
}

/// Matches everything; counts how often it is released.
struct CountingFilter {
    releases: Arc<AtomicUsize>,
}

impl Filter for CountingFilter {
    fn matches(&self, _: &RecordInfo) -> bool {
        true
    }

    fn release(&mut self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn counting(releases: &Arc<AtomicUsize>) -> Box<dyn Filter> {
    Box::new(CountingFilter {
        releases: Arc::clone(releases),
    })
}

/// Delegates to a memory backend but fails reads for one record name.
struct FlakyBackend {
    inner: MemoryBackend,
    fail_name: String,
}

impl Backend for FlakyBackend {
    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn refresh_chain(&mut self) -> Result<Vec<RecordInfo>> {
        self.inner.refresh_chain()
    }

    fn read_record(&mut self, id: &RecordId) -> Result<RecordData> {
        if id.name.as_str() == self.fail_name {
            return Err(Error::Backend("injected read failure".into()));
        }
        self.inner.read_record(id)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let registry = Registry::open(cpu_chain()).unwrap();
        registry.close().unwrap();
    }

    #[test]
    fn test_open_propagates_backend_failure() {
        struct FailingOpen;
        impl Backend for FailingOpen {
            fn open(&mut self) -> Result<()> {
                Err(Error::Backend("no kernel".into()))
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
            fn refresh_chain(&mut self) -> Result<Vec<RecordInfo>> {
                Ok(Vec::new())
            }
            fn read_record(&mut self, _: &RecordId) -> Result<RecordData> {
                Err(Error::Backend("no kernel".into()))
            }
        }
        assert!(Registry::open(FailingOpen).is_err());
    }
}

// ============================================================================
// Stateless access: find
// ============================================================================

mod find {
    use super::*;

    #[test]
    fn test_first_match_is_instance_zero() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        assert_eq!(record.instance(), 0);
        assert_eq!(record.module(), "cpu_stat");
        assert_eq!(record.class(), "misc");
        assert_eq!(record.name(), "cpu_stat0");
    }

    #[test]
    fn test_find_twice_returns_identical_identity() {
        // The second walk must restart from the head, not resume.
        let registry = Registry::open(cpu_chain()).unwrap();
        let first = registry.find([by_module("cpu_stat")]).unwrap();
        let second = registry.find([by_module("cpu_stat")]).unwrap();
        assert_eq!(first.instance(), second.instance());
        assert_eq!(first.name(), second.name());
    }

    #[test]
    fn test_no_match_is_not_found() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let err = registry.find([by_module("zpool")]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_filter_set_matches_chain_head() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find(FilterSet::new()).unwrap();
        assert_eq!(record.module(), "cpu_stat");
        assert_eq!(record.instance(), 0);
    }

    #[test]
    fn test_conjunction_narrows_to_one_record() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry
            .find(vec![by_module("cpu_stat"), by_instance(1)])
            .unwrap();
        assert_eq!(record.instance(), 1);

        // Instance-only filter picks the first instance-0 record.
        let record = registry.find([by_instance(0)]).unwrap();
        assert_eq!(record.module(), "cpu_stat");
    }

    #[test]
    fn test_typed_accessors() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        assert_eq!(record.uint64("idle").unwrap(), 100);
        assert_eq!(record.int32("load").unwrap(), -3);
        assert_eq!(record.uint32("ncpus").unwrap(), 8);
        assert_eq!(record.int64("snap_ns").unwrap(), 1_000_000_007);
        assert_eq!(record.string("brand").unwrap(), "sparcv9");
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        assert!(record.uint64("nonexistent").unwrap_err().is_not_found());
    }

    #[test]
    fn test_type_mismatch_never_widens() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        // Stored uint64, requested int32.
        let err = record.int32("idle").unwrap_err();
        assert!(err.is_type_mismatch());
        // Stored int32, requested int64: lossless widening is still refused.
        assert!(record.int64("load").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_string_encodings_decode_equal() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        assert_eq!(
            record.string("brand").unwrap(),
            record.string("vendor").unwrap()
        );
    }

    #[test]
    fn test_lookup_on_raw_record_is_not_named() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let record = registry.find([by_module("unix")]).unwrap();
        assert_eq!(record.kind(), RecordKind::Raw);
        assert!(matches!(
            record.uint64("anything").unwrap_err(),
            Error::NotNamedRecord(_)
        ));
    }

    #[test]
    fn test_find_surfaces_read_failure() {
        let backend = FlakyBackend {
            inner: cpu_chain(),
            fail_name: "cpu_stat0".into(),
        };
        let registry = Registry::open(backend).unwrap();
        let err = registry.find([by_module("cpu_stat")]).unwrap_err();
        assert!(err.is_retryable());
    }
}

// ============================================================================
// Stateless access: scan
// ============================================================================

mod scan {
    use super::*;

    #[test]
    fn test_scan_yields_matches_in_chain_order() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let instances: Vec<i32> = registry
            .scan([by_module("cpu_stat")])
            .unwrap()
            .map(|r| r.instance())
            .collect();
        assert_eq!(instances, vec![0, 1, 2]);
    }

    #[test]
    fn test_scan_without_filters_yields_whole_chain() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let count = registry.scan(FilterSet::new()).unwrap().count();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_scan_values_are_decodable() {
        let registry = Registry::open(cpu_chain()).unwrap();
        for (i, record) in registry.scan([by_module("cpu_stat")]).unwrap().enumerate() {
            assert_eq!(record.uint64("idle").unwrap(), 100 + i as u64);
        }
    }

    #[test]
    fn test_fresh_scan_restarts_from_head() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let first: Vec<i32> = registry
            .scan([by_module("cpu_stat")])
            .unwrap()
            .map(|r| r.instance())
            .collect();
        let second: Vec<i32> = registry
            .scan([by_module("cpu_stat")])
            .unwrap()
            .map(|r| r.instance())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_failure_skips_record_and_continues() {
        let backend = FlakyBackend {
            inner: cpu_chain(),
            fail_name: "cpu_stat1".into(),
        };
        let registry = Registry::open(backend).unwrap();
        let instances: Vec<i32> = registry
            .scan([by_module("cpu_stat")])
            .unwrap()
            .map(|r| r.instance())
            .collect();
        assert_eq!(instances, vec![0, 2]);
    }

    #[test]
    fn test_error_sink_observes_read_failures() {
        let backend = FlakyBackend {
            inner: cpu_chain(),
            fail_name: "cpu_stat1".into(),
        };
        let registry = Registry::open(backend).unwrap();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let instances: Vec<i32> = registry
            .scan_with_errors([by_module("cpu_stat")], move |id, err| {
                sink.lock().unwrap().push((id.to_string(), err.to_string()));
            })
            .unwrap()
            .map(|r| r.instance())
            .collect();
        assert_eq!(instances, vec![0, 2]);
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.contains("cpu_stat1"));
        assert!(failures[0].1.contains("injected read failure"));
    }

    #[test]
    fn test_refresh_during_scan_invalidates_pending_reads() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let scan = registry
            .scan_with_errors([by_module("cpu_stat")], move |_, err| {
                sink.lock().unwrap().push(err.to_string());
            })
            .unwrap();

        // A foreground search refreshes the chain underneath the scan.
        registry.find([by_module("cpu_info")]).unwrap();

        let delivered = scan.count();
        let failures = failures.lock().unwrap();
        // At most the one record read before the refresh gets through; the
        // rest are reported stale instead of reading through a rebuilt
        // chain.
        assert_eq!(delivered + failures.len(), 3);
        assert!(failures.len() >= 2);
        assert!(failures.iter().all(|msg| msg.contains("stale")));
    }
}

// ============================================================================
// Stateful access: cursor
// ============================================================================

mod cursor {
    use super::*;

    #[test]
    fn test_wraparound_cycle() {
        // K matching records: K successes, one NotFound, then the first
        // match again.
        let mut registry = Registry::open(cpu_chain()).unwrap();
        for expected in 0..3 {
            registry.find_next("cpu_stat", "", -1).unwrap();
            assert_eq!(registry.instance(), expected);
        }
        let err = registry.find_next("cpu_stat", "", -1).unwrap_err();
        assert!(err.is_not_found());

        registry.find_next("cpu_stat", "", -1).unwrap();
        assert_eq!(registry.instance(), 0);
    }

    #[test]
    fn test_sentinels_when_unset() {
        let registry = Registry::open(cpu_chain()).unwrap();
        assert_eq!(registry.instance(), -1);
        assert_eq!(registry.snaptime(), -1);
    }

    #[test]
    fn test_read_requires_position() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        assert!(registry.read().unwrap_err().is_not_found());
    }

    #[test]
    fn test_sentinels_return_after_exhaustion() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("cpu_info", "", -1).unwrap();
        assert_eq!(registry.instance(), 0);
        let _ = registry.find_next("cpu_info", "", -1).unwrap_err();
        assert_eq!(registry.instance(), -1);
        assert_eq!(registry.snaptime(), -1);
    }

    #[test]
    fn test_wildcards_walk_whole_chain() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        let mut modules = Vec::new();
        while registry.find_next("", "", -1).is_ok() {
            modules.push(registry.instance());
        }
        // 3 cpu_stat + cpu_info + unix.
        assert_eq!(modules.len(), 5);
    }

    #[test]
    fn test_name_and_instance_arguments() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("", "cpu_stat2", -1).unwrap();
        assert_eq!(registry.instance(), 2);

        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("cpu_stat", "", 1).unwrap();
        assert_eq!(registry.instance(), 1);
    }

    #[test]
    fn test_data_lookup_reads_implicitly() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("cpu_stat", "", -1).unwrap();
        // No explicit read between the advance and the lookup.
        assert_eq!(registry.data_lookup_uint64("idle").unwrap(), 100);
        assert_eq!(registry.data_lookup_int32("load").unwrap(), -3);
        assert_eq!(registry.data_lookup_uint32("ncpus").unwrap(), 8);
        assert_eq!(registry.data_lookup_int64("snap_ns").unwrap(), 1_000_000_007);
        assert_eq!(registry.data_lookup_string("brand").unwrap(), "sparcv9");
    }

    #[test]
    fn test_explicit_read_updates_snaptime() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("cpu_stat", "", -1).unwrap();
        let before = registry.snaptime();
        registry.read().unwrap();
        assert!(registry.snaptime() > before);
    }

    #[test]
    fn test_data_lookup_without_position_is_not_found() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        assert!(registry.data_lookup("idle").unwrap_err().is_not_found());
    }

    #[test]
    fn test_data_lookup_on_raw_record_is_not_named() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("unix", "", -1).unwrap();
        assert!(matches!(
            registry.data_lookup("anything").unwrap_err(),
            Error::NotNamedRecord(_)
        ));
    }

    #[test]
    fn test_data_lookup_type_mismatch() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        registry.find_next("cpu_stat", "", -1).unwrap();
        // Stored int64, requested uint32.
        let err = registry.data_lookup_uint32("snap_ns").unwrap_err();
        assert!(err.is_type_mismatch());
    }
}

// ============================================================================
// Filter release discipline
// ============================================================================

mod release {
    use super::*;

    #[test]
    fn test_find_releases_on_success() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let releases = Arc::new(AtomicUsize::new(0));
        registry
            .find(vec![by_module("cpu_stat"), counting(&releases)])
            .unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_releases_on_no_match() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let releases = Arc::new(AtomicUsize::new(0));
        let _ = registry
            .find(vec![by_module("zpool"), counting(&releases)])
            .unwrap_err();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_next_releases_each_call() {
        let mut registry = Registry::open(cpu_chain()).unwrap();
        let releases = Arc::new(AtomicUsize::new(0));
        registry
            .find_next_with(vec![by_module("cpu_stat"), counting(&releases)])
            .unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        let _ = registry
            .find_next_with(vec![by_module("zpool"), counting(&releases)])
            .unwrap_err();
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drained_scan_releases_once() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let releases = Arc::new(AtomicUsize::new(0));
        let produced = registry
            .scan(vec![by_module("cpu_stat"), counting(&releases)])
            .unwrap()
            .count();
        assert_eq!(produced, 3);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abandoned_scan_releases_once() {
        let registry = Registry::open(cpu_chain()).unwrap();
        let releases = Arc::new(AtomicUsize::new(0));
        let mut scan = registry
            .scan(vec![by_module("cpu_stat"), counting(&releases)])
            .unwrap();
        // Take one match, then walk away mid-stream.
        assert!(scan.next().is_some());
        drop(scan);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// The concrete end-to-end scenario
// ============================================================================

mod scenario {
    use super::*;

    #[test]
    fn test_cpu_stat_walkthrough() {
        let mut registry = Registry::open(cpu_chain()).unwrap();

        // Find returns instance 0.
        let record = registry.find([by_module("cpu_stat")]).unwrap();
        assert_eq!(record.instance(), 0);

        // Scan yields instances 0, 1, 2 in chain order.
        let instances: Vec<i32> = registry
            .scan([by_module("cpu_stat")])
            .unwrap()
            .map(|r| r.instance())
            .collect();
        assert_eq!(instances, vec![0, 1, 2]);

        // The cursor yields 0, 1, 2 and then NotFound.
        for expected in 0..3 {
            registry.find_next("cpu_stat", "", -1).unwrap();
            assert_eq!(registry.instance(), expected);
        }
        assert!(registry.find_next("cpu_stat", "", -1).unwrap_err().is_not_found());

        // A nonexistent key is NotFound; an existing int64 key read through
        // the uint32 accessor is a TypeMismatch.
        assert!(record.uint64("missing").unwrap_err().is_not_found());
        assert!(record.uint32("snap_ns").unwrap_err().is_type_mismatch());

        registry.close().unwrap();
    }
}

// ============================================================================
// Decoder properties
// ============================================================================

mod decode_props {
    use kstat_reader::value::{decode, RawValue, ReqKind, TypedValue};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn numeric_requests_are_strict(v in any::<u64>()) {
            let raw = RawValue::uint64(v);
            prop_assert_eq!(
                decode("k", &raw, ReqKind::UInt64).unwrap(),
                TypedValue::UInt64(v)
            );
            for wrong in [ReqKind::Int32, ReqKind::UInt32, ReqKind::Int64, ReqKind::String] {
                prop_assert!(decode("k", &raw, wrong).is_err());
            }
        }

        #[test]
        fn string_encodings_agree(s in "[ -~]{0,15}") {
            let inline = decode("k", &RawValue::char_buf(&s), ReqKind::String).unwrap();
            let indirect = decode("k", &RawValue::string(&s), ReqKind::String).unwrap();
            prop_assert_eq!(inline, indirect);
        }

        #[test]
        fn int32_roundtrips(v in any::<i32>()) {
            prop_assert_eq!(
                decode("k", &RawValue::int32(v), ReqKind::Int32).unwrap(),
                TypedValue::Int32(v)
            );
        }
    }
}

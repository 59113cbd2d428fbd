//! Streaming scan over one chain snapshot.
//!
//! `Registry::scan` refreshes the chain synchronously, then hands the owned
//! snapshot to a producer thread. The producer walks it with the caller's
//! filter set, reads each match (one external read at a time, behind the
//! session lock) and pushes completed handles across a rendezvous channel,
//! so it can never race ahead of a slow consumer.
//!
//! Abandonment is observable: dropping the [`Scan`] disconnects the channel,
//! the producer's next send fails, it releases the filter set and exits, and
//! `Drop` joins it. Filters are therefore released exactly once whether the
//! stream is drained or dropped mid-way.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};

use crate::error::Error;
use crate::filter::FilterSet;
use crate::record::RecordHandle;
use crate::registry::Shared;
use crate::types::{Chain, RecordId};

/// Callback receiving per-record read failures during a scan.
pub(crate) type ReadErrorSink = Box<dyn FnMut(&RecordId, &Error) + Send>;

/// A lazy stream of matching records.
///
/// Produced by `Registry::scan`. Finite: bounded by the chain length at
/// refresh time. Not restartable; a fresh scan re-refreshes and re-walks.
pub struct Scan {
    rx: Option<Receiver<RecordHandle>>,
    producer: Option<JoinHandle<()>>,
}

impl Scan {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        chain: Chain,
        mut filters: FilterSet,
        mut on_read_error: ReadErrorSink,
    ) -> Self {
        // Rendezvous handoff: the producer blocks until the consumer takes
        // each handle, or learns the consumer is gone.
        let (tx, rx) = bounded(0);
        let producer = thread::spawn(move || {
            let mut next = 0;
            while let Some(index) = chain.find_match(next, &filters) {
                next = index + 1;
                let Some(info) = chain.entry(index) else {
                    break;
                };
                let handle =
                    RecordHandle::new(Arc::clone(&shared), chain.generation(), info.clone());
                match handle.ensure_read() {
                    Ok(()) => {
                        if tx.send(handle).is_err() {
                            // Consumer dropped the stream.
                            break;
                        }
                    }
                    Err(err) => on_read_error(&info.id, &err),
                }
            }
            filters.release_all();
        });
        Scan {
            rx: Some(rx),
            producer: Some(producer),
        }
    }
}

impl Iterator for Scan {
    type Item = RecordHandle;

    fn next(&mut self) -> Option<RecordHandle> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Scan {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked in send observes it.
        self.rx = None;
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                tracing::warn!("scan producer panicked");
            }
        }
    }
}

//! Event reader
//!
//! An `EventReader` owns one query: its own executor (and worker thread)
//! plus a [`BatchIterator`] over the records. Readers are created through
//! [`EventLog`](crate::EventLog).

use crate::config::ReaderConfig;
use crate::format::RecordFormatter;
use crate::iterator::BatchIterator;
use crate::record::EventRecord;
use evtlog_core::{BatchStatus, Direction, LogSource, QueryLocator, Result, SeekOrigin};
use evtlog_executor::QueryExecutor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

static NEXT_READER: AtomicUsize = AtomicUsize::new(0);

/// Reads the records of one query in order.
#[derive(Debug)]
pub struct EventReader {
    iter: BatchIterator,
    locator: QueryLocator,
}

impl EventReader {
    pub(crate) fn open(
        source: Arc<dyn LogSource>,
        formatter: Arc<RecordFormatter>,
        config: &ReaderConfig,
        locator: QueryLocator,
        query: &str,
        direction: Direction,
    ) -> Result<Self> {
        let id = NEXT_READER.fetch_add(1, Ordering::Relaxed);
        let executor =
            QueryExecutor::with_config(source, config.executor_config(format!("evtlog-query-{}", id)))?;
        executor.query(locator.clone(), query, direction)?;
        debug!(target: "evtlog::reader", reader = id, ?locator, ?direction, "query opened");

        let iter = BatchIterator::new(
            executor,
            formatter,
            config.batch_size,
            config.fetch_timeout_ms(),
        )?;
        Ok(Self { iter, locator })
    }

    /// Advance to the next record; `false` when none is available right now.
    pub fn next(&mut self) -> Result<bool> {
        self.iter.next()
    }

    /// The record `next()` last moved to.
    pub fn current(&self) -> Option<&EventRecord> {
        self.iter.current()
    }

    /// Reposition the query.
    pub fn seek(&mut self, position: i64, origin: SeekOrigin) -> Result<()> {
        self.iter.seek(position, origin)
    }

    /// Status of the most recent fetch.
    pub fn last_status(&self) -> Option<BatchStatus> {
        self.iter.last_status()
    }

    pub fn batch_size(&self) -> usize {
        self.iter.batch_size()
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        self.iter.set_batch_size(batch_size)
    }

    /// Fetch timeout; `None` waits until data arrives.
    pub fn timeout(&self) -> Option<Duration> {
        match self.iter.timeout_ms() {
            u32::MAX => None,
            ms => Some(Duration::from_millis(u64::from(ms))),
        }
    }

    /// Set the fetch timeout; `None` waits until data arrives.
    ///
    /// Durations beyond `u32::MAX - 1` milliseconds are clamped.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        let ms = match timeout {
            None => u32::MAX,
            Some(t) => u32::try_from(t.as_millis()).unwrap_or(u32::MAX - 1).min(u32::MAX - 1),
        };
        self.iter.set_timeout_ms(ms);
    }

    /// What this reader queries.
    pub fn locator(&self) -> &QueryLocator {
        &self.locator
    }

    /// Drain the reader as an iterator of records.
    ///
    /// Stops at the first fetch that returns no records, or after yielding
    /// an error.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            reader: self,
            done: false,
        }
    }
}

/// Iterator returned by [`EventReader::records`].
pub struct Records<'a> {
    reader: &'a mut EventReader,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next() {
            Ok(true) => self.reader.current().cloned().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

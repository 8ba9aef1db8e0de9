//! Batch query iterator
//!
//! Pages through a query one batch at a time. `next()` moves to the next
//! record of the buffered batch and fetches a new batch once the buffered
//! one is used up.
//!
//! A fetch that returns `NoMoreItems` or `Timeout` leaves the iterator with
//! no current record. Calling `next()` again simply fetches again, which is
//! how a live channel is tailed.

use crate::format::RecordFormatter;
use crate::record::EventRecord;
use evtlog_core::{BatchStatus, Error, Result, SeekOrigin};
use evtlog_executor::{QueryBatch, QueryExecutor};
use std::sync::Arc;

/// Cursor-style iteration over the records of one query.
#[derive(Debug)]
pub struct BatchIterator {
    executor: QueryExecutor,
    formatter: Arc<RecordFormatter>,
    batch: Option<QueryBatch>,
    /// Index of the current record within `batch`
    index: usize,
    current: Option<EventRecord>,
    last_status: Option<BatchStatus>,
    batch_size: usize,
    timeout_ms: u32,
}

impl BatchIterator {
    /// Iterate the query already open on `executor`.
    pub fn new(
        executor: QueryExecutor,
        formatter: Arc<RecordFormatter>,
        batch_size: usize,
        timeout_ms: u32,
    ) -> Result<Self> {
        check_batch_size(batch_size)?;
        Ok(Self {
            executor,
            formatter,
            batch: None,
            index: 0,
            current: None,
            last_status: None,
            batch_size,
            timeout_ms,
        })
    }

    /// Advance to the next record.
    ///
    /// Returns `false` when the fetch found no records; the iterator stays
    /// usable and a later call fetches again.
    pub fn next(&mut self) -> Result<bool> {
        self.current = None;

        let buffered = self.batch.as_ref().map_or(0, QueryBatch::count);
        if self.batch.is_some() && self.index + 1 < buffered {
            self.index += 1;
            return self.load_current();
        }

        // Release the spent batch before asking for the next one.
        self.batch = None;
        let batch = self.executor.next(self.batch_size, self.timeout_ms)?;
        self.last_status = Some(batch.status());
        if batch.status() != BatchStatus::Success || batch.is_empty() {
            return Ok(false);
        }
        self.batch = Some(batch);
        self.index = 0;
        self.load_current()
    }

    fn load_current(&mut self) -> Result<bool> {
        let batch = self
            .batch
            .as_ref()
            .ok_or_else(|| Error::internal("no batch buffered"))?;
        self.current = Some(self.formatter.format(batch.record(self.index)?)?);
        Ok(true)
    }

    /// The record `next()` last moved to.
    pub fn current(&self) -> Option<&EventRecord> {
        self.current.as_ref()
    }

    /// Reposition the query and drop the buffered batch.
    pub fn seek(&mut self, position: i64, origin: SeekOrigin) -> Result<()> {
        self.batch = None;
        self.current = None;
        self.index = 0;
        self.executor.seek(position, origin)
    }

    /// Status of the most recent fetch; `None` before the first.
    pub fn last_status(&self) -> Option<BatchStatus> {
        self.last_status
    }

    /// Records left in the buffered batch after the current one
    pub fn buffered(&self) -> usize {
        self.batch
            .as_ref()
            .map_or(0, |b| b.count().saturating_sub(self.index + 1))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records per fetch, from the next fetch on.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        check_batch_size(batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Fetch timeout in milliseconds, `u32::MAX` to wait indefinitely.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }
}

fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::invalid_argument("batch size must be at least 1"));
    }
    Ok(())
}

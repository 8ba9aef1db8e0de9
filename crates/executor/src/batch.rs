//! Result of one fetch

use evtlog_core::{BatchStatus, Error, FetchOutcome, Handle, Result};

/// Records returned by one `Next` command.
///
/// The record handles are released when the batch is dropped, so a batch
/// must be consumed before it is replaced by the next fetch.
#[derive(Debug)]
pub struct QueryBatch {
    status: BatchStatus,
    records: Vec<Handle>,
}

impl QueryBatch {
    pub fn new(status: BatchStatus, records: Vec<Handle>) -> Self {
        Self { status, records }
    }

    /// An empty batch with the given status
    pub fn empty(status: BatchStatus) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Number of records returned
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record handle at `index`.
    pub fn record(&self, index: usize) -> Result<&Handle> {
        self.records.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            len: self.records.len(),
        })
    }

    pub fn records(&self) -> &[Handle] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Handle> {
        self.records
    }
}

impl From<FetchOutcome> for QueryBatch {
    fn from(outcome: FetchOutcome) -> Self {
        Self::new(outcome.status, outcome.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_index_checked() {
        let batch = QueryBatch::new(
            BatchStatus::Success,
            vec![Handle::borrowed(1), Handle::borrowed(2)],
        );
        assert_eq!(batch.count(), 2);
        assert_eq!(batch.record(1).unwrap().raw(), 2);
        assert_eq!(
            batch.record(2).unwrap_err(),
            Error::IndexOutOfBounds { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_from_outcome() {
        let batch = QueryBatch::from(FetchOutcome::timed_out());
        assert_eq!(batch.status(), BatchStatus::Timeout);
        assert!(batch.is_empty());
    }
}

//! Commands executed by the query worker
//!
//! Commands are:
//! - **Self-contained**: All parameters needed for execution are in the variant
//! - **Pure data**: No closures or executable code
//!
//! The reply travels separately, in the envelope the executor queues
//! alongside the command.

use crate::batch::QueryBatch;
use evtlog_core::{Direction, Error, QueryLocator, Result, SeekOrigin};

/// One operation against the worker's query cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a query, closing any cursor already open.
    /// Returns: `Output::Unit`
    Query {
        locator: QueryLocator,
        query: String,
        direction: Direction,
    },

    /// Fetch up to `max` records, waiting at most `timeout_ms` for data.
    /// Returns: `Output::Batch`
    Next { max: usize, timeout_ms: u32 },

    /// Reposition the cursor.
    /// Returns: `Output::Unit`
    Seek { position: i64, origin: SeekOrigin },

    /// Close the cursor. Closing when nothing is open succeeds.
    /// Returns: `Output::Unit`
    Close,

    /// Stop the worker. Commands queued behind it fail with
    /// `ExecutorClosed`.
    /// Returns: `Output::Unit`
    Shutdown,
}

impl Command {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Query { .. } => "query",
            Command::Next { .. } => "next",
            Command::Seek { .. } => "seek",
            Command::Close => "close",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug)]
pub enum Output {
    /// The command has no value to return
    Unit,
    /// Records from a `Next` command
    Batch(QueryBatch),
}

impl Output {
    pub fn into_unit(self) -> Result<()> {
        match self {
            Output::Unit => Ok(()),
            Output::Batch(_) => Err(Error::internal("expected no output, got a batch")),
        }
    }

    pub fn into_batch(self) -> Result<QueryBatch> {
        match self {
            Output::Batch(batch) => Ok(batch),
            Output::Unit => Err(Error::internal("expected a batch, got no output")),
        }
    }
}

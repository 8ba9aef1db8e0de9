//! Active-object query executor for evtlog
//!
//! A query cursor must only ever be touched by the thread that opened it.
//! `QueryExecutor` owns such a cursor on a dedicated worker thread and runs
//! every operation on it in the order callers queued them:
//! - queue: the bounded blocking FIFO commands wait in
//! - command: the Command / Output instruction set
//! - completion: the one-shot slot a caller waits on
//! - batch: QueryBatch, the records returned by one fetch

#![warn(clippy::all)]

pub mod batch;
pub mod command;
pub mod completion;
pub mod executor;
pub mod queue;

pub use batch::QueryBatch;
pub use command::{Command, Output};
pub use executor::{
    ExecutorConfig, PendingCommand, QueryExecutor, DEFAULT_FAILSAFE_TIMEOUT,
    DEFAULT_QUEUE_CAPACITY,
};
pub use queue::{BoundedQueue, PushError};

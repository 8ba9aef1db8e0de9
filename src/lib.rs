//! evtlog - structured access to append-only event logs
//!
//! evtlog queries a log source with filters, pages through the results and
//! renders each raw record into display strings using the metadata its
//! publisher ships.
//!
//! # Quick Start
//!
//! ```ignore
//! use evtlog::{Direction, EventLog};
//!
//! let log = EventLog::new(source);
//! let mut reader = log.query_channel("Application", "*[System[Level=2]]", Direction::Reverse)?;
//! for record in reader.records() {
//!     let record = record?;
//!     println!("{:?} {}", record.event_id, record.message());
//! }
//! ```
//!
//! # Architecture
//!
//! Each reader owns a query executor: an active object whose worker thread
//! is the only thread that ever touches the reader's cursor. Records are
//! rendered on the caller's thread through a formatter shared by every
//! reader of a session, backed by the process-wide publisher metadata cache.

pub use evtlog_core::{
    codes, testing, BatchStatus, Direction, Error, FileTime, FormatKind, Guid, Handle,
    LogSource, QueryCursor, QueryLocator, Result, SeekOrigin, Sid, SysTime, SystemError,
    SystemField, TaggedValue, ValueType, Variant,
};
pub use evtlog_engine::*;
pub use evtlog_executor::{ExecutorConfig, QueryBatch, QueryExecutor};
pub use evtlog_metadata::{CachedPublisher, EventMetadata, MetadataCache, PublisherMetadata};

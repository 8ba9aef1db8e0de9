//! Record formatting, paging readers and sessions for evtlog
//!
//! This crate ties the executor and the metadata cache together:
//! - format: RecordFormatter, raw record handle to EventRecord
//! - iterator: BatchIterator, paging over an executor
//! - reader: EventReader, one query with its own worker thread
//! - session: EventLog, the entry point
//! - log_info: LogInfo for channels and log files
//! - config: ReaderConfig loaded from `evtlog.toml`

#![warn(clippy::all)]

pub mod config;
pub mod format;
pub mod iterator;
pub mod log_info;
pub mod reader;
pub mod record;
pub mod session;

pub use config::{ReaderConfig, CONFIG_FILE_NAME, DEFAULT_BATCH_SIZE, INFINITE_TIMEOUT};
pub use format::{RecordFormatter, SYSTEM_KEYWORD_MASK};
pub use iterator::BatchIterator;
pub use log_info::LogInfo;
pub use reader::{EventReader, Records};
pub use record::{DisplayRecord, EventRecord};
pub use session::EventLog;

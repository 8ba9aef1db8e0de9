//! Publisher metadata for evtlog
//!
//! This crate turns the numeric values carried by records into display
//! strings:
//! - lookup: the five per-publisher tables and their lookup rules
//! - publisher: PublisherMetadata, an open publisher with lazily read tables
//! - event: EventMetadata, resolved event definitions
//! - cache: MetadataCache, the never-evicted publisher cache
//! - format: native formatting with the benign-error downgrade

#![warn(clippy::all)]

pub mod cache;
pub mod event;
pub mod format;
pub mod lookup;
pub mod publisher;

pub use cache::{CachedPublisher, MetadataCache};
pub use event::EventMetadata;
pub use format::{format_or_empty, split_keywords};
pub use lookup::{
    pack_opcode, ChannelRow, KeywordRow, LevelRow, LookupTable, MetadataRow, OpcodeRow, TableRow,
    TaskRow, NO_MESSAGE_ID,
};
pub use publisher::PublisherMetadata;

//! Core types and traits for evtlog
//!
//! This crate defines the foundational types used throughout the system:
//! - TaggedValue / ValueType: self-describing field values and typed access
//! - codec: binary wire format for tagged values
//! - Error: error type hierarchy and platform error codes
//! - Types: Direction, SeekOrigin, BatchStatus, FileTime, SysTime, Sid, SystemField
//! - Handle: RAII guard with an injected release function
//! - LogSource / QueryCursor: the boundary to the log store
//! - testing: MemorySource, an in-process log source

#![warn(clippy::all)]

pub mod codec;
pub mod codes;
pub mod error;
pub mod handle;
pub mod source;
pub mod testing;
pub mod types;
pub mod value;

pub use error::{Error, Result, SystemError};
pub use handle::Handle;
pub use source::{
    EventMetadataField, FetchOutcome, FormatKind, LogInfoField, LogSource, MetadataTable,
    PublisherProperty, QueryCursor, QueryLocator,
};
pub use types::{BatchStatus, Direction, FileTime, Guid, SeekOrigin, Sid, SysTime, SystemField};
pub use value::{
    mask_keyword, AnsiString, HexInt32, HexInt64, RawHandle, SizeT, TaggedValue, ValueType,
    Variant, KEYWORD_RESERVED_MASK,
};

//! In-process log source for tests
//!
//! [`MemorySource`] implements the full [`LogSource`](crate::LogSource)
//! surface over records, publishers and accounts registered at runtime, and
//! can inject the failures a native backend produces: query open errors,
//! fetch errors and stalls, publisher open failures, formatter errors.

mod memory;

pub use memory::{
    CursorOp, MemoryChannelRef, MemoryEntry, MemoryEvent, MemoryPublisher, MemoryRecord,
    MemorySource, Rendering,
};

//! Integration Tests
//!
//! End-to-end tests through the public `evtlog` API, organized by concern:
//! - paging: batches, exhaustion, seeking and tailing
//! - formatting: records rendered through publisher metadata
//! - concurrency: readers on many threads sharing one session and cache
//! - config: reader settings loaded from `evtlog.toml`

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod config;
mod formatting;
mod paging;

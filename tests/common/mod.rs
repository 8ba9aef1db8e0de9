//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;
use std::time::Duration;

pub use evtlog::testing::{MemoryEvent, MemoryPublisher, MemoryRecord, MemorySource, Rendering};
pub use evtlog::{
    BatchStatus, Direction, Error, EventLog, LogSource, MetadataCache, QueryLocator, ReaderConfig,
};

pub const CHANNEL: &str = "Application";
pub const PROVIDER: &str = "Contoso-Backup";

// ============================================================================
// Fixtures
// ============================================================================

/// A publisher with one of everything.
pub fn backup_publisher() -> MemoryPublisher {
    MemoryPublisher::new(PROVIDER)
        .with_publisher_message("Contoso Backup Service")
        .with_channel(CHANNEL, 16, Some("Application"))
        .with_level(2, "win:Error", Some("Error"))
        .with_level(4, "win:Informational", Some("Information"))
        .with_task(1, "Backup", Some("Backup Job"))
        .with_task(2, "Restore", None)
        .with_opcode(1, 0, "win:Start", Some("Start"))
        .with_opcode(2, 0, "win:Stop", Some("Stop"))
        .with_opcode(10, 1, "Snapshot", Some("Volume Snapshot"))
        .with_keyword(0x1, "Disk", Some("Disk I/O"))
        .with_keyword(0x2, "Network", None)
        .with_keyword(0x4, "Cloud", None)
        .with_event(
            MemoryEvent {
                id: 100,
                level: 4,
                task: 1,
                opcode: 1,
                keyword: 0x1,
                ..Default::default()
            },
            Some("Backup of %1 started"),
        )
        .with_event(
            MemoryEvent {
                id: 101,
                level: 2,
                task: 1,
                opcode: 2,
                keyword: 0x3,
                ..Default::default()
            },
            Some("Backup of %1 failed after %2 files"),
        )
}

/// A source with the backup publisher registered and an empty channel.
pub fn backup_source() -> MemorySource {
    let memory = MemorySource::new();
    memory.add_channel(CHANNEL);
    memory.register_publisher(backup_publisher());
    memory
}

/// A session over `memory` with its own metadata cache.
pub fn session(memory: &MemorySource, config: ReaderConfig) -> EventLog {
    let source: Arc<dyn LogSource> = Arc::new(memory.clone());
    EventLog::with_config(source, config)
        .unwrap()
        .with_cache(Arc::new(MetadataCache::new()))
}

/// Reader settings with a bounded fetch timeout, for tests that must not hang.
pub fn bounded_config(batch_size: usize) -> ReaderConfig {
    ReaderConfig {
        batch_size,
        timeout_ms: Some(50),
        failsafe_timeout_ms: Duration::from_secs(10).as_millis() as u64,
        ..ReaderConfig::default()
    }
}

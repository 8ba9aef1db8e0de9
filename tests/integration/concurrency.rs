//! Readers on many threads sharing one session and one metadata cache

use crate::common::*;
use evtlog::CachedPublisher;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn readers_on_many_threads_share_one_publisher() {
    let memory = backup_source();
    for _ in 0..20 {
        memory.append(CHANNEL, MemoryRecord::new(PROVIDER, 100).with_data(["E:\\"]));
    }
    let log = Arc::new(session(&memory, bounded_config(3)));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let log = Arc::clone(&log);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();
                barrier.wait();
                reader
                    .records()
                    .map(|r| r.unwrap().display.message)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for h in handles {
        let messages = h.join().unwrap();
        assert_eq!(messages.len(), 20);
        assert!(messages.iter().all(|m| m == "Backup of E:\\ started"));
    }
    assert_eq!(memory.publisher_open_count(PROVIDER), 1);
    assert_eq!(memory.render_context_count(), 1);
}

#[test]
fn negative_entry_shared_across_threads() {
    let memory = backup_source();
    memory.fail_publisher("Broken-Provider", evtlog::codes::ERROR_MUI_FILE_NOT_LOADED);
    let log = Arc::new(session(&memory, ReaderConfig::default()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let log = Arc::clone(&log);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                log.publisher_metadata("Broken-Provider").is_none()
            })
        })
        .collect();

    assert!(handles.into_iter().all(|h| h.join().unwrap()));
    assert_eq!(memory.publisher_open_count("Broken-Provider"), 1);
    assert!(matches!(
        log.formatter().cache().peek("Broken-Provider"),
        Some(CachedPublisher::Unavailable)
    ));
}

#[test]
fn sessions_without_own_cache_share_the_global_one() {
    let memory = MemorySource::new();
    memory.register_publisher(MemoryPublisher::new("Global-Session-Provider"));
    let source: Arc<dyn LogSource> = Arc::new(memory.clone());

    let first = EventLog::new(Arc::clone(&source));
    let second = EventLog::new(source);
    let a = first.publisher_metadata("Global-Session-Provider").unwrap();
    let b = second.publisher_metadata("Global-Session-Provider").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(memory.publisher_open_count("Global-Session-Provider"), 1);
    assert!(Arc::ptr_eq(
        first.formatter().cache(),
        &MetadataCache::global()
    ));
}

#[test]
fn dropping_readers_stops_their_workers() {
    let memory = backup_source();
    memory.append(CHANNEL, MemoryRecord::new(PROVIDER, 100).with_data(["F:\\"]));
    let log = session(&memory, bounded_config(1));

    for _ in 0..16 {
        let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();
        assert!(reader.next().unwrap());
    }
    // Every reader closed its cursor on drop. The render context and the
    // cached publisher are the only handles left.
    let closes = memory
        .operations()
        .into_iter()
        .filter(|op| matches!(op, evtlog::testing::CursorOp::Close))
        .count();
    assert_eq!(closes, 16);
    assert_eq!(memory.open_handles(), 2);
}

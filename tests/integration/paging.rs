//! Paging through query results

use crate::common::*;
use evtlog::{QueryExecutor, SeekOrigin};
use std::sync::Arc;

fn three_records() -> MemorySource {
    let memory = backup_source();
    for id in [100u16, 101, 100] {
        memory.append(CHANNEL, MemoryRecord::new(PROVIDER, id).with_data(["C:\\", "7"]));
    }
    memory
}

#[test]
fn three_records_in_batches_of_two_at_fetch_level() {
    let memory = three_records();
    let source: Arc<dyn LogSource> = Arc::new(memory.clone());
    let executor = QueryExecutor::new(source).unwrap();
    executor
        .query(QueryLocator::Channel(CHANNEL.into()), "*", Direction::Forward)
        .unwrap();

    let first = executor.next(2, 0).unwrap();
    assert_eq!(first.status(), BatchStatus::Success);
    assert_eq!(first.count(), 2);

    let second = executor.next(2, 0).unwrap();
    assert_eq!(second.status(), BatchStatus::Success);
    assert_eq!(second.count(), 1);

    let third = executor.next(2, 0).unwrap();
    assert_eq!(third.status(), BatchStatus::NoMoreItems);
    assert_eq!(third.count(), 0);
}

#[test]
fn three_records_in_batches_of_two_through_reader() {
    let memory = three_records();
    let log = session(&memory, bounded_config(2));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();

    assert!(reader.next().unwrap());
    assert!(reader.next().unwrap());
    assert!(reader.next().unwrap());
    assert!(!reader.next().unwrap());
    assert_eq!(reader.last_status(), Some(BatchStatus::NoMoreItems));
    assert!(reader.current().is_none());
}

#[test]
fn record_ids_are_in_cursor_order() {
    let memory = three_records();
    let log = session(&memory, bounded_config(2));

    let forward: Vec<u64> = log
        .query_channel(CHANNEL, "*", Direction::Forward)
        .unwrap()
        .records()
        .map(|r| r.unwrap().record_id.unwrap())
        .collect();
    assert_eq!(forward, vec![1, 2, 3]);

    let reverse: Vec<u64> = log
        .query_channel(CHANNEL, "*", Direction::Reverse)
        .unwrap()
        .records()
        .map(|r| r.unwrap().record_id.unwrap())
        .collect();
    assert_eq!(reverse, vec![3, 2, 1]);
}

#[test]
fn seek_mid_batch_refetches() {
    let memory = three_records();
    let log = session(&memory, bounded_config(16));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();

    assert!(reader.next().unwrap());
    assert_eq!(reader.current().unwrap().record_id, Some(1));

    reader.seek(-1, SeekOrigin::FromLast).unwrap();
    assert!(reader.next().unwrap());
    assert_eq!(reader.current().unwrap().record_id, Some(2));
}

#[test]
fn seek_out_of_range_is_an_error_and_reader_survives() {
    let memory = three_records();
    let log = session(&memory, bounded_config(16));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();

    let err = reader.seek(10, SeekOrigin::FromFirst).unwrap_err();
    assert_eq!(err.system_code(), Some(evtlog::codes::ERROR_INVALID_PARAMETER));
    assert_eq!(reader.records().count(), 3);
}

#[test]
fn tailing_a_live_channel() {
    let memory = backup_source();
    memory.set_live(CHANNEL, true);
    let log = session(&memory, bounded_config(4));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();

    assert!(!reader.next().unwrap());
    assert_eq!(reader.last_status(), Some(BatchStatus::Timeout));

    memory.append(CHANNEL, MemoryRecord::new(PROVIDER, 100).with_data(["D:\\"]));
    assert!(reader.next().unwrap());
    assert_eq!(reader.current().unwrap().message(), "Backup of D:\\ started");

    assert!(!reader.next().unwrap());
    assert_eq!(reader.last_status(), Some(BatchStatus::Timeout));
}

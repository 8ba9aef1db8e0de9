//! Reader settings loaded from `evtlog.toml`

use crate::common::*;
use evtlog::testing::CursorOp;
use evtlog::CONFIG_FILE_NAME;
use tempfile::TempDir;

#[test]
fn batch_size_from_config_file_reaches_the_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "batch_size = 5\ntimeout_ms = 20\n").unwrap();
    let config = ReaderConfig::from_file(&path).unwrap();

    let memory = backup_source();
    for _ in 0..7 {
        memory.append(CHANNEL, MemoryRecord::new(PROVIDER, 100));
    }
    let log = session(&memory, config);
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();
    assert_eq!(reader.records().count(), 7);

    let fetches: Vec<(usize, u32)> = memory
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            CursorOp::Fetch { max, timeout_ms } => Some((max, timeout_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(fetches, vec![(5, 20), (5, 20), (5, 20)]);
}

#[test]
fn default_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    ReaderConfig::write_default_if_missing(&path).unwrap();

    let config = ReaderConfig::from_file(&path).unwrap();
    assert_eq!(config, ReaderConfig::default());
    assert_eq!(config.fetch_timeout_ms(), evtlog::INFINITE_TIMEOUT);
}

#[test]
fn invalid_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "queue_capacity = 0\n").unwrap();
    assert!(matches!(
        ReaderConfig::from_file(&path),
        Err(Error::Config { .. })
    ));
}

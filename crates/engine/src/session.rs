//! Event log session
//!
//! `EventLog` is the entry point: it holds the log source, the metadata
//! cache and one shared [`RecordFormatter`], and opens readers.
//!
//! # Example
//!
//! ```ignore
//! use evtlog_engine::EventLog;
//! use evtlog_core::Direction;
//!
//! let log = EventLog::new(source);
//! let mut reader = log.query_channel("Application", "*", Direction::Forward)?;
//! while reader.next()? {
//!     println!("{}", reader.current().unwrap().message());
//! }
//! ```

use crate::config::ReaderConfig;
use crate::format::RecordFormatter;
use crate::log_info::LogInfo;
use crate::reader::EventReader;
use evtlog_core::{Direction, LogSource, QueryLocator, Result};
use evtlog_metadata::{MetadataCache, PublisherMetadata};
use std::path::Path;
use std::sync::Arc;

/// A session against one log source.
pub struct EventLog {
    source: Arc<dyn LogSource>,
    formatter: Arc<RecordFormatter>,
    config: ReaderConfig,
}

impl EventLog {
    /// Open a session with default settings and the process-wide cache.
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        let formatter = Arc::new(RecordFormatter::new(Arc::clone(&source)));
        Self {
            source,
            formatter,
            config: ReaderConfig::default(),
        }
    }

    /// Open a session whose readers use `config`.
    pub fn with_config(source: Arc<dyn LogSource>, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(source)
        })
    }

    /// Use `cache` instead of the process-wide metadata cache.
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.formatter = Arc::new(RecordFormatter::with_cache(Arc::clone(&self.source), cache));
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn LogSource> {
        &self.source
    }

    pub fn formatter(&self) -> &Arc<RecordFormatter> {
        &self.formatter
    }

    /// Names of every channel.
    pub fn channels(&self) -> Result<Vec<String>> {
        self.source.channel_names()
    }

    /// Names of every registered publisher.
    pub fn publishers(&self) -> Result<Vec<String>> {
        self.source.publisher_names()
    }

    /// Cached metadata of `publisher`; `None` when it cannot be opened.
    pub fn publisher_metadata(&self, publisher: &str) -> Option<Arc<PublisherMetadata>> {
        self.formatter.cache().lookup(&self.source, publisher)
    }

    /// Log information of a channel.
    pub fn channel_info(&self, channel: &str) -> Result<LogInfo> {
        LogInfo::read(self.source.as_ref(), &QueryLocator::Channel(channel.to_string()))
    }

    /// Log information of an exported log file.
    pub fn file_info(&self, path: &Path) -> Result<LogInfo> {
        LogInfo::read(self.source.as_ref(), &QueryLocator::File(path.to_path_buf()))
    }

    /// Query a channel with an XPath filter.
    pub fn query_channel(
        &self,
        channel: &str,
        query: &str,
        direction: Direction,
    ) -> Result<EventReader> {
        self.open_reader(QueryLocator::Channel(channel.to_string()), query, direction)
    }

    /// Query an exported log file with an XPath filter.
    pub fn query_file(&self, path: &Path, query: &str, direction: Direction) -> Result<EventReader> {
        self.open_reader(QueryLocator::File(path.to_path_buf()), query, direction)
    }

    /// Query with a full structured query document.
    pub fn query_structured(&self, query: &str, direction: Direction) -> Result<EventReader> {
        self.open_reader(QueryLocator::Structured, query, direction)
    }

    fn open_reader(
        &self,
        locator: QueryLocator,
        query: &str,
        direction: Direction,
    ) -> Result<EventReader> {
        EventReader::open(
            Arc::clone(&self.source),
            Arc::clone(&self.formatter),
            &self.config,
            locator,
            query,
            direction,
        )
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("formatter", &self.formatter)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evtlog_core::testing::{MemoryPublisher, MemoryRecord, MemorySource};
    use evtlog_core::{codes, BatchStatus, Error, SeekOrigin};
    use std::time::Duration;

    fn session() -> (MemorySource, EventLog) {
        let memory = MemorySource::new();
        memory.register_publisher(MemoryPublisher::new("Demo-Provider"));
        for id in 1..=5 {
            memory.append("Application", MemoryRecord::new("Demo-Provider", id));
        }
        memory.add_channel("System");
        let source: Arc<dyn LogSource> = Arc::new(memory.clone());
        let log = EventLog::new(source).with_cache(Arc::new(MetadataCache::new()));
        (memory, log)
    }

    #[test]
    fn test_enumeration() {
        let (_, log) = session();
        assert_eq!(log.channels().unwrap(), vec!["Application", "System"]);
        assert_eq!(log.publishers().unwrap(), vec!["Demo-Provider"]);
    }

    #[test]
    fn test_publisher_metadata_is_cached() {
        let (memory, log) = session();
        let a = log.publisher_metadata("Demo-Provider").unwrap();
        let b = log.publisher_metadata("Demo-Provider").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memory.publisher_open_count("Demo-Provider"), 1);
        assert!(log.publisher_metadata("Nobody").is_none());
    }

    #[test]
    fn test_reverse_query() {
        let (_, log) = session();
        let mut reader = log
            .query_channel("Application", "*", Direction::Reverse)
            .unwrap();
        let ids: Vec<u16> = reader
            .records()
            .map(|r| r.unwrap().event_id.unwrap())
            .collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_reader_seek_from_last() {
        let (_, log) = session();
        let mut reader = log
            .query_channel("Application", "*", Direction::Forward)
            .unwrap();
        reader.seek(0, SeekOrigin::FromLast).unwrap();
        assert!(reader.next().unwrap());
        assert_eq!(reader.current().unwrap().event_id, Some(5));
        assert!(!reader.next().unwrap());
        assert_eq!(reader.last_status(), Some(BatchStatus::NoMoreItems));
    }

    #[test]
    fn test_reader_timeout_settings() {
        let (_, log) = session();
        let mut reader = log.query_channel("System", "*", Direction::Forward).unwrap();
        assert_eq!(reader.timeout(), None);
        reader.set_timeout(Some(Duration::from_millis(25)));
        assert_eq!(reader.timeout(), Some(Duration::from_millis(25)));
        reader.set_batch_size(4).unwrap();
        assert_eq!(reader.batch_size(), 4);
    }

    #[test]
    fn test_query_unknown_channel_fails() {
        let (_, log) = session();
        let err = log
            .query_channel("Missing", "*", Direction::Forward)
            .unwrap_err();
        assert_eq!(err.system_code(), Some(codes::ERROR_EVT_CHANNEL_NOT_FOUND));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let memory = MemorySource::new();
        let config = ReaderConfig {
            batch_size: 0,
            ..ReaderConfig::default()
        };
        let err = EventLog::with_config(Arc::new(memory), config).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_structured_query() {
        let (memory, log) = session();
        memory.append("System", MemoryRecord::new("Kernel", 42));
        let query = r#"<QueryList><Query Id="0"><Select Path="System">*</Select></Query></QueryList>"#;
        let mut reader = log.query_structured(query, Direction::Forward).unwrap();
        assert!(reader.next().unwrap());
        assert_eq!(reader.current().unwrap().event_id, Some(42));
    }

    #[test]
    fn test_file_query_and_info() {
        let (memory, log) = session();
        let path = Path::new("/exports/app.evtx");
        memory.add_file(
            path,
            vec![MemoryRecord::new("Demo-Provider", 7), MemoryRecord::new("Demo-Provider", 8)],
        );
        let mut reader = log.query_file(path, "*", Direction::Forward).unwrap();
        let count = reader.records().count();
        assert_eq!(count, 2);
        assert_eq!(log.file_info(path).unwrap().record_count, Some(2));
        assert_eq!(log.channel_info("Application").unwrap().record_count, Some(5));
    }
}

//! Rendered records
//!
//! An [`EventRecord`] is everything evtlog can say about one record: the
//! decoded system fields plus the [`DisplayRecord`] strings. Absent fields
//! are `None`, never an error.

use chrono::{DateTime, Utc};
use evtlog_core::{FileTime, Guid, Sid};
use serde::{Deserialize, Serialize};

/// Display strings of one record.
///
/// Each string is empty when no message is available for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRecord {
    /// The event message with its inserts applied
    pub message: String,
    pub level: String,
    pub task: String,
    pub opcode: String,
    /// One entry per keyword bit set on the record
    pub keywords: Vec<String>,
    pub channel: String,
    pub provider: String,
}

/// A record with its system fields decoded and its display strings resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub provider_name: Option<String>,
    pub provider_guid: Option<Guid>,
    pub event_id: Option<u16>,
    pub qualifiers: Option<u16>,
    pub level: Option<u8>,
    pub task: Option<u16>,
    pub opcode: Option<u8>,
    /// Keyword mask with the top 16 bits cleared
    pub keywords: Option<u64>,
    pub time_created: Option<FileTime>,
    pub record_id: Option<u64>,
    pub activity_id: Option<Guid>,
    pub related_activity_id: Option<Guid>,
    pub process_id: Option<u32>,
    pub thread_id: Option<u32>,
    pub channel: Option<String>,
    pub computer: Option<String>,
    pub user_sid: Option<Sid>,
    /// Account name of `user_sid`, when the account is known
    pub user: Option<String>,
    pub version: Option<u8>,
    pub display: DisplayRecord,
}

impl EventRecord {
    /// Creation time as a UTC date-time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.time_created.and_then(|t| t.to_datetime())
    }

    /// The event message, empty when none is available.
    pub fn message(&self) -> &str {
        &self.display.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = EventRecord {
            time_created: Some(FileTime::from_datetime(dt)),
            ..Default::default()
        };
        assert_eq!(record.timestamp(), Some(dt));
        assert_eq!(EventRecord::default().timestamp(), None);
    }
}

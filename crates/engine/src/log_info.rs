//! Log information of a channel or exported log file

use evtlog_core::{FileTime, LogInfoField, LogSource, QueryLocator, Result};
use serde::{Deserialize, Serialize};

/// Size, timestamps and record counts of one log.
///
/// Every field is optional: a source may not know a value, and an empty log
/// has no oldest record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInfo {
    pub creation_time: Option<FileTime>,
    pub last_access_time: Option<FileTime>,
    pub last_write_time: Option<FileTime>,
    /// Size in bytes
    pub file_size: Option<u64>,
    /// File attribute bits
    pub attributes: Option<u32>,
    pub record_count: Option<u64>,
    pub oldest_record_number: Option<u64>,
    /// Whether the log reached its maximum size
    pub full: Option<bool>,
}

impl LogInfo {
    /// Read the log information of a channel or file.
    pub fn read(source: &dyn LogSource, locator: &QueryLocator) -> Result<Self> {
        let log = source.open_log(locator)?;
        let read = |field| source.log_property(&log, field);
        Ok(LogInfo {
            creation_time: read(LogInfoField::CreationTime)?.get_maybe()?,
            last_access_time: read(LogInfoField::LastAccessTime)?.get_maybe()?,
            last_write_time: read(LogInfoField::LastWriteTime)?.get_maybe()?,
            file_size: read(LogInfoField::FileSize)?.get_maybe()?,
            attributes: read(LogInfoField::Attributes)?.get_maybe()?,
            record_count: read(LogInfoField::NumberOfLogRecords)?.get_maybe()?,
            oldest_record_number: read(LogInfoField::OldestRecordNumber)?.get_maybe()?,
            full: read(LogInfoField::Full)?.get_maybe()?,
        })
    }
}

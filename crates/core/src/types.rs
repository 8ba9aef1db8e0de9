//! Core types for evtlog
//!
//! This module defines the small value types that flow through the query
//! and rendering pipeline:
//! - Direction / SeekOrigin: cursor positioning
//! - BatchStatus: outcome of a batch fetch
//! - FileTime / SysTime: the two native time encodings
//! - Sid: binary security identifier
//! - SystemField: fixed indices of the rendered system field array

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier type for publishers, activities and task event GUIDs.
pub type Guid = uuid::Uuid;

/// Order in which a query returns records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    /// Oldest record first
    #[default]
    Forward,
    /// Newest record first
    Reverse,
}

/// Anchor for a cursor seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeekOrigin {
    /// Offset from the first record of the result set
    FromFirst,
    /// Offset from the last record of the result set
    FromLast,
    /// Offset from the current cursor position
    FromCurrent,
}

/// Outcome of one fetch against a cursor.
///
/// `Timeout` is the caller's own "no data within the window" answer and is
/// never reported as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    /// At least one record was returned
    Success,
    /// The result set is exhausted
    NoMoreItems,
    /// Nothing arrived before the caller-supplied timeout
    Timeout,
}

impl BatchStatus {
    /// True only for [`BatchStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, BatchStatus::Success)
    }
}

/// Ticks between 1601-01-01 and 1970-01-01, in 100 ns units.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Native timestamp: 100-nanosecond ticks since 1601-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileTime(pub u64);

impl FileTime {
    /// Raw tick count
    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Convert to a UTC date-time.
    ///
    /// Returns `None` for instants before the Unix epoch or beyond chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let since_unix = self.0.checked_sub(FILETIME_UNIX_EPOCH)?;
        let secs = i64::try_from(since_unix / TICKS_PER_SECOND).ok()?;
        let nanos = ((since_unix % TICKS_PER_SECOND) * 100) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }

    /// Convert from a UTC date-time. Instants before 1601 clamp to zero.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp();
        let sub_ticks = u64::from(dt.timestamp_subsec_nanos() / 100);
        let ticks = if secs >= 0 {
            FILETIME_UNIX_EPOCH
                .saturating_add((secs as u64).saturating_mul(TICKS_PER_SECOND))
                .saturating_add(sub_ticks)
        } else {
            FILETIME_UNIX_EPOCH
                .saturating_sub(secs.unsigned_abs().saturating_mul(TICKS_PER_SECOND))
                .saturating_add(sub_ticks)
        };
        FileTime(ticks)
    }
}

/// Broken-down calendar time as the native SYSTEMTIME layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SysTime {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub milliseconds: u16,
}

impl fmt::Display for SysTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.milliseconds
        )
    }
}

/// Binary security identifier.
///
/// Layout: revision (1 byte), sub-authority count (1 byte), identifier
/// authority (6 bytes, big-endian), then `count` little-endian u32
/// sub-authorities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sid(Vec<u8>);

impl Sid {
    /// Wrap raw SID bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Sid(bytes)
    }

    /// Raw SID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the `S-R-I-S-S...` string form.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.strip_prefix("S-")?.split('-');
        let revision: u8 = parts.next()?.parse().ok()?;
        let authority: u64 = parts.next()?.parse().ok()?;
        let subs = parts
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        if subs.len() > u8::MAX as usize || authority >= 1 << 48 {
            return None;
        }
        let mut bytes = Vec::with_capacity(8 + subs.len() * 4);
        bytes.push(revision);
        bytes.push(subs.len() as u8);
        bytes.extend_from_slice(&authority.to_be_bytes()[2..]);
        for sub in subs {
            bytes.extend_from_slice(&sub.to_le_bytes());
        }
        Some(Sid(bytes))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        if b.len() < 8 {
            return write!(f, "S-?");
        }
        let mut authority = [0u8; 8];
        authority[2..].copy_from_slice(&b[2..8]);
        write!(f, "S-{}-{}", b[0], u64::from_be_bytes(authority))?;
        for chunk in b[8..].chunks_exact(4).take(b[1] as usize) {
            let sub = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

/// Fixed indices into the array returned by
/// [`LogSource::render_system_fields`](crate::LogSource::render_system_fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SystemField {
    ProviderName = 0,
    ProviderGuid,
    EventId,
    Qualifiers,
    Level,
    Task,
    Opcode,
    Keywords,
    TimeCreated,
    EventRecordId,
    ActivityId,
    RelatedActivityId,
    ProcessId,
    ThreadId,
    Channel,
    Computer,
    UserId,
    Version,
}

impl SystemField {
    /// Number of system fields a render produces.
    pub const COUNT: usize = 18;

    /// Position of this field in the rendered array
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

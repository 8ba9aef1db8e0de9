//! The log source boundary
//!
//! Everything evtlog knows about the underlying log store and its native
//! message formatter goes through two traits:
//!
//! - [`LogSource`]: the process-wide service. Opens cursors, renders record
//!   fields, reads publisher metadata and formats messages. Shared across
//!   threads.
//! - [`QueryCursor`]: one open, position-tracked query. Thread-affine: it is
//!   created on the executor's worker thread and never leaves it.
//!
//! Record and metadata handles cross the boundary as [`Handle`] guards; the
//! source decides what dropping one does.

use crate::error::Result;
use crate::handle::Handle;
use crate::types::{BatchStatus, Direction, SeekOrigin, Sid};
use crate::value::TaggedValue;
use std::path::PathBuf;

/// What a query reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryLocator {
    /// A named channel; the query text is an XPath filter
    Channel(String),
    /// An exported log file; the query text is an XPath filter
    File(PathBuf),
    /// No path; the query text is a full structured query document
    Structured,
}

/// Records returned by one fetch.
///
/// Record handles are only valid while this batch is alive.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Outcome of the fetch
    pub status: BatchStatus,
    /// Record handles in cursor order; empty unless `status` is `Success`
    pub records: Vec<Handle>,
}

impl FetchOutcome {
    /// A successful fetch
    pub fn success(records: Vec<Handle>) -> Self {
        Self {
            status: BatchStatus::Success,
            records,
        }
    }

    /// A fetch that found the result set exhausted
    pub fn no_more_items() -> Self {
        Self {
            status: BatchStatus::NoMoreItems,
            records: Vec::new(),
        }
    }

    /// A fetch that gave up after the caller's timeout
    pub fn timed_out() -> Self {
        Self {
            status: BatchStatus::Timeout,
            records: Vec::new(),
        }
    }
}

/// Object-array tables of a publisher's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTable {
    Channels,
    Levels,
    Tasks,
    Opcodes,
    Keywords,
}

/// Properties readable from a publisher metadata handle.
///
/// The table properties need a row index; the scalar ones take none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherProperty {
    /// `Guid`
    PublisherGuid,
    /// `String`
    ResourceFilePath,
    /// `String`
    ParameterFilePath,
    /// `String`
    MessageFilePath,
    /// `String`
    HelpLink,
    /// `UInt32`, `u32::MAX` when absent
    PublisherMessageId,
    /// `String`
    ChannelReferencePath,
    /// `UInt32`
    ChannelReferenceIndex,
    /// `UInt32`
    ChannelReferenceId,
    /// `UInt32`
    ChannelReferenceFlags,
    /// `UInt32`
    ChannelReferenceMessageId,
    /// `String`
    LevelName,
    /// `UInt32`
    LevelValue,
    /// `UInt32`
    LevelMessageId,
    /// `String`
    TaskName,
    /// `Guid`
    TaskEventGuid,
    /// `UInt32`
    TaskValue,
    /// `UInt32`
    TaskMessageId,
    /// `String`
    OpcodeName,
    /// `UInt32`, opcode in the high word and task in the low word
    OpcodeValue,
    /// `UInt32`
    OpcodeMessageId,
    /// `String`
    KeywordName,
    /// `UInt64`
    KeywordValue,
    /// `UInt32`
    KeywordMessageId,
}

impl PublisherProperty {
    /// The table this property indexes into, if any.
    pub fn table(self) -> Option<MetadataTable> {
        use PublisherProperty::*;
        match self {
            ChannelReferencePath
            | ChannelReferenceIndex
            | ChannelReferenceId
            | ChannelReferenceFlags
            | ChannelReferenceMessageId => Some(MetadataTable::Channels),
            LevelName | LevelValue | LevelMessageId => Some(MetadataTable::Levels),
            TaskName | TaskEventGuid | TaskValue | TaskMessageId => Some(MetadataTable::Tasks),
            OpcodeName | OpcodeValue | OpcodeMessageId => Some(MetadataTable::Opcodes),
            KeywordName | KeywordValue | KeywordMessageId => Some(MetadataTable::Keywords),
            PublisherGuid | ResourceFilePath | ParameterFilePath | MessageFilePath | HelpLink
            | PublisherMessageId => None,
        }
    }
}

/// Properties of one event definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventMetadataField {
    /// `UInt32`
    Id,
    /// `UInt32`
    Version,
    /// `UInt32`
    Channel,
    /// `UInt32`
    Level,
    /// `UInt32`
    Opcode,
    /// `UInt32`
    Task,
    /// `UInt64`
    Keyword,
    /// `UInt32`, `u32::MAX` when absent
    MessageId,
    /// `String`
    Template,
}

/// Properties of an open log (channel or file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogInfoField {
    /// `FileTime`
    CreationTime,
    /// `FileTime`
    LastAccessTime,
    /// `FileTime`
    LastWriteTime,
    /// `UInt64`
    FileSize,
    /// `UInt32`
    Attributes,
    /// `UInt64`
    NumberOfLogRecords,
    /// `UInt64`
    OldestRecordNumber,
    /// `Boolean`
    Full,
}

/// Which display string the native formatter should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// The event message with its inserts applied
    Event,
    Level,
    Task,
    Opcode,
    /// Every matching keyword, NUL separated
    Keyword,
    Channel,
    Provider,
    /// A message looked up by id only
    Id,
}

/// One open query against the log store.
///
/// Only ever touched by the thread that opened it.
pub trait QueryCursor {
    /// Fetch up to `max` records, waiting at most `timeout_ms` for data.
    ///
    /// Running out of records or time is reported through the outcome
    /// status, not as an error.
    fn next_batch(&mut self, max: usize, timeout_ms: u32) -> Result<FetchOutcome>;

    /// Reposition the cursor.
    fn seek(&mut self, position: i64, origin: SeekOrigin) -> Result<()>;

    /// Release the cursor. No other call is made afterwards.
    fn close(&mut self) -> Result<()>;
}

/// The log store and its native formatting service.
pub trait LogSource: Send + Sync {
    /// Open a query cursor. Called on the thread that will own the cursor.
    fn open_query(
        &self,
        locator: &QueryLocator,
        query: &str,
        direction: Direction,
    ) -> Result<Box<dyn QueryCursor>>;

    /// Create a context that renders the system field set.
    ///
    /// The context holds no per-record state and may be reused for every
    /// record from this source.
    fn create_render_context(&self) -> Result<Handle>;

    /// Render the fixed system field set of a record, indexed by
    /// [`SystemField`](crate::types::SystemField).
    fn render_system_fields(&self, context: &Handle, record: &Handle) -> Result<Vec<TaggedValue>>;

    /// Open the metadata of a publisher by name.
    fn open_publisher_metadata(&self, publisher: &str) -> Result<Handle>;

    /// Read a metadata property. Table properties take the row index.
    fn metadata_property(
        &self,
        metadata: &Handle,
        property: PublisherProperty,
        index: Option<u32>,
    ) -> Result<TaggedValue>;

    /// Number of rows in one of the metadata tables.
    fn metadata_array_len(&self, metadata: &Handle, table: MetadataTable) -> Result<u32>;

    /// Handles to every event definition of a publisher.
    fn event_metadata(&self, metadata: &Handle) -> Result<Vec<Handle>>;

    /// Read one property of an event definition.
    fn event_metadata_property(
        &self,
        event: &Handle,
        field: EventMetadataField,
    ) -> Result<TaggedValue>;

    /// Produce a display string through the native formatter.
    ///
    /// Without `metadata` the source formats the record on its own.
    fn format_message(
        &self,
        metadata: Option<&Handle>,
        record: Option<&Handle>,
        message_id: Option<u32>,
        kind: FormatKind,
    ) -> Result<String>;

    /// Resolve a SID to `DOMAIN\name`; `None` when the account is unknown.
    fn lookup_account(&self, sid: &Sid) -> Result<Option<String>>;

    /// Names of every channel.
    fn channel_names(&self) -> Result<Vec<String>>;

    /// Names of every registered publisher.
    fn publisher_names(&self) -> Result<Vec<String>>;

    /// Open a channel or log file for its log information.
    fn open_log(&self, locator: &QueryLocator) -> Result<Handle>;

    /// Read one log information property.
    fn log_property(&self, log: &Handle, field: LogInfoField) -> Result<TaggedValue>;
}

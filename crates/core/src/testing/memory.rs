//! MemorySource: records, publishers and failure injection

use crate::codes;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::source::{
    EventMetadataField, FetchOutcome, FormatKind, LogInfoField, LogSource, MetadataTable,
    PublisherProperty, QueryCursor, QueryLocator,
};
use crate::types::{Direction, FileTime, Guid, SeekOrigin, Sid, SystemField};
use crate::value::{mask_keyword, TaggedValue};
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::debug;

const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x20;
const LOG_HEADER_BYTES: u64 = 4096;
const RECORD_OVERHEAD_BYTES: u64 = 256;

// ============================================================================
// Records
// ============================================================================

/// Display strings a record carries with it, used when the source formats a
/// record without publisher metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendering {
    pub message: Option<String>,
    pub level: Option<String>,
    pub task: Option<String>,
    pub opcode: Option<String>,
    pub keywords: Vec<String>,
    pub channel: Option<String>,
    pub provider: Option<String>,
}

/// One record in a memory channel or file.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    pub provider: Option<String>,
    pub provider_guid: Option<Guid>,
    pub event_id: u16,
    pub qualifiers: Option<u16>,
    pub level: u8,
    pub task: u16,
    pub opcode: u8,
    pub keywords: u64,
    pub time_created: Option<FileTime>,
    pub activity_id: Option<Guid>,
    pub related_activity_id: Option<Guid>,
    pub process_id: u32,
    pub thread_id: u32,
    pub computer: String,
    pub user: Option<Sid>,
    pub version: u8,
    /// Insert strings for the event message (`%1`, `%2`, ...)
    pub data: Vec<String>,
    /// Pre-rendered display strings
    pub rendering: Option<Rendering>,
    /// Rendered fields replaced verbatim after rendering
    pub overrides: Vec<(SystemField, TaggedValue)>,
    channel: String,
    record_id: u64,
}

impl MemoryRecord {
    /// A record raised by `provider`.
    pub fn new(provider: &str, event_id: u16) -> Self {
        Self {
            provider: Some(provider.to_string()),
            event_id,
            computer: "localhost".to_string(),
            ..Default::default()
        }
    }

    /// A record with no provider name.
    pub fn anonymous(event_id: u16) -> Self {
        Self {
            event_id,
            computer: "localhost".to_string(),
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_task(mut self, task: u16) -> Self {
        self.task = task;
        self
    }

    pub fn with_opcode(mut self, opcode: u8) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn with_keywords(mut self, keywords: u64) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn with_user(mut self, sid: Sid) -> Self {
        self.user = Some(sid);
        self
    }

    pub fn with_time_created(mut self, time: FileTime) -> Self {
        self.time_created = Some(time);
        self
    }

    pub fn with_data<I, S>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data = data.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rendering(mut self, rendering: Rendering) -> Self {
        self.rendering = Some(rendering);
        self
    }

    /// Channel name reported for records stored in a log file.
    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    /// Replace one rendered system field with `value`.
    pub fn with_override(mut self, field: SystemField, value: TaggedValue) -> Self {
        self.overrides.push((field, value));
        self
    }

    /// Record number assigned when the record was appended
    pub fn record_id(&self) -> u64 {
        self.record_id
    }
}

// ============================================================================
// Publishers
// ============================================================================

/// A channel referenced by a publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryChannelRef {
    pub path: String,
    pub index: u32,
    pub id: u32,
    pub flags: u32,
    pub message_id: Option<u32>,
}

/// A row of the level, task, opcode or keyword table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEntry {
    pub value: u64,
    pub name: Option<String>,
    pub message_id: Option<u32>,
    pub event_guid: Option<Guid>,
}

/// An event definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEvent {
    pub id: u32,
    pub version: u32,
    pub channel: u32,
    pub level: u32,
    pub opcode: u32,
    pub task: u32,
    pub keyword: u64,
    pub message_id: Option<u32>,
    pub template: Option<String>,
}

/// Publisher metadata served by a [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    pub name: String,
    pub guid: Option<Guid>,
    pub resource_file_path: Option<String>,
    pub parameter_file_path: Option<String>,
    pub message_file_path: Option<String>,
    pub help_link: Option<String>,
    pub message_id: Option<u32>,
    pub channels: Vec<MemoryChannelRef>,
    pub levels: Vec<MemoryEntry>,
    pub tasks: Vec<MemoryEntry>,
    pub opcodes: Vec<MemoryEntry>,
    pub keywords: Vec<MemoryEntry>,
    pub events: Vec<MemoryEvent>,
    pub messages: BTreeMap<u32, String>,
}

impl MemoryPublisher {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Store `text` in the message table under a fresh id.
    pub fn add_message(&mut self, text: &str) -> u32 {
        let id = self
            .messages
            .keys()
            .next_back()
            .map_or(0x1000, |last| last.saturating_add(1));
        self.messages.insert(id, text.to_string());
        id
    }

    fn optional_message(&mut self, text: Option<&str>) -> Option<u32> {
        text.map(|t| self.add_message(t))
    }

    pub fn with_guid(mut self, guid: Guid) -> Self {
        self.guid = Some(guid);
        self
    }

    pub fn with_publisher_message(mut self, text: &str) -> Self {
        self.message_id = Some(self.add_message(text));
        self
    }

    pub fn with_channel(mut self, path: &str, id: u32, message: Option<&str>) -> Self {
        let message_id = self.optional_message(message);
        let index = self.channels.len() as u32;
        self.channels.push(MemoryChannelRef {
            path: path.to_string(),
            index,
            id,
            flags: 0,
            message_id,
        });
        self
    }

    pub fn with_level(mut self, value: u8, name: &str, message: Option<&str>) -> Self {
        let message_id = self.optional_message(message);
        self.levels.push(entry(u64::from(value), name, message_id));
        self
    }

    pub fn with_task(mut self, value: u16, name: &str, message: Option<&str>) -> Self {
        let message_id = self.optional_message(message);
        self.tasks.push(entry(u64::from(value), name, message_id));
        self
    }

    /// Opcode row keyed by `(opcode, task)`; task 0 registers a global opcode.
    pub fn with_opcode(mut self, opcode: u8, task: u16, name: &str, message: Option<&str>) -> Self {
        let message_id = self.optional_message(message);
        let packed = (u64::from(opcode) << 16) | u64::from(task);
        self.opcodes.push(entry(packed, name, message_id));
        self
    }

    pub fn with_keyword(mut self, mask: u64, name: &str, message: Option<&str>) -> Self {
        let message_id = self.optional_message(message);
        self.keywords.push(entry(mask, name, message_id));
        self
    }

    pub fn with_event(mut self, mut event: MemoryEvent, message: Option<&str>) -> Self {
        if let Some(text) = message {
            event.message_id = Some(self.add_message(text));
        }
        self.events.push(event);
        self
    }

    fn text_for(&self, message_id: Option<u32>, name: Option<&str>) -> Result<String> {
        if let Some(text) = message_id.and_then(|id| self.messages.get(&id)) {
            return Ok(text.clone());
        }
        name.map(str::to_string)
            .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))
    }

    fn table(&self, table: MetadataTable) -> usize {
        match table {
            MetadataTable::Channels => self.channels.len(),
            MetadataTable::Levels => self.levels.len(),
            MetadataTable::Tasks => self.tasks.len(),
            MetadataTable::Opcodes => self.opcodes.len(),
            MetadataTable::Keywords => self.keywords.len(),
        }
    }
}

fn entry(value: u64, name: &str, message_id: Option<u32>) -> MemoryEntry {
    MemoryEntry {
        value,
        name: Some(name.to_string()),
        message_id,
        event_guid: None,
    }
}

// ============================================================================
// Source state
// ============================================================================

/// A cursor operation as observed by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorOp {
    Open {
        locator: QueryLocator,
        query: String,
        direction: Direction,
    },
    Fetch {
        max: usize,
        timeout_ms: u32,
    },
    Seek {
        position: i64,
        origin: SeekOrigin,
    },
    Close,
}

#[derive(Debug, Clone)]
struct LogStats {
    created: FileTime,
    last_access: FileTime,
    last_write: FileTime,
    size: u64,
    records: u64,
    oldest: Option<u64>,
    full: bool,
}

#[derive(Debug)]
struct RecordLog {
    records: Vec<Arc<MemoryRecord>>,
    live: bool,
    full: bool,
    created: FileTime,
    last_write: FileTime,
    next_record_id: u64,
}

impl RecordLog {
    fn new() -> Self {
        let now = FileTime::from_datetime(Utc::now());
        Self {
            records: Vec::new(),
            live: false,
            full: false,
            created: now,
            last_write: now,
            next_record_id: 1,
        }
    }

    fn push(&mut self, mut record: MemoryRecord, channel: &str) -> u64 {
        let id = self.next_record_id;
        self.next_record_id += 1;
        record.record_id = id;
        if record.channel.is_empty() {
            record.channel = channel.to_string();
        }
        self.records.push(Arc::new(record));
        self.last_write = FileTime::from_datetime(Utc::now());
        id
    }

    fn stats(&self) -> LogStats {
        let size = self.records.iter().fold(LOG_HEADER_BYTES, |acc, r| {
            acc + RECORD_OVERHEAD_BYTES + r.data.iter().map(|d| d.len() as u64).sum::<u64>()
        });
        LogStats {
            created: self.created,
            last_access: FileTime::from_datetime(Utc::now()),
            last_write: self.last_write,
            size,
            records: self.records.len() as u64,
            oldest: self.records.first().map(|r| r.record_id),
            full: self.full,
        }
    }
}

#[derive(Debug, Clone)]
enum Object {
    Record(Arc<MemoryRecord>),
    Publisher(Arc<MemoryPublisher>),
    Event(Arc<MemoryPublisher>, usize),
    Log(LogStats),
    RenderContext,
}

#[derive(Debug, Default)]
struct Faults {
    open_query: Option<u32>,
    fetch: Option<u32>,
    fetch_delay: Option<Duration>,
    render: Option<u32>,
    metadata_tables: Option<u32>,
    publisher_open: HashMap<String, u32>,
    format: HashMap<FormatKind, u32>,
}

#[derive(Debug, Default)]
struct State {
    channels: BTreeMap<String, RecordLog>,
    files: BTreeMap<PathBuf, RecordLog>,
    publishers: BTreeMap<String, Arc<MemoryPublisher>>,
    accounts: HashMap<Sid, String>,
    objects: HashMap<u64, Object>,
    next_handle: u64,
    faults: Faults,
    ops: Vec<(CursorOp, ThreadId)>,
    publisher_opens: HashMap<String, usize>,
    render_contexts: usize,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    appended: Condvar,
    active_ops: AtomicUsize,
    max_active_ops: AtomicUsize,
}

impl Inner {
    fn register(self: &Arc<Self>, state: &mut State, object: Object) -> Handle {
        state.next_handle += 1;
        let raw = state.next_handle;
        state.objects.insert(raw, object);
        let weak: Weak<Inner> = Arc::downgrade(self);
        Handle::owned(raw, move |raw| {
            if let Some(inner) = weak.upgrade() {
                inner.state.lock().objects.remove(&raw);
            }
        })
    }

    fn begin(&self, op: CursorOp) -> OpGuard<'_> {
        let active = self.active_ops.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_ops.fetch_max(active, Ordering::SeqCst);
        self.state
            .lock()
            .ops
            .push((op, std::thread::current().id()));
        OpGuard { inner: self }
    }
}

struct OpGuard<'a> {
    inner: &'a Inner,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.inner.active_ops.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// MemorySource
// ============================================================================

/// A complete log source held in memory.
///
/// Query filter text is recorded but not evaluated: a query returns every
/// record of its channel or file.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Inner>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty channel.
    pub fn add_channel(&self, name: &str) {
        self.inner
            .state
            .lock()
            .channels
            .entry(name.to_string())
            .or_insert_with(RecordLog::new);
    }

    /// Append a record to `channel`, creating the channel if needed.
    ///
    /// Wakes cursors waiting on a live channel. Returns the record number.
    pub fn append(&self, channel: &str, record: MemoryRecord) -> u64 {
        let id = {
            let mut state = self.inner.state.lock();
            state
                .channels
                .entry(channel.to_string())
                .or_insert_with(RecordLog::new)
                .push(record, channel)
        };
        self.inner.appended.notify_all();
        id
    }

    /// Register an exported log file holding `records`.
    pub fn add_file(&self, path: impl AsRef<Path>, records: Vec<MemoryRecord>) {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut log = RecordLog::new();
        for record in records {
            log.push(record, &stem);
        }
        self.inner.state.lock().files.insert(path.to_path_buf(), log);
    }

    /// A live channel makes fetches wait for new records instead of
    /// reporting the end of the result set.
    pub fn set_live(&self, channel: &str, live: bool) {
        self.inner
            .state
            .lock()
            .channels
            .entry(channel.to_string())
            .or_insert_with(RecordLog::new)
            .live = live;
        self.inner.appended.notify_all();
    }

    pub fn set_full(&self, channel: &str, full: bool) {
        if let Some(log) = self.inner.state.lock().channels.get_mut(channel) {
            log.full = full;
        }
    }

    pub fn register_publisher(&self, publisher: MemoryPublisher) {
        self.inner
            .state
            .lock()
            .publishers
            .insert(publisher.name.clone(), Arc::new(publisher));
    }

    pub fn add_account(&self, sid: Sid, name: &str) {
        self.inner
            .state
            .lock()
            .accounts
            .insert(sid, name.to_string());
    }

    // ------------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------------

    /// Fail every query open with `code`.
    pub fn fail_query_open(&self, code: Option<u32>) {
        self.inner.state.lock().faults.open_query = code;
    }

    /// Fail every fetch with `code`.
    pub fn fail_fetch(&self, code: Option<u32>) {
        self.inner.state.lock().faults.fetch = code;
    }

    /// Stall every fetch for `delay` before it runs.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.inner.state.lock().faults.fetch_delay = delay;
    }

    /// Fail system field rendering with `code`.
    pub fn fail_render(&self, code: Option<u32>) {
        self.inner.state.lock().faults.render = code;
    }

    /// Fail reads of the metadata tables with `code`.
    pub fn fail_metadata_tables(&self, code: Option<u32>) {
        self.inner.state.lock().faults.metadata_tables = code;
    }

    /// Fail opening the metadata of `publisher` with `code`.
    pub fn fail_publisher(&self, publisher: &str, code: u32) {
        self.inner
            .state
            .lock()
            .faults
            .publisher_open
            .insert(publisher.to_string(), code);
    }

    /// Fail formatting of `kind` with `code`.
    pub fn fail_format(&self, kind: FormatKind, code: Option<u32>) {
        let mut state = self.inner.state.lock();
        match code {
            Some(code) => state.faults.format.insert(kind, code),
            None => state.faults.format.remove(&kind),
        };
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Every cursor operation, in execution order.
    pub fn operations(&self) -> Vec<CursorOp> {
        self.inner
            .state
            .lock()
            .ops
            .iter()
            .map(|(op, _)| op.clone())
            .collect()
    }

    /// Thread that executed each cursor operation, in execution order.
    pub fn operation_threads(&self) -> Vec<ThreadId> {
        self.inner
            .state
            .lock()
            .ops
            .iter()
            .map(|(_, thread)| *thread)
            .collect()
    }

    /// Highest number of cursor operations ever in flight at once.
    pub fn max_concurrent_operations(&self) -> usize {
        self.inner.max_active_ops.load(Ordering::SeqCst)
    }

    /// How many times the metadata of `publisher` was opened.
    pub fn publisher_open_count(&self, publisher: &str) -> usize {
        self.inner
            .state
            .lock()
            .publisher_opens
            .get(publisher)
            .copied()
            .unwrap_or(0)
    }

    /// How many render contexts were created.
    pub fn render_context_count(&self) -> usize {
        self.inner.state.lock().render_contexts
    }

    /// Handles handed out and not yet released.
    pub fn open_handles(&self) -> usize {
        self.inner.state.lock().objects.len()
    }

    fn object(&self, handle: &Handle) -> Result<Object> {
        self.inner
            .state
            .lock()
            .objects
            .get(&handle.raw())
            .cloned()
            .ok_or_else(|| Error::system(codes::ERROR_INVALID_HANDLE))
    }

    fn publisher(&self, handle: &Handle) -> Result<Arc<MemoryPublisher>> {
        match self.object(handle)? {
            Object::Publisher(p) => Ok(p),
            _ => Err(Error::system(codes::ERROR_INVALID_HANDLE)),
        }
    }

    fn record(&self, handle: &Handle) -> Result<Arc<MemoryRecord>> {
        match self.object(handle)? {
            Object::Record(r) => Ok(r),
            _ => Err(Error::system(codes::ERROR_INVALID_HANDLE)),
        }
    }

    fn resolve_target(state: &State, locator: &QueryLocator, query: &str) -> Result<Target> {
        match locator {
            QueryLocator::Channel(name) => {
                if state.channels.contains_key(name) {
                    Ok(Target::Channels(vec![name.clone()]))
                } else {
                    Err(Error::system(codes::ERROR_EVT_CHANNEL_NOT_FOUND))
                }
            }
            QueryLocator::File(path) => {
                if state.files.contains_key(path) {
                    Ok(Target::File(path.clone()))
                } else {
                    Err(Error::system(codes::ERROR_FILE_NOT_FOUND))
                }
            }
            QueryLocator::Structured => {
                let paths = select_paths(query);
                if paths.is_empty() {
                    return Err(Error::system(codes::ERROR_INVALID_PARAMETER));
                }
                if let Some(missing) = paths.iter().find(|p| !state.channels.contains_key(*p)) {
                    debug!(target: "evtlog::memory", channel = %missing, "structured query names unknown channel");
                    return Err(Error::system(codes::ERROR_EVT_CHANNEL_NOT_FOUND));
                }
                Ok(Target::Channels(paths))
            }
        }
    }

    fn format_with_metadata(
        publisher: &MemoryPublisher,
        record: &MemoryRecord,
        kind: FormatKind,
    ) -> Result<String> {
        match kind {
            FormatKind::Event => {
                let event = publisher
                    .events
                    .iter()
                    .find(|e| e.id == u32::from(record.event_id) && e.version == u32::from(record.version))
                    .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))?;
                let template = event
                    .message_id
                    .and_then(|id| publisher.messages.get(&id))
                    .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_ID_NOT_FOUND))?;
                apply_inserts(template, &record.data)
            }
            FormatKind::Level => {
                let row = find_entry(&publisher.levels, u64::from(record.level))?;
                publisher.text_for(row.message_id, row.name.as_deref())
            }
            FormatKind::Task => {
                let row = find_entry(&publisher.tasks, u64::from(record.task))?;
                publisher.text_for(row.message_id, row.name.as_deref())
            }
            FormatKind::Opcode => {
                let exact = (u64::from(record.opcode) << 16) | u64::from(record.task);
                let global = u64::from(record.opcode) << 16;
                let row = find_entry(&publisher.opcodes, exact)
                    .or_else(|_| find_entry(&publisher.opcodes, global))?;
                publisher.text_for(row.message_id, row.name.as_deref())
            }
            FormatKind::Keyword => {
                let bits = mask_keyword(record.keywords);
                let names = publisher
                    .keywords
                    .iter()
                    .filter(|k| k.value & bits != 0)
                    .map(|k| publisher.text_for(k.message_id, k.name.as_deref()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(names.join("\0"))
            }
            FormatKind::Channel => {
                let row = publisher
                    .channels
                    .iter()
                    .find(|c| c.path == record.channel)
                    .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))?;
                publisher.text_for(row.message_id, Some(&row.path))
            }
            FormatKind::Provider => publisher.text_for(publisher.message_id, None),
            FormatKind::Id => Err(Error::system(codes::ERROR_INVALID_PARAMETER)),
        }
    }

    fn format_without_metadata(record: &MemoryRecord, kind: FormatKind) -> Result<String> {
        let rendering = record
            .rendering
            .as_ref()
            .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))?;
        let text = match kind {
            FormatKind::Event => rendering.message.clone(),
            FormatKind::Level => rendering.level.clone(),
            FormatKind::Task => rendering.task.clone(),
            FormatKind::Opcode => rendering.opcode.clone(),
            FormatKind::Keyword => Some(rendering.keywords.join("\0")),
            FormatKind::Channel => rendering.channel.clone(),
            FormatKind::Provider => rendering.provider.clone(),
            FormatKind::Id => None,
        };
        text.ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))
    }
}

fn find_entry(rows: &[MemoryEntry], value: u64) -> Result<&MemoryEntry> {
    rows.iter()
        .find(|r| r.value == value)
        .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_NOT_FOUND))
}

/// Substitute `%N` inserts with `data[N - 1]`.
fn apply_inserts(template: &str, data: &[String]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            out.push('%');
            continue;
        }
        let insert = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| data.get(i))
            .ok_or_else(|| Error::system(codes::ERROR_EVT_UNRESOLVED_VALUE_INSERT))?;
        out.push_str(insert);
    }
    Ok(out)
}

/// Channel names from `Path="..."` attributes of a structured query.
fn select_paths(query: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut rest = query;
    while let Some(at) = rest.find("Path=") {
        rest = &rest[at + 5..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        rest = &rest[1..];
        if let Some(end) = rest.find(quote) {
            let path = rest[..end].to_string();
            if !paths.contains(&path) {
                paths.push(path);
            }
            rest = &rest[end + 1..];
        }
    }
    paths
}

impl LogSource for MemorySource {
    fn open_query(
        &self,
        locator: &QueryLocator,
        query: &str,
        direction: Direction,
    ) -> Result<Box<dyn QueryCursor>> {
        let _op = self.inner.begin(CursorOp::Open {
            locator: locator.clone(),
            query: query.to_string(),
            direction,
        });
        let state = self.inner.state.lock();
        if let Some(code) = state.faults.open_query {
            return Err(Error::system(code));
        }
        let target = Self::resolve_target(&state, locator, query)?;
        Ok(Box::new(MemoryCursor {
            inner: Arc::clone(&self.inner),
            target,
            direction,
            position: 0,
            closed: false,
        }))
    }

    fn create_render_context(&self) -> Result<Handle> {
        let mut state = self.inner.state.lock();
        state.render_contexts += 1;
        Ok(self.inner.register(&mut state, Object::RenderContext))
    }

    fn render_system_fields(&self, context: &Handle, record: &Handle) -> Result<Vec<TaggedValue>> {
        if !matches!(self.object(context)?, Object::RenderContext) {
            return Err(Error::system(codes::ERROR_INVALID_HANDLE));
        }
        let record = self.record(record)?;
        if let Some(code) = self.inner.state.lock().faults.render {
            return Err(Error::system(code));
        }

        let mut fields = vec![TaggedValue::Null; SystemField::COUNT];
        let mut put = |field: SystemField, value: TaggedValue| fields[field.index()] = value;
        put(
            SystemField::ProviderName,
            record.provider.clone().map_or(TaggedValue::Null, TaggedValue::String),
        );
        put(
            SystemField::ProviderGuid,
            record.provider_guid.map_or(TaggedValue::Null, TaggedValue::Guid),
        );
        put(SystemField::EventId, TaggedValue::UInt16(record.event_id));
        put(
            SystemField::Qualifiers,
            record.qualifiers.map_or(TaggedValue::Null, TaggedValue::UInt16),
        );
        put(SystemField::Level, TaggedValue::Byte(record.level));
        put(SystemField::Task, TaggedValue::UInt16(record.task));
        put(SystemField::Opcode, TaggedValue::Byte(record.opcode));
        put(SystemField::Keywords, TaggedValue::HexInt64(record.keywords));
        put(
            SystemField::TimeCreated,
            record.time_created.map_or(TaggedValue::Null, TaggedValue::FileTime),
        );
        put(SystemField::EventRecordId, TaggedValue::UInt64(record.record_id));
        put(
            SystemField::ActivityId,
            record.activity_id.map_or(TaggedValue::Null, TaggedValue::Guid),
        );
        put(
            SystemField::RelatedActivityId,
            record.related_activity_id.map_or(TaggedValue::Null, TaggedValue::Guid),
        );
        put(SystemField::ProcessId, TaggedValue::UInt32(record.process_id));
        put(SystemField::ThreadId, TaggedValue::UInt32(record.thread_id));
        put(SystemField::Channel, TaggedValue::String(record.channel.clone()));
        put(SystemField::Computer, TaggedValue::String(record.computer.clone()));
        put(
            SystemField::UserId,
            record.user.clone().map_or(TaggedValue::Null, TaggedValue::Sid),
        );
        put(SystemField::Version, TaggedValue::Byte(record.version));
        for (field, value) in &record.overrides {
            put(*field, value.clone());
        }
        Ok(fields)
    }

    fn open_publisher_metadata(&self, publisher: &str) -> Result<Handle> {
        let mut state = self.inner.state.lock();
        *state
            .publisher_opens
            .entry(publisher.to_string())
            .or_insert(0) += 1;
        if let Some(code) = state.faults.publisher_open.get(publisher) {
            return Err(Error::system(*code));
        }
        let found = state
            .publishers
            .get(publisher)
            .cloned()
            .ok_or_else(|| Error::system(codes::ERROR_EVT_PUBLISHER_METADATA_NOT_FOUND))?;
        Ok(self.inner.register(&mut state, Object::Publisher(found)))
    }

    fn metadata_property(
        &self,
        metadata: &Handle,
        property: PublisherProperty,
        index: Option<u32>,
    ) -> Result<TaggedValue> {
        use PublisherProperty::*;

        let p = self.publisher(metadata)?;
        if property.table().is_some() {
            if let Some(code) = self.inner.state.lock().faults.metadata_tables {
                return Err(Error::system(code));
            }
        }
        let string = |s: &Option<String>| s.clone().map_or(TaggedValue::Null, TaggedValue::String);
        let message_id = |id: Option<u32>| TaggedValue::UInt32(id.unwrap_or(u32::MAX));

        let row = |table: &[MemoryEntry]| -> Result<MemoryEntry> {
            index
                .and_then(|i| table.get(i as usize))
                .cloned()
                .ok_or_else(|| Error::system(codes::ERROR_INVALID_PARAMETER))
        };
        let channel = || -> Result<MemoryChannelRef> {
            index
                .and_then(|i| p.channels.get(i as usize))
                .cloned()
                .ok_or_else(|| Error::system(codes::ERROR_INVALID_PARAMETER))
        };

        let value = match property {
            PublisherGuid => p.guid.map_or(TaggedValue::Null, TaggedValue::Guid),
            ResourceFilePath => string(&p.resource_file_path),
            ParameterFilePath => string(&p.parameter_file_path),
            MessageFilePath => string(&p.message_file_path),
            HelpLink => string(&p.help_link),
            PublisherMessageId => message_id(p.message_id),
            ChannelReferencePath => TaggedValue::String(channel()?.path),
            ChannelReferenceIndex => TaggedValue::UInt32(channel()?.index),
            ChannelReferenceId => TaggedValue::UInt32(channel()?.id),
            ChannelReferenceFlags => TaggedValue::UInt32(channel()?.flags),
            ChannelReferenceMessageId => message_id(channel()?.message_id),
            LevelName => string(&row(&p.levels)?.name),
            LevelValue => TaggedValue::UInt32(row(&p.levels)?.value as u32),
            LevelMessageId => message_id(row(&p.levels)?.message_id),
            TaskName => string(&row(&p.tasks)?.name),
            TaskEventGuid => row(&p.tasks)?
                .event_guid
                .map_or(TaggedValue::Null, TaggedValue::Guid),
            TaskValue => TaggedValue::UInt32(row(&p.tasks)?.value as u32),
            TaskMessageId => message_id(row(&p.tasks)?.message_id),
            OpcodeName => string(&row(&p.opcodes)?.name),
            OpcodeValue => TaggedValue::UInt32(row(&p.opcodes)?.value as u32),
            OpcodeMessageId => message_id(row(&p.opcodes)?.message_id),
            KeywordName => string(&row(&p.keywords)?.name),
            KeywordValue => TaggedValue::UInt64(row(&p.keywords)?.value),
            KeywordMessageId => message_id(row(&p.keywords)?.message_id),
        };
        Ok(value)
    }

    fn metadata_array_len(&self, metadata: &Handle, table: MetadataTable) -> Result<u32> {
        let p = self.publisher(metadata)?;
        if let Some(code) = self.inner.state.lock().faults.metadata_tables {
            return Err(Error::system(code));
        }
        Ok(p.table(table) as u32)
    }

    fn event_metadata(&self, metadata: &Handle) -> Result<Vec<Handle>> {
        let p = self.publisher(metadata)?;
        let mut state = self.inner.state.lock();
        Ok((0..p.events.len())
            .map(|i| self.inner.register(&mut state, Object::Event(Arc::clone(&p), i)))
            .collect())
    }

    fn event_metadata_property(
        &self,
        event: &Handle,
        field: EventMetadataField,
    ) -> Result<TaggedValue> {
        let (p, index) = match self.object(event)? {
            Object::Event(p, index) => (p, index),
            _ => return Err(Error::system(codes::ERROR_INVALID_HANDLE)),
        };
        let e = p
            .events
            .get(index)
            .ok_or_else(|| Error::system(codes::ERROR_INVALID_HANDLE))?;
        let value = match field {
            EventMetadataField::Id => TaggedValue::UInt32(e.id),
            EventMetadataField::Version => TaggedValue::UInt32(e.version),
            EventMetadataField::Channel => TaggedValue::UInt32(e.channel),
            EventMetadataField::Level => TaggedValue::UInt32(e.level),
            EventMetadataField::Opcode => TaggedValue::UInt32(e.opcode),
            EventMetadataField::Task => TaggedValue::UInt32(e.task),
            EventMetadataField::Keyword => TaggedValue::UInt64(e.keyword),
            EventMetadataField::MessageId => TaggedValue::UInt32(e.message_id.unwrap_or(u32::MAX)),
            EventMetadataField::Template => {
                e.template.clone().map_or(TaggedValue::Null, TaggedValue::String)
            }
        };
        Ok(value)
    }

    fn format_message(
        &self,
        metadata: Option<&Handle>,
        record: Option<&Handle>,
        message_id: Option<u32>,
        kind: FormatKind,
    ) -> Result<String> {
        if let Some(code) = self.inner.state.lock().faults.format.get(&kind) {
            return Err(Error::system(*code));
        }

        if kind == FormatKind::Id {
            let p = self.publisher(metadata.ok_or_else(|| Error::system(codes::ERROR_INVALID_HANDLE))?)?;
            let id = message_id.ok_or_else(|| Error::system(codes::ERROR_INVALID_PARAMETER))?;
            return p
                .messages
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::system(codes::ERROR_EVT_MESSAGE_ID_NOT_FOUND));
        }

        let record = self.record(record.ok_or_else(|| Error::system(codes::ERROR_INVALID_HANDLE))?)?;
        match metadata {
            Some(handle) => {
                let p = self.publisher(handle)?;
                Self::format_with_metadata(&p, &record, kind)
            }
            None => Self::format_without_metadata(&record, kind),
        }
    }

    fn lookup_account(&self, sid: &Sid) -> Result<Option<String>> {
        Ok(self.inner.state.lock().accounts.get(sid).cloned())
    }

    fn channel_names(&self) -> Result<Vec<String>> {
        Ok(self.inner.state.lock().channels.keys().cloned().collect())
    }

    fn publisher_names(&self) -> Result<Vec<String>> {
        Ok(self.inner.state.lock().publishers.keys().cloned().collect())
    }

    fn open_log(&self, locator: &QueryLocator) -> Result<Handle> {
        let mut state = self.inner.state.lock();
        let stats = match locator {
            QueryLocator::Channel(name) => state
                .channels
                .get(name)
                .map(RecordLog::stats)
                .ok_or_else(|| Error::system(codes::ERROR_EVT_CHANNEL_NOT_FOUND))?,
            QueryLocator::File(path) => state
                .files
                .get(path)
                .map(RecordLog::stats)
                .ok_or_else(|| Error::system(codes::ERROR_FILE_NOT_FOUND))?,
            QueryLocator::Structured => {
                return Err(Error::invalid_argument(
                    "log information needs a channel name or file path",
                ))
            }
        };
        Ok(self.inner.register(&mut state, Object::Log(stats)))
    }

    fn log_property(&self, log: &Handle, field: LogInfoField) -> Result<TaggedValue> {
        let stats = match self.object(log)? {
            Object::Log(stats) => stats,
            _ => return Err(Error::system(codes::ERROR_INVALID_HANDLE)),
        };
        let value = match field {
            LogInfoField::CreationTime => TaggedValue::FileTime(stats.created),
            LogInfoField::LastAccessTime => TaggedValue::FileTime(stats.last_access),
            LogInfoField::LastWriteTime => TaggedValue::FileTime(stats.last_write),
            LogInfoField::FileSize => TaggedValue::UInt64(stats.size),
            LogInfoField::Attributes => TaggedValue::UInt32(FILE_ATTRIBUTE_ARCHIVE),
            LogInfoField::NumberOfLogRecords => TaggedValue::UInt64(stats.records),
            LogInfoField::OldestRecordNumber => {
                stats.oldest.map_or(TaggedValue::Null, TaggedValue::UInt64)
            }
            LogInfoField::Full => TaggedValue::Boolean(stats.full),
        };
        Ok(value)
    }
}

// ============================================================================
// Cursor
// ============================================================================

#[derive(Debug, Clone)]
enum Target {
    Channels(Vec<String>),
    File(PathBuf),
}

impl Target {
    fn records(&self, state: &State, direction: Direction) -> Vec<Arc<MemoryRecord>> {
        let mut records: Vec<Arc<MemoryRecord>> = match self {
            Target::Channels(names) => names
                .iter()
                .filter_map(|n| state.channels.get(n))
                .flat_map(|log| log.records.iter().cloned())
                .collect(),
            Target::File(path) => state
                .files
                .get(path)
                .map(|log| log.records.clone())
                .unwrap_or_default(),
        };
        if direction == Direction::Reverse {
            records.reverse();
        }
        records
    }

    fn is_live(&self, state: &State) -> bool {
        match self {
            Target::Channels(names) => names
                .iter()
                .filter_map(|n| state.channels.get(n))
                .any(|log| log.live),
            Target::File(_) => false,
        }
    }
}

struct MemoryCursor {
    inner: Arc<Inner>,
    target: Target,
    direction: Direction,
    /// Index of the next record to return
    position: usize,
    closed: bool,
}

impl QueryCursor for MemoryCursor {
    fn next_batch(&mut self, max: usize, timeout_ms: u32) -> Result<FetchOutcome> {
        let _op = self.inner.begin(CursorOp::Fetch { max, timeout_ms });

        let (delay, fault) = {
            let state = self.inner.state.lock();
            (state.faults.fetch_delay, state.faults.fetch)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if let Some(code) = fault {
            return Err(Error::system(code));
        }
        if self.closed {
            return Err(Error::system(codes::ERROR_INVALID_HANDLE));
        }
        if max == 0 {
            return Err(Error::system(codes::ERROR_INVALID_PARAMETER));
        }

        let deadline = (timeout_ms != u32::MAX)
            .then(|| Instant::now() + Duration::from_millis(u64::from(timeout_ms)));

        let mut state = self.inner.state.lock();
        loop {
            let records = self.target.records(&state, self.direction);
            if self.position < records.len() {
                let end = records.len().min(self.position + max);
                let batch: Vec<Handle> = records[self.position..end]
                    .iter()
                    .map(|r| self.inner.register(&mut state, Object::Record(Arc::clone(r))))
                    .collect();
                self.position = end;
                return Ok(FetchOutcome::success(batch));
            }
            if !self.target.is_live(&state) {
                return Ok(FetchOutcome::no_more_items());
            }
            match deadline {
                None => self.inner.appended.wait(&mut state),
                Some(deadline) => {
                    if self.inner.appended.wait_until(&mut state, deadline).timed_out() {
                        return Ok(FetchOutcome::timed_out());
                    }
                }
            }
        }
    }

    fn seek(&mut self, position: i64, origin: SeekOrigin) -> Result<()> {
        let _op = self.inner.begin(CursorOp::Seek { position, origin });
        if self.closed {
            return Err(Error::system(codes::ERROR_INVALID_HANDLE));
        }
        let len = {
            let state = self.inner.state.lock();
            self.target.records(&state, self.direction).len() as i64
        };
        let base = match origin {
            SeekOrigin::FromFirst => 0,
            SeekOrigin::FromLast => len - 1,
            SeekOrigin::FromCurrent => self.position as i64,
        };
        let target = base
            .checked_add(position)
            .filter(|t| (0..=len).contains(t))
            .ok_or_else(|| Error::system(codes::ERROR_INVALID_PARAMETER))?;
        self.position = target as usize;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let _op = self.inner.begin(CursorOp::Close);
        self.closed = true;
        Ok(())
    }
}

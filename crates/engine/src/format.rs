//! Record formatter
//!
//! Turns a raw record handle into an [`EventRecord`]:
//!
//! 1. The system fields are rendered through one render context, created on
//!    first use and reused for every record afterwards.
//! 2. If the record names a provider, its metadata is taken from the
//!    [`MetadataCache`] and the display strings are formatted against it.
//!    Without a provider, or when its metadata is unavailable, the source
//!    formats the record on its own. Neither case fails the record.
//!
//! Benign formatting failures leave the affected display string empty.

use crate::record::{DisplayRecord, EventRecord};
use evtlog_core::{
    Error, FormatKind, Handle, LogSource, Result, Sid, SystemField, TaggedValue, ValueType,
};
use evtlog_metadata::{format_or_empty, split_keywords, MetadataCache, PublisherMetadata};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

/// Bits of the system keyword field that carry keywords
pub const SYSTEM_KEYWORD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Renders records from one log source.
///
/// `RecordFormatter` is `Send + Sync`; readers of one session share it.
pub struct RecordFormatter {
    source: Arc<dyn LogSource>,
    cache: Arc<MetadataCache>,
    context: OnceCell<Handle>,
}

impl RecordFormatter {
    /// A formatter backed by the process-wide metadata cache.
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        Self::with_cache(source, MetadataCache::global())
    }

    /// A formatter backed by its own metadata cache.
    pub fn with_cache(source: Arc<dyn LogSource>, cache: Arc<MetadataCache>) -> Self {
        Self {
            source,
            cache,
            context: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn LogSource> {
        &self.source
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Render one record.
    pub fn format(&self, record: &Handle) -> Result<EventRecord> {
        let fields = self.render_fields(record)?;
        let mut event = decode_system_fields(&fields)?;

        if let Some(sid) = &event.user_sid {
            event.user = self.source.lookup_account(sid)?;
        }

        let metadata = event
            .provider_name
            .as_deref()
            .and_then(|provider| self.cache.lookup(&self.source, provider));
        if metadata.is_none() {
            debug!(
                target: "evtlog::format",
                provider = event.provider_name.as_deref().unwrap_or(""),
                "formatting record without publisher metadata"
            );
        }
        event.display = self.display(record, metadata.as_deref())?;
        Ok(event)
    }

    fn render_fields(&self, record: &Handle) -> Result<Vec<TaggedValue>> {
        let context = self
            .context
            .get_or_try_init(|| self.source.create_render_context())?;
        let fields = self.source.render_system_fields(context, record)?;
        if fields.len() < SystemField::COUNT {
            return Err(Error::IndexOutOfBounds {
                index: SystemField::COUNT - 1,
                len: fields.len(),
            });
        }
        Ok(fields)
    }

    fn display(
        &self,
        record: &Handle,
        metadata: Option<&PublisherMetadata>,
    ) -> Result<DisplayRecord> {
        let handle = metadata.map(PublisherMetadata::handle);
        let text = |kind| format_or_empty(self.source.as_ref(), handle, Some(record), None, kind);
        Ok(DisplayRecord {
            message: text(FormatKind::Event)?,
            level: text(FormatKind::Level)?,
            task: text(FormatKind::Task)?,
            opcode: text(FormatKind::Opcode)?,
            keywords: split_keywords(&text(FormatKind::Keyword)?),
            channel: text(FormatKind::Channel)?,
            provider: text(FormatKind::Provider)?,
        })
    }
}

impl std::fmt::Debug for RecordFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFormatter")
            .field("cached_publishers", &self.cache.len())
            .field("context_ready", &self.context.get().is_some())
            .finish()
    }
}

/// Decode the rendered system field array; `fields` holds at least
/// `SystemField::COUNT` entries.
fn decode_system_fields(fields: &[TaggedValue]) -> Result<EventRecord> {
    let field = |f: SystemField| &fields[f.index()];
    Ok(EventRecord {
        provider_name: field(SystemField::ProviderName).get_maybe()?,
        provider_guid: field(SystemField::ProviderGuid).get_maybe()?,
        event_id: field(SystemField::EventId).get_maybe()?,
        qualifiers: field(SystemField::Qualifiers).get_maybe()?,
        level: field(SystemField::Level).get_maybe()?,
        task: field(SystemField::Task).get_maybe()?,
        opcode: field(SystemField::Opcode).get_maybe()?,
        keywords: system_keywords(field(SystemField::Keywords)),
        time_created: field(SystemField::TimeCreated).get_maybe()?,
        record_id: field(SystemField::EventRecordId).get_maybe()?,
        activity_id: field(SystemField::ActivityId).get_maybe()?,
        related_activity_id: field(SystemField::RelatedActivityId).get_maybe()?,
        process_id: field(SystemField::ProcessId).get_maybe()?,
        thread_id: field(SystemField::ThreadId).get_maybe()?,
        channel: field(SystemField::Channel).get_maybe()?,
        computer: field(SystemField::Computer).get_maybe()?,
        user_sid: user_sid(field(SystemField::UserId))?,
        user: None,
        version: field(SystemField::Version).get_maybe()?,
        display: DisplayRecord::default(),
    })
}

/// Keyword field with the top 16 bits cleared. Any tag other than a 64-bit
/// integer leaves the field empty.
fn system_keywords(value: &TaggedValue) -> Option<u64> {
    match value {
        TaggedValue::HexInt64(v) | TaggedValue::UInt64(v) => Some(v & SYSTEM_KEYWORD_MASK),
        TaggedValue::Int64(v) => Some(*v as u64 & SYSTEM_KEYWORD_MASK),
        _ => None,
    }
}

fn user_sid(value: &TaggedValue) -> Result<Option<Sid>> {
    match value {
        TaggedValue::Null => Ok(None),
        TaggedValue::Sid(sid) => Ok(Some(sid.clone())),
        other => Err(Error::InvalidDataType {
            expected: ValueType::Sid,
            actual: other.value_type(),
        }),
    }
}

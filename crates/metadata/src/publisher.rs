//! Publisher metadata
//!
//! A `PublisherMetadata` owns the open metadata handle of one publisher. The
//! scalar properties (GUID, resource paths, help link, publisher message) are
//! read when it is opened; the five lookup tables are read on first use and
//! kept for the lifetime of the value.

use crate::event::EventMetadata;
use crate::format::format_or_empty;
use crate::lookup::{
    ChannelRow, KeywordRow, LevelRow, LookupTable, MetadataRow, OpcodeRow, TaskRow, NO_MESSAGE_ID,
};
use evtlog_core::{
    FormatKind, Guid, Handle, LogSource, MetadataTable, PublisherProperty, Result, Variant,
};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Resolved metadata of one publisher.
pub struct PublisherMetadata {
    name: String,
    source: Arc<dyn LogSource>,
    handle: Handle,
    guid: Option<Guid>,
    resource_file_path: Option<String>,
    parameter_file_path: Option<String>,
    message_file_path: Option<String>,
    help_link: Option<String>,
    message_id: Option<u32>,
    message: String,
    channels: OnceCell<LookupTable<ChannelRow>>,
    levels: OnceCell<LookupTable<LevelRow>>,
    tasks: OnceCell<LookupTable<TaskRow>>,
    opcodes: OnceCell<LookupTable<OpcodeRow>>,
    keywords: OnceCell<LookupTable<KeywordRow>>,
}

impl PublisherMetadata {
    /// Open the metadata of `name` and read its scalar properties.
    pub fn open(source: Arc<dyn LogSource>, name: &str) -> Result<Self> {
        let handle = source.open_publisher_metadata(name)?;

        let read_string = |prop| -> Result<Option<String>> {
            source.metadata_property(&handle, prop, None)?.get_maybe::<String>()
        };
        let guid = source
            .metadata_property(&handle, PublisherProperty::PublisherGuid, None)?
            .get_maybe::<Guid>()?;
        let resource_file_path = read_string(PublisherProperty::ResourceFilePath)?;
        let parameter_file_path = read_string(PublisherProperty::ParameterFilePath)?;
        let message_file_path = read_string(PublisherProperty::MessageFilePath)?;
        let help_link = read_string(PublisherProperty::HelpLink)?;
        let message_id = source
            .metadata_property(&handle, PublisherProperty::PublisherMessageId, None)?
            .get_maybe::<u32>()?
            .filter(|id| *id != NO_MESSAGE_ID);
        let message = match message_id {
            Some(id) => format_or_empty(
                source.as_ref(),
                Some(&handle),
                None,
                Some(id),
                FormatKind::Id,
            )?,
            None => String::new(),
        };

        debug!(target: "evtlog::metadata", publisher = %name, "opened publisher metadata");

        Ok(Self {
            name: name.to_string(),
            source,
            handle,
            guid,
            resource_file_path,
            parameter_file_path,
            message_file_path,
            help_link,
            message_id,
            message,
            channels: OnceCell::new(),
            levels: OnceCell::new(),
            tasks: OnceCell::new(),
            opcodes: OnceCell::new(),
            keywords: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    pub fn resource_file_path(&self) -> Option<&str> {
        self.resource_file_path.as_deref()
    }

    pub fn parameter_file_path(&self) -> Option<&str> {
        self.parameter_file_path.as_deref()
    }

    pub fn message_file_path(&self) -> Option<&str> {
        self.message_file_path.as_deref()
    }

    pub fn help_link(&self) -> Option<&str> {
        self.help_link.as_deref()
    }

    /// Publisher message id, `None` when the publisher declares none
    pub fn message_id(&self) -> Option<u32> {
        self.message_id
    }

    /// Resolved publisher message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The open metadata handle, for formatting records of this publisher
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The source this metadata was read from
    pub fn source(&self) -> &Arc<dyn LogSource> {
        &self.source
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub fn channels(&self) -> Result<&LookupTable<ChannelRow>> {
        self.channels.get_or_try_init(|| {
            let rows = (0..self.table_len(MetadataTable::Channels)?)
                .map(|i| {
                    let id = self.read::<u32>(PublisherProperty::ChannelReferenceId, i)?;
                    let mut entry = self.entry(
                        i,
                        PublisherProperty::ChannelReferencePath,
                        u64::from(id.unwrap_or(0)),
                        PublisherProperty::ChannelReferenceMessageId,
                    )?;
                    if entry.name.is_empty() {
                        entry.name = format!("channel {}", i);
                    }
                    Ok(ChannelRow {
                        entry,
                        index: self
                            .read::<u32>(PublisherProperty::ChannelReferenceIndex, i)?
                            .unwrap_or(i),
                        flags: self
                            .read::<u32>(PublisherProperty::ChannelReferenceFlags, i)?
                            .unwrap_or(0),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LookupTable::new(rows))
        })
    }

    pub fn levels(&self) -> Result<&LookupTable<LevelRow>> {
        self.levels.get_or_try_init(|| {
            let rows = (0..self.table_len(MetadataTable::Levels)?)
                .map(|i| {
                    let value = self.read::<u32>(PublisherProperty::LevelValue, i)?;
                    Ok(LevelRow {
                        entry: self.entry(
                            i,
                            PublisherProperty::LevelName,
                            u64::from(value.unwrap_or(0)),
                            PublisherProperty::LevelMessageId,
                        )?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LookupTable::new(rows))
        })
    }

    pub fn tasks(&self) -> Result<&LookupTable<TaskRow>> {
        self.tasks.get_or_try_init(|| {
            let rows = (0..self.table_len(MetadataTable::Tasks)?)
                .map(|i| {
                    let value = self.read::<u32>(PublisherProperty::TaskValue, i)?;
                    Ok(TaskRow {
                        entry: self.entry(
                            i,
                            PublisherProperty::TaskName,
                            u64::from(value.unwrap_or(0)),
                            PublisherProperty::TaskMessageId,
                        )?,
                        event_guid: self.read::<Guid>(PublisherProperty::TaskEventGuid, i)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LookupTable::new(rows))
        })
    }

    pub fn opcodes(&self) -> Result<&LookupTable<OpcodeRow>> {
        self.opcodes.get_or_try_init(|| {
            let rows = (0..self.table_len(MetadataTable::Opcodes)?)
                .map(|i| {
                    let value = self.read::<u32>(PublisherProperty::OpcodeValue, i)?;
                    Ok(OpcodeRow {
                        entry: self.entry(
                            i,
                            PublisherProperty::OpcodeName,
                            u64::from(value.unwrap_or(0)),
                            PublisherProperty::OpcodeMessageId,
                        )?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LookupTable::new(rows))
        })
    }

    pub fn keywords(&self) -> Result<&LookupTable<KeywordRow>> {
        self.keywords.get_or_try_init(|| {
            let rows = (0..self.table_len(MetadataTable::Keywords)?)
                .map(|i| {
                    let value = self.read::<u64>(PublisherProperty::KeywordValue, i)?;
                    Ok(KeywordRow {
                        entry: self.entry(
                            i,
                            PublisherProperty::KeywordName,
                            value.unwrap_or(0),
                            PublisherProperty::KeywordMessageId,
                        )?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LookupTable::new(rows))
        })
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Channel message, else channel path, for a channel reference id.
    pub fn lookup_channel_display(&self, id: u32) -> Result<String> {
        Ok(self.channels()?.channel_display(id))
    }

    pub fn lookup_level_display(&self, value: u32) -> Result<String> {
        Ok(self.levels()?.display(u64::from(value)))
    }

    pub fn lookup_task_display(&self, value: u32) -> Result<String> {
        Ok(self.tasks()?.display(u64::from(value)))
    }

    /// Opcode display for a packed `opcode << 16 | task` key.
    pub fn lookup_opcode_display(&self, key: u32) -> Result<String> {
        Ok(self.opcodes()?.opcode_display(key))
    }

    pub fn lookup_keywords_display(&self, mask: u64) -> Result<Vec<String>> {
        Ok(self.keywords()?.keyword_display(mask))
    }

    /// Format a message of this publisher by id; empty when unavailable.
    pub fn format_message(&self, message_id: u32) -> Result<String> {
        format_or_empty(
            self.source.as_ref(),
            Some(&self.handle),
            None,
            Some(message_id),
            FormatKind::Id,
        )
    }

    /// Every event definition of this publisher, with display strings
    /// resolved through its tables.
    pub fn event_definitions(&self) -> Result<Vec<EventMetadata>> {
        self.source
            .event_metadata(&self.handle)?
            .iter()
            .map(|h| EventMetadata::load(self, h))
            .collect()
    }

    // ========================================================================
    // Property reads
    // ========================================================================

    fn table_len(&self, table: MetadataTable) -> Result<u32> {
        self.source.metadata_array_len(&self.handle, table)
    }

    fn read<T: Variant>(&self, property: PublisherProperty, index: u32) -> Result<Option<T>> {
        self.source
            .metadata_property(&self.handle, property, Some(index))?
            .get_maybe::<T>()
    }

    fn entry(
        &self,
        index: u32,
        name: PublisherProperty,
        value: u64,
        message: PublisherProperty,
    ) -> Result<MetadataRow> {
        let name = self.read::<String>(name, index)?.unwrap_or_default();
        let message_id = self.read::<u32>(message, index)?.unwrap_or(NO_MESSAGE_ID);
        let message = if message_id != NO_MESSAGE_ID {
            self.format_message(message_id)?
        } else {
            String::new()
        };
        Ok(MetadataRow {
            value,
            name,
            message_id,
            message,
        })
    }
}

impl fmt::Debug for PublisherMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherMetadata")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("handle", &self.handle)
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

//! Event definitions
//!
//! One `EventMetadata` per event a publisher declares in its manifest. The
//! numeric attributes are read as-is; the display strings are resolved
//! through the owning publisher's lookup tables. Zero means "no value" for
//! channel, level, task, opcode and keyword, and leaves the display empty.

use crate::lookup::{pack_opcode, NO_MESSAGE_ID};
use crate::publisher::PublisherMetadata;
use evtlog_core::{mask_keyword, EventMetadataField, Handle, Result, TaggedValue};

/// A resolved event definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub id: Option<u32>,
    pub version: Option<u32>,
    /// Channel reference id
    pub channel: Option<u32>,
    pub level: Option<u32>,
    pub opcode: Option<u32>,
    pub task: Option<u32>,
    /// Keyword mask with the reserved top byte cleared
    pub keyword: Option<u64>,
    /// Message id; `None` when the definition declares no message
    pub message_id: Option<u32>,
    /// Template XML; empty when the event has no template
    pub template: Option<String>,
    pub channel_display: String,
    pub level_display: String,
    pub task_display: String,
    pub opcode_display: String,
    pub keywords_display: Vec<String>,
    pub message: String,
}

impl EventMetadata {
    pub(crate) fn load(publisher: &PublisherMetadata, handle: &Handle) -> Result<Self> {
        let source = publisher.source();
        let read = |field| -> Result<TaggedValue> { source.event_metadata_property(handle, field) };
        let read_u32 = |field| -> Result<Option<u32>> { read(field)?.get_maybe::<u32>() };

        let mut event = EventMetadata {
            id: read_u32(EventMetadataField::Id)?,
            version: read_u32(EventMetadataField::Version)?,
            channel: read_u32(EventMetadataField::Channel)?,
            level: read_u32(EventMetadataField::Level)?,
            opcode: read_u32(EventMetadataField::Opcode)?,
            task: read_u32(EventMetadataField::Task)?,
            keyword: read(EventMetadataField::Keyword)?.get_keyword()?,
            message_id: read_u32(EventMetadataField::MessageId)?.filter(|id| *id != NO_MESSAGE_ID),
            template: read(EventMetadataField::Template)?.get_maybe::<String>()?,
            ..Default::default()
        };

        if let Some(channel) = event.channel.filter(|v| *v > 0) {
            event.channel_display = publisher.lookup_channel_display(channel)?;
        }
        if let Some(level) = event.level.filter(|v| *v > 0) {
            event.level_display = publisher.lookup_level_display(level)?;
        }
        if let Some(opcode) = event.opcode.filter(|v| *v > 0) {
            let task = event.task.unwrap_or(0);
            let key = pack_opcode(opcode as u16, task as u16);
            event.opcode_display = publisher.lookup_opcode_display(key)?;
        }
        if let Some(task) = event.task.filter(|v| *v > 0) {
            event.task_display = publisher.lookup_task_display(task)?;
        }
        if let Some(mask) = event.keyword.map(mask_keyword).filter(|v| *v > 0) {
            event.keywords_display = publisher.lookup_keywords_display(mask)?;
        }
        if let Some(id) = event.message_id {
            event.message = publisher.format_message(id)?;
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use crate::publisher::PublisherMetadata;
    use evtlog_core::testing::{MemoryEvent, MemoryPublisher, MemorySource};
    use evtlog_core::LogSource;
    use std::sync::Arc;

    fn publisher() -> PublisherMetadata {
        let memory = MemorySource::new();
        memory.register_publisher(
            MemoryPublisher::new("Demo-Provider")
                .with_channel("Demo/Operational", 16, None)
                .with_level(4, "win:Informational", Some("Information"))
                .with_task(3, "Transfer", None)
                .with_opcode(10, 3, "TransferBegin", Some("Transfer Begin"))
                .with_keyword(0x4, "Net", None)
                .with_event(
                    MemoryEvent {
                        id: 7,
                        version: 1,
                        channel: 16,
                        level: 4,
                        opcode: 10,
                        task: 3,
                        keyword: 0xFF00_0000_0000_0004,
                        template: Some("<template/>".into()),
                        ..Default::default()
                    },
                    Some("Transfer of %1 started"),
                )
                .with_event(
                    MemoryEvent {
                        id: 8,
                        ..Default::default()
                    },
                    None,
                ),
        );
        let source: Arc<dyn LogSource> = Arc::new(memory);
        PublisherMetadata::open(source, "Demo-Provider").unwrap()
    }

    #[test]
    fn test_event_definitions_resolved() {
        let meta = publisher();
        let events = meta.event_definitions().unwrap();
        assert_eq!(events.len(), 2);

        let e = &events[0];
        assert_eq!(e.id, Some(7));
        assert_eq!(e.keyword, Some(0x4));
        assert_eq!(e.channel_display, "Demo/Operational");
        assert_eq!(e.level_display, "Information");
        assert_eq!(e.task_display, "Transfer");
        assert_eq!(e.opcode_display, "Transfer Begin");
        assert_eq!(e.keywords_display, vec!["Net"]);
        assert_eq!(e.message, "Transfer of %1 started");
        assert_eq!(e.template.as_deref(), Some("<template/>"));
    }

    #[test]
    fn test_zero_values_leave_display_empty() {
        let meta = publisher();
        let events = meta.event_definitions().unwrap();
        let e = &events[1];
        assert_eq!(e.id, Some(8));
        assert_eq!(e.message_id, None);
        assert!(e.level_display.is_empty());
        assert!(e.keywords_display.is_empty());
        assert!(e.message.is_empty());
    }
}

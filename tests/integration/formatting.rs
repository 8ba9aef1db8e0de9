//! Records rendered through publisher metadata

use crate::common::*;
use evtlog::{codes, FormatKind, Sid, SystemField, TaggedValue};

fn first_record(memory: &MemorySource, record: MemoryRecord) -> evtlog::EventRecord {
    memory.append(CHANNEL, record);
    let log = session(memory, bounded_config(8));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();
    assert!(reader.next().unwrap());
    reader.current().cloned().unwrap()
}

#[test]
fn full_display_record() {
    let memory = backup_source();
    let record = first_record(
        &memory,
        MemoryRecord::new(PROVIDER, 101)
            .with_level(2)
            .with_task(1)
            .with_opcode(2)
            .with_keywords(0x8000_0000_0000_0003)
            .with_data(["C:\\", "42"]),
    );

    assert_eq!(record.event_id, Some(101));
    assert_eq!(record.keywords, Some(0x3));
    let display = &record.display;
    assert_eq!(display.message, "Backup of C:\\ failed after 42 files");
    assert_eq!(display.level, "Error");
    assert_eq!(display.task, "Backup Job");
    assert_eq!(display.opcode, "Stop");
    assert_eq!(display.keywords, vec!["Disk I/O", "Network"]);
    assert_eq!(display.channel, "Application");
    assert_eq!(display.provider, "Contoso Backup Service");
}

#[test]
fn task_scoped_opcode_preferred_over_global() {
    let memory = backup_source();
    let record = first_record(
        &memory,
        MemoryRecord::new(PROVIDER, 100).with_task(1).with_opcode(10),
    );
    assert_eq!(record.display.opcode, "Volume Snapshot");
}

#[test]
fn missing_insert_leaves_message_empty() {
    let memory = backup_source();
    let record = first_record(&memory, MemoryRecord::new(PROVIDER, 101).with_data(["C:\\"]));
    assert_eq!(record.display.message, "");
}

#[test]
fn unknown_publisher_uses_source_rendering() {
    let memory = backup_source();
    let record = first_record(
        &memory,
        MemoryRecord::new("Legacy-App", 3).with_rendering(Rendering {
            message: Some("Legacy message".into()),
            keywords: vec!["Classic".into()],
            ..Default::default()
        }),
    );
    assert_eq!(record.display.message, "Legacy message");
    assert_eq!(record.display.keywords, vec!["Classic"]);
    assert_eq!(record.display.level, "");
}

#[test]
fn unavailable_publisher_metadata_does_not_fail_record() {
    let memory = backup_source();
    memory.fail_publisher(PROVIDER, codes::ERROR_MUI_FILE_NOT_FOUND);
    let record = first_record(&memory, MemoryRecord::new(PROVIDER, 100));
    assert_eq!(record.provider_name.as_deref(), Some(PROVIDER));
    assert_eq!(record.display.message, "");
}

#[test]
fn hard_format_failure_surfaces_from_reader() {
    let memory = backup_source();
    memory.fail_format(FormatKind::Channel, Some(codes::ERROR_INVALID_HANDLE));
    memory.append(CHANNEL, MemoryRecord::new(PROVIDER, 100));
    let log = session(&memory, bounded_config(8));
    let mut reader = log.query_channel(CHANNEL, "*", Direction::Forward).unwrap();
    let err = reader.next().unwrap_err();
    assert_eq!(err.system_code(), Some(codes::ERROR_INVALID_HANDLE));
}

#[test]
fn user_account_resolved() {
    let memory = backup_source();
    let sid = Sid::parse("S-1-5-21-1004-1001").unwrap();
    memory.add_account(sid.clone(), "CONTOSO\\backup-svc");
    let record = first_record(&memory, MemoryRecord::new(PROVIDER, 100).with_user(sid));
    assert_eq!(record.user.as_deref(), Some("CONTOSO\\backup-svc"));
}

#[test]
fn unknown_account_keeps_sid_only() {
    let memory = backup_source();
    let sid = Sid::parse("S-1-5-21-9-9").unwrap();
    let record = first_record(&memory, MemoryRecord::new(PROVIDER, 100).with_user(sid.clone()));
    assert_eq!(record.user_sid, Some(sid));
    assert_eq!(record.user, None);
}

#[test]
fn null_system_fields_are_absent() {
    let memory = backup_source();
    let record = first_record(
        &memory,
        MemoryRecord::new(PROVIDER, 100)
            .with_override(SystemField::ProcessId, TaggedValue::Null)
            .with_override(SystemField::Computer, TaggedValue::Null),
    );
    assert_eq!(record.process_id, None);
    assert_eq!(record.computer, None);
    assert_eq!(record.event_id, Some(100));
}

#[test]
fn publisher_metadata_tables_and_events() {
    let memory = backup_source();
    let log = session(&memory, ReaderConfig::default());
    let meta = log.publisher_metadata(PROVIDER).unwrap();

    assert_eq!(meta.message(), "Contoso Backup Service");
    assert_eq!(meta.levels().unwrap().len(), 2);
    assert_eq!(meta.lookup_level_display(4).unwrap(), "Information");
    assert_eq!(meta.lookup_task_display(2).unwrap(), "Restore");
    assert_eq!(
        meta.lookup_keywords_display(0x6).unwrap(),
        vec!["Network", "Cloud"]
    );
    assert!(meta.lookup_keywords_display(0).unwrap().is_empty());

    let events = meta.event_definitions().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].opcode_display, "Start");
    assert_eq!(events[1].keywords_display, vec!["Disk I/O", "Network"]);
    assert_eq!(events[1].message, "Backup of %1 failed after %2 files");
}

//! Lookup tables
//!
//! A publisher declares five small ordered tables: channels, levels, tasks,
//! opcodes and keywords. Each row pairs a numeric value with a name, a
//! message id and the message resolved for that id. Records and event
//! definitions carry only the numeric values; these tables turn them into
//! display strings.
//!
//! ## Lookup Rules
//!
//! | Table    | Key                          | Miss         |
//! |----------|------------------------------|--------------|
//! | channel  | reference id                 | empty string |
//! | level    | value, 0 never matches       | empty string |
//! | task     | value, 0 never matches       | empty string |
//! | opcode   | opcode << 16 \| task         | empty string |
//! | keyword  | any overlapping bit          | empty list   |
//!
//! The display string of a row is its message when it has a message id, and
//! its name otherwise.

use evtlog_core::{Error, Guid, Result};
use std::ops::Deref;

/// Message id meaning "no message".
pub const NO_MESSAGE_ID: u32 = u32::MAX;

/// The columns every table row has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    /// Numeric value records refer to
    pub value: u64,
    /// Symbolic name
    pub name: String,
    /// Message id, [`NO_MESSAGE_ID`] when absent
    pub message_id: u32,
    /// Message resolved for `message_id`; empty when absent or unresolvable
    pub message: String,
}

impl MetadataRow {
    /// True if the row declares a message
    pub fn has_message(&self) -> bool {
        self.message_id != NO_MESSAGE_ID
    }

    /// Message if declared, else the name
    pub fn display(&self) -> &str {
        if self.has_message() {
            &self.message
        } else {
            &self.name
        }
    }
}

/// Access to the common columns of a row type.
pub trait TableRow {
    /// The common columns
    fn entry(&self) -> &MetadataRow;
}

macro_rules! table_row {
    ($ty:ty) => {
        impl TableRow for $ty {
            fn entry(&self) -> &MetadataRow {
                &self.entry
            }
        }

        impl Deref for $ty {
            type Target = MetadataRow;

            fn deref(&self) -> &MetadataRow {
                &self.entry
            }
        }
    };
}

/// A channel the publisher writes to.
///
/// `value` is the channel reference id and `name` the channel path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub entry: MetadataRow,
    /// Position of the channel in the publisher's channel list
    pub index: u32,
    /// Channel reference flags (bit 0: imported channel)
    pub flags: u32,
}

impl ChannelRow {
    /// Channel path
    pub fn path(&self) -> &str {
        &self.entry.name
    }

    /// Channel reference id
    pub fn id(&self) -> u32 {
        self.entry.value as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRow {
    pub entry: MetadataRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub entry: MetadataRow,
    /// GUID identifying the task in event traces
    pub event_guid: Option<Guid>,
}

/// An opcode row. `value` packs the opcode in the high word and the task in
/// the low word; task 0 marks a global opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeRow {
    pub entry: MetadataRow,
}

impl OpcodeRow {
    /// The opcode half of the key
    pub fn opcode(&self) -> u16 {
        hi_word(self.entry.value as u32)
    }

    /// The task half of the key, 0 for a global opcode
    pub fn task(&self) -> u16 {
        lo_word(self.entry.value as u32)
    }
}

/// A keyword row. `value` is the keyword's bit mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRow {
    pub entry: MetadataRow,
}

table_row!(ChannelRow);
table_row!(LevelRow);
table_row!(TaskRow);
table_row!(OpcodeRow);
table_row!(KeywordRow);

/// Pack an opcode and a task into an opcode lookup key.
#[inline]
pub const fn pack_opcode(opcode: u16, task: u16) -> u32 {
    ((opcode as u32) << 16) | task as u32
}

#[inline]
const fn hi_word(v: u32) -> u16 {
    (v >> 16) as u16
}

#[inline]
const fn lo_word(v: u32) -> u16 {
    (v & 0xFFFF) as u16
}

/// An ordered, immutable table of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable<R> {
    rows: Vec<R>,
}

impl<R> Default for LookupTable<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: TableRow> LookupTable<R> {
    /// Build a table; rows keep their order.
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `index`
    pub fn row(&self, index: usize) -> Result<&R> {
        self.rows.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            len: self.rows.len(),
        })
    }

    /// Rows in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Index of the first row whose value equals `value`.
    ///
    /// Zero means "no value" and never matches.
    pub fn find_index(&self, value: u64) -> Option<usize> {
        if value == 0 {
            return None;
        }
        self.rows.iter().position(|r| r.entry().value == value)
    }

    /// Display string of the row matching `value`, empty on a miss.
    pub fn display(&self, value: u64) -> String {
        self.find_index(value)
            .map(|i| self.rows[i].entry().display().to_string())
            .unwrap_or_default()
    }
}

impl LookupTable<ChannelRow> {
    /// Index of the channel with reference id `id`.
    pub fn find_channel(&self, id: u32) -> Option<usize> {
        self.rows.iter().position(|r| r.id() == id)
    }

    /// Channel message, else channel path; empty on a miss.
    pub fn channel_display(&self, id: u32) -> String {
        self.find_channel(id)
            .map(|i| self.rows[i].display().to_string())
            .unwrap_or_default()
    }
}

impl LookupTable<OpcodeRow> {
    /// Index of the opcode row for a packed `opcode << 16 | task` key.
    ///
    /// A row scoped to the same task wins. Failing that, the last global row
    /// (task 0) with the same opcode is used. Rows scoped to a different task
    /// never match.
    pub fn find_opcode_key(&self, key: u32) -> Option<usize> {
        let (opcode, task) = (hi_word(key), lo_word(key));
        let mut found = None;
        for (i, row) in self.rows.iter().enumerate() {
            if row.opcode() != opcode {
                continue;
            }
            if row.task() == 0 {
                // keep scanning for a task-specific row
                found = Some(i);
            } else if row.task() == task {
                found = Some(i);
                break;
            }
        }
        found
    }

    /// Index of the opcode row for `opcode` raised under `task`.
    pub fn find_opcode(&self, opcode: u16, task: u16) -> Option<usize> {
        self.find_opcode_key(pack_opcode(opcode, task))
    }

    /// Display string for a packed key, empty on a miss.
    pub fn opcode_display(&self, key: u32) -> String {
        self.find_opcode_key(key)
            .map(|i| self.rows[i].display().to_string())
            .unwrap_or_default()
    }
}

impl LookupTable<KeywordRow> {
    /// Display strings of every keyword sharing a bit with `mask`, in table
    /// order.
    pub fn keyword_display(&self, mask: u64) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.value & mask != 0)
            .map(|r| r.display().to_string())
            .collect()
    }
}

impl<'a, R> IntoIterator for &'a LookupTable<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(value: u64, name: &str, message: Option<&str>) -> MetadataRow {
        MetadataRow {
            value,
            name: name.to_string(),
            message_id: if message.is_some() { 1 } else { NO_MESSAGE_ID },
            message: message.unwrap_or_default().to_string(),
        }
    }

    fn opcodes(rows: &[(u32, &str)]) -> LookupTable<OpcodeRow> {
        LookupTable::new(
            rows.iter()
                .map(|(v, n)| OpcodeRow {
                    entry: row(u64::from(*v), n, None),
                })
                .collect(),
        )
    }

    fn keywords(masks: &[u64]) -> LookupTable<KeywordRow> {
        LookupTable::new(
            masks
                .iter()
                .enumerate()
                .map(|(i, m)| KeywordRow {
                    entry: row(*m, &format!("kw{}", i), None),
                })
                .collect(),
        )
    }

    #[test]
    fn test_find_index_zero_never_matches() {
        let levels = LookupTable::new(vec![
            LevelRow {
                entry: row(0, "LogAlways", None),
            },
            LevelRow {
                entry: row(4, "Information", None),
            },
        ]);
        assert_eq!(levels.find_index(0), None);
        assert_eq!(levels.find_index(4), Some(1));
        assert_eq!(levels.find_index(5), None);
    }

    #[test]
    fn test_display_prefers_message() {
        let tasks = LookupTable::new(vec![
            TaskRow {
                entry: row(1, "Logon", Some("Logon Task")),
                event_guid: None,
            },
            TaskRow {
                entry: row(2, "Logoff", None),
                event_guid: None,
            },
        ]);
        assert_eq!(tasks.display(1), "Logon Task");
        assert_eq!(tasks.display(2), "Logoff");
        assert_eq!(tasks.display(3), "");
    }

    #[test]
    fn test_declared_but_unresolved_message_displays_empty() {
        let levels = LookupTable::new(vec![LevelRow {
            entry: MetadataRow {
                value: 2,
                name: "Error".into(),
                message_id: 77,
                message: String::new(),
            },
        }]);
        assert_eq!(levels.display(2), "");
    }

    #[test]
    fn test_row_out_of_bounds() {
        let levels: LookupTable<LevelRow> = LookupTable::default();
        assert_eq!(
            levels.row(0).unwrap_err(),
            Error::IndexOutOfBounds { index: 0, len: 0 }
        );
    }

    #[test]
    fn test_opcode_global_and_task_scoped() {
        let table = opcodes(&[(0x0002_0000, "global2"), (0x0003_0005, "op3task5")]);
        assert_eq!(table.find_opcode(3, 5), Some(1));
        assert_eq!(table.find_opcode(2, 0), Some(0));
    }

    #[test]
    fn test_opcode_task_match_beats_global() {
        let table = opcodes(&[(0x0001_0000, "global"), (0x0001_0007, "scoped")]);
        assert_eq!(table.opcode_display(pack_opcode(1, 7)), "scoped");
        assert_eq!(table.opcode_display(pack_opcode(1, 9)), "global");
    }

    #[test]
    fn test_opcode_last_global_row_wins() {
        let table = opcodes(&[
            (0x0006_0000, "first"),
            (0x0005_0000, "other"),
            (0x0006_0000, "second"),
        ]);
        assert_eq!(table.find_opcode(6, 0), Some(2));
        assert_eq!(table.opcode_display(pack_opcode(6, 3)), "second");
    }

    #[test]
    fn test_opcode_other_task_never_matches() {
        let table = opcodes(&[(0x0004_0002, "op4task2")]);
        assert_eq!(table.find_opcode(4, 3), None);
        assert_eq!(table.opcode_display(pack_opcode(4, 3)), "");
    }

    #[test]
    fn test_channel_lookup_by_reference_id() {
        let channels = LookupTable::new(vec![ChannelRow {
            entry: row(0, "Security", None),
            index: 0,
            flags: 0,
        }]);
        assert_eq!(channels.find_channel(0), Some(0));
        assert_eq!(channels.channel_display(0), "Security");
        assert_eq!(channels.channel_display(1), "");
    }

    #[test]
    fn test_keyword_display_in_table_order() {
        let table = keywords(&[0x4, 0x1, 0x2]);
        assert_eq!(table.keyword_display(0x3), vec!["kw1", "kw2"]);
        assert!(table.keyword_display(0).is_empty());
        assert!(table.keyword_display(0x8).is_empty());
    }

    proptest! {
        #[test]
        fn prop_keyword_display_is_overlap_subset(
            masks in prop::collection::vec(any::<u64>(), 0..12),
            query in any::<u64>(),
        ) {
            let table = keywords(&masks);
            let expected: Vec<String> = masks
                .iter()
                .enumerate()
                .filter(|(_, m)| *m & query != 0)
                .map(|(i, _)| format!("kw{}", i))
                .collect();
            prop_assert_eq!(table.keyword_display(query), expected);
        }

        #[test]
        fn prop_opcode_pack_round_trip(opcode in any::<u16>(), task in any::<u16>()) {
            let table = opcodes(&[(pack_opcode(opcode, task), "x")]);
            prop_assert_eq!(table.iter().next().map(|r| (r.opcode(), r.task())), Some((opcode, task)));
        }
    }
}

//! Native message formatting with the benign-error downgrade

use evtlog_core::codes::is_benign_format_error;
use evtlog_core::{FormatKind, Handle, LogSource, Result};
use tracing::debug;

/// Format through the source, turning benign failures into an empty string.
///
/// Missing messages, missing locales, unresolved inserts and missing
/// resource files only mean "no message available". Every other failure is
/// returned.
pub fn format_or_empty(
    source: &dyn LogSource,
    metadata: Option<&Handle>,
    record: Option<&Handle>,
    message_id: Option<u32>,
    kind: FormatKind,
) -> Result<String> {
    match source.format_message(metadata, record, message_id, kind) {
        Ok(text) => Ok(text),
        Err(e) => match e.system_code() {
            Some(code) if is_benign_format_error(code) => {
                debug!(target: "evtlog::format", ?kind, code, "no message available");
                Ok(String::new())
            }
            _ => Err(e),
        },
    }
}

/// Split the NUL-separated keyword list the formatter produces.
///
/// The list may or may not end with a double NUL; an empty entry ends it.
pub fn split_keywords(text: &str) -> Vec<String> {
    text.split('\0')
        .take_while(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

//! Platform error codes surfaced by log sources.
//!
//! The numeric values are the Windows system error codes the event log
//! service reports, so a native backend can pass them through unchanged and
//! in-process backends can mimic the same failures.

/// The system cannot find the file specified.
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
/// The handle is invalid (e.g. fetching from a cursor that was never opened).
pub const ERROR_INVALID_HANDLE: u32 = 6;
/// The parameter is incorrect.
pub const ERROR_INVALID_PARAMETER: u32 = 87;
/// The data area passed to a system call is too small.
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
/// No more data is available.
pub const ERROR_NO_MORE_ITEMS: u32 = 259;
/// This operation returned because the timeout period expired.
pub const ERROR_TIMEOUT: u32 = 1460;
/// The specified channel could not be found.
pub const ERROR_EVT_CHANNEL_NOT_FOUND: u32 = 15007;
/// The publisher metadata cannot be found in the resource.
pub const ERROR_EVT_PUBLISHER_METADATA_NOT_FOUND: u32 = 15002;
/// The message resource is present but the message was not found.
pub const ERROR_EVT_MESSAGE_NOT_FOUND: u32 = 15027;
/// The message id for the desired message could not be found.
pub const ERROR_EVT_MESSAGE_ID_NOT_FOUND: u32 = 15028;
/// The substitution string for insert index could not be found.
pub const ERROR_EVT_UNRESOLVED_VALUE_INSERT: u32 = 15029;
/// The description string for parameter reference could not be found.
pub const ERROR_EVT_UNRESOLVED_PARAMETER_INSERT: u32 = 15030;
/// The maximum number of replacements has been reached.
pub const ERROR_EVT_MAX_INSERTS_REACHED: u32 = 15031;
/// The locale specific resource for the desired message is not present.
pub const ERROR_EVT_MESSAGE_LOCALE_NOT_FOUND: u32 = 15033;
/// The resource loader failed to find the MUI file.
pub const ERROR_MUI_FILE_NOT_FOUND: u32 = 15100;
/// The resource loader cache does not have a loaded MUI entry.
pub const ERROR_MUI_FILE_NOT_LOADED: u32 = 15105;

const BENIGN_FORMAT_ERRORS: [u32; 8] = [
    // misconfigured or unsupported language
    ERROR_EVT_MESSAGE_NOT_FOUND,
    ERROR_EVT_MESSAGE_ID_NOT_FOUND,
    ERROR_EVT_MESSAGE_LOCALE_NOT_FOUND,
    // raw messages retrieved without inserts
    ERROR_EVT_UNRESOLVED_PARAMETER_INSERT,
    ERROR_EVT_UNRESOLVED_VALUE_INSERT,
    ERROR_EVT_MAX_INSERTS_REACHED,
    // resource files we cannot do anything about
    ERROR_MUI_FILE_NOT_FOUND,
    ERROR_MUI_FILE_NOT_LOADED,
];

/// Returns true for formatting failures that only mean "no message available".
///
/// Callers downgrade these to an empty string instead of failing the record.
pub fn is_benign_format_error(code: u32) -> bool {
    BENIGN_FORMAT_ERRORS.contains(&code)
}

/// Human readable text for a code, used when a [`SystemError`](crate::SystemError)
/// is first displayed.
pub fn describe(code: u32) -> String {
    let text = match code {
        0 => "The operation completed successfully.",
        ERROR_FILE_NOT_FOUND => "The system cannot find the file specified.",
        ERROR_INVALID_HANDLE => "The handle is invalid.",
        ERROR_INVALID_PARAMETER => "The parameter is incorrect.",
        ERROR_INSUFFICIENT_BUFFER => "The data area passed to a system call is too small.",
        ERROR_NO_MORE_ITEMS => "No more data is available.",
        ERROR_TIMEOUT => "This operation returned because the timeout period expired.",
        ERROR_EVT_CHANNEL_NOT_FOUND => "The specified channel could not be found.",
        ERROR_EVT_PUBLISHER_METADATA_NOT_FOUND => {
            "The publisher metadata cannot be found in the resource."
        }
        ERROR_EVT_MESSAGE_NOT_FOUND => {
            "The message resource is present but the message was not found in the message table."
        }
        ERROR_EVT_MESSAGE_ID_NOT_FOUND => "The message id for the desired message could not be found.",
        ERROR_EVT_UNRESOLVED_VALUE_INSERT => "The substitution string for insert index could not be found.",
        ERROR_EVT_UNRESOLVED_PARAMETER_INSERT => {
            "The description string for parameter reference could not be found."
        }
        ERROR_EVT_MAX_INSERTS_REACHED => "The maximum number of replacements has been reached.",
        ERROR_EVT_MESSAGE_LOCALE_NOT_FOUND => {
            "The locale specific resource for the desired message is not present."
        }
        ERROR_MUI_FILE_NOT_FOUND => "The resource loader failed to find the MUI file.",
        ERROR_MUI_FILE_NOT_LOADED => "The resource loader cache does not have a loaded MUI entry.",
        other => return std::io::Error::from_raw_os_error(other as i32).to_string(),
    };
    text.to_string()
}

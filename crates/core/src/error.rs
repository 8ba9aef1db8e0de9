//! Error types for evtlog
//!
//! This module defines the error taxonomy shared by every crate in the
//! workspace. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Errors are `Clone + PartialEq`: a failure raised on the executor's worker
//! thread is captured there and handed back to the waiting caller as the very
//! same value.

use crate::codes;
use crate::value::ValueType;
use once_cell::sync::OnceCell;
use std::fmt;
use thiserror::Error;

/// Result type alias for evtlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for evtlog
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A tagged value did not carry the type the caller asked for
    #[error("invalid data type: expected {expected}, got {actual}")]
    InvalidDataType {
        /// Type the accessor requires
        expected: ValueType,
        /// Type actually stored in the value
        actual: ValueType,
    },

    /// An argument was rejected, e.g. assigning to an already-typed slot
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument
        reason: String,
    },

    /// Index past the end of an array or batch
    #[error("index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of elements available
        len: usize,
    },

    /// A call into the log source failed with a platform error code
    #[error("system error: {0}")]
    System(SystemError),

    /// The executor's fail-safe wait expired. Always a bug signal.
    #[error("executor did not complete the command within {waited_ms} ms")]
    ExecutorTimeout {
        /// How long the caller waited
        waited_ms: u64,
    },

    /// The executor's worker has shut down and accepts no more commands
    #[error("executor is shut down")]
    ExecutorClosed,

    /// Configuration could not be read or is out of range
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the problem
        reason: String,
    },

    /// Internal failure (worker panic, abandoned command)
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the failure
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::System`] with the given code.
    pub fn system(code: u32) -> Self {
        Error::System(SystemError::new(code))
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Internal`].
    pub fn internal(reason: impl Into<String>) -> Self {
        Error::Internal {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Config`].
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Platform code if this is a [`Error::System`] failure.
    pub fn system_code(&self) -> Option<u32> {
        match self {
            Error::System(e) => Some(e.code()),
            _ => None,
        }
    }
}

impl From<SystemError> for Error {
    fn from(e: SystemError) -> Self {
        Error::System(e)
    }
}

/// A failed native call: the platform code plus a message formatted on demand.
///
/// The message text is only produced the first time it is needed and is then
/// kept for the lifetime of the error (and its clones made afterwards).
#[derive(Clone)]
pub struct SystemError {
    code: u32,
    message: OnceCell<String>,
}

impl SystemError {
    /// Wrap a platform error code.
    pub fn new(code: u32) -> Self {
        Self {
            code,
            message: OnceCell::new(),
        }
    }

    /// The raw platform code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// The formatted message for the code.
    pub fn message(&self) -> &str {
        self.message.get_or_init(|| codes::describe(self.code))
    }
}

impl PartialEq for SystemError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl fmt::Debug for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemError")
            .field("code", &self.code)
            .finish()
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code)
    }
}

use std::fmt;

/// Errors from save/load/patch/replay operations.
///
/// Every fallible operation in this crate returns one of these with a
/// human-readable diagnostic; nothing here panics or aborts. Business
/// refusals (tool results) live in the simulation crate and are not errors.
#[derive(Debug)]
pub enum SaveError {
    /// File open/read/write failure.
    Io(std::io::Error),
    /// Bad magic, unsupported version, truncated stream, CRC mismatch.
    Format(String),
    /// Caller passed something out of range (sizes, versions, rects).
    InvalidArgument(String),
    /// A progress callback asked to stop.
    Cancelled,
}

impl SaveError {
    pub fn format(msg: impl Into<String>) -> SaveError {
        SaveError::Format(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> SaveError {
        SaveError::InvalidArgument(msg.into())
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "I/O error: {e}"),
            SaveError::Format(msg) => write!(f, "Format error: {msg}"),
            SaveError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            SaveError::Cancelled => write!(f, "Cancelled by caller"),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

//! Error kinds reported by the ingest pipeline
//!
//! Nothing in the pipeline fails by returning `Err`. A rejected packet is
//! counted in [`Stats`](crate::stats::Stats) and its kind is kept as the
//! last error, which is informational only.

use core::fmt;

/// Kind of the most recent producer-side failure
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No error recorded
    #[default]
    None = 0,

    /// Packet larger than the staging capacity or than its free space
    OutOfAllocatedMemory = 1,

    /// Malformed producer input (reserved, not produced yet)
    InvalidArgument = 2,
}

impl ErrorKind {
    /// Decode from the `repr(u8)` discriminant.
    ///
    /// Unknown values map to `None`.
    #[inline]
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => ErrorKind::OutOfAllocatedMemory,
            2 => ErrorKind::InvalidArgument,
            _ => ErrorKind::None,
        }
    }

    /// Human readable name
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::None => "None",
            ErrorKind::OutOfAllocatedMemory => "Out Of Allocated Memory",
            ErrorKind::InvalidArgument => "Invalid Argument",
        }
    }

    /// True for every kind except `None`
    #[inline]
    pub const fn is_error(&self) -> bool {
        !matches!(self, ErrorKind::None)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

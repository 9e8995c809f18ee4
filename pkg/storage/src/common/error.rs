use alloc::string::String;
use core::fmt;

/// Errors raised by devices, images, file systems and file streams.
///
/// Every kind is fatal to the operation in progress; nothing retries on its
/// own except the sector cache, which reopens a stale store once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    /// The device, engine or stream is not open.
    NotOpen(&'static str),
    /// A write payload does not match the sector size.
    InvalidBuffer(&'static str),
    /// The request does not make sense in the current state.
    InvalidRequest(&'static str),
    /// On-disk structures are inconsistent or unsupported.
    InvalidFormat(String),
    NotFound,
    NoSpace(&'static str),
    InvalidName(String),
    NotEmpty,
    /// The medium reported an error (bad track, status byte, host I/O).
    DiskError(String),
    WriteProtected,
    InvalidPath(String),
    /// The backing store handle went stale and must be reopened.
    StaleHandle,
}

pub type FsResult<T = ()> = Result<T, FsError>;

impl FsError {
    pub fn format(hint: impl Into<String>) -> Self {
        Self::InvalidFormat(hint.into())
    }

    pub fn disk(hint: impl Into<String>) -> Self {
        Self::DiskError(hint.into())
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen(hint) => write!(f, "not open: {}", hint),
            Self::InvalidBuffer(hint) => write!(f, "invalid buffer: {}", hint),
            Self::InvalidRequest(hint) => write!(f, "invalid request: {}", hint),
            Self::InvalidFormat(hint) => write!(f, "invalid format: {}", hint),
            Self::NotFound => write!(f, "not found"),
            Self::NoSpace(hint) => write!(f, "no space: {}", hint),
            Self::InvalidName(name) => write!(f, "invalid name: {}", name),
            Self::NotEmpty => write!(f, "directory not empty"),
            Self::DiskError(hint) => write!(f, "disk error: {}", hint),
            Self::WriteProtected => write!(f, "write protected"),
            Self::InvalidPath(path) => write!(f, "invalid path: {}", path),
            Self::StaleHandle => write!(f, "stale handle"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for FsError {}

#[cfg(any(test, feature = "std"))]
impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        Self::DiskError(format!("{}", err))
    }
}

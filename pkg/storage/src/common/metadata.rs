use super::*;
use chrono::NaiveDateTime;

/// One listed directory entry, as presented to callers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsMetadata {
    pub name: String,
    /// Name bytes as stored on disk
    pub raw_name: Vec<u8>,
    pub writable: bool,
    pub readable: bool,
    pub system: bool,
    pub archive: bool,
    pub directory: bool,
    pub created: Option<NaiveDateTime>,
    pub accessed: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub size: u64,
    /// Set for volumes and images listed by a router
    pub mount: bool,
}

impl FsMetadata {
    /// A directory-like entry that stands for a mountable volume
    pub fn mount_point(name: &str, writable: bool, size: u64) -> Self {
        Self {
            name: name.into(),
            raw_name: name.as_bytes().to_vec(),
            writable,
            readable: true,
            directory: true,
            size,
            mount: true,
            ..Default::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.directory
    }

    pub fn is_file(&self) -> bool {
        !self.directory
    }
}

/// Properties of a mounted file system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsAttributes {
    pub encoding: &'static str,
    pub volume_label: String,
}

/// Options for creating directories and opening files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryOptions {
    /// Create a new file instead of opening an existing one
    pub create: bool,
    pub writable: bool,
    pub readable: bool,
    pub system: bool,
    pub created: Option<NaiveDateTime>,
    pub accessed: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            create: false,
            writable: true,
            readable: true,
            system: false,
            created: None,
            accessed: None,
            modified: None,
        }
    }
}

impl EntryOptions {
    pub fn create() -> Self {
        Self {
            create: true,
            ..Default::default()
        }
    }
}

/// Current wall-clock time, or the DOS epoch where no clock is available.
pub fn now() -> NaiveDateTime {
    #[cfg(feature = "std")]
    {
        chrono::Local::now().naive_local()
    }
    #[cfg(not(feature = "std"))]
    {
        chrono::NaiveDate::from_ymd_opt(1980, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }
}

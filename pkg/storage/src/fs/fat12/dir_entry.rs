//! On-disk directory entries.
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0x00   | 8    | base name, space padded                 |
//! | 0x08   | 3    | extension, space padded                 |
//! | 0x0b   | 1    | attributes                              |
//! | 0x0c   | 9    | name continuation (extended names only) |
//! | 0x0d   | 1    | creation time, 10ms units               |
//! | 0x0e   | 2    | creation time                           |
//! | 0x10   | 2    | creation date                           |
//! | 0x12   | 2    | last access date                        |
//! | 0x14   | 2    | cluster high (PC only)                  |
//! | 0x16   | 2    | modification time                       |
//! | 0x18   | 2    | modification date                       |
//! | 0x1a   | 2    | cluster low                             |
//! | 0x1c   | 4    | size                                    |

use super::*;
use bitflags::bitflags;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use encoding_rs::SHIFT_JIS;

pub const ENTRY_SIZE: usize = 32;
pub const END_MARKER: u8 = 0x00;
pub const DELETED_MARKER: u8 = 0xe5;
/// Stored in place of a leading 0xe5 name byte
pub const ESCAPED_DELETED: u8 = 0x05;

const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;
const CONTINUATION_LEN: usize = 9;
const EXTENDED_BASE_LEN: usize = BASE_LEN + CONTINUATION_LEN;

bitflags! {
    /// File attributes
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
    }
}

impl Attributes {
    pub fn from_options(options: &EntryOptions, directory: bool) -> Self {
        let mut attributes = Self::empty();
        attributes.set(Self::READ_ONLY, !options.writable);
        attributes.set(Self::HIDDEN, !options.readable);
        attributes.set(Self::SYSTEM, options.system);
        attributes.set(Self::DIRECTORY, directory);
        attributes
    }
}

/// An encoded entry name: base, extension and continuation bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortName {
    base: [u8; BASE_LEN],
    ext: [u8; EXT_LEN],
    continuation: [u8; CONTINUATION_LEN],
}

impl ShortName {
    /// Encodes `name` as Shift_JIS, allowing 17 base bytes when `extended`.
    pub fn encode(name: &str, extended: bool) -> FsResult<Self> {
        let (bytes, _, unmappable) = SHIFT_JIS.encode(name);
        if unmappable {
            return Err(FsError::InvalidName(format!("unencodable: {}", name)));
        }
        let (base, ext) = split_extension(&bytes);
        let limit = if extended { EXTENDED_BASE_LEN } else { BASE_LEN };
        if base.is_empty() || base.len() > limit {
            return Err(FsError::InvalidName(format!("too long: {}", name)));
        }

        let mut full = [0u8; EXTENDED_BASE_LEN];
        full[..BASE_LEN].fill(b' ');
        full[..base.len()].copy_from_slice(base);
        if full[0] == DELETED_MARKER {
            full[0] = ESCAPED_DELETED;
        }
        let mut encoded = Self {
            base: [b' '; BASE_LEN],
            ext: [b' '; EXT_LEN],
            continuation: [0; CONTINUATION_LEN],
        };
        encoded.base.copy_from_slice(&full[..BASE_LEN]);
        encoded.continuation.copy_from_slice(&full[BASE_LEN..]);
        encoded.ext[..ext.len()].copy_from_slice(ext);
        Ok(encoded)
    }

    pub fn dot() -> Self {
        Self::special(b".")
    }

    pub fn dot_dot() -> Self {
        Self::special(b"..")
    }

    fn special(name: &[u8]) -> Self {
        let mut base = [b' '; BASE_LEN];
        base[..name.len()].copy_from_slice(name);
        Self {
            base,
            ext: [b' '; EXT_LEN],
            continuation: [0; CONTINUATION_LEN],
        }
    }

    /// Decodes the name bytes of a raw entry.
    pub fn decode(raw: &[u8], extended: bool) -> Vec<u8> {
        let mut name: Vec<u8> = raw[..BASE_LEN]
            .iter()
            .take_while(|b| **b != b' ')
            .copied()
            .collect();
        if name.first() == Some(&ESCAPED_DELETED) {
            name[0] = DELETED_MARKER;
        }
        if extended {
            name.extend(raw[0x0c..0x0c + CONTINUATION_LEN].iter().take_while(|b| **b != 0));
        }
        let ext = raw[BASE_LEN..BASE_LEN + EXT_LEN]
            .iter()
            .take_while(|b| **b != b' ');
        let mut ext = ext.peekable();
        if ext.peek().is_some() {
            name.push(b'.');
            name.extend(ext);
        }
        name
    }

    fn write_to(&self, raw: &mut [u8], extended: bool) {
        raw[..BASE_LEN].copy_from_slice(&self.base);
        raw[BASE_LEN..BASE_LEN + EXT_LEN].copy_from_slice(&self.ext);
        if extended {
            raw[0x0c..0x0c + CONTINUATION_LEN].copy_from_slice(&self.continuation);
        }
    }
}

pub fn pack_date(timestamp: &NaiveDateTime) -> u16 {
    let year = timestamp.year().clamp(1980, 2107) - 1980;
    ((year as u16) << 9) | ((timestamp.month() as u16) << 5) | timestamp.day() as u16
}

pub fn pack_time(timestamp: &NaiveDateTime) -> u16 {
    ((timestamp.hour() as u16) << 11)
        | ((timestamp.minute() as u16) << 5)
        | (timestamp.second() as u16 >> 1)
}

/// Odd second and hundredths, in 10ms units
pub fn pack_subtime(timestamp: &NaiveDateTime) -> u8 {
    let millis = (timestamp.nanosecond() / 1_000_000).min(999);
    ((timestamp.second() & 1) * 100 + millis / 10) as u8
}

/// Unpacks a DOS timestamp; a zero month or day reads as 1.
pub fn unpack_timestamp(date: u16, time: u16, subtime: u8) -> Option<NaiveDateTime> {
    let year = 1980 + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0f).max(1) as u32;
    let day = (date & 0x1f).max(1) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3f) as u32;
    let second = (time & 0x1f) as u32 * 2 + subtime as u32 / 100;
    let millis = (subtime as u32 % 100) * 10;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_milli_opt(hour, minute, second, millis)
}

/// One 32-byte directory slot.
#[derive(Clone)]
pub struct RawEntry {
    data: [u8; ENTRY_SIZE],
}

impl RawEntry {
    define_field!(u8, 0x0b, attribute_bits);
    define_field!(u8, 0x0d, created_subtime);
    define_field!(u16, 0x0e, created_time);
    define_field!(u16, 0x10, created_date);
    define_field!(u16, 0x12, accessed_date);
    define_field!(u16, 0x14, cluster_high);
    define_field!(u16, 0x16, modified_time);
    define_field!(u16, 0x18, modified_date);
    define_field!(u16, 0x1a, cluster_low);
    define_field!(u32, 0x1c, size);

    pub fn from_slice(raw: &[u8]) -> Self {
        let mut data = [0u8; ENTRY_SIZE];
        data.copy_from_slice(&raw[..ENTRY_SIZE]);
        Self { data }
    }

    /// Builds a fresh entry with size 0.
    pub fn new(
        name: &ShortName,
        attributes: Attributes,
        cluster: u32,
        options: &EntryOptions,
        extended: bool,
    ) -> Self {
        let mut entry = Self {
            data: [0; ENTRY_SIZE],
        };
        name.write_to(&mut entry.data, extended);
        entry.data[0x0b] = attributes.bits();

        let modified = options.modified.unwrap_or_else(now);
        if !extended {
            let created = options.created.unwrap_or(modified);
            entry.data[0x0d] = pack_subtime(&created);
            entry.put_u16(0x0e, pack_time(&created));
            entry.put_u16(0x10, pack_date(&created));
            entry.put_u16(0x12, pack_date(&options.accessed.unwrap_or(modified)));
        }
        entry.set_modified(&modified);
        entry.set_cluster(cluster, extended);
        entry
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_retain(self.attribute_bits())
    }

    pub fn cluster(&self, extended: bool) -> u32 {
        let high = if extended { 0 } else { self.cluster_high() as u32 };
        (high << 16) | self.cluster_low() as u32
    }

    pub fn set_cluster(&mut self, cluster: u32, extended: bool) {
        self.put_u16(0x1a, cluster as u16);
        if !extended {
            self.put_u16(0x14, (cluster >> 16) as u16);
        }
    }

    pub fn set_size(&mut self, size: u32) {
        self.data[0x1c..0x20].copy_from_slice(&size.to_le_bytes());
    }

    pub fn set_modified(&mut self, timestamp: &NaiveDateTime) {
        self.put_u16(0x16, pack_time(timestamp));
        self.put_u16(0x18, pack_date(timestamp));
    }

    pub fn modified(&self) -> Option<NaiveDateTime> {
        unpack_timestamp(self.modified_date(), self.modified_time(), 0)
    }
}

/// A decoded live directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub raw_name: Vec<u8>,
    pub attributes: Attributes,
    pub created: Option<NaiveDateTime>,
    pub accessed: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub cluster: u32,
    pub size: u32,
    /// Slot index within the directory
    pub index: usize,
}

impl DirEntry {
    pub fn parse(raw: &[u8], index: usize, extended: bool) -> Self {
        let entry = RawEntry::from_slice(raw);
        let raw_name = ShortName::decode(raw, extended);
        let (created, accessed) = if extended {
            (None, None)
        } else {
            (
                unpack_timestamp(entry.created_date(), entry.created_time(), entry.created_subtime()),
                unpack_timestamp(entry.accessed_date(), 0, 0),
            )
        };
        Self {
            name: shift_jis(&raw_name),
            raw_name,
            attributes: entry.attributes(),
            created,
            accessed,
            modified: entry.modified(),
            cluster: entry.cluster(extended),
            size: entry.size(),
            index,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    /// Volume labels and long-name slots, neither of which is a file
    pub fn is_volume(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_ID)
    }

    /// The volume label itself; long-name slots also carry the volume bit
    pub fn is_volume_label(&self) -> bool {
        self.attributes.bits() & Attributes::LONG_NAME.bits() == Attributes::VOLUME_ID.bits()
    }

    /// `.` or `..`
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    pub fn metadata(&self) -> FsMetadata {
        FsMetadata {
            name: self.name.clone(),
            raw_name: self.raw_name.clone(),
            writable: !self.attributes.contains(Attributes::READ_ONLY),
            readable: !self.attributes.contains(Attributes::HIDDEN),
            system: self.attributes.contains(Attributes::SYSTEM),
            archive: self.attributes.contains(Attributes::ARCHIVE),
            directory: self.is_dir(),
            created: self.created,
            accessed: self.accessed,
            modified: self.modified,
            size: self.size as u64,
            mount: false,
        }
    }
}

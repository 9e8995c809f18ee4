//! Boot sector dialects and the volume layout derived from them.

use super::*;

/// OEM name prefixes of volumes written by the X68000 tool chain.
pub const HUMAN_OEM_PREFIXES: [&str; 3] = ["X68", "Hudson soft 1.", "9SCFMT IPL v1."];

const HUMAN_JUMP: u8 = 0x60;
const HUMAN_IPLS: [u8; 2] = [0x1c, 0x1e];
const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
const MIN_BOOT_SECTOR: usize = 64;

/// FAT12 volumes have fewer clusters than this
pub const FAT12_MAX_CLUSTERS: u32 = 4086;

fn has_human_oem(oem_name: &str) -> bool {
    HUMAN_OEM_PREFIXES
        .iter()
        .any(|prefix| oem_name.starts_with(prefix))
}

/// A PC compatible BIOS parameter block.
#[derive(Clone)]
pub struct PcBootSector {
    data: Vec<u8>,
}

impl PcBootSector {
    define_field!([u8; 8], 0x03, oem_name);
    define_field!(u16, 0x0b, bytes_per_sector);
    define_field!(u8, 0x0d, sectors_per_cluster);
    define_field!(u16, 0x0e, reserved_sector_count);
    define_field!(u8, 0x10, fat_count);
    define_field!(u16, 0x11, root_entries_count);
    define_field!(u16, 0x13, total_sectors_16);
    define_field!(u8, 0x15, media_descriptor);
    define_field!(u16, 0x16, sectors_per_fat);
    define_field!(u16, 0x18, sectors_per_track);
    define_field!(u16, 0x1a, track_heads);
    define_field!(u32, 0x1c, hidden_sectors);
    define_field!(u32, 0x20, total_sectors_32);
    define_field!(u8, 0x26, boot_signature);
    define_field!(u32, 0x27, volume_id);
    define_field!([u8; 11], 0x2b, volume_label);
    define_field!([u8; 8], 0x36, system_identifier);

    pub fn total_sectors(&self) -> u32 {
        match self.total_sectors_16() {
            0 => self.total_sectors_32(),
            total => total as u32,
        }
    }

    pub fn has_extended_boot(&self) -> bool {
        self.boot_signature() == EXTENDED_BOOT_SIGNATURE
    }

    fn params(&self) -> VolumeParams {
        let extended = self.has_extended_boot();
        let oem_name = self.oem_name_str();
        VolumeParams {
            extended_names: has_human_oem(&oem_name),
            oem_name,
            bytes_per_sector: self.bytes_per_sector() as usize,
            sectors_per_cluster: self.sectors_per_cluster() as usize,
            reserved_sectors: self.reserved_sector_count() as usize,
            fat_count: self.fat_count() as usize,
            root_entries: self.root_entries_count() as usize,
            total_sectors: self.total_sectors() as usize,
            media: self.media_descriptor(),
            fat_sectors: self.sectors_per_fat() as usize,
            sectors_per_track: self.sectors_per_track() as usize,
            heads: self.track_heads() as usize,
            hidden_sectors: self.hidden_sectors(),
            volume_id: if extended { self.volume_id() } else { 0 },
            volume_label: if extended {
                self.volume_label_str().trim_end().into()
            } else {
                String::new()
            },
            fat_type: if extended {
                self.system_identifier_str().trim_end().into()
            } else {
                String::new()
            },
        }
    }
}

/// The X68000 (Human68k) boot sector.
///
/// Only a handful of fields are stored, big-endian; sectors per cluster and
/// reserved sectors are always 1.
#[derive(Clone)]
pub struct HumanBootSector {
    data: Vec<u8>,
}

impl HumanBootSector {
    define_field!([u8; 16], 0x02, oem_name);
    define_field!(be16, 0x12, bytes_per_sector);
    define_field!(u8, 0x14, cluster_marker);
    define_field!(u8, 0x15, sectors_per_fat);
    define_field!(u8, 0x16, reserved_low);
    define_field!(u8, 0x17, reserved_marker);
    define_field!(u8, 0x18, reserved_high);
    define_field!(u8, 0x19, root_entries_count);
    define_field!(be16, 0x1a, total_sectors);
    define_field!(u8, 0x1c, media_descriptor);
    define_field!(u8, 0x1d, fat_count);

    fn check(&self) -> FsResult {
        let oem_name = self.oem_name_str();
        if !has_human_oem(&oem_name) {
            return Err(FsError::format(format!("unknown IPL \"{}\"", oem_name)));
        }
        if self.bytes_per_sector() != 1024 {
            return Err(FsError::format("Human68k sector must be 1024 bytes"));
        }
        if self.root_entries_count() != 192 {
            return Err(FsError::format("Human68k root must hold 192 entries"));
        }
        if self.cluster_marker() != 1
            || self.reserved_marker() != 1
            || self.reserved_low() != 0
            || self.reserved_high() != 0
        {
            return Err(FsError::format("unexpected Human68k layout bytes"));
        }
        self.geometry().map(|_| ())
    }

    /// Returns (total sectors, sectors per track) for the media byte
    fn geometry(&self) -> FsResult<(usize, usize)> {
        let expected = match self.media_descriptor() {
            0xfb => (1440, 9),
            0xfe => (1232, 8),
            media => {
                return Err(FsError::format(format!("unknown Human68k media {:#x}", media)))
            }
        };
        if self.total_sectors() as usize != expected.0 {
            return Err(FsError::format("Human68k total sectors do not match media"));
        }
        Ok(expected)
    }

    fn params(&self) -> FsResult<VolumeParams> {
        let (total_sectors, sectors_per_track) = self.geometry()?;
        Ok(VolumeParams {
            oem_name: self.oem_name_str(),
            bytes_per_sector: self.bytes_per_sector() as usize,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            fat_count: self.fat_count() as usize,
            root_entries: self.root_entries_count() as usize,
            total_sectors,
            media: self.media_descriptor(),
            fat_sectors: self.sectors_per_fat() as usize,
            sectors_per_track,
            heads: 2,
            hidden_sectors: 0,
            volume_id: 0,
            volume_label: String::new(),
            fat_type: String::new(),
            extended_names: true,
        })
    }
}

/// Sector 0 of a volume, in one of the two dialects.
#[derive(Clone)]
pub enum BootSector {
    Pc(PcBootSector),
    Human(HumanBootSector),
}

impl BootSector {
    pub fn parse(data: Vec<u8>) -> FsResult<Self> {
        if data.len() < MIN_BOOT_SECTOR {
            return Err(FsError::format("boot sector too short"));
        }
        if data[0] == HUMAN_JUMP && HUMAN_IPLS.contains(&data[1]) {
            let sector = HumanBootSector { data };
            sector.check()?;
            Ok(Self::Human(sector))
        } else {
            Ok(Self::Pc(PcBootSector { data }))
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human(_))
    }

    pub fn params(&self) -> FsResult<VolumeParams> {
        match self {
            Self::Pc(sector) => Ok(sector.params()),
            Self::Human(sector) => sector.params(),
        }
    }
}

/// Parameters read from the boot sector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeParams {
    pub oem_name: String,
    pub bytes_per_sector: usize,
    pub sectors_per_cluster: usize,
    pub reserved_sectors: usize,
    pub fat_count: usize,
    pub root_entries: usize,
    pub total_sectors: usize,
    pub media: u8,
    pub fat_sectors: usize,
    pub sectors_per_track: usize,
    pub heads: usize,
    pub hidden_sectors: u32,
    pub volume_id: u32,
    /// Label stored in the extended boot record, if any
    pub volume_label: String,
    pub fat_type: String,
    /// Entries carry up to 17 name characters
    pub extended_names: bool,
}

impl VolumeParams {
    /// Rejects parameters that disagree with the device carrying them.
    pub fn check_device(&self, device: &DeviceAttributes) -> FsResult {
        if self.bytes_per_sector != device.bytes_per_sector {
            return Err(FsError::format("inconsistent sector size"));
        }
        if self.sectors_per_track != device.sectors_per_track {
            return Err(FsError::format("inconsistent sectors/track"));
        }
        if self.total_sectors != device.total_sectors() {
            return Err(FsError::format("inconsistent total tracks"));
        }
        Ok(())
    }

    pub fn layout(&self) -> FsResult<Layout> {
        if self.bytes_per_sector < ENTRY_SIZE
            || self.sectors_per_cluster == 0
            || self.fat_count == 0
            || self.fat_sectors == 0
        {
            return Err(FsError::format("degenerate volume parameters"));
        }
        let fat_start = self.reserved_sectors;
        let root_start = fat_start + self.fat_sectors * self.fat_count;
        let root_sectors = (ENTRY_SIZE * self.root_entries).div_ceil(self.bytes_per_sector);
        let data_start = root_start + root_sectors;
        let data_sectors = self
            .total_sectors
            .checked_sub(data_start)
            .ok_or_else(|| FsError::format("data region starts beyond the volume"))?;
        let clusters = (data_sectors / self.sectors_per_cluster) as u32;
        if clusters >= FAT12_MAX_CLUSTERS {
            return Err(FsError::format("fat16/fat32 are not supported"));
        }

        let layout = Layout {
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_cluster: self.sectors_per_cluster,
            fat_start: fat_start as u32,
            fat_sectors: self.fat_sectors as u32,
            fat_count: self.fat_count as u32,
            root_start: root_start as u32,
            root_sectors: root_sectors as u32,
            root_entries: self.root_entries,
            data_start: data_start as u32,
            clusters,
            last_cluster: clusters + 1,
        };
        debug!("FAT12 layout: {:?}", layout);
        Ok(layout)
    }
}

/// Where each region of a volume lives, in sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub bytes_per_sector: usize,
    pub sectors_per_cluster: usize,
    pub fat_start: u32,
    pub fat_sectors: u32,
    pub fat_count: u32,
    pub root_start: u32,
    pub root_sectors: u32,
    pub root_entries: usize,
    pub data_start: u32,
    pub clusters: u32,
    pub last_cluster: u32,
}

impl Layout {
    pub fn bytes_per_cluster(&self) -> usize {
        self.bytes_per_sector * self.sectors_per_cluster
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.data_start + (cluster - 2) * self.sectors_per_cluster as u32
    }
}

//! Blank disk images and small device wrappers shared by the unit tests.

use crate::*;
use hex_literal::hex;

/// Sector size, sectors per track and track count of a disk.
#[derive(Clone, Copy, Debug)]
pub struct Geometry {
    pub bytes_per_sector: usize,
    pub sectors_per_track: usize,
    pub tracks: usize,
}

impl Geometry {
    pub const fn size(&self) -> usize {
        self.bytes_per_sector * self.sectors_per_track * self.tracks
    }
}

/// 1.25M: 1024 * 8 * 154
pub const GEOMETRY_2HD: Geometry = Geometry {
    bytes_per_sector: 1024,
    sectors_per_track: 8,
    tracks: 154,
};

/// 720K: 512 * 9 * 160
pub const GEOMETRY_2DD: Geometry = Geometry {
    bytes_per_sector: 512,
    sectors_per_track: 9,
    tracks: 160,
};

/// 1.44M X68000: 1024 * 9 * 160
pub const GEOMETRY_2HS: Geometry = Geometry {
    bytes_per_sector: 1024,
    sectors_per_track: 9,
    tracks: 160,
};

/// PC boot sector of a freshly formatted 2HD disk labelled "BLANK".
pub const PC_2HD_HEADER: [u8; 62] = hex!(
    "eb3c90 46444b4954312e30 0004 01 0100 02 c000 d004 fe 0200 0800 0200"
    "00000000 00000000 00 00 29 78563412 424c414e4b202020202020 4641543132202020"
);

/// PC boot sector of a 720K disk labelled "DD720": two sectors per cluster,
/// 112 root entries and 3 sectors per FAT.
pub const PC_2DD_HEADER: [u8; 62] = hex!(
    "eb3c90 46444b4954312e30 0002 02 0100 02 7000 a005 f9 0300 0900 0200"
    "00000000 00000000 00 00 29 78563412 44443732302020202020 20 4641543132202020"
);

/// X68000 boot sector of a 2HD disk: IPL jump, "X68IPL30" and the
/// big-endian parameter block.
pub const HUMAN_2HD_HEADER: [u8; 32] =
    hex!("601c 5836 3849 504c 3330 2020 2020 2020 2020 0400 0102 0001 00c0 04d0 fe02 0000");

/// X68000 boot sector of a 2HS disk (media 0xfb, 1440 sectors, 3 sectors
/// per FAT).
pub const HUMAN_2HS_HEADER: [u8; 32] =
    hex!("601c 5836 3849 504c 3330 2020 2020 2020 2020 0400 0103 0001 00c0 05a0 fb02 0000");

fn format(geometry: Geometry, boot: &[u8], fat_sectors: usize) -> Vec<u8> {
    let bytes_per_sector = geometry.bytes_per_sector;
    let mut image = vec![0u8; geometry.size()];
    image[..boot.len()].copy_from_slice(boot);
    image[510..512].copy_from_slice(&[0x55, 0xaa]);
    let media = if boot[0] == 0x60 { boot[0x1c] } else { boot[0x15] };
    for copy in 0..2 {
        let at = (1 + copy * fat_sectors) * bytes_per_sector;
        image[at..at + 3].copy_from_slice(&[media, 0xff, 0xff]);
    }
    image
}

pub fn blank_2hd() -> Vec<u8> {
    format(GEOMETRY_2HD, &PC_2HD_HEADER, 2)
}

pub fn blank_2dd() -> Vec<u8> {
    format(GEOMETRY_2DD, &PC_2DD_HEADER, 3)
}

pub fn blank_human_2hd() -> Vec<u8> {
    format(GEOMETRY_2HD, &HUMAN_2HD_HEADER, 2)
}

pub fn blank_human_2hs() -> Vec<u8> {
    format(GEOMETRY_2HS, &HUMAN_2HS_HEADER, 3)
}

pub fn xdf(image: Vec<u8>) -> XdfImage<MemoryIo> {
    XdfImage::open(MemoryIo::new("test.xdf", image)).unwrap()
}

pub fn mount(image: Vec<u8>) -> Fat12<XdfImage<MemoryIo>> {
    Fat12::open(xdf(image)).unwrap()
}

/// A 2HD DCU holding only the first `tracks` tracks of `image`.
pub fn dcu_from(image: &[u8], tracks: usize) -> Vec<u8> {
    dcu_with(0, GEOMETRY_2HD, image, tracks)
}

/// A DCU of type `kind` holding the first `tracks` tracks of `image`.
pub fn dcu_with(kind: u8, geometry: Geometry, image: &[u8], tracks: usize) -> Vec<u8> {
    let track_size = geometry.bytes_per_sector * geometry.sectors_per_track;
    let mut data = vec![0u8; 162];
    data[0] = kind;
    data[1..=tracks].fill(1);
    data[geometry.tracks + 1] = 1;
    data.extend_from_slice(&image[..tracks * track_size]);
    data
}

/// One D88 disk carrying a flat 2HD image.
pub fn d88_from(name: &str, image: &[u8]) -> Vec<u8> {
    d88_with(name, GEOMETRY_2HD, image)
}

/// One D88 disk carrying a flat image of the given geometry.
pub fn d88_with(name: &str, geometry: Geometry, image: &[u8]) -> Vec<u8> {
    const DISK_HEADER: usize = 0x2b0;
    const SECTOR_HEADER: usize = 0x10;
    let Geometry {
        bytes_per_sector,
        sectors_per_track,
        tracks,
    } = geometry;
    let track_size = sectors_per_track * (SECTOR_HEADER + bytes_per_sector);
    let size = DISK_HEADER + tracks * track_size;

    let mut data = vec![0u8; size];
    data[..name.len()].copy_from_slice(name.as_bytes());
    data[0x1b] = 0x20;
    data[0x1c..0x20].copy_from_slice(&(size as u32).to_le_bytes());
    for track in 0..tracks {
        let track_offset = DISK_HEADER + track * track_size;
        data[0x20 + track * 4..0x24 + track * 4].copy_from_slice(&(track_offset as u32).to_le_bytes());
        for n in 0..sectors_per_track {
            let at = track_offset + n * (SECTOR_HEADER + bytes_per_sector);
            data[at] = (track / 2) as u8;
            data[at + 1] = (track % 2) as u8;
            data[at + 2] = n as u8 + 1;
            data[at + 3] = (bytes_per_sector / 128).trailing_zeros() as u8;
            data[at + 4..at + 6].copy_from_slice(&(sectors_per_track as u16).to_le_bytes());
            data[at + 0x0e..at + 0x10].copy_from_slice(&(bytes_per_sector as u16).to_le_bytes());
            let sector = (track * sectors_per_track + n) * bytes_per_sector;
            data[at + SECTOR_HEADER..at + SECTOR_HEADER + bytes_per_sector]
                .copy_from_slice(&image[sector..sector + bytes_per_sector]);
        }
    }
    data
}

/// Reports the wrapped device as write protected.
pub struct ReadOnly<D: BlockDevice>(pub D);

impl<D: BlockDevice> BlockDevice for ReadOnly<D> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        self.0.read_block(sector, buf)
    }

    fn write_block(&mut self, _sector: u32, _buf: &[u8]) -> FsResult {
        Err(FsError::WriteProtected)
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        let mut attributes = self.0.attributes()?;
        attributes.read_only = true;
        Ok(attributes)
    }

    fn flush(&mut self) -> FsResult {
        self.0.flush()
    }
}

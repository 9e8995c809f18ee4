use super::*;
use alloc::sync::Arc;
use spin::Mutex;

const DISK_HEADER_SIZE: usize = 0x2b0;
const SECTOR_HEADER_SIZE: usize = 0x10;
const MAX_TRACKS: usize = 164;
const WRITE_PROTECTED: u8 = 0x10;

/// Header in front of every disk of a D88 container.
struct DiskHeader {
    data: Vec<u8>,
}

impl DiskHeader {
    define_field!([u8; 17], 0x00, name);
    define_field!(u8, 0x1a, write_protect);
    define_field!(u8, 0x1b, media);
    define_field!(u32, 0x1c, disk_size);

    /// Track offsets relative to the disk start; the table ends at the first 0
    fn track_offsets(&self) -> Vec<u32> {
        self.data[0x20..0x20 + MAX_TRACKS * 4]
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .take_while(|offset| *offset != 0)
            .collect()
    }
}

/// Header in front of every sector's data.
struct SectorHeader {
    data: Vec<u8>,
}

impl SectorHeader {
    define_field!(u8, 0x00, cylinder);
    define_field!(u8, 0x01, head);
    define_field!(u8, 0x02, record);
    define_field!(u16, 0x04, sectors_in_track);
    define_field!(u8, 0x08, status);
    define_field!(u16, 0x0e, data_size);
}

/// One disk inside a D88 container.
pub struct D88Disk<F: FileIo> {
    store: Arc<Mutex<F>>,
    base: u64,
    name: String,
    media: u8,
    read_only: bool,
    size: u64,
    tracks: Vec<u32>,
    bytes_per_sector: usize,
    sectors_per_track: usize,
}

impl<F: FileIo> Clone for D88Disk<F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            base: self.base,
            name: self.name.clone(),
            media: self.media,
            read_only: self.read_only,
            size: self.size,
            tracks: self.tracks.clone(),
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_track: self.sectors_per_track,
        }
    }
}

impl<F: FileIo> D88Disk<F> {
    fn open(store: Arc<Mutex<F>>, base: u64, read_only: bool) -> FsResult<Self> {
        let header = DiskHeader {
            data: store.lock().read_at(base, DISK_HEADER_SIZE)?,
        };
        if header.data.len() != DISK_HEADER_SIZE {
            return Err(FsError::format("D88 disk header too short"));
        }
        let tracks = header.track_offsets();
        let first = *tracks
            .first()
            .ok_or_else(|| FsError::format("D88 disk without tracks"))?;

        let sector = SectorHeader {
            data: store
                .lock()
                .read_at(base + first as u64, SECTOR_HEADER_SIZE)?,
        };
        if sector.data.len() != SECTOR_HEADER_SIZE {
            return Err(FsError::format("D88 sector header too short"));
        }
        let sectors_per_track = sector.sectors_in_track() as usize;
        let bytes_per_sector = sector.data_size() as usize;
        if sectors_per_track == 0 || bytes_per_sector == 0 {
            return Err(FsError::format("D88 empty first track"));
        }

        let disk = Self {
            store,
            base,
            name: header.name_str(),
            media: header.media(),
            read_only: read_only || header.write_protect() == WRITE_PROTECTED,
            size: header.disk_size() as u64,
            tracks,
            bytes_per_sector,
            sectors_per_track,
        };
        debug!(
            "D88 disk \"{}\" at {:#x}: media {:#x}, {} tracks, {}x{} bytes",
            disk.name,
            base,
            disk.media,
            disk.tracks.len(),
            disk.sectors_per_track,
            disk.bytes_per_sector
        );
        Ok(disk)
    }

    pub fn media(&self) -> u8 {
        self.media
    }

    /// Finds the data of `sector`, checking its header on every access.
    fn locate(&self, sector: u32) -> FsResult<u64> {
        let track = sector as usize / self.sectors_per_track;
        let in_track = sector as usize % self.sectors_per_track;
        let track_offset = *self
            .tracks
            .get(track)
            .ok_or_else(|| FsError::disk("D88 out of range track"))?;
        let offset = self.base
            + track_offset as u64
            + (in_track * (SECTOR_HEADER_SIZE + self.bytes_per_sector)) as u64;

        let header = SectorHeader {
            data: self.store.lock().read_at(offset, SECTOR_HEADER_SIZE)?,
        };
        if header.data.len() != SECTOR_HEADER_SIZE {
            return Err(FsError::disk("D88 truncated sector header"));
        }
        if header.status() != 0 {
            return Err(FsError::disk(format!("D88 error status: {:#x}", header.status())));
        }
        if header.sectors_in_track() as usize != self.sectors_per_track
            || header.data_size() as usize != self.bytes_per_sector
        {
            return Err(FsError::disk(format!(
                "D88 irregular sector C{} H{} R{}",
                header.cylinder(),
                header.head(),
                header.record()
            )));
        }
        Ok(offset + SECTOR_HEADER_SIZE as u64)
    }
}

impl<F: FileIo + 'static> BlockDevice for D88Disk<F> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        check_buffer(buf.len(), self.bytes_per_sector)?;
        let offset = self.locate(sector)?;
        let data = self.store.lock().read_at(offset, self.bytes_per_sector)?;
        if data.len() != self.bytes_per_sector {
            return Err(FsError::disk("short D88 sector read"));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        check_buffer(buf.len(), self.bytes_per_sector)?;
        let offset = self.locate(sector)?;
        self.store.lock().write_at(offset, buf)?;
        Ok(())
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        Ok(DeviceAttributes {
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_track: self.sectors_per_track,
            tracks: self.tracks.len(),
            size: self.size,
            name: self.name.clone(),
            read_only: self.read_only,
            bundles: None,
        })
    }

    fn flush(&mut self) -> FsResult {
        self.store.lock().flush()
    }
}

/// A D88 container: one or more disks stored back to back.
///
/// As a block device it is its first disk under the container's name; every
/// disk, with its own name, is reached through [`BlockDevice::bundle`].
pub struct D88Image<F: FileIo> {
    name: String,
    disks: Vec<D88Disk<F>>,
}

impl<F: FileIo> D88Image<F> {
    pub fn open(io: F) -> FsResult<Self> {
        let attributes = io.attributes()?;
        let size = attributes.size;
        let store = Arc::new(Mutex::new(io));
        let mut disks = Vec::new();
        let mut offset = 0u64;
        while offset < size {
            let disk = D88Disk::open(store.clone(), offset, attributes.read_only)?;
            if disk.size == 0 {
                return Err(FsError::format("D88 disk of size 0"));
            }
            offset += disk.size;
            disks.push(disk);
        }
        if offset != size || disks.is_empty() {
            return Err(FsError::format("D88 unexpected padding"));
        }
        Ok(Self {
            name: attributes.name,
            disks,
        })
    }

    pub fn disks(&self) -> &[D88Disk<F>] {
        &self.disks
    }

    fn first(&mut self) -> &mut D88Disk<F> {
        // open() guarantees at least one disk
        &mut self.disks[0]
    }
}

impl<F: FileIo + 'static> BlockDevice for D88Image<F> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        self.first().read_block(sector, buf)
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        self.first().write_block(sector, buf)
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        let mut attributes = self.disks[0].attributes()?;
        attributes.name = self.name.clone();
        attributes.bundles = Some(self.disks.len());
        Ok(attributes)
    }

    fn flush(&mut self) -> FsResult {
        self.first().flush()
    }

    fn bundle(&self, index: usize) -> FsResult<Box<dyn BlockDevice>> {
        let disk = self
            .disks
            .get(index)
            .ok_or(FsError::InvalidRequest("no such disk in bundle"))?;
        Ok(Box::new(disk.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPS: usize = 256;
    const SPT: usize = 4;
    const TRACKS: usize = 3;

    /// Builds a disk whose sector `n` is filled with byte `fill + n`.
    fn disk(name: &str, fill: u8, write_protect: u8) -> Vec<u8> {
        let track_size = SPT * (SECTOR_HEADER_SIZE + BPS);
        let size = DISK_HEADER_SIZE + TRACKS * track_size;
        let mut data = vec![0u8; size];
        data[..name.len()].copy_from_slice(name.as_bytes());
        data[0x1a] = write_protect;
        data[0x1b] = 0x20;
        data[0x1c..0x20].copy_from_slice(&(size as u32).to_le_bytes());
        for track in 0..TRACKS {
            let track_offset = DISK_HEADER_SIZE + track * track_size;
            data[0x20 + track * 4..0x24 + track * 4]
                .copy_from_slice(&(track_offset as u32).to_le_bytes());
            for n in 0..SPT {
                let at = track_offset + n * (SECTOR_HEADER_SIZE + BPS);
                data[at] = (track / 2) as u8;
                data[at + 1] = (track % 2) as u8;
                data[at + 2] = n as u8 + 1;
                data[at + 3] = 1;
                data[at + 4..at + 6].copy_from_slice(&(SPT as u16).to_le_bytes());
                data[at + 0x0e..at + 0x10].copy_from_slice(&(BPS as u16).to_le_bytes());
                let sector = (track * SPT + n) as u8;
                data[at + SECTOR_HEADER_SIZE..at + SECTOR_HEADER_SIZE + BPS]
                    .fill(fill.wrapping_add(sector));
            }
        }
        data
    }

    #[test]
    fn reads_sectors_past_headers() {
        let mut image = D88Image::open(MemoryIo::new("a.d88", disk("GAME", 0, 0))).unwrap();
        let attributes = image.attributes().unwrap();
        assert_eq!(attributes.name, "a.d88");
        assert_eq!(image.bundle(0).unwrap().attributes().unwrap().name, "GAME");
        assert_eq!(attributes.bytes_per_sector, BPS);
        assert_eq!(attributes.sectors_per_track, SPT);
        assert_eq!(attributes.tracks, TRACKS);
        assert_eq!(attributes.bundles, Some(1));

        assert_eq!(image.read_sector(0).unwrap(), vec![0; BPS]);
        assert_eq!(image.read_sector(5).unwrap(), vec![5; BPS]);
        image.write_block(6, &[0xaa; BPS]).unwrap();
        assert_eq!(image.read_sector(6).unwrap(), vec![0xaa; BPS]);
        assert_eq!(image.read_sector(7).unwrap(), vec![7; BPS]);
        assert!(matches!(image.read_sector(12), Err(FsError::DiskError(_))));
    }

    #[test]
    fn bundles_share_the_container() {
        let mut data = disk("ONE", 0, 0);
        data.extend(disk("TWO", 0x40, WRITE_PROTECTED));
        let image = D88Image::open(MemoryIo::new("b.d88", data)).unwrap();
        assert_eq!(image.attributes().unwrap().bundles, Some(2));

        let mut second = image.bundle(1).unwrap();
        let attributes = second.attributes().unwrap();
        assert_eq!(attributes.name, "TWO");
        assert!(attributes.read_only);
        assert_eq!(second.read_sector(1).unwrap(), vec![0x41; BPS]);
        assert_eq!(second.write_block(1, &[0; BPS]), Err(FsError::WriteProtected));
        assert!(matches!(image.bundle(2), Err(FsError::InvalidRequest(_))));
    }

    #[test]
    fn read_only_containers_protect_every_disk() {
        let mut data = disk("ONE", 0, 0);
        data.extend(disk("TWO", 0, 0));
        let mut image = D88Image::open(MemoryIo::new("ro.d88", data).write_protected()).unwrap();
        assert!(image.attributes().unwrap().read_only);
        assert!(image.bundle(1).unwrap().attributes().unwrap().read_only);
        assert_eq!(image.write_block(0, &[0; BPS]), Err(FsError::WriteProtected));
        assert_eq!(image.read_sector(1).unwrap(), vec![1; BPS]);
    }

    #[test]
    fn rejects_bad_sectors_and_padding() {
        let mut data = disk("BAD", 0, 0);
        let at = DISK_HEADER_SIZE + (SECTOR_HEADER_SIZE + BPS);
        data[at + 8] = 0xa0;
        let mut image = D88Image::open(MemoryIo::new("c.d88", data.clone())).unwrap();
        assert!(matches!(image.read_sector(1), Err(FsError::DiskError(_))));
        assert!(image.read_sector(2).is_ok());

        data.extend([0u8; 16]);
        assert!(matches!(
            D88Image::open(MemoryIo::new("c.d88", data)),
            Err(FsError::InvalidFormat(_))
        ));
    }
}

use super::*;

const SECTOR_SIZE: usize = 1024;
const SECTORS_PER_TRACK: usize = 8;
const TRACKS: usize = 154;
const SECTOR_COUNT: u32 = (SECTORS_PER_TRACK * TRACKS) as u32;
const IMAGE_SIZE: u64 = (SECTOR_SIZE * SECTORS_PER_TRACK * TRACKS) as u64;

/// A raw 2HD image: 1024-byte sectors, 8 per track, 154 tracks, no header.
pub struct XdfImage<F: FileIo> {
    io: Option<F>,
    name: String,
    read_only: bool,
}

impl<F: FileIo> XdfImage<F> {
    pub fn open(io: F) -> FsResult<Self> {
        let attributes = io.attributes()?;
        if attributes.size != IMAGE_SIZE {
            return Err(FsError::format(format!(
                "XDF image must be {} bytes, got {}",
                IMAGE_SIZE, attributes.size
            )));
        }
        debug!("XDF image \"{}\" opened.", attributes.name);
        Ok(Self {
            io: Some(io),
            name: attributes.name,
            read_only: attributes.read_only,
        })
    }

    pub fn into_inner(self) -> Option<F> {
        self.io
    }

    fn seek(&mut self, sector: u32) -> FsResult<&mut F> {
        let io = self.io.as_mut().ok_or(FsError::NotOpen("XDF"))?;
        if sector >= SECTOR_COUNT {
            return Err(FsError::NoSpace("invalid sector"));
        }
        io.seek(sector as u64 * SECTOR_SIZE as u64)?;
        Ok(io)
    }
}

impl<F: FileIo + 'static> BlockDevice for XdfImage<F> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        check_buffer(buf.len(), SECTOR_SIZE)?;
        let data = self.seek(sector)?.read(SECTOR_SIZE)?;
        if data.len() != SECTOR_SIZE {
            return Err(FsError::disk("short XDF sector read"));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        check_buffer(buf.len(), SECTOR_SIZE)?;
        self.seek(sector)?.write(buf)?;
        Ok(())
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        Ok(DeviceAttributes {
            bytes_per_sector: SECTOR_SIZE,
            sectors_per_track: SECTORS_PER_TRACK,
            tracks: TRACKS,
            size: IMAGE_SIZE,
            name: self.name.clone(),
            read_only: self.read_only,
            bundles: None,
        })
    }

    fn flush(&mut self) -> FsResult {
        match self.io.as_mut() {
            Some(io) => io.flush(),
            None => Ok(()),
        }
    }
}

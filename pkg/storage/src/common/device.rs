use super::*;

/// Geometry and identity reported by a block device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceAttributes {
    pub bytes_per_sector: usize,
    pub sectors_per_track: usize,
    pub tracks: usize,
    /// Size in bytes of the container backing this device
    pub size: u64,
    pub name: String,
    pub read_only: bool,
    /// Number of independent disks when the container bundles several
    pub bundles: Option<usize>,
}

impl DeviceAttributes {
    pub fn total_sectors(&self) -> usize {
        self.sectors_per_track * self.tracks
    }
}

/// A sector-addressable device, sectors numbered from 0.
pub trait BlockDevice: Send + 'static {
    /// Reads one sector into `buf`, which must be exactly one sector long
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult;

    /// Writes one sector from `buf`, which must be exactly one sector long
    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult;

    /// Returns the geometry of the device
    fn attributes(&self) -> FsResult<DeviceAttributes>;

    /// Pushes buffered writes down to the backing store
    fn flush(&mut self) -> FsResult;

    /// Returns the `index`-th disk of a bundled container
    fn bundle(&self, _index: usize) -> FsResult<Box<dyn BlockDevice>> {
        Err(FsError::InvalidRequest("not a bundle"))
    }

    /// Reads one sector into a freshly allocated buffer
    fn read_sector(&mut self, sector: u32) -> FsResult<Vec<u8>> {
        let mut buf = vec![0u8; self.attributes()?.bytes_per_sector];
        self.read_block(sector, &mut buf)?;
        Ok(buf)
    }
}

impl BlockDevice for Box<dyn BlockDevice> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        (**self).read_block(sector, buf)
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        (**self).write_block(sector, buf)
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        (**self).attributes()
    }

    fn flush(&mut self) -> FsResult {
        (**self).flush()
    }

    fn bundle(&self, index: usize) -> FsResult<Box<dyn BlockDevice>> {
        (**self).bundle(index)
    }
}

/// An unbuffered random-access byte store, the layer below the sector cache.
pub trait RawStore: Send {
    /// Returns the current length of the store in bytes
    fn len(&self) -> FsResult<u64>;

    /// Reads into `buf` starting at `offset`, returning the bytes read
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<usize>;

    /// Writes `buf` at `offset`
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult;

    /// Resizes the store
    fn set_len(&mut self, size: u64) -> FsResult;

    /// Makes written bytes durable
    fn sync(&mut self) -> FsResult;

    /// Reacquires the underlying handle after it went stale
    fn reopen(&mut self) -> FsResult {
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_empty(&self) -> FsResult<bool> {
        Ok(self.len()? == 0)
    }
}

use super::*;

pub const FREE_CLUSTER: u16 = 0x000;
pub const BAD_CLUSTER: u16 = 0xff7;
/// Written to terminate a chain; anything from 0xff8 up is read as the end
pub const END_OF_CHAIN: u16 = 0xfff;
const END_OF_CHAIN_MIN: u16 = 0xff8;

pub fn is_end_of_chain(value: u16) -> bool {
    value >= END_OF_CHAIN_MIN
}

/// An in-memory copy of the allocation table, written back per sector.
pub struct FatTable {
    data: Vec<u8>,
    dirty: Vec<bool>,
    bytes_per_sector: usize,
    last_cluster: u32,
}

impl FatTable {
    pub fn new(data: Vec<u8>, bytes_per_sector: usize, last_cluster: u32) -> Self {
        let sectors = data.len() / bytes_per_sector;
        Self {
            data,
            dirty: vec![false; sectors],
            bytes_per_sector,
            last_cluster,
        }
    }

    pub fn last_cluster(&self) -> u32 {
        self.last_cluster
    }

    fn offset(&self, cluster: u32) -> FsResult<usize> {
        let offset = cluster as usize * 3 / 2;
        if offset + 1 >= self.data.len() {
            return Err(FsError::format(format!("cluster {} beyond FAT", cluster)));
        }
        Ok(offset)
    }

    pub fn get(&self, cluster: u32) -> FsResult<u16> {
        let offset = self.offset(cluster)?;
        let (low, high) = (self.data[offset] as u16, self.data[offset + 1] as u16);
        Ok(if cluster & 1 == 1 {
            (high << 4) | (low >> 4)
        } else {
            ((high & 0x0f) << 8) | low
        })
    }

    pub fn set(&mut self, cluster: u32, value: u16) -> FsResult {
        let offset = self.offset(cluster)?;
        let value = value & 0x0fff;
        if cluster & 1 == 1 {
            self.data[offset] = (self.data[offset] & 0x0f) | ((value & 0x0f) << 4) as u8;
            self.data[offset + 1] = (value >> 4) as u8;
        } else {
            self.data[offset] = value as u8;
            self.data[offset + 1] = (self.data[offset + 1] & 0xf0) | (value >> 8) as u8;
        }
        self.dirty[offset / self.bytes_per_sector] = true;
        self.dirty[(offset + 1) / self.bytes_per_sector] = true;
        Ok(())
    }

    /// Follows one link; `None` at the end of the chain.
    pub fn next(&self, cluster: u32) -> FsResult<Option<u32>> {
        let value = self.get(cluster)?;
        if is_end_of_chain(value) {
            return Ok(None);
        }
        if value < 2 || value == BAD_CLUSTER || value as u32 > self.last_cluster {
            return Err(FsError::format(format!(
                "invalid fat ID {:#x} after cluster {}",
                value, cluster
            )));
        }
        Ok(Some(value as u32))
    }

    /// Returns every cluster of the chain starting at `start`.
    pub fn chain(&self, start: u32) -> FsResult<Vec<u32>> {
        let mut chain = Vec::new();
        let mut cluster = Some(start);
        while let Some(current) = cluster {
            if chain.len() as u32 >= self.last_cluster {
                return Err(FsError::format("cluster chain loops"));
            }
            chain.push(current);
            cluster = self.next(current)?;
        }
        Ok(chain)
    }

    pub fn chain_length(&self, start: u32) -> FsResult<u32> {
        Ok(self.chain(start)?.len() as u32)
    }

    /// Frees the chain starting at `start`, stopping at the first value
    /// that is not a link. Returns the number of clusters freed.
    pub fn release(&mut self, start: u32) -> FsResult<u32> {
        let mut freed = 0;
        let mut cluster = start;
        while (2..=self.last_cluster).contains(&cluster) {
            if freed >= self.last_cluster {
                return Err(FsError::format("cluster chain loops"));
            }
            let next = self.get(cluster)?;
            if next == FREE_CLUSTER {
                break;
            }
            self.set(cluster, FREE_CLUSTER)?;
            freed += 1;
            if next == BAD_CLUSTER || is_end_of_chain(next) {
                break;
            }
            cluster = next as u32;
        }
        trace!("Released {} clusters from {}", freed, start);
        Ok(freed)
    }

    /// First free cluster, scanning upward from 2.
    pub fn find_free(&self) -> FsResult<u32> {
        for cluster in 2..=self.last_cluster {
            if self.get(cluster)? == FREE_CLUSTER {
                return Ok(cluster);
            }
        }
        Err(FsError::NoSpace("no free cluster"))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.iter().any(|dirty| *dirty)
    }

    /// Writes every dirty sector to each FAT copy.
    pub fn flush<D: BlockDevice>(&mut self, device: &mut D, layout: &Layout) -> FsResult {
        for (index, dirty) in self.dirty.iter_mut().enumerate() {
            if !*dirty {
                continue;
            }
            let start = index * self.bytes_per_sector;
            let sector = &self.data[start..start + self.bytes_per_sector];
            for copy in 0..layout.fat_count {
                device.write_block(layout.fat_start + copy * layout.fat_sectors + index as u32, sector)?;
            }
            *dirty = false;
        }
        Ok(())
    }
}

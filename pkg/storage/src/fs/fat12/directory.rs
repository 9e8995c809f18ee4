use super::*;

/// Bytes of consecutive sectors with the sector numbers backing them and
/// a dirty flag per sector.
#[derive(Clone, Debug)]
pub struct SectorBuffer {
    pub data: Vec<u8>,
    pub sectors: Vec<u32>,
    pub dirty: Vec<bool>,
    bytes_per_sector: usize,
}

impl SectorBuffer {
    pub fn new(bytes_per_sector: usize) -> Self {
        Self {
            data: Vec::new(),
            sectors: Vec::new(),
            dirty: Vec::new(),
            bytes_per_sector,
        }
    }

    pub fn push(&mut self, sector: u32, data: &[u8]) {
        self.data.extend_from_slice(data);
        self.sectors.push(sector);
        self.dirty.push(false);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Marks every sector overlapping `range` dirty.
    pub fn mark_dirty(&mut self, range: core::ops::Range<usize>) {
        if range.is_empty() {
            return;
        }
        let first = range.start / self.bytes_per_sector;
        let last = (range.end - 1) / self.bytes_per_sector;
        for dirty in &mut self.dirty[first..=last] {
            *dirty = true;
        }
    }

    /// Zeroes the whole buffer and marks it dirty.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.dirty.fill(true);
    }

    /// Hands every dirty sector to `write`; flags are cleared only after a
    /// successful write.
    pub fn flush_with(&mut self, mut write: impl FnMut(u32, &[u8]) -> FsResult) -> FsResult {
        for (index, dirty) in self.dirty.iter_mut().enumerate() {
            if !*dirty {
                continue;
            }
            let start = index * self.bytes_per_sector;
            write(self.sectors[index], &self.data[start..start + self.bytes_per_sector])?;
            *dirty = false;
        }
        Ok(())
    }

    pub fn flush<D: BlockDevice>(&mut self, device: &mut D) -> FsResult {
        self.flush_with(|sector, data| device.write_block(sector, data))
    }
}

/// Locates one directory slot on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryLocation {
    pub sector: u32,
    pub offset: usize,
}

/// The root region or a subdirectory's clusters, loaded whole.
#[derive(Clone, Debug)]
pub struct Directory {
    /// First cluster; 0 for the root directory
    pub start_cluster: u32,
    pub buffer: SectorBuffer,
    extended: bool,
}

impl Directory {
    pub fn new(start_cluster: u32, buffer: SectorBuffer, extended: bool) -> Self {
        Self {
            start_cluster,
            buffer,
            extended,
        }
    }

    pub fn is_root(&self) -> bool {
        self.start_cluster == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len() / ENTRY_SIZE
    }

    pub fn slot(&self, index: usize) -> &[u8] {
        &self.buffer.data[index * ENTRY_SIZE..(index + 1) * ENTRY_SIZE]
    }

    pub fn location(&self, index: usize) -> EntryLocation {
        let offset = index * ENTRY_SIZE;
        let bytes_per_sector = self.buffer.bytes_per_sector;
        EntryLocation {
            sector: self.buffer.sectors[offset / bytes_per_sector],
            offset: offset % bytes_per_sector,
        }
    }

    pub fn write_slot(&mut self, index: usize, raw: &[u8]) {
        let start = index * ENTRY_SIZE;
        self.buffer.data[start..start + ENTRY_SIZE].copy_from_slice(&raw[..ENTRY_SIZE]);
        self.buffer.mark_dirty(start..start + ENTRY_SIZE);
    }

    pub fn mark_deleted(&mut self, index: usize) {
        let start = index * ENTRY_SIZE;
        self.buffer.data[start] = DELETED_MARKER;
        self.buffer.mark_dirty(start..start + 1);
    }

    /// First deleted or never used slot.
    pub fn free_slot(&self) -> Option<usize> {
        (0..self.capacity()).find(|index| {
            let first = self.slot(*index)[0];
            first == DELETED_MARKER || first == END_MARKER
        })
    }

    /// Appends freshly zeroed sectors.
    pub fn extend(&mut self, sectors: &[u32]) {
        let zero = vec![0u8; self.buffer.bytes_per_sector];
        for sector in sectors {
            self.buffer.push(*sector, &zero);
        }
    }

    pub fn find(&self, name: &str) -> Option<DirEntry> {
        self.entries().find(|entry| entry.name == name)
    }

    pub fn entries(&self) -> DirEntries<&[u8]> {
        DirEntries::new(self.buffer.data.as_slice(), self.extended)
    }

    pub fn into_entries(self) -> DirEntries<Vec<u8>> {
        DirEntries::new(self.buffer.data, self.extended)
    }

    pub fn flush<D: BlockDevice>(&mut self, device: &mut D) -> FsResult {
        self.buffer.flush(device)
    }
}

/// Live entries of a directory in slot order: deleted slots are skipped
/// and the first end marker finishes the walk.
pub struct DirEntries<B> {
    data: B,
    index: usize,
    extended: bool,
}

impl<B: AsRef<[u8]>> DirEntries<B> {
    pub fn new(data: B, extended: bool) -> Self {
        Self {
            data,
            index: 0,
            extended,
        }
    }
}

impl<B: AsRef<[u8]>> Iterator for DirEntries<B> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let data = self.data.as_ref();
        while (self.index + 1) * ENTRY_SIZE <= data.len() {
            let index = self.index;
            let raw = &data[index * ENTRY_SIZE..(index + 1) * ENTRY_SIZE];
            match raw[0] {
                END_MARKER => {
                    self.index = data.len() / ENTRY_SIZE;
                    return None;
                }
                DELETED_MARKER => self.index += 1,
                _ => {
                    self.index += 1;
                    return Some(DirEntry::parse(raw, index, self.extended));
                }
            }
        }
        None
    }
}

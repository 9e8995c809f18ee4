use super::*;
use alloc::collections::BTreeMap;

/// Granularity of the write-back cache.
pub const BLOCK_SIZE: usize = 4096;

type CacheBlock = Box<[u8; BLOCK_SIZE]>;

/// Write-back block cache over an unbuffered store.
///
/// Writes land in the active generation. `flush` hands the active blocks to
/// the stale generation and writes them back; reads keep hitting the stale
/// blocks until `complete_flush` confirms the store serves the same bytes.
pub struct SectorCache<S: RawStore> {
    store: S,
    len: u64,
    active: BTreeMap<u64, CacheBlock>,
    stale: BTreeMap<u64, CacheBlock>,
}

impl<S: RawStore> SectorCache<S> {
    pub fn new(store: S) -> FsResult<Self> {
        let len = store.len()?;
        Ok(Self {
            store,
            len,
            active: BTreeMap::new(),
            stale: BTreeMap::new(),
        })
    }

    /// Logical length, including bytes not yet written back
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns true while a flush has not been confirmed
    pub fn is_flushing(&self) -> bool {
        !self.stale.is_empty()
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn cached(&self, block: u64) -> Option<&CacheBlock> {
        self.active.get(&block).or_else(|| self.stale.get(&block))
    }

    fn read_store(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        match self.store.read_at(offset, buf) {
            Err(FsError::StaleHandle) => {
                warn!("Backing store went stale at {:#x}, reopening.", offset);
                self.store.reopen()?;
                match self.store.read_at(offset, buf) {
                    Err(FsError::StaleHandle) => {
                        Err(FsError::disk("backing store unreadable after reopen"))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn load_block(&mut self, block: u64) -> FsResult<CacheBlock> {
        if let Some(data) = self.cached(block) {
            return Ok(data.clone());
        }
        let mut data: CacheBlock = Box::new([0u8; BLOCK_SIZE]);
        self.read_store(block * BLOCK_SIZE as u64, &mut data[..])?;
        Ok(data)
    }

    /// Reads up to `size` bytes at `offset`, clamped to the logical length
    pub fn read(&mut self, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        if offset >= self.len {
            return Ok(Vec::new());
        }
        let end = self.len.min(offset + size as u64);
        let mut dst = vec![0u8; (end - offset) as usize];

        let mut pos = offset;
        while pos < end {
            let block = pos / BLOCK_SIZE as u64;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - in_block).min((end - pos) as usize);
            let at = (pos - offset) as usize;
            if let Some(data) = self.cached(block) {
                dst[at..at + take].copy_from_slice(&data[in_block..in_block + take]);
            } else {
                self.read_store(pos, &mut dst[at..at + take])?;
            }
            pos += take as u64;
        }
        Ok(dst)
    }

    /// Buffers `buf` at `offset`; nothing reaches the store until `flush`
    pub fn write(&mut self, offset: u64, buf: &[u8]) -> FsResult {
        let end = offset + buf.len() as u64;
        let mut pos = offset;
        while pos < end {
            let block = pos / BLOCK_SIZE as u64;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - in_block).min((end - pos) as usize);
            let mut data = if take == BLOCK_SIZE {
                Box::new([0u8; BLOCK_SIZE])
            } else {
                self.load_block(block)?
            };
            let at = (pos - offset) as usize;
            data[in_block..in_block + take].copy_from_slice(&buf[at..at + take]);
            self.active.insert(block, data);
            pos += take as u64;
        }
        self.len = self.len.max(end);
        Ok(())
    }

    /// Drops every cached byte at or beyond `size` and resizes the store
    pub fn truncate(&mut self, size: u64) -> FsResult {
        let first_dropped = (size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64;
        self.active.retain(|block, _| *block < first_dropped);
        self.stale.retain(|block, _| *block < first_dropped);

        let tail = (size % BLOCK_SIZE as u64) as usize;
        if tail != 0 {
            let block = size / BLOCK_SIZE as u64;
            for cache in [&mut self.active, &mut self.stale] {
                if let Some(data) = cache.get_mut(&block) {
                    data[tail..].fill(0);
                }
            }
        }

        self.store.set_len(size)?;
        self.len = size;
        Ok(())
    }

    /// Moves the active blocks to the stale generation and writes them back.
    ///
    /// On failure the stale blocks remain readable and are retried by the
    /// next flush.
    pub fn flush(&mut self) -> FsResult {
        let active = core::mem::take(&mut self.active);
        self.stale.extend(active);

        for (block, data) in self.stale.iter() {
            let start = block * BLOCK_SIZE as u64;
            if start >= self.len {
                continue;
            }
            let size = (self.len - start).min(BLOCK_SIZE as u64) as usize;
            self.store.write_at(start, &data[..size])?;
        }
        if self.store.len()? < self.len {
            self.store.set_len(self.len)?;
        }
        self.store.sync()?;
        trace!("Wrote back {} cache blocks.", self.stale.len());
        Ok(())
    }

    /// Releases the stale generation once the store serves the flushed bytes
    pub fn complete_flush(&mut self) {
        self.stale.clear();
    }
}

use super::*;
use alloc::sync::Arc;
use chrono::NaiveDateTime;
use spin::Mutex;

/// Fields of a file's directory entry rewritten after it changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryUpdate {
    pub start_cluster: u32,
    pub size: u32,
    pub modified: NaiveDateTime,
}

/// The volume primitives a file stream needs.
pub trait ClusterSource: Send + 'static {
    fn bytes_per_sector(&self) -> usize;

    fn sectors_per_cluster(&self) -> usize;

    fn last_cluster(&self) -> u32;

    fn is_read_only(&self) -> bool;

    fn fat_entry(&self, cluster: u32) -> FsResult<u16>;

    fn set_fat_entry(&mut self, cluster: u32, value: u16) -> FsResult;

    /// Writes modified FAT sectors to every copy
    fn flush_fat(&mut self) -> FsResult;

    fn find_free_cluster(&self) -> FsResult<u32>;

    /// Reads `count` clusters of the chain starting at `cluster`
    fn read_clusters(&mut self, cluster: u32, count: usize) -> FsResult<SectorBuffer>;

    fn write_sector(&mut self, sector: u32, data: &[u8]) -> FsResult;

    fn flush_device(&mut self) -> FsResult;

    /// Rewrites the entry at `location` and writes its sector back
    fn update_entry(&mut self, location: &EntryLocation, update: &EntryUpdate) -> FsResult;

    fn bytes_per_cluster(&self) -> usize {
        self.bytes_per_sector() * self.sectors_per_cluster()
    }

    /// Follows one FAT link; `None` at the end of the chain.
    fn next_cluster(&self, cluster: u32) -> FsResult<Option<u32>> {
        let value = self.fat_entry(cluster)?;
        if is_end_of_chain(value) {
            return Ok(None);
        }
        if value < 2 || value == BAD_CLUSTER || value as u32 > self.last_cluster() {
            return Err(FsError::format(format!("unexpected fat link {:#x}", value)));
        }
        Ok(Some(value as u32))
    }

    /// Frees a whole chain.
    fn release_chain(&mut self, start: u32) -> FsResult {
        let mut cluster = start;
        let mut freed = 0;
        while (2..=self.last_cluster()).contains(&cluster) && freed < self.last_cluster() {
            let next = self.fat_entry(cluster)?;
            if next == FREE_CLUSTER {
                break;
            }
            self.set_fat_entry(cluster, FREE_CLUSTER)?;
            freed += 1;
            if next == BAD_CLUSTER || is_end_of_chain(next) {
                break;
            }
            cluster = next as u32;
        }
        Ok(())
    }

    /// Allocates a cluster, links it after `previous` (if any) and ends the
    /// chain there.
    fn append_cluster(&mut self, previous: Option<u32>) -> FsResult<u32> {
        let cluster = self.find_free_cluster()?;
        if let Some(previous) = previous {
            self.set_fat_entry(previous, cluster as u16)?;
        }
        self.set_fat_entry(cluster, END_OF_CHAIN)?;
        self.flush_fat()?;
        Ok(cluster)
    }
}

/// The open-file cursor: everything but the volume it lives on.
struct FileState {
    name: String,
    location: EntryLocation,
    size: u64,
    start_cluster: u32,
    modified: Option<NaiveDateTime>,
    offset: u64,
    /// Cluster holding `offset`, 0 when not walked yet
    cluster: u32,
    cluster_offset: u64,
    data: Option<SectorBuffer>,
}

impl FileState {
    /// Moves `cluster` to the one holding `offset`. With `allocate`, the
    /// chain is extended as needed; without it, returns false when the
    /// chain ends first.
    fn locate<S: ClusterSource>(&mut self, source: &mut S, allocate: bool) -> FsResult<bool> {
        let bytes_per_cluster = source.bytes_per_cluster() as u64;
        if self.cluster == 0 || self.offset < self.cluster_offset {
            self.cluster = self.start_cluster;
            self.cluster_offset = 0;
            self.data = None;
        }
        if self.cluster == 0 {
            if !allocate {
                return Ok(false);
            }
            let cluster = source.append_cluster(None)?;
            self.start_cluster = cluster;
            self.cluster = cluster;
            self.data = Some(Self::zeroed(source, cluster)?);
        }
        while self.offset >= self.cluster_offset + bytes_per_cluster {
            let next = match source.next_cluster(self.cluster)? {
                Some(next) => {
                    self.data = None;
                    next
                }
                None if allocate => {
                    let next = source.append_cluster(Some(self.cluster))?;
                    self.data = Some(Self::zeroed(source, next)?);
                    next
                }
                None => return Ok(false),
            };
            self.cluster = next;
            self.cluster_offset += bytes_per_cluster;
        }
        if self.data.is_none() {
            self.data = Some(source.read_clusters(self.cluster, 1)?);
        }
        Ok(true)
    }

    fn zeroed<S: ClusterSource>(source: &mut S, cluster: u32) -> FsResult<SectorBuffer> {
        let mut buffer = source.read_clusters(cluster, 1)?;
        buffer.clear();
        Ok(buffer)
    }

    fn read<S: ClusterSource>(&mut self, source: &mut S, size: usize) -> FsResult<Vec<u8>> {
        let size = size.min(self.size.saturating_sub(self.offset) as usize);
        let mut out = Vec::with_capacity(size);
        while out.len() < size {
            if !self.locate(source, false)? {
                return Err(FsError::format("cluster chain shorter than file"));
            }
            let data = self
                .data
                .as_ref()
                .ok_or(FsError::NotOpen("cluster buffer"))?;
            let start = (self.offset - self.cluster_offset) as usize;
            let end = data.len().min(start + size - out.len());
            out.extend_from_slice(&data.data[start..end]);
            self.offset += (end - start) as u64;
        }
        Ok(out)
    }

    fn write<S: ClusterSource>(&mut self, source: &mut S, buf: &[u8]) -> FsResult<usize> {
        if source.is_read_only() {
            return Err(FsError::WriteProtected);
        }
        let mut written = 0;
        while written < buf.len() {
            self.locate(source, true)?;
            let data = self
                .data
                .as_mut()
                .ok_or(FsError::NotOpen("cluster buffer"))?;
            let start = (self.offset - self.cluster_offset) as usize;
            let end = data.len().min(start + buf.len() - written);
            data.data[start..end].copy_from_slice(&buf[written..written + end - start]);
            data.mark_dirty(start..end);
            data.flush_with(|sector, bytes| source.write_sector(sector, bytes))?;

            written += end - start;
            self.offset += (end - start) as u64;
            self.size = self.size.max(self.offset);
        }
        self.update_entry(source)?;
        Ok(written)
    }

    fn truncate<S: ClusterSource>(&mut self, source: &mut S, size: u64) -> FsResult {
        if size >= self.size {
            return Ok(());
        }
        if source.is_read_only() {
            return Err(FsError::WriteProtected);
        }
        if size > 0 && self.start_cluster < 2 {
            return Err(FsError::format("file without clusters has a size"));
        }
        if size == 0 {
            source.release_chain(self.start_cluster)?;
            self.start_cluster = 0;
        } else {
            let keep = size.div_ceil(source.bytes_per_cluster() as u64);
            let mut last = self.start_cluster;
            for _ in 1..keep {
                last = source
                    .next_cluster(last)?
                    .ok_or_else(|| FsError::format("cluster chain shorter than file"))?;
            }
            let tail = source.next_cluster(last)?;
            source.set_fat_entry(last, END_OF_CHAIN)?;
            if let Some(tail) = tail {
                source.release_chain(tail)?;
            }
        }
        self.size = size;
        self.offset = self.offset.min(size);
        self.cluster = 0;
        self.cluster_offset = 0;
        self.data = None;
        self.update_entry(source)?;
        source.flush_fat()
    }

    fn update_entry<S: ClusterSource>(&mut self, source: &mut S) -> FsResult {
        let modified = now();
        source.update_entry(
            &self.location,
            &EntryUpdate {
                start_cluster: self.start_cluster,
                size: self.size as u32,
                modified,
            },
        )?;
        self.modified = Some(modified);
        Ok(())
    }
}

/// A file on a FAT12 volume.
///
/// Every operation holds the volume lock for its whole duration.
pub struct FatFile<S: ClusterSource> {
    source: Arc<Mutex<Option<S>>>,
    state: Option<FileState>,
}

impl<S: ClusterSource> FatFile<S> {
    pub(super) fn new(source: Arc<Mutex<Option<S>>>, entry: &DirEntry, location: EntryLocation) -> Self {
        Self {
            source,
            state: Some(FileState {
                name: entry.name.clone(),
                location,
                size: entry.size as u64,
                start_cluster: entry.cluster,
                modified: entry.modified,
                offset: 0,
                cluster: 0,
                cluster_offset: 0,
                data: None,
            }),
        }
    }

    fn state(&self) -> FsResult<&FileState> {
        self.state.as_ref().ok_or(FsError::NotOpen("file"))
    }

    fn with_source<T>(&mut self, f: impl FnOnce(&mut FileState, &mut S) -> FsResult<T>) -> FsResult<T> {
        let state = self.state.as_mut().ok_or(FsError::NotOpen("file"))?;
        let mut guard = self.source.lock();
        let source = guard.as_mut().ok_or(FsError::NotOpen("volume"))?;
        f(state, source)
    }
}

impl<S: ClusterSource> FileIo for FatFile<S> {
    fn attributes(&self) -> FsResult<IoAttributes> {
        let state = self.state()?;
        let read_only = self
            .source
            .lock()
            .as_ref()
            .map_or(true, |source| source.is_read_only());
        Ok(IoAttributes {
            name: state.name.clone(),
            size: state.size,
            modified: state.modified,
            read_only,
        })
    }

    fn seek(&mut self, offset: u64) -> FsResult {
        let state = self.state.as_mut().ok_or(FsError::NotOpen("file"))?;
        state.offset = offset.min(state.size);
        Ok(())
    }

    fn read(&mut self, size: usize) -> FsResult<Vec<u8>> {
        self.with_source(|state, source| state.read(source, size))
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.with_source(|state, source| state.write(source, buf))
    }

    fn truncate(&mut self, size: u64) -> FsResult {
        self.with_source(|state, source| state.truncate(source, size))
    }

    fn flush(&mut self) -> FsResult {
        self.with_source(|_, source| source.flush_device())
    }

    fn close(&mut self) -> FsResult {
        self.flush()?;
        self.state = None;
        Ok(())
    }
}

use super::*;
use chrono::NaiveDateTime;

/// Identity of an open byte stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoAttributes {
    pub name: String,
    pub size: u64,
    pub modified: Option<NaiveDateTime>,
    /// Writes are refused up front
    pub read_only: bool,
}

/// A cursor-based random-access byte stream.
///
/// Host files, in-memory buffers and files inside a FAT12 volume all
/// implement it, so an image adapter can sit on any of them.
pub trait FileIo: Send {
    fn attributes(&self) -> FsResult<IoAttributes>;

    /// Moves the cursor, clamping to the current size
    fn seek(&mut self, offset: u64) -> FsResult;

    /// Reads up to `size` bytes from the cursor; short at end of data
    fn read(&mut self, size: usize) -> FsResult<Vec<u8>>;

    /// Writes `buf` at the cursor, growing the stream as needed
    fn write(&mut self, buf: &[u8]) -> FsResult<usize>;

    /// Shrinks the stream to `size` bytes
    fn truncate(&mut self, size: u64) -> FsResult;

    fn flush(&mut self) -> FsResult;

    /// Flushes and releases the stream; later calls fail `NotOpen`
    fn close(&mut self) -> FsResult;

    fn read_at(&mut self, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        self.seek(offset)?;
        self.read(size)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult<usize> {
        self.seek(offset)?;
        self.write(buf)
    }

    /// Reads the whole stream from the start into `buf`
    fn read_all(&mut self, buf: &mut Vec<u8>) -> FsResult<usize> {
        let size = self.attributes()?.size as usize;
        let data = self.read_at(0, size)?;
        buf.extend_from_slice(&data);
        Ok(data.len())
    }
}

pub type FileHandle = Box<dyn FileIo>;

impl FileIo for Box<dyn FileIo> {
    fn attributes(&self) -> FsResult<IoAttributes> {
        (**self).attributes()
    }

    fn seek(&mut self, offset: u64) -> FsResult {
        (**self).seek(offset)
    }

    fn read(&mut self, size: usize) -> FsResult<Vec<u8>> {
        (**self).read(size)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        (**self).write(buf)
    }

    fn truncate(&mut self, size: u64) -> FsResult {
        (**self).truncate(size)
    }

    fn flush(&mut self) -> FsResult {
        (**self).flush()
    }

    fn close(&mut self) -> FsResult {
        (**self).close()
    }
}

use crate::*;

/// A byte stream held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryIo {
    name: String,
    data: Vec<u8>,
    offset: usize,
    closed: bool,
    read_only: bool,
}

impl MemoryIo {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            offset: 0,
            closed: false,
            read_only: false,
        }
    }

    /// Refuses every later write or truncation
    pub fn write_protected(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn check(&self) -> FsResult {
        if self.closed {
            return Err(FsError::NotOpen("memory io"));
        }
        Ok(())
    }

    fn check_writable(&self) -> FsResult {
        self.check()?;
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        Ok(())
    }
}

impl FileIo for MemoryIo {
    fn attributes(&self) -> FsResult<IoAttributes> {
        self.check()?;
        Ok(IoAttributes {
            name: self.name.clone(),
            size: self.data.len() as u64,
            modified: None,
            read_only: self.read_only,
        })
    }

    fn seek(&mut self, offset: u64) -> FsResult {
        self.check()?;
        self.offset = (offset as usize).min(self.data.len());
        Ok(())
    }

    fn read(&mut self, size: usize) -> FsResult<Vec<u8>> {
        self.check()?;
        let end = (self.offset + size).min(self.data.len());
        let data = self.data[self.offset..end].to_vec();
        self.offset = end;
        Ok(data)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.check_writable()?;
        let end = self.offset + buf.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[self.offset..end].copy_from_slice(buf);
        self.offset = end;
        Ok(buf.len())
    }

    fn truncate(&mut self, size: u64) -> FsResult {
        self.check_writable()?;
        self.data.truncate(size as usize);
        self.offset = self.offset.min(self.data.len());
        Ok(())
    }

    fn flush(&mut self) -> FsResult {
        self.check()
    }

    fn close(&mut self) -> FsResult {
        self.closed = true;
        Ok(())
    }
}

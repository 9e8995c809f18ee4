use crate::*;

/// A host byte store seen through the write-back sector cache.
pub struct NativeIo<S: RawStore> {
    cache: Option<SectorCache<S>>,
    name: String,
    offset: u64,
}

impl<S: RawStore> NativeIo<S> {
    pub fn new(name: &str, store: S) -> FsResult<Self> {
        Ok(Self {
            cache: Some(SectorCache::new(store)?),
            name: name.into(),
            offset: 0,
        })
    }

    fn cache(&mut self) -> FsResult<&mut SectorCache<S>> {
        self.cache.as_mut().ok_or(FsError::NotOpen("native io"))
    }

    fn writable_cache(&mut self) -> FsResult<&mut SectorCache<S>> {
        let cache = self.cache()?;
        if cache.store().is_read_only() {
            return Err(FsError::WriteProtected);
        }
        Ok(cache)
    }
}

impl<S: RawStore> FileIo for NativeIo<S> {
    fn attributes(&self) -> FsResult<IoAttributes> {
        let cache = self.cache.as_ref().ok_or(FsError::NotOpen("native io"))?;
        Ok(IoAttributes {
            name: self.name.clone(),
            size: cache.len(),
            modified: None,
            read_only: cache.store().is_read_only(),
        })
    }

    fn seek(&mut self, offset: u64) -> FsResult {
        let len = self.cache()?.len();
        self.offset = offset.min(len);
        Ok(())
    }

    fn read(&mut self, size: usize) -> FsResult<Vec<u8>> {
        let offset = self.offset;
        let data = self.cache()?.read(offset, size)?;
        self.offset += data.len() as u64;
        Ok(data)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        let offset = self.offset;
        self.writable_cache()?.write(offset, buf)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn truncate(&mut self, size: u64) -> FsResult {
        self.writable_cache()?.truncate(size)?;
        self.offset = self.offset.min(size);
        Ok(())
    }

    fn flush(&mut self) -> FsResult {
        let cache = self.cache()?;
        cache.flush()?;
        cache.complete_flush();
        Ok(())
    }

    fn close(&mut self) -> FsResult {
        if self.cache.is_some() {
            self.flush()?;
        }
        self.cache = None;
        self.offset = 0;
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use self::file_store::FileStore;

#[cfg(feature = "std")]
mod file_store {
    use crate::*;
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::path::{Path, PathBuf};

    /// A host file used as an unbuffered store.
    pub struct FileStore {
        path: PathBuf,
        file: File,
        writable: bool,
    }

    impl FileStore {
        /// Opens `path` for update, falling back to read-only access
        pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
            let path = path.as_ref().to_path_buf();
            let (file, writable) = match OpenOptions::new().read(true).write(true).open(&path) {
                Ok(file) => (file, true),
                Err(_) => (File::open(&path)?, false),
            };
            Ok(Self {
                path,
                file,
                writable,
            })
        }
    }

    impl RawStore for FileStore {
        fn len(&self) -> FsResult<u64> {
            Ok(self.file.metadata()?.len())
        }

        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
            self.file.seek(SeekFrom::Start(offset))?;
            let mut read = 0;
            while read < buf.len() {
                match self.file.read(&mut buf[read..]) {
                    Ok(0) => break,
                    Ok(n) => read += n,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        return Err(FsError::StaleHandle)
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(read)
        }

        fn write_at(&mut self, offset: u64, buf: &[u8]) -> FsResult {
            if !self.writable {
                return Err(FsError::WriteProtected);
            }
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.write_all(buf)?;
            Ok(())
        }

        fn set_len(&mut self, size: u64) -> FsResult {
            if !self.writable {
                return Err(FsError::WriteProtected);
            }
            self.file.set_len(size)?;
            Ok(())
        }

        fn sync(&mut self) -> FsResult {
            if self.writable {
                self.file.sync_data()?;
            }
            Ok(())
        }

        fn is_read_only(&self) -> bool {
            !self.writable
        }

        fn reopen(&mut self) -> FsResult {
            debug!("Reopening {}", self.path.display());
            *self = Self::open(&self.path)?;
            Ok(())
        }
    }

    impl NativeIo<FileStore> {
        /// Opens a host file through the sector cache
        pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Self::new(&name, FileStore::open(path)?)
        }
    }
}

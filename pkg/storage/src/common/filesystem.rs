//! The file system trait shared by volumes and the routers above them
use super::*;

pub type DirIterator = Box<dyn Iterator<Item = FsMetadata> + Send>;

/// A browsable, mutable directory tree with a current directory.
pub trait FileSystem: Send {
    /// Lists the current directory
    fn list(&mut self) -> FsResult<DirIterator>;

    /// Changes the current directory to the named child, or `..`
    fn chdir(&mut self, name: &str) -> FsResult;

    /// Creates a directory in the current directory
    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult;

    /// Removes a file or an empty directory from the current directory
    fn remove(&mut self, name: &str) -> FsResult;

    /// Opens, or with `options.create` creates, a file in the current directory
    fn get_io(&mut self, name: &str, options: &EntryOptions) -> FsResult<FileHandle>;

    fn flush(&mut self) -> FsResult;

    fn attributes(&self) -> FsResult<FsAttributes>;

    /// Returns the current directory as a `/`-separated path
    fn cwd(&self) -> FsResult<String>;

    /// Returns true if the current directory has an entry named `name`
    fn exists(&mut self, name: &str) -> FsResult<bool> {
        Ok(self.list()?.any(|meta| meta.name == name))
    }
}

impl FileSystem for Box<dyn FileSystem> {
    fn list(&mut self) -> FsResult<DirIterator> {
        (**self).list()
    }

    fn chdir(&mut self, name: &str) -> FsResult {
        (**self).chdir(name)
    }

    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult {
        (**self).mkdir(name, options)
    }

    fn remove(&mut self, name: &str) -> FsResult {
        (**self).remove(name)
    }

    fn get_io(&mut self, name: &str, options: &EntryOptions) -> FsResult<FileHandle> {
        (**self).get_io(name, options)
    }

    fn flush(&mut self) -> FsResult {
        (**self).flush()
    }

    fn attributes(&self) -> FsResult<FsAttributes> {
        (**self).attributes()
    }

    fn cwd(&self) -> FsResult<String> {
        (**self).cwd()
    }
}

use super::*;

/// Routes every call to the selected volume; at the top level the mounted
/// volumes themselves are the directory entries.
#[derive(Default)]
pub struct RootFs {
    volumes: Vec<(String, Box<dyn FileSystem>)>,
    current: Option<usize>,
}

impl RootFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file system under its volume label
    pub fn mount(&mut self, fs: Box<dyn FileSystem>) -> FsResult {
        let label = fs.attributes()?.volume_label;
        if self.volumes.iter().any(|(name, _)| *name == label) {
            return Err(FsError::InvalidRequest("mount name conflicts"));
        }
        info!("Mounted volume \"{}\".", label);
        self.volumes.push((label, fs));
        Ok(())
    }

    pub fn volumes(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().map(|(name, _)| name.as_str())
    }

    fn current(&mut self) -> Option<&mut Box<dyn FileSystem>> {
        let index = self.current?;
        self.volumes.get_mut(index).map(|(_, fs)| fs)
    }
}

impl FileSystem for RootFs {
    fn list(&mut self) -> FsResult<DirIterator> {
        if let Some(fs) = self.current() {
            return fs.list();
        }
        let entries: Vec<FsMetadata> = self
            .volumes
            .iter()
            .map(|(name, _)| FsMetadata::mount_point(name, true, 0))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn chdir(&mut self, name: &str) -> FsResult {
        if let Some(fs) = self.current() {
            return match fs.chdir(name) {
                Err(FsError::NotFound) if name == ".." => {
                    self.current = None;
                    Ok(())
                }
                other => other,
            };
        }
        let index = self
            .volumes
            .iter()
            .position(|(label, _)| label == name)
            .ok_or(FsError::NotFound)?;
        self.current = Some(index);
        Ok(())
    }

    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult {
        match self.current() {
            Some(fs) => fs.mkdir(name, options),
            None => Err(FsError::InvalidRequest("no volume selected")),
        }
    }

    fn remove(&mut self, name: &str) -> FsResult {
        match self.current() {
            Some(fs) => fs.remove(name),
            None => Err(FsError::InvalidRequest("no volume selected")),
        }
    }

    fn get_io(&mut self, name: &str, options: &EntryOptions) -> FsResult<FileHandle> {
        match self.current() {
            Some(fs) => fs.get_io(name, options),
            None => Err(FsError::InvalidRequest("no volume selected")),
        }
    }

    fn flush(&mut self) -> FsResult {
        match self.current() {
            Some(fs) => fs.flush(),
            None => Ok(()),
        }
    }

    fn attributes(&self) -> FsResult<FsAttributes> {
        Ok(FsAttributes {
            encoding: "UTF-8",
            volume_label: "Root".into(),
        })
    }

    fn cwd(&self) -> FsResult<String> {
        match self.current.and_then(|index| self.volumes.get(index)) {
            Some((_, fs)) => fs.cwd(),
            None => Ok(PATH_SEPARATOR.to_string()),
        }
    }
}

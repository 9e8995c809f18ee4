use super::*;
use alloc::sync::Arc;
use spin::Mutex;

/// A block device that can be handed to a volume and still be reused once
/// that volume is closed.
#[derive(Clone)]
pub struct SharedDevice(Arc<Mutex<Box<dyn BlockDevice>>>);

impl SharedDevice {
    pub fn new(device: Box<dyn BlockDevice>) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }
}

impl BlockDevice for SharedDevice {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        self.0.lock().read_block(sector, buf)
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        self.0.lock().write_block(sector, buf)
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        self.0.lock().attributes()
    }

    fn flush(&mut self) -> FsResult {
        self.0.lock().flush()
    }

    fn bundle(&self, index: usize) -> FsResult<Box<dyn BlockDevice>> {
        self.0.lock().bundle(index)
    }
}

struct Disk {
    name: String,
    size: u64,
    writable: bool,
    device: SharedDevice,
}

/// The disks of one image file, each listed as a directory.
///
/// Entering a disk mounts a [`Fat12`] volume on it; `..` from that volume's
/// root closes it again.
pub struct MultiImageFs {
    name: String,
    disks: Vec<Disk>,
    mounted: Option<(usize, Fat12<SharedDevice>)>,
}

impl MultiImageFs {
    pub fn open(image: Box<dyn BlockDevice>) -> FsResult<Self> {
        let attributes = image.attributes()?;
        let devices = match attributes.bundles {
            Some(count) => (0..count)
                .map(|index| image.bundle(index))
                .collect::<FsResult<Vec<_>>>()?,
            None => vec![image],
        };

        let mut disks = Vec::with_capacity(devices.len());
        for (index, device) in devices.into_iter().enumerate() {
            let disk = device.attributes()?;
            let name = match disk.name.trim() {
                "" => format!("DISK{}", index),
                name => name.to_string(),
            };
            disks.push(Disk {
                name,
                size: (disk.total_sectors() * disk.bytes_per_sector) as u64,
                writable: !disk.read_only,
                device: SharedDevice::new(device),
            });
        }
        debug!("Image \"{}\" holds {} disk(s).", attributes.name, disks.len());

        Ok(Self {
            name: attributes.name,
            disks,
            mounted: None,
        })
    }

    pub fn disks(&self) -> impl Iterator<Item = &str> {
        self.disks.iter().map(|disk| disk.name.as_str())
    }

    fn enter(&mut self, name: &str) -> FsResult {
        let index = self
            .disks
            .iter()
            .position(|disk| disk.name == name)
            .ok_or(FsError::NotFound)?;
        let fs = Fat12::open(self.disks[index].device.clone())?;
        self.mounted = Some((index, fs));
        Ok(())
    }

    fn leave(&mut self) -> FsResult {
        if let Some((_, fs)) = self.mounted.take() {
            fs.close()?;
        }
        Ok(())
    }
}

impl FileSystem for MultiImageFs {
    fn list(&mut self) -> FsResult<DirIterator> {
        if let Some((_, fs)) = self.mounted.as_mut() {
            return fs.list();
        }
        let entries: Vec<FsMetadata> = self
            .disks
            .iter()
            .map(|disk| FsMetadata::mount_point(&disk.name, disk.writable, disk.size))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn chdir(&mut self, name: &str) -> FsResult {
        match self.mounted.as_mut() {
            Some((_, fs)) => match fs.chdir(name) {
                Err(FsError::NotFound) if name == ".." => self.leave(),
                other => other,
            },
            None if name == "." => Ok(()),
            None => self.enter(name),
        }
    }

    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult {
        match self.mounted.as_mut() {
            Some((_, fs)) => fs.mkdir(name, options),
            None => Err(FsError::WriteProtected),
        }
    }

    fn remove(&mut self, name: &str) -> FsResult {
        match self.mounted.as_mut() {
            Some((_, fs)) => fs.remove(name),
            None => Err(FsError::WriteProtected),
        }
    }

    fn get_io(&mut self, name: &str, options: &EntryOptions) -> FsResult<FileHandle> {
        match self.mounted.as_mut() {
            Some((_, fs)) => fs.get_io(name, options),
            None => Err(FsError::InvalidRequest("not a volume")),
        }
    }

    fn flush(&mut self) -> FsResult {
        match self.mounted.as_mut() {
            Some((_, fs)) => fs.flush(),
            None => Ok(()),
        }
    }

    fn attributes(&self) -> FsResult<FsAttributes> {
        Ok(FsAttributes {
            encoding: "UTF-8",
            volume_label: self.name.clone(),
        })
    }

    fn cwd(&self) -> FsResult<String> {
        let mut path = format!("{}{}", PATH_SEPARATOR, self.name);
        if let Some((_, fs)) = &self.mounted {
            path.push(PATH_SEPARATOR);
            path.push_str(&fs.volume_label()?);
            let inner = fs.cwd()?;
            if inner.len() > 1 {
                path.push_str(&inner);
            }
        }
        Ok(path)
    }
}

impl Drop for MultiImageFs {
    fn drop(&mut self) {
        if let Err(err) = self.leave() {
            warn!("Failed to close \"{}\": {}", self.name, err);
        }
    }
}

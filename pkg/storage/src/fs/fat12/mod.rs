//! FAT12 volumes on floppy-disk images.
//!
//! ```text
//!   [ boot | FAT 1 | FAT 2 | root directory | data clusters ... ]
//! ```
//!
//! Two boot-sector dialects are understood: the PC BIOS parameter block and
//! the X68000 one, which also allows 17-character names.

pub mod bpb;
pub mod dir_entry;
pub mod directory;
pub mod file;
pub mod table;

pub use bpb::*;
pub use dir_entry::*;
pub use directory::*;
pub use file::*;
pub use table::*;

use crate::*;
use alloc::sync::Arc;
use spin::Mutex;

type Fat12Handle<D> = Arc<Mutex<Option<Fat12Impl<D>>>>;

/// A FAT12 volume, shared with the files opened on it.
pub struct Fat12<D: BlockDevice> {
    handle: Fat12Handle<D>,
}

impl<D: BlockDevice> Default for Fat12<D> {
    fn default() -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
        }
    }
}

impl<D: BlockDevice> Fat12<D> {
    /// Creates a closed volume
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(device: D) -> FsResult<Self> {
        let fs = Self::new();
        fs.mount(device)?;
        Ok(fs)
    }

    pub fn mount(&self, device: D) -> FsResult {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            return Err(FsError::InvalidRequest("already open"));
        }
        *guard = Some(Fat12Impl::open(device)?);
        Ok(())
    }

    /// Flushes and detaches the device. Open files fail `NotOpen` afterwards.
    pub fn close(&self) -> FsResult<D> {
        let mut guard = self.handle.lock();
        let fs = guard.as_mut().ok_or(FsError::NotOpen("fat12"))?;
        fs.device.flush()?;
        let fs = guard.take().ok_or(FsError::NotOpen("fat12"))?;
        info!("Unmounted FAT12 volume \"{}\".", fs.volume_label);
        Ok(fs.device)
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Fat12Impl<D>) -> FsResult<T>) -> FsResult<T> {
        let mut guard = self.handle.lock();
        let fs = guard.as_mut().ok_or(FsError::NotOpen("fat12"))?;
        f(fs)
    }

    pub fn volume_label(&self) -> FsResult<String> {
        self.with(|fs| Ok(fs.volume_label.clone()))
    }

    pub fn params(&self) -> FsResult<VolumeParams> {
        self.with(|fs| Ok(fs.params.clone()))
    }

    /// Every live entry of the current directory, volume labels included.
    pub fn entries(&self) -> FsResult<DirEntries<Vec<u8>>> {
        self.with(|fs| Ok(fs.current_directory()?.into_entries()))
    }
}

impl<D: BlockDevice> core::fmt::Debug for Fat12<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fat12")
            .field("handle", &*self.handle.lock())
            .finish()
    }
}

impl<D: BlockDevice> FileSystem for Fat12<D> {
    fn list(&mut self) -> FsResult<DirIterator> {
        let entries = self.entries()?;
        Ok(Box::new(
            entries
                .filter(|entry| !entry.is_volume())
                .map(|entry| entry.metadata()),
        ))
    }

    fn chdir(&mut self, name: &str) -> FsResult {
        self.with(|fs| fs.chdir(name))
    }

    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult {
        self.with(|fs| fs.mkdir(name, options))
    }

    fn remove(&mut self, name: &str) -> FsResult {
        self.with(|fs| fs.remove(name))
    }

    fn get_io(&mut self, name: &str, options: &EntryOptions) -> FsResult<FileHandle> {
        let (entry, location) = self.with(|fs| fs.open_entry(name, options))?;
        Ok(Box::new(FatFile::new(self.handle.clone(), &entry, location)))
    }

    fn flush(&mut self) -> FsResult {
        self.with(|fs| fs.device.flush())
    }

    fn attributes(&self) -> FsResult<FsAttributes> {
        Ok(FsAttributes {
            encoding: "Shift_JIS",
            volume_label: self.volume_label()?,
        })
    }

    fn cwd(&self) -> FsResult<String> {
        self.with(|fs| Ok(fs.path.to_string()))
    }
}

/// The state of an open volume.
pub struct Fat12Impl<D: BlockDevice> {
    device: D,
    params: VolumeParams,
    layout: Layout,
    fat: FatTable,
    read_only: bool,
    volume_label: String,
    /// First cluster of the current directory, 0 for the root
    cwd_cluster: u32,
    cwd_clusters: u32,
    path: FsPath,
}

impl<D: BlockDevice> core::fmt::Debug for Fat12Impl<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fat12Impl")
            .field("volume_label", &self.volume_label)
            .field("layout", &self.layout)
            .field("cwd", &self.path)
            .finish()
    }
}

impl<D: BlockDevice> Fat12Impl<D> {
    fn open(mut device: D) -> FsResult<Self> {
        let attributes = device.attributes()?;
        let boot = BootSector::parse(device.read_sector(0)?)?;
        let params = boot.params()?;
        params.check_device(&attributes)?;
        let layout = params.layout()?;

        let mut table = Vec::with_capacity(layout.fat_sectors as usize * layout.bytes_per_sector);
        for index in 0..layout.fat_sectors {
            table.extend(device.read_sector(layout.fat_start + index)?);
        }

        let mut fs = Self {
            fat: FatTable::new(table, layout.bytes_per_sector, layout.last_cluster),
            read_only: attributes.read_only,
            volume_label: String::new(),
            cwd_cluster: 0,
            cwd_clusters: 0,
            path: FsPath::root(),
            device,
            params,
            layout,
        };

        let root = fs.read_directory(0)?;
        fs.volume_label = root
            .entries()
            .find(|entry| entry.is_volume_label())
            .map(|entry| shift_jis(&root.slot(entry.index)[..11]).trim_end().to_string())
            .filter(|label| !label.is_empty())
            .or_else(|| Some(fs.params.volume_label.clone()).filter(|label| !label.is_empty()))
            .unwrap_or(attributes.name);

        info!(
            "Mounted FAT12 volume \"{}\": {} clusters of {} bytes{}.",
            fs.volume_label,
            layout.clusters,
            layout.bytes_per_cluster(),
            if fs.params.extended_names { ", extended names" } else { "" }
        );
        Ok(fs)
    }

    fn check_writable(&self) -> FsResult {
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        Ok(())
    }

    fn cluster_sectors(&self, cluster: u32) -> core::ops::Range<u32> {
        let first = self.layout.cluster_to_sector(cluster);
        first..first + self.layout.sectors_per_cluster as u32
    }

    fn read_sectors(&mut self, start: u32, count: u32) -> FsResult<SectorBuffer> {
        let mut buffer = SectorBuffer::new(self.layout.bytes_per_sector);
        for sector in start..start + count {
            let data = self.device.read_sector(sector)?;
            buffer.push(sector, &data);
        }
        Ok(buffer)
    }

    fn load_clusters(&mut self, start: u32, count: usize) -> FsResult<SectorBuffer> {
        let mut buffer = SectorBuffer::new(self.layout.bytes_per_sector);
        let mut cluster = start;
        for index in 0..count {
            if !(2..=self.layout.last_cluster).contains(&cluster) {
                return Err(FsError::format(format!("cluster {} out of range", cluster)));
            }
            for sector in self.cluster_sectors(cluster) {
                let data = self.device.read_sector(sector)?;
                buffer.push(sector, &data);
            }
            if index + 1 < count {
                cluster = self
                    .fat
                    .next(cluster)?
                    .ok_or_else(|| FsError::format("unexpected end mark to read dirent"))?;
            }
        }
        Ok(buffer)
    }

    fn read_directory(&mut self, start_cluster: u32) -> FsResult<Directory> {
        let buffer = if start_cluster == 0 {
            self.read_sectors(self.layout.root_start, self.layout.root_sectors)?
        } else {
            let clusters = self.fat.chain_length(start_cluster)?;
            self.load_clusters(start_cluster, clusters as usize)?
        };
        Ok(Directory::new(start_cluster, buffer, self.params.extended_names))
    }

    fn current_directory(&mut self) -> FsResult<Directory> {
        if self.cwd_cluster == 0 {
            return self.read_directory(0);
        }
        let buffer = self.load_clusters(self.cwd_cluster, self.cwd_clusters as usize)?;
        Ok(Directory::new(self.cwd_cluster, buffer, self.params.extended_names))
    }

    /// Finds a file or directory by name, skipping volume labels.
    fn lookup(directory: &Directory, name: &str) -> Option<DirEntry> {
        directory
            .entries()
            .find(|entry| !entry.is_volume() && entry.name == name)
    }

    /// Returns a free slot, growing a subdirectory by one cluster if it is
    /// full.
    fn find_available_entry(&mut self, directory: &mut Directory) -> FsResult<usize> {
        if let Some(index) = directory.free_slot() {
            return Ok(index);
        }
        if directory.is_root() {
            return Err(FsError::NoSpace("cannot expand root dirent"));
        }
        let chain = self.fat.chain(directory.start_cluster)?;
        let last = chain.last().copied().unwrap_or(directory.start_cluster);
        let cluster = self.append_cluster(Some(last))?;

        let zero = vec![0u8; self.layout.bytes_per_sector];
        let sectors: Vec<u32> = self.cluster_sectors(cluster).collect();
        for sector in &sectors {
            self.device.write_block(*sector, &zero)?;
        }
        let index = directory.capacity();
        directory.extend(&sectors);
        if directory.start_cluster == self.cwd_cluster {
            self.cwd_clusters += 1;
        }
        debug!("Directory at cluster {} grew into cluster {}.", directory.start_cluster, cluster);
        Ok(index)
    }

    fn chdir(&mut self, name: &str) -> FsResult {
        if name == "." {
            return Ok(());
        }
        let directory = self.current_directory()?;
        let entry = directory
            .entries()
            .find(|entry| entry.is_dir() && entry.name == name)
            .ok_or(FsError::NotFound)?;
        if entry.cluster == 0 {
            self.cwd_cluster = 0;
            self.cwd_clusters = 0;
            self.path.clear();
        } else {
            self.cwd_clusters = self.fat.chain_length(entry.cluster)?;
            self.cwd_cluster = entry.cluster;
            self.path.enter(name);
        }
        trace!("cwd: {}", self.path);
        Ok(())
    }

    fn mkdir(&mut self, name: &str, options: &EntryOptions) -> FsResult {
        self.check_writable()?;
        let extended = self.params.extended_names;
        let mut directory = self.current_directory()?;
        if Self::lookup(&directory, name).is_some() {
            return Err(FsError::InvalidRequest("already exist"));
        }
        let short = ShortName::encode(name, extended)?;
        let index = self.find_available_entry(&mut directory)?;
        let cluster = self.append_cluster(None)?;

        let options = EntryOptions {
            modified: Some(options.modified.unwrap_or_else(now)),
            ..options.clone()
        };
        let entry = RawEntry::new(
            &short,
            Attributes::from_options(&options, true),
            cluster,
            &options,
            extended,
        );
        directory.write_slot(index, entry.as_bytes());
        directory.flush(&mut self.device)?;

        let stamp = EntryOptions {
            modified: options.modified,
            ..Default::default()
        };
        let mut first = vec![0u8; self.layout.bytes_per_sector];
        let dot = RawEntry::new(&ShortName::dot(), Attributes::DIRECTORY, cluster, &stamp, extended);
        let parent = RawEntry::new(
            &ShortName::dot_dot(),
            Attributes::DIRECTORY,
            directory.start_cluster,
            &stamp,
            extended,
        );
        first[..ENTRY_SIZE].copy_from_slice(dot.as_bytes());
        first[ENTRY_SIZE..2 * ENTRY_SIZE].copy_from_slice(parent.as_bytes());

        let zero = vec![0u8; self.layout.bytes_per_sector];
        for (index, sector) in self.cluster_sectors(cluster).enumerate() {
            let data = if index == 0 { &first } else { &zero };
            self.device.write_block(sector, data)?;
        }
        debug!("Created directory {} at cluster {}.", name, cluster);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> FsResult {
        self.check_writable()?;
        let mut directory = self.current_directory()?;
        let entry = directory.find(name).ok_or(FsError::NotFound)?;
        if entry.is_dot() {
            return Err(FsError::InvalidRequest("cannot remove dot entries"));
        }
        if entry.is_dir() && entry.cluster != 0 {
            let children = self.read_directory(entry.cluster)?;
            if children.entries().any(|child| !child.is_dot()) {
                return Err(FsError::NotEmpty);
            }
        }
        if entry.cluster != 0 {
            self.fat.release(entry.cluster)?;
            self.flush_fat()?;
        }
        directory.mark_deleted(entry.index);
        directory.flush(&mut self.device)?;
        debug!("Removed {}.", name);
        Ok(())
    }

    /// Finds, or creates, the entry a file stream is bound to.
    fn open_entry(&mut self, name: &str, options: &EntryOptions) -> FsResult<(DirEntry, EntryLocation)> {
        let extended = self.params.extended_names;
        let mut directory = self.current_directory()?;
        match Self::lookup(&directory, name) {
            Some(_) if options.create => Err(FsError::InvalidRequest("already exist")),
            Some(entry) if entry.is_dir() => Err(FsError::NotFound),
            Some(entry) => {
                let location = directory.location(entry.index);
                Ok((entry, location))
            }
            None if options.create => {
                self.check_writable()?;
                let short = ShortName::encode(name, extended)?;
                let index = self.find_available_entry(&mut directory)?;
                let raw = RawEntry::new(
                    &short,
                    Attributes::from_options(options, false),
                    0,
                    options,
                    extended,
                );
                directory.write_slot(index, raw.as_bytes());
                directory.flush(&mut self.device)?;
                debug!("Created file {}.", name);
                Ok((DirEntry::parse(raw.as_bytes(), index, extended), directory.location(index)))
            }
            None => Err(FsError::NotFound),
        }
    }
}

impl<D: BlockDevice> ClusterSource for Fat12Impl<D> {
    fn bytes_per_sector(&self) -> usize {
        self.layout.bytes_per_sector
    }

    fn sectors_per_cluster(&self) -> usize {
        self.layout.sectors_per_cluster
    }

    fn last_cluster(&self) -> u32 {
        self.layout.last_cluster
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn fat_entry(&self, cluster: u32) -> FsResult<u16> {
        self.fat.get(cluster)
    }

    fn set_fat_entry(&mut self, cluster: u32, value: u16) -> FsResult {
        self.fat.set(cluster, value)
    }

    fn flush_fat(&mut self) -> FsResult {
        self.fat.flush(&mut self.device, &self.layout)
    }

    fn find_free_cluster(&self) -> FsResult<u32> {
        self.fat.find_free()
    }

    fn read_clusters(&mut self, cluster: u32, count: usize) -> FsResult<SectorBuffer> {
        self.load_clusters(cluster, count)
    }

    fn write_sector(&mut self, sector: u32, data: &[u8]) -> FsResult {
        self.device.write_block(sector, data)
    }

    fn flush_device(&mut self) -> FsResult {
        self.device.flush()
    }

    fn update_entry(&mut self, location: &EntryLocation, update: &EntryUpdate) -> FsResult {
        let extended = self.params.extended_names;
        let mut sector = self.device.read_sector(location.sector)?;
        let slot = location.offset..location.offset + ENTRY_SIZE;
        let mut entry = RawEntry::from_slice(&sector[slot.clone()]);
        entry.set_cluster(update.start_cluster, extended);
        entry.set_size(update.size);
        entry.set_modified(&update.modified);
        sector[slot].copy_from_slice(entry.as_bytes());
        self.device.write_block(location.sector, &sector)
    }

    fn release_chain(&mut self, start: u32) -> FsResult {
        self.fat.release(start).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn names(fs: &mut impl FileSystem) -> Vec<String> {
        fs.list().unwrap().map(|meta| meta.name).collect()
    }

    fn create(fs: &mut impl FileSystem, name: &str, data: &[u8]) {
        let mut io = fs.get_io(name, &EntryOptions::create()).unwrap();
        assert_eq!(io.write(data).unwrap(), data.len());
        io.close().unwrap();
    }

    fn read(fs: &mut impl FileSystem, name: &str) -> Vec<u8> {
        let mut io = fs.get_io(name, &EntryOptions::default()).unwrap();
        let mut data = Vec::new();
        io.read_all(&mut data).unwrap();
        io.close().unwrap();
        data
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn free_cluster<D: BlockDevice>(fs: &Fat12<D>) -> u32 {
        fs.with(|fs| fs.fat.find_free()).unwrap()
    }

    #[test]
    fn mounts_formatted_image() {
        let mut fs = testing::mount(testing::blank_2hd());
        assert_eq!(
            fs.attributes().unwrap(),
            FsAttributes {
                encoding: "Shift_JIS",
                volume_label: "BLANK".into()
            }
        );
        assert_eq!(fs.cwd().unwrap(), "/");
        assert!(names(&mut fs).is_empty());
        assert_eq!(free_cluster(&fs), 2);
        assert!(matches!(
            fs.mount(testing::xdf(testing::blank_2hd())),
            Err(FsError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rejects_mismatched_geometry() {
        let mut image = testing::blank_2hd();
        image[24] = 9;
        assert_eq!(
            Fat12::open(testing::xdf(image)).map(|_| ()),
            Err(FsError::format("inconsistent sectors/track"))
        );
    }

    #[test]
    fn volume_label_entry_wins() {
        let mut image = testing::blank_2hd();
        let root = 5 * 1024;
        image[root..root + 11].copy_from_slice(b"MY DISK    ");
        image[root + 11] = Attributes::VOLUME_ID.bits();
        let mut fs = testing::mount(image);
        assert_eq!(fs.volume_label().unwrap(), "MY DISK");
        assert!(names(&mut fs).is_empty());
        assert_eq!(fs.entries().unwrap().count(), 1);
    }

    #[test]
    fn long_name_slots_are_not_labels() {
        let mut image = testing::blank_2hd();
        let root = 5 * 1024;
        image[root..root + 11].copy_from_slice(b"\x41h\0e\0l\0l\0o\0");
        image[root + 11] = Attributes::LONG_NAME.bits();
        let mut fs = testing::mount(image.clone());
        assert_eq!(fs.volume_label().unwrap(), "BLANK");
        assert!(names(&mut fs).is_empty());

        image[root + 32..root + 43].copy_from_slice(b"MY DISK    ");
        image[root + 43] = Attributes::VOLUME_ID.bits();
        let fs = testing::mount(image);
        assert_eq!(fs.volume_label().unwrap(), "MY DISK");
    }

    #[test]
    fn shift_jis_names_round_trip() {
        let mut image = testing::blank_2hd();
        let root = 5 * 1024;
        image[root..root + 11].copy_from_slice(b"\x83\x65\x83\x58\x83\x67  TXT");
        image[root + 11] = Attributes::ARCHIVE.bits();
        let mut fs = testing::mount(image);
        assert_eq!(names(&mut fs), vec!["テスト.TXT"]);
        assert_eq!(fs.attributes().unwrap().encoding, "Shift_JIS");

        fs.mkdir("データ", &EntryOptions::default()).unwrap();
        let listed: Vec<FsMetadata> = fs.list().unwrap().collect();
        assert_eq!(listed[1].name, "データ");
        assert_eq!(listed[1].raw_name, b"\x83\x66\x81\x5b\x83\x5e");
        fs.chdir("データ").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/データ");
        create(&mut fs, "メモ.TXT", b"memo");
        assert_eq!(read(&mut fs, "メモ.TXT"), b"memo");
    }

    #[test]
    fn files_survive_reopen_and_delete_frees_clusters() {
        let mut fs = testing::mount(testing::blank_2hd());
        let data = pattern(3000);
        create(&mut fs, "HELLO.TXT", &data);
        assert_eq!(free_cluster(&fs), 5);

        let listed: Vec<FsMetadata> = fs.list().unwrap().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "HELLO.TXT");
        assert_eq!(listed[0].size, 3000);
        assert!(listed[0].is_file());
        assert!(listed[0].modified.is_some());
        assert_eq!(read(&mut fs, "HELLO.TXT"), data);

        assert!(matches!(
            fs.get_io("HELLO.TXT", &EntryOptions::create()),
            Err(FsError::InvalidRequest(_))
        ));
        assert_eq!(
            fs.get_io("MISSING.TXT", &EntryOptions::default()).map(|_| ()),
            Err(FsError::NotFound)
        );

        fs.remove("HELLO.TXT").unwrap();
        assert!(names(&mut fs).is_empty());
        assert_eq!(free_cluster(&fs), 2);
        assert_eq!(fs.remove("HELLO.TXT"), Err(FsError::NotFound));
    }

    #[test]
    fn changes_reach_the_image() {
        let mut fs = testing::mount(testing::blank_2hd());
        create(&mut fs, "A.BIN", &pattern(1500));
        fs.mkdir("SUB", &EntryOptions::default()).unwrap();

        let image = fs.close().unwrap().into_inner().unwrap().into_inner();
        // both FAT copies: A.BIN is 2 -> 3, SUB is 4
        for fat in [1024, 3 * 1024] {
            assert_eq!(&image[fat..fat + 8], &[0xfe, 0xff, 0xff, 0x03, 0xf0, 0xff, 0xff, 0x0f]);
        }
        assert_eq!(&image[11 * 1024..11 * 1024 + 1500], &pattern(1500)[..]);

        let mut fs = testing::mount(image);
        assert_eq!(names(&mut fs), vec!["A.BIN", "SUB"]);
        assert_eq!(read(&mut fs, "A.BIN"), pattern(1500));
    }

    #[test]
    fn mkdir_twice_is_rejected() {
        let mut fs = testing::mount(testing::blank_2hd());
        fs.mkdir("A", &EntryOptions::default()).unwrap();
        assert_eq!(
            fs.mkdir("A", &EntryOptions::default()),
            Err(FsError::InvalidRequest("already exist"))
        );
    }

    #[test]
    fn directories_navigate_and_hold_dot_entries() {
        let mut fs = testing::mount(testing::blank_2hd());
        fs.mkdir("GAMES", &EntryOptions::default()).unwrap();
        fs.chdir("GAMES").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/GAMES");
        assert_eq!(names(&mut fs), vec![".", ".."]);

        fs.mkdir("SAVE", &EntryOptions::default()).unwrap();
        fs.chdir("SAVE").unwrap();
        fs.chdir(".").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/GAMES/SAVE");
        let parent = fs.entries().unwrap().find(|e| e.name == "..").unwrap();
        assert_eq!(parent.cluster, 2);

        fs.chdir("..").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/GAMES");
        fs.chdir("..").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/");
        assert_eq!(fs.chdir(".."), Err(FsError::NotFound));
        assert_eq!(fs.chdir("NOWHERE"), Err(FsError::NotFound));
    }

    #[test]
    fn only_empty_directories_are_removed() {
        let mut fs = testing::mount(testing::blank_2hd());
        fs.mkdir("EMPTY", &EntryOptions::default()).unwrap();
        fs.remove("EMPTY").unwrap();
        assert!(names(&mut fs).is_empty());

        fs.mkdir("FULL", &EntryOptions::default()).unwrap();
        fs.chdir("FULL").unwrap();
        create(&mut fs, "NOTE.TXT", b"hello");
        assert!(matches!(fs.remove("."), Err(FsError::InvalidRequest(_))));
        fs.chdir("..").unwrap();
        assert_eq!(fs.remove("FULL"), Err(FsError::NotEmpty));

        fs.chdir("FULL").unwrap();
        fs.remove("NOTE.TXT").unwrap();
        fs.chdir("..").unwrap();
        fs.remove("FULL").unwrap();
        assert_eq!(free_cluster(&fs), 2);
    }

    #[test]
    fn subdirectories_grow_and_root_does_not() {
        let mut fs = testing::mount(testing::blank_2hd());
        fs.mkdir("MANY", &EntryOptions::default()).unwrap();
        fs.chdir("MANY").unwrap();
        for i in 0..40 {
            create(&mut fs, &format!("F{}.DAT", i), &[i as u8]);
        }
        assert_eq!(names(&mut fs).len(), 42);
        assert_eq!(read(&mut fs, "F39.DAT"), vec![39]);
        assert_eq!(fs.with(|fs| fs.fat.chain_length(2)).unwrap(), 2);

        fs.chdir("..").unwrap();
        fs.chdir("MANY").unwrap();
        assert_eq!(names(&mut fs).len(), 42);

        fs.chdir("..").unwrap();
        for i in 1..192 {
            fs.mkdir(&format!("D{}", i), &EntryOptions::default()).unwrap();
        }
        assert_eq!(
            fs.mkdir("ONEMORE", &EntryOptions::default()),
            Err(FsError::NoSpace("cannot expand root dirent"))
        );
    }

    #[test]
    fn streams_seek_overwrite_and_truncate() {
        let mut fs = testing::mount(testing::blank_2hd());
        let mut io = fs.get_io("DATA.BIN", &EntryOptions::create()).unwrap();
        io.write(&pattern(2500)).unwrap();
        assert_eq!(io.attributes().unwrap().size, 2500);

        io.seek(1000).unwrap();
        io.write(&[0xee; 100]).unwrap();
        io.seek(990).unwrap();
        let middle = io.read(20).unwrap();
        assert_eq!(&middle[..10], &pattern(1000)[990..]);
        assert_eq!(&middle[10..], &[0xee; 10]);
        assert_eq!(io.read_at(2490, 100).unwrap().len(), 10);

        io.truncate(1000).unwrap();
        assert_eq!(io.attributes().unwrap().size, 1000);
        assert_eq!(io.read_at(0, 5000).unwrap(), pattern(1000));
        assert_eq!(free_cluster(&fs), 3);

        io.seek(1000).unwrap();
        io.write(&[1, 2, 3]).unwrap();
        assert_eq!(io.attributes().unwrap().size, 1003);

        io.truncate(0).unwrap();
        assert_eq!(io.read_at(0, 10).unwrap(), Vec::<u8>::new());
        io.close().unwrap();
        assert_eq!(free_cluster(&fs), 2);
        assert_eq!(io.read(1), Err(FsError::NotOpen("file")));

        let listed: Vec<FsMetadata> = fs.list().unwrap().collect();
        assert_eq!(listed[0].size, 0);
    }

    #[test]
    fn failed_truncate_keeps_the_size() {
        let mut fs = testing::mount(testing::blank_2hd());
        create(&mut fs, "LONG.BIN", &pattern(3000));
        fs.with(|fs| fs.fat.set(2, 1)).unwrap();

        let mut io = fs.get_io("LONG.BIN", &EntryOptions::default()).unwrap();
        io.seek(2900).unwrap();
        assert!(matches!(io.truncate(2500), Err(FsError::InvalidFormat(_))));
        assert_eq!(io.attributes().unwrap().size, 3000);
        let listed: Vec<FsMetadata> = fs.list().unwrap().collect();
        assert_eq!(listed[0].size, 3000);
    }

    #[test]
    fn new_clusters_are_zero_filled() {
        let mut image = testing::blank_2hd();
        image[11 * 1024..13 * 1024].fill(0xcc);
        let mut fs = testing::mount(image);
        let mut io = fs.get_io("Z", &EntryOptions::create()).unwrap();
        io.write(&[7; 10]).unwrap();
        io.close().unwrap();

        let image = fs.close().unwrap().into_inner().unwrap().into_inner();
        assert_eq!(&image[11 * 1024..11 * 1024 + 10], &[7; 10]);
        assert!(image[11 * 1024 + 10..12 * 1024].iter().all(|b| *b == 0));
    }

    #[test]
    fn closed_volume_fails_not_open() {
        let mut fs = testing::mount(testing::blank_2hd());
        let mut io = fs.get_io("A", &EntryOptions::create()).unwrap();
        fs.close().unwrap();
        assert!(!fs.is_open());
        assert_eq!(io.write(b"x"), Err(FsError::NotOpen("volume")));
        assert!(matches!(fs.list(), Err(FsError::NotOpen(_))));
        assert!(matches!(fs.close(), Err(FsError::NotOpen(_))));
    }

    #[test]
    fn read_only_devices_reject_mutation() {
        let mut fs = Fat12::open(testing::ReadOnly(testing::xdf(testing::blank_2hd()))).unwrap();
        assert_eq!(fs.mkdir("A", &EntryOptions::default()), Err(FsError::WriteProtected));
        assert_eq!(
            fs.get_io("A", &EntryOptions::create()).map(|_| ()),
            Err(FsError::WriteProtected)
        );
        assert!(fs.list().unwrap().next().is_none());
    }

    #[test]
    fn write_protected_images_refuse_changes_up_front() {
        let mut fs = testing::mount(testing::blank_2hd());
        create(&mut fs, "KEEP.TXT", b"original");
        let image = fs.close().unwrap().into_inner().unwrap().into_inner();

        let io = MemoryIo::new("ro.xdf", image.clone()).write_protected();
        let mut fs = Fat12::open(XdfImage::open(io).unwrap()).unwrap();
        assert_eq!(fs.mkdir("NEW", &EntryOptions::default()), Err(FsError::WriteProtected));
        let mut io = fs.get_io("KEEP.TXT", &EntryOptions::default()).unwrap();
        assert!(io.attributes().unwrap().read_only);
        assert_eq!(io.write(b"changed"), Err(FsError::WriteProtected));
        assert_eq!(io.truncate(1), Err(FsError::WriteProtected));
        io.close().unwrap();

        assert_eq!(read(&mut fs, "KEEP.TXT"), b"original");
        assert_eq!(free_cluster(&fs), 3);
        assert_eq!(fs.close().unwrap().into_inner().unwrap().into_inner(), image);
    }

    #[test]
    fn two_sector_clusters_on_dd_media() {
        let mut blank = testing::blank_2dd();
        // cluster 6, the first file created in LOGS
        blank[22 * 512..24 * 512].fill(0xcc);
        let dcu = testing::dcu_with(4, testing::GEOMETRY_2DD, &blank, 160);
        let mut fs = Fat12::open(DcuImage::open(MemoryIo::new("dd.dcu", dcu)).unwrap()).unwrap();
        let layout = fs.with(|fs| Ok(fs.layout)).unwrap();
        assert_eq!(layout.sectors_per_cluster, 2);
        assert_eq!(layout.root_start, 7);
        assert_eq!(layout.data_start, 14);
        assert_eq!(layout.last_cluster, 714);
        assert_eq!(fs.volume_label().unwrap(), "DD720");

        let mut expected = pattern(2500);
        expected[500..540].fill(0xee);
        let mut io = fs.get_io("DATA.BIN", &EntryOptions::create()).unwrap();
        io.write(&pattern(2500)).unwrap();
        // straddles both sectors of the first cluster
        io.write_at(500, &[0xee; 40]).unwrap();
        io.close().unwrap();
        assert_eq!(free_cluster(&fs), 5);

        fs.mkdir("LOGS", &EntryOptions::default()).unwrap();
        fs.chdir("LOGS").unwrap();
        for i in 0..40 {
            create(&mut fs, &format!("L{}.TXT", i), &[i as u8]);
        }
        assert_eq!(names(&mut fs).len(), 42);
        assert_eq!(fs.with(|fs| fs.fat.chain_length(5)).unwrap(), 2);

        let image = fs.close().unwrap().into_inner().unwrap().into_inner();
        let first_cluster = 162 + 14 * 512;
        assert_eq!(&image[first_cluster..first_cluster + 2500], &expected[..]);
        let log = 162 + 22 * 512;
        assert!(image[log..log + 1024].iter().all(|b| *b == 0));

        let mut fs = Fat12::open(DcuImage::open(MemoryIo::new("dd.dcu", image)).unwrap()).unwrap();
        assert_eq!(read(&mut fs, "DATA.BIN"), expected);
        fs.chdir("LOGS").unwrap();
        assert_eq!(names(&mut fs).len(), 42);
        assert_eq!(read(&mut fs, "L39.TXT"), vec![39]);
    }

    #[test]
    fn human_2hs_volumes_mount_from_d88() {
        let data = testing::d88_with("2HS", testing::GEOMETRY_2HS, &testing::blank_human_2hs());
        let mut fs = Fat12::open(open_image(MemoryIo::new("hs.d88", data)).unwrap()).unwrap();
        let params = fs.params().unwrap();
        assert_eq!(params.media, 0xfb);
        assert_eq!(params.total_sectors, 1440);
        assert_eq!(params.sectors_per_track, 9);
        assert_eq!(fs.with(|fs| Ok(fs.layout.data_start)).unwrap(), 13);
        assert_eq!(fs.volume_label().unwrap(), "hs.d88");

        create(&mut fs, "HIGH_DENSITY_X.DAT", &pattern(3000));
        assert_eq!(read(&mut fs, "HIGH_DENSITY_X.DAT"), pattern(3000));
        assert_eq!(free_cluster(&fs), 5);
    }

    #[test]
    fn human_volumes_use_long_names() {
        let mut fs = testing::mount(testing::blank_human_2hd());
        assert!(fs.params().unwrap().extended_names);
        assert_eq!(fs.volume_label().unwrap(), "test.xdf");

        fs.mkdir("LONG_DIRECTORY_NM", &EntryOptions::default()).unwrap();
        create(&mut fs, "A_LONGER_NAME.TXT", b"x68k");
        let listed: Vec<FsMetadata> = fs.list().unwrap().collect();
        assert_eq!(listed[0].name, "LONG_DIRECTORY_NM");
        assert!(listed[0].is_dir());
        assert_eq!(listed[0].created, None);
        assert_eq!(listed[1].name, "A_LONGER_NAME.TXT");
        assert_eq!(read(&mut fs, "A_LONGER_NAME.TXT"), b"x68k");

        fs.chdir("LONG_DIRECTORY_NM").unwrap();
        assert_eq!(fs.cwd().unwrap(), "/LONG_DIRECTORY_NM");
        assert!(matches!(
            fs.mkdir("EIGHTEEN_CHARACTER", &EntryOptions::default()),
            Err(FsError::InvalidName(_))
        ));
    }

    #[test]
    fn images_mount_from_inside_a_volume() {
        let mut outer = testing::mount(testing::blank_2hd());
        let mut io = outer.get_io("INNER.DCU", &EntryOptions::create()).unwrap();
        io.write(&testing::dcu_from(&testing::blank_2hd(), 2)).unwrap();
        io.close().unwrap();

        let io = outer.get_io("INNER.DCU", &EntryOptions::default()).unwrap();
        let mut inner = Fat12::open(open_image(io).unwrap()).unwrap();
        inner.mkdir("NESTED", &EntryOptions::default()).unwrap();
        assert_eq!(names(&mut inner), vec!["NESTED"]);
        let device = inner.close().unwrap();
        drop(device);

        let io = outer.get_io("INNER.DCU", &EntryOptions::default()).unwrap();
        let mut inner = Fat12::open(open_image(io).unwrap()).unwrap();
        assert_eq!(names(&mut inner), vec!["NESTED"]);
    }
}

use super::*;
use num_enum::TryFromPrimitive;

const HEADER_SIZE: usize = 162;
const MAX_TRACKS: usize = 160;
const TRACK_STOP: u8 = 1;

/// Media types a DCU header can declare.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum DcuType {
    /// 1.25M: 1024 * 8 * 77 * 2
    Hd8Sector = 0,
    /// 1.21M: 512 * 15 * 80 * 2
    Hc15Sector = 1,
    /// 1.44M: 512 * 18 * 80 * 2
    Hq18Sector = 2,
    /// 640K: 512 * 8 * 80 * 2
    Dd8Sector = 3,
    /// 720K: 512 * 9 * 80 * 2
    Dd9Sector = 4,
}

impl DcuType {
    /// Returns (bytes/sector, sectors/track, tracks)
    pub fn geometry(self) -> (usize, usize, usize) {
        match self {
            Self::Hd8Sector => (1024, 8, 154),
            Self::Hc15Sector => (512, 15, 160),
            Self::Hq18Sector => (512, 18, 160),
            Self::Dd8Sector => (512, 8, 160),
            Self::Dd9Sector => (512, 9, 160),
        }
    }

    fn tracks(self) -> usize {
        self.geometry().2
    }

    fn track_size(self) -> u64 {
        let (bytes_per_sector, sectors_per_track, _) = self.geometry();
        (bytes_per_sector * sectors_per_track) as u64
    }

    /// The stop marker must follow the last track, and short tables leave
    /// the final slot unused.
    fn matches(self, header: &[u8]) -> bool {
        let tracks = self.tracks();
        header[tracks + 1] == TRACK_STOP && (tracks == MAX_TRACKS || header[MAX_TRACKS + 1] == 0)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum TrackStatus {
    Unused = 0,
    Used = 1,
    Bad = 255,
}

/// A track-map image: a type byte and per-track status table, followed by
/// the data of every used track in order.
pub struct DcuImage<F: FileIo> {
    io: Option<F>,
    kind: DcuType,
    tracks: Vec<(TrackStatus, u64)>,
    name: String,
    size: u64,
    read_only: bool,
}

impl<F: FileIo> DcuImage<F> {
    pub fn open(mut io: F) -> FsResult<Self> {
        let attributes = io.attributes()?;
        io.seek(0)?;
        let header = io.read(HEADER_SIZE)?;
        if header.len() != HEADER_SIZE {
            return Err(FsError::format("DCU header too short"));
        }

        let mut kind = DcuType::try_from(header[0])
            .map_err(|_| FsError::format(format!("DCU unknown type {:#x}", header[0])))?;
        if !kind.matches(&header) {
            if kind == DcuType::Hd8Sector || !DcuType::Hd8Sector.matches(&header) {
                return Err(FsError::format("DCU invalid track information"));
            }
            warn!("DCU: declared type {:?} looks wrong, assuming 2HD.", kind);
            kind = DcuType::Hd8Sector;
        }

        let mut tracks = Vec::with_capacity(kind.tracks());
        let mut offset = HEADER_SIZE as u64;
        for (track, raw) in header[1..=kind.tracks()].iter().enumerate() {
            let status = TrackStatus::try_from(*raw).map_err(|_| {
                FsError::format(format!("DCU track {} has status {:#x}", track, raw))
            })?;
            tracks.push((status, offset));
            if status == TrackStatus::Used {
                offset += kind.track_size();
            }
        }
        if attributes.size != offset {
            return Err(FsError::format(format!(
                "DCU size {} does not match {} used tracks",
                attributes.size,
                (offset - HEADER_SIZE as u64) / kind.track_size()
            )));
        }

        debug!("DCU image \"{}\" opened as {:?}.", attributes.name, kind);
        Ok(Self {
            io: Some(io),
            kind,
            tracks,
            name: attributes.name,
            size: attributes.size,
            read_only: attributes.read_only,
        })
    }

    pub fn kind(&self) -> DcuType {
        self.kind
    }

    pub fn into_inner(self) -> Option<F> {
        self.io
    }

    pub fn track_status(&self, track: usize) -> Option<TrackStatus> {
        self.tracks.get(track).map(|(status, _)| *status)
    }

    /// Translates a sector number into a file offset; `None` for sectors of
    /// a track the image does not store.
    fn locate(&self, sector: u32) -> FsResult<Option<u64>> {
        let (bytes_per_sector, sectors_per_track, _) = self.kind.geometry();
        let track = sector as usize / sectors_per_track;
        let (status, offset) = self
            .tracks
            .get(track)
            .copied()
            .ok_or(FsError::InvalidRequest("sector out of range"))?;
        match status {
            TrackStatus::Bad => Err(FsError::disk(format!("DCU bad track {}", track))),
            TrackStatus::Unused => Ok(None),
            TrackStatus::Used => {
                let in_track = sector as usize % sectors_per_track;
                Ok(Some(offset + (in_track * bytes_per_sector) as u64))
            }
        }
    }

    fn io(&mut self) -> FsResult<&mut F> {
        self.io.as_mut().ok_or(FsError::NotOpen("DCU"))
    }
}

impl<F: FileIo + 'static> BlockDevice for DcuImage<F> {
    fn read_block(&mut self, sector: u32, buf: &mut [u8]) -> FsResult {
        let bytes_per_sector = self.kind.geometry().0;
        check_buffer(buf.len(), bytes_per_sector)?;
        let Some(offset) = self.locate(sector)? else {
            buf.fill(0);
            return Ok(());
        };
        let data = self.io()?.read_at(offset, bytes_per_sector)?;
        if data.len() != bytes_per_sector {
            return Err(FsError::disk("short DCU sector read"));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write_block(&mut self, sector: u32, buf: &[u8]) -> FsResult {
        if self.read_only {
            return Err(FsError::WriteProtected);
        }
        check_buffer(buf.len(), self.kind.geometry().0)?;
        let offset = self
            .locate(sector)?
            .ok_or_else(|| FsError::disk("DCU track not stored"))?;
        self.io()?.write_at(offset, buf)?;
        Ok(())
    }

    fn attributes(&self) -> FsResult<DeviceAttributes> {
        if self.io.is_none() {
            return Err(FsError::NotOpen("DCU"));
        }
        let (bytes_per_sector, sectors_per_track, tracks) = self.kind.geometry();
        Ok(DeviceAttributes {
            bytes_per_sector,
            sectors_per_track,
            tracks,
            size: self.size,
            name: self.name.clone(),
            read_only: self.read_only,
            bundles: None,
        })
    }

    fn flush(&mut self) -> FsResult {
        self.io()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: usize = 1024 * 8;

    fn header(kind: u8, used: &[usize], bad: &[usize], stop: usize) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_SIZE];
        header[0] = kind;
        for track in used {
            header[track + 1] = TrackStatus::Used as u8;
        }
        for track in bad {
            header[track + 1] = TrackStatus::Bad as u8;
        }
        header[stop] = TRACK_STOP;
        header
    }

    #[test]
    fn skips_absent_tracks() {
        let mut data = header(0, &[0, 3], &[2], 155);
        data.extend(vec![0x11; TRACK]);
        data.extend(vec![0x33; TRACK]);
        let mut image = DcuImage::open(MemoryIo::new("t.dcu", data)).unwrap();
        assert_eq!(image.attributes().unwrap().total_sectors(), 1232);

        assert_eq!(image.read_sector(7).unwrap(), vec![0x11; 1024]);
        assert_eq!(image.read_sector(8).unwrap(), vec![0; 1024]);
        assert_eq!(image.read_sector(24).unwrap(), vec![0x33; 1024]);
        assert!(matches!(image.read_sector(16), Err(FsError::DiskError(_))));
        assert!(matches!(image.write_block(8, &[0; 1024]), Err(FsError::DiskError(_))));

        image.write_block(25, &[0x77; 1024]).unwrap();
        assert_eq!(image.read_sector(25).unwrap(), vec![0x77; 1024]);
        assert_eq!(image.read_sector(24).unwrap(), vec![0x33; 1024]);
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut data = header(0, &[0], &[], 155);
        data.extend(vec![0; TRACK - 1]);
        assert!(matches!(
            DcuImage::open(MemoryIo::new("t.dcu", data)),
            Err(FsError::InvalidFormat(_))
        ));
    }

    #[test]
    fn falls_back_to_2hd() {
        let mut data = header(2, &[0], &[], 155);
        data.extend(vec![0; TRACK]);
        let image = DcuImage::open(MemoryIo::new("t.dcu", data)).unwrap();
        assert_eq!(image.kind(), DcuType::Hd8Sector);
        assert_eq!(image.track_status(1), Some(TrackStatus::Unused));
    }

    #[test]
    fn read_only_files_make_read_only_disks() {
        let mut data = header(0, &[0], &[], 155);
        data.extend(vec![0; TRACK]);
        let mut image = DcuImage::open(MemoryIo::new("t.dcu", data).write_protected()).unwrap();
        assert!(image.attributes().unwrap().read_only);
        assert_eq!(image.write_block(0, &[1; 1024]), Err(FsError::WriteProtected));
        assert_eq!(image.read_sector(0).unwrap(), vec![0; 1024]);
    }
}

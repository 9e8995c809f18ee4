//! Block devices over historical floppy-disk container formats.
//!
//! Every adapter reads its container through a [`FileIo`], so a container
//! can live in a host file, in memory, or inside another FAT12 volume.

mod d88;
mod dcu;
mod xdf;

pub use d88::*;
pub use dcu::*;
pub use xdf::*;

use crate::*;

fn check_buffer(buf_len: usize, bytes_per_sector: usize) -> FsResult {
    if buf_len != bytes_per_sector {
        return Err(FsError::InvalidBuffer("wrong size sector buffer"));
    }
    Ok(())
}

/// Opens an image by its file extension.
pub fn open_image<F: FileIo + 'static>(io: F) -> FsResult<Box<dyn BlockDevice>> {
    let name = io.attributes()?.name.to_ascii_lowercase();
    let device: Box<dyn BlockDevice> = match name.rsplit('.').next() {
        Some("d88") | Some("d77") | Some("d68") => Box::new(D88Image::open(io)?),
        Some("dcu") => Box::new(DcuImage::open(io)?),
        Some("xdf") | Some("hdm") | Some("2hd") => Box::new(XdfImage::open(io)?),
        _ => return Err(FsError::format("unknown image type")),
    };
    Ok(device)
}

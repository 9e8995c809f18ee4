#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
extern crate alloc;
#[macro_use]
extern crate log;

#[macro_use]
pub mod common;
pub mod fs;
pub mod image;
pub mod io;

#[cfg(test)]
mod testing;

use alloc::{
    boxed::Box,
    string::{String, ToString},
    vec::Vec,
};

pub use common::*;
pub use fs::*;
pub use image::*;
pub use io::*;

// Layers, top to bottom:
//
//   RootFs            volumes by label
//   MultiImageFs      disks of one image file
//   Fat12             directories, files, cluster chains
//   BlockDevice       XdfImage / DcuImage / D88Image
//   FileIo            NativeIo (SectorCache over a RawStore) / MemoryIo / FatFile
//
// Every FAT12 file is itself a FileIo, so an image stored inside a mounted
// image can be opened and mounted in turn.

#[macro_use]
mod macros;

mod cache;
mod device;
mod error;
mod filesystem;
mod io;
mod metadata;
mod mount;
mod path;

pub use cache::*;
pub use device::*;
pub use error::*;
pub use filesystem::*;
pub use io::*;
pub use metadata::*;
pub use mount::*;
pub use path::*;

use super::*;

/// Decodes Shift_JIS text, stopping at the first NUL.
pub fn shift_jis(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    encoding_rs::SHIFT_JIS
        .decode_without_bom_handling(&bytes[..end])
        .0
        .into_owned()
}

pub fn humanized_size(size: u64) -> (f32, &'static str) {
    let bytes = size as f32;
    if bytes < 1024f32 {
        (bytes, "B")
    } else if (bytes / (1 << 10) as f32) < 1024f32 {
        (bytes / (1 << 10) as f32, "K")
    } else if (bytes / (1 << 20) as f32) < 1024f32 {
        (bytes / (1 << 20) as f32, "M")
    } else {
        (bytes / (1 << 30) as f32, "G")
    }
}

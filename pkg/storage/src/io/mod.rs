mod memory;
mod native;

pub use memory::*;
pub use native::*;

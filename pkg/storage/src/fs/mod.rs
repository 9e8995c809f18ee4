pub mod fat12;
mod multi;

pub use fat12::Fat12;
pub use multi::*;

use crate::*;

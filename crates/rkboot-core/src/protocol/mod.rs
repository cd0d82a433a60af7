//! Protocol module - maskrom boot protocol definitions.

pub mod checksum;
pub mod constants;
pub mod stage;

pub use checksum::{Checksum, crc16_update};
pub use constants::*;
pub use stage::Stage;

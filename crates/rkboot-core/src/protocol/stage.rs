//! Boot stages and their function codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{FUNCTION_STAGE1, FUNCTION_STAGE2};

/// One of the two images the boot ROM accepts, in download order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// DDR init blob (TPL).
    One,
    /// Secondary loader (SPL).
    Two,
}

impl Stage {
    /// wIndex used for every transfer of this stage.
    pub const fn function_code(self) -> u16 {
        match self {
            Stage::One => FUNCTION_STAGE1,
            Stage::Two => FUNCTION_STAGE2,
        }
    }

    pub const fn all() -> [Stage; 2] {
        [Stage::One, Stage::Two]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::One => write!(f, "stage 1"),
            Stage::Two => write!(f, "stage 2"),
        }
    }
}

//! State machine module.

pub mod machine;

pub use machine::{BootMachine, BootState, BootStep};

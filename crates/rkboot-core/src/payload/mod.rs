//! Payload handling module.
//!
//! Turns boot images into protocol frames: block framing with the CRC16
//! trailer, optional RC4 encryption, and the buffers both work in.

pub mod buffers;
pub mod cipher;
pub mod framer;

pub use buffers::{BufferError, TransferBuffers};
pub use cipher::{CipherGate, CipherMode};
pub use framer::{BlockFramer, Frame, FrameKind};

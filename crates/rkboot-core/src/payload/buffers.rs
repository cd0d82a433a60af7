//! Session-owned transmit buffers.

use std::collections::TryReserveError;

use thiserror::Error;

use super::cipher::CipherMode;
use crate::protocol::constants::TRAILER_LEN;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error(
        "block size {block_size} leaves no room for data beside the {}-byte trailer",
        TRAILER_LEN
    )]
    BlockTooSmall { block_size: usize },

    #[error("out of memory")]
    OutOfMemory(#[from] TryReserveError),
}

/// Plaintext read buffer plus, when encrypting, a same-sized ciphertext
/// scratch buffer. Both are exactly one block long.
#[derive(Debug)]
pub struct TransferBuffers {
    mode: CipherMode,
    plain: Vec<u8>,
    scratch: Vec<u8>,
}

impl TransferBuffers {
    /// Block sizes must exceed the trailer length, so a terminal frame can
    /// always carry the checksum.
    pub fn allocate(block_size: usize, mode: CipherMode) -> Result<Self, BufferError> {
        if block_size <= TRAILER_LEN {
            return Err(BufferError::BlockTooSmall { block_size });
        }
        let plain = zeroed(block_size)?;
        let scratch = if mode.is_encrypted() {
            zeroed(block_size)?
        } else {
            Vec::new()
        };
        Ok(Self {
            mode,
            plain,
            scratch,
        })
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn block_size(&self) -> usize {
        self.plain.len()
    }

    /// Read buffer and, when encrypting, the buffer that goes on the wire.
    pub(crate) fn split(&mut self) -> (&mut [u8], Option<&mut [u8]>) {
        match self.mode {
            CipherMode::Plaintext => (self.plain.as_mut_slice(), None),
            CipherMode::Rc4 => (
                self.plain.as_mut_slice(),
                Some(self.scratch.as_mut_slice()),
            ),
        }
    }

    /// The buffer whose contents are transmitted.
    pub(crate) fn wire(&mut self) -> &mut [u8] {
        match self.mode {
            CipherMode::Plaintext => self.plain.as_mut_slice(),
            CipherMode::Rc4 => self.scratch.as_mut_slice(),
        }
    }
}

fn zeroed(len: usize) -> Result<Vec<u8>, TryReserveError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

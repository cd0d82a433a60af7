//! Block framing of a boot image.
//!
//! An image is cut into blocks of `block_size` bytes. Every byte that goes
//! on the wire is folded into a running CRC16, and the final frame carries
//! the checksum as a big-endian trailer. When the last chunk leaves no room
//! for the trailer it is sent on its own and the trailer follows in a
//! two-byte frame.

use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

use super::buffers::TransferBuffers;
use super::cipher::CipherGate;
use crate::protocol::Checksum;
use crate::protocol::constants::TRAILER_LEN;

/// Position of a frame within an image transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Payload only.
    Interior,
    /// Last frame; ends with the checksum trailer.
    Terminal,
}

/// One protocol frame, borrowed from the session buffers.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub kind: FrameKind,
    pub data: &'a [u8],
}

impl Frame<'_> {
    pub fn is_terminal(&self) -> bool {
        self.kind == FrameKind::Terminal
    }

    /// Image bytes carried by this frame, excluding the trailer.
    pub fn payload_len(&self) -> usize {
        match self.kind {
            FrameKind::Interior => self.data.len(),
            FrameKind::Terminal => self.data.len() - TRAILER_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    Reading,
    TrailerPending,
    Finished,
}

/// Lazily frames one image. Not restartable: once the terminal frame has
/// been produced, [`BlockFramer::next_frame`] returns `None`.
#[derive(Debug)]
pub struct BlockFramer<'a, R: Read> {
    source: R,
    buffers: &'a mut TransferBuffers,
    cipher: CipherGate,
    checksum: Checksum,
    state: FramerState,
    bytes_read: u64,
}

impl<'a, R: Read> BlockFramer<'a, R> {
    /// Start framing `source`. The cipher starts from a fresh keystream.
    pub fn new(source: R, buffers: &'a mut TransferBuffers) -> Self {
        let cipher = CipherGate::new(buffers.mode());
        Self {
            source,
            buffers,
            cipher,
            checksum: Checksum::new(),
            state: FramerState::Reading,
            bytes_read: 0,
        }
    }

    /// Image bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Checksum over everything produced so far.
    pub fn checksum(&self) -> u16 {
        self.checksum.value()
    }

    pub fn next_frame(&mut self) -> io::Result<Option<Frame<'_>>> {
        match self.state {
            FramerState::Finished => Ok(None),
            FramerState::TrailerPending => {
                let wire = self.buffers.wire();
                BigEndian::write_u16(&mut wire[..TRAILER_LEN], self.checksum.value());
                self.state = FramerState::Finished;
                trace!(crc = %format!("{:04X}", self.checksum.value()), "Trailer-only frame");
                Ok(Some(Frame {
                    kind: FrameKind::Terminal,
                    data: &wire[..TRAILER_LEN],
                }))
            }
            FramerState::Reading => {
                let block_size = self.buffers.block_size();
                let (plain, scratch) = self.buffers.split();
                let n = fill_block(&mut self.source, plain)?;
                self.bytes_read += n as u64;

                let wire: &mut [u8] = match scratch {
                    Some(scratch) => {
                        self.cipher.apply(&plain[..n], &mut scratch[..n]);
                        scratch
                    }
                    None => plain,
                };
                self.checksum.update(&wire[..n]);

                if n == block_size {
                    return Ok(Some(Frame {
                        kind: FrameKind::Interior,
                        data: &wire[..n],
                    }));
                }

                if n >= block_size.saturating_sub(TRAILER_LEN) {
                    // A tail this long goes out alone; the trailer follows.
                    self.state = FramerState::TrailerPending;
                    return Ok(Some(Frame {
                        kind: FrameKind::Interior,
                        data: &wire[..n],
                    }));
                }

                BigEndian::write_u16(&mut wire[n..n + TRAILER_LEN], self.checksum.value());
                self.state = FramerState::Finished;
                Ok(Some(Frame {
                    kind: FrameKind::Terminal,
                    data: &wire[..n + TRAILER_LEN],
                }))
            }
        }
    }
}

/// Read until `buf` is full or the source is exhausted.
fn fill_block<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

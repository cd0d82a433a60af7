//! Frame delivery over the boot control pipe.

use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use super::traits::{TransportError, UsbTransport, VendorRequest};
use crate::payload::{Frame, FrameKind};
use crate::protocol::constants::{
    BOOT_REQUEST, BOOT_VALUE, DEFAULT_PACING, INTERIOR_TIMEOUT, TERMINAL_TIMEOUT,
};

/// Sends frames as vendor control transfers on a claimed interface.
pub struct TransferChannel<'a, T: UsbTransport> {
    transport: &'a T,
    pacing: Duration,
}

impl<'a, T: UsbTransport> TransferChannel<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self::with_pacing(transport, DEFAULT_PACING)
    }

    /// Use a custom pause after interior frames.
    pub fn with_pacing(transport: &'a T, pacing: Duration) -> Self {
        Self { transport, pacing }
    }

    /// Send one frame to the boot function selected by `function_code`.
    ///
    /// Interior frames are followed by the pacing delay. The terminal frame
    /// gets the long timeout because the ROM verifies the image before it
    /// completes the status stage.
    pub fn send(&self, frame: &Frame<'_>, function_code: u16) -> Result<(), TransportError> {
        let request = VendorRequest {
            request: BOOT_REQUEST,
            value: BOOT_VALUE,
            index: function_code,
        };
        let timeout = match frame.kind {
            FrameKind::Interior => INTERIOR_TIMEOUT,
            FrameKind::Terminal => TERMINAL_TIMEOUT,
        };

        let written = self.transport.control_out(request, frame.data, timeout)?;
        if written != frame.data.len() {
            return Err(TransportError::ShortWrite {
                expected: frame.data.len(),
                actual: written,
            });
        }

        match frame.kind {
            FrameKind::Interior => {
                trace!(len = written, "Interior frame sent");
                if !self.pacing.is_zero() {
                    thread::sleep(self.pacing);
                }
            }
            FrameKind::Terminal => {
                debug!(len = written, "Terminal frame sent");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBackend, MockDeviceInfo};
    use crate::transport::traits::{UsbBackend, UsbDevice};

    fn interior(data: &[u8]) -> Frame<'_> {
        Frame {
            kind: FrameKind::Interior,
            data,
        }
    }

    fn terminal(data: &[u8]) -> Frame<'_> {
        Frame {
            kind: FrameKind::Terminal,
            data,
        }
    }

    #[test]
    fn test_setup_fields_and_timeouts() {
        let backend = MockBackend::new().with_device(MockDeviceInfo::maskrom(0x2207, 0x350A));
        let info = backend.enumerate().unwrap().remove(0);
        let device = backend.open(&info).unwrap();
        let iface = device.claim_interface(0).unwrap();
        let channel = TransferChannel::new(&iface);

        channel.send(&interior(&[1, 2, 3]), 0x471).unwrap();
        channel.send(&terminal(&[4, 0xAB, 0xCD]), 0x472).unwrap();

        let transfers = backend.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(
            transfers[0].request,
            VendorRequest {
                request: 12,
                value: 0,
                index: 0x471
            }
        );
        assert_eq!(transfers[0].timeout, Duration::from_millis(1000));
        assert_eq!(transfers[1].request.index, 0x472);
        assert_eq!(transfers[1].timeout, Duration::from_millis(30_000));
        assert_eq!(transfers[1].data, vec![4, 0xAB, 0xCD]);
    }

    #[test]
    fn test_short_write_is_fatal() {
        let backend = MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x350A))
            .short_write_at(0);
        let info = backend.enumerate().unwrap().remove(0);
        let device = backend.open(&info).unwrap();
        let iface = device.claim_interface(0).unwrap();
        let channel = TransferChannel::with_pacing(&iface, Duration::ZERO);

        let err = channel.send(&interior(&[0u8; 64]), 0x471).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortWrite {
                expected: 64,
                actual: 32
            }
        ));
    }

    #[test]
    fn test_failed_transfer_propagates() {
        let backend = MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x350A))
            .fail_transfer_at(0);
        let info = backend.enumerate().unwrap().remove(0);
        let device = backend.open(&info).unwrap();
        let iface = device.claim_interface(0).unwrap();
        let channel = TransferChannel::new(&iface);

        assert!(channel.send(&terminal(&[0xFF, 0xFF]), 0x471).is_err());
        assert!(backend.transfers().is_empty());
    }
}

//! USB Transport layer abstraction.
//!
//! The boot session talks to the bus through three traits, one per
//! resource it acquires:
//! - `UsbBackend`: enumerate the bus and open a device
//! - `UsbDevice`: an open device handle, claims the boot interface
//! - `UsbTransport`: a claimed interface, issues vendor control transfers
//!
//! Dropping a `UsbTransport` releases the interface, dropping a `UsbDevice`
//! closes the handle.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Control transfer failed: {0}")]
    TransferFailed(String),

    #[error("Short write: {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Setup fields of a vendor-type, device-recipient control OUT request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorRequest {
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

/// Point-in-time description of an attached device.
pub trait DeviceDescriptor {
    fn vendor_id(&self) -> u16;

    fn product_id(&self) -> u16;

    /// Whether the device descriptor names a manufacturer string.
    /// The boot ROM does not.
    fn has_manufacturer_string(&self) -> bool;

    /// Human readable bus location, for logs.
    fn location(&self) -> String;
}

/// A claimed interface.
pub trait UsbTransport: Send + Sync {
    /// Issue one control OUT transfer; returns the number of bytes accepted.
    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// An exclusively opened device.
pub trait UsbDevice {
    type Interface: UsbTransport;

    /// Detach any kernel driver bound to `interface`, then claim it.
    fn claim_interface(&self, interface: u8) -> Result<Self::Interface, TransportError>;
}

/// Entry point to the bus.
pub trait UsbBackend {
    type Info: DeviceDescriptor;
    type Device: UsbDevice;

    /// Snapshot of all attached devices, in bus enumeration order.
    fn enumerate(&self) -> Result<Vec<Self::Info>, TransportError>;

    fn open(&self, info: &Self::Info) -> Result<Self::Device, TransportError>;
}

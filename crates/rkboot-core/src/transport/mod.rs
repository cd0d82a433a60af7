//! Transport layer module.

pub mod channel;
pub mod mock;
pub mod nusb;
pub mod traits;

pub use channel::TransferChannel;
pub use mock::{MockBackend, MockDeviceInfo, MockEvent, MockTransfer};
pub use nusb::{NusbBackend, NusbDevice, NusbTransport};
pub use traits::{
    DeviceDescriptor, TransportError, UsbBackend, UsbDevice, UsbTransport, VendorRequest,
};

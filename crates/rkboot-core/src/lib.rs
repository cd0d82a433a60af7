//! rkboot-core: Rockchip maskrom USB boot protocol in Rust.
//!
//! A Rockchip SoC without bootable firmware enumerates as a maskrom USB
//! device (vendor 0x2207). The boot ROM accepts two images over vendor
//! control transfers: a DDR init blob (stage 1) and a loader (stage 2).
//! This crate frames those images, encrypts them when the SoC family
//! requires it, and sequences the download.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, CRC16 checksum, boot stages
//! - **Payload**: Block framing, RC4 gate, transmit buffers
//! - **Transport**: USB abstraction (nusb, mock) and the frame channel
//! - **Device**: Maskrom discovery and selection
//! - **State**: Session state machine
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use rkboot_core::session::{BootSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     stage1_path: Some("rk3588_ddr.bin".into()),
//!     stage2_path: Some("rk3588_spl.bin".into()),
//!     ..Default::default()
//! };
//!
//! let mut session = BootSession::new(config);
//! session.run().expect("boot failed");
//! ```

pub mod device;
pub mod error;
pub mod events;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use device::{DeviceSelector, ListedDevice, MaskromDevice, Mode, Selection, is_maskrom};
pub use error::BootError;
pub use events::{BootEvent, BootObserver, NullObserver, TracingObserver};
pub use payload::{
    BlockFramer, BufferError, CipherGate, CipherMode, Frame, FrameKind, TransferBuffers,
};
pub use protocol::{Checksum, Stage};
pub use session::{BootSession, SessionConfig};
pub use state::{BootMachine, BootState, BootStep};
pub use transport::{
    DeviceDescriptor, MockBackend, MockDeviceInfo, NusbBackend, TransferChannel, TransportError,
    UsbBackend, UsbDevice, UsbTransport, VendorRequest,
};

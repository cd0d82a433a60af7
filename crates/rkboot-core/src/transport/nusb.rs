//! nusb-based USB transport implementation.

use std::time::Duration;

use nusb::transfer::{ControlOut, ControlType, Recipient, TransferError};
use nusb::{DeviceInfo, Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument};

use super::traits::{
    DeviceDescriptor, TransportError, UsbBackend, UsbDevice, UsbTransport, VendorRequest,
};

/// The host's USB stack, through nusb.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbBackend;

impl NusbBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceDescriptor for DeviceInfo {
    fn vendor_id(&self) -> u16 {
        DeviceInfo::vendor_id(self)
    }

    fn product_id(&self) -> u16 {
        DeviceInfo::product_id(self)
    }

    fn has_manufacturer_string(&self) -> bool {
        self.manufacturer_string().is_some()
    }

    fn location(&self) -> String {
        format!("{}:{:03}", self.bus_id(), self.device_address())
    }
}

impl UsbBackend for NusbBackend {
    type Info = DeviceInfo;
    type Device = NusbDevice;

    fn enumerate(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let devices: Vec<DeviceInfo> = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .collect();
        debug!(count = devices.len(), "Enumerated USB devices");
        Ok(devices)
    }

    #[instrument(level = "info", skip(self, info), fields(location = %info.location()))]
    fn open(&self, info: &DeviceInfo) -> Result<NusbDevice, TransportError> {
        let device = info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        info!(
            vendor_id = %format!("{:04X}", info.vendor_id()),
            product_id = %format!("{:04X}", info.product_id()),
            "Device opened"
        );

        Ok(NusbDevice {
            device,
            pid: info.product_id(),
        })
    }
}

/// Open device handle.
pub struct NusbDevice {
    device: nusb::Device,
    pid: u16,
}

impl UsbDevice for NusbDevice {
    type Interface = NusbTransport;

    #[instrument(level = "info", skip(self))]
    fn claim_interface(&self, interface: u8) -> Result<NusbTransport, TransportError> {
        let claimed = self
            .device
            .detach_and_claim_interface(interface)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface,
                message: e.to_string(),
            })?;

        info!(interface, "Interface claimed");

        Ok(NusbTransport {
            interface: claimed,
            pid: self.pid,
        })
    }
}

impl Drop for NusbDevice {
    fn drop(&mut self) {
        debug!(product_id = %format!("{:04X}", self.pid), "Closing device");
    }
}

/// Claimed boot interface.
pub struct NusbTransport {
    interface: Interface,
    pid: u16,
}

impl UsbTransport for NusbTransport {
    #[instrument(skip(self, data), fields(index = %format!("0x{:03X}", request.index), len = data.len()))]
    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: request.request,
                    value: request.value,
                    index: request.index,
                    data,
                },
                timeout,
            )
            .wait()
            .map_err(|e| match e {
                TransferError::Disconnected => TransportError::Disconnected,
                TransferError::Cancelled => TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
                other => TransportError::TransferFailed(other.to_string()),
            })?;

        // nusb completes a control OUT in full or reports an error.
        debug!(bytes_written = data.len(), "Control transfer complete");
        Ok(data.len())
    }
}

impl Drop for NusbTransport {
    fn drop(&mut self) {
        debug!(
            product_id = %format!("{:04X}", self.pid),
            interface = self.interface.interface_number(),
            "Releasing interface"
        );
    }
}

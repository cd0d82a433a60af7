//! Mock USB bus for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{
    DeviceDescriptor, TransportError, UsbBackend, UsbDevice, UsbTransport, VendorRequest,
};

/// A simulated attached device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub address: u8,
}

impl MockDeviceInfo {
    /// A device sitting in the boot ROM (no manufacturer string).
    pub fn maskrom(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            manufacturer: None,
            address: 0,
        }
    }

    /// A device running an OS that names its manufacturer.
    pub fn running(vendor_id: u16, product_id: u16, manufacturer: &str) -> Self {
        Self {
            manufacturer: Some(manufacturer.to_string()),
            ..Self::maskrom(vendor_id, product_id)
        }
    }
}

impl DeviceDescriptor for MockDeviceInfo {
    fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.product_id
    }

    fn has_manufacturer_string(&self) -> bool {
        self.manufacturer.is_some()
    }

    fn location(&self) -> String {
        format!("mock:{:03}", self.address)
    }
}

/// Everything that happened on the mock bus, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Enumerated,
    Opened { pid: u16 },
    Claimed { pid: u16, interface: u8 },
    Transfer(MockTransfer),
    InterfaceReleased { pid: u16 },
    DeviceClosed { pid: u16 },
}

/// A captured control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTransfer {
    pub pid: u16,
    pub request: VendorRequest,
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// Failures to inject.
#[derive(Debug, Default, Clone)]
struct FailurePlan {
    enumerate: bool,
    open: bool,
    open_pids: Vec<u16>,
    claim: bool,
    claim_pids: Vec<u16>,
    /// Zero-based index of the transfer that fails.
    transfer_at: Option<usize>,
    /// Zero-based index of the transfer that only accepts half its data.
    short_write_at: Option<usize>,
}

#[derive(Debug, Default)]
struct BusState {
    events: Vec<MockEvent>,
    transfers: usize,
    failures: FailurePlan,
}

type SharedBus = Arc<Mutex<BusState>>;

/// Mock backend for unit testing selection and session logic.
#[derive(Debug, Default, Clone)]
pub struct MockBackend {
    devices: Vec<MockDeviceInfo>,
    bus: SharedBus,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device; devices enumerate in attach order.
    pub fn with_device(mut self, mut info: MockDeviceInfo) -> Self {
        info.address = u8::try_from(self.devices.len() + 1).unwrap_or(u8::MAX);
        self.devices.push(info);
        self
    }

    pub fn fail_enumerate(self) -> Self {
        self.bus.lock().unwrap().failures.enumerate = true;
        self
    }

    pub fn fail_open(self) -> Self {
        self.bus.lock().unwrap().failures.open = true;
        self
    }

    /// Fail opening devices with this product id only.
    pub fn fail_open_for(self, pid: u16) -> Self {
        self.bus.lock().unwrap().failures.open_pids.push(pid);
        self
    }

    pub fn fail_claim(self) -> Self {
        self.bus.lock().unwrap().failures.claim = true;
        self
    }

    /// Fail claiming the interface of devices with this product id only.
    pub fn fail_claim_for(self, pid: u16) -> Self {
        self.bus.lock().unwrap().failures.claim_pids.push(pid);
        self
    }

    pub fn fail_transfer_at(self, index: usize) -> Self {
        self.bus.lock().unwrap().failures.transfer_at = Some(index);
        self
    }

    pub fn short_write_at(self, index: usize) -> Self {
        self.bus.lock().unwrap().failures.short_write_at = Some(index);
        self
    }

    /// All captured events.
    pub fn events(&self) -> Vec<MockEvent> {
        self.bus.lock().unwrap().events.clone()
    }

    /// Captured control transfers only.
    pub fn transfers(&self) -> Vec<MockTransfer> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Transfer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Whether any device was opened.
    pub fn opened_any(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, MockEvent::Opened { .. }))
    }

    fn record(&self, event: MockEvent) {
        self.bus.lock().unwrap().events.push(event);
    }
}

impl UsbBackend for MockBackend {
    type Info = MockDeviceInfo;
    type Device = MockDevice;

    fn enumerate(&self) -> Result<Vec<MockDeviceInfo>, TransportError> {
        if self.bus.lock().unwrap().failures.enumerate {
            return Err(TransportError::EnumerationFailed("mock bus unavailable".into()));
        }
        self.record(MockEvent::Enumerated);
        Ok(self.devices.clone())
    }

    fn open(&self, info: &MockDeviceInfo) -> Result<MockDevice, TransportError> {
        {
            let bus = self.bus.lock().unwrap();
            if bus.failures.open || bus.failures.open_pids.contains(&info.product_id) {
                return Err(TransportError::OpenFailed("access denied".into()));
            }
        }
        self.record(MockEvent::Opened {
            pid: info.product_id,
        });
        Ok(MockDevice {
            pid: info.product_id,
            bus: self.bus.clone(),
        })
    }
}

/// Open mock device; records its close on drop.
#[derive(Debug)]
pub struct MockDevice {
    pid: u16,
    bus: SharedBus,
}

impl UsbDevice for MockDevice {
    type Interface = MockTransport;

    fn claim_interface(&self, interface: u8) -> Result<MockTransport, TransportError> {
        let mut bus = self.bus.lock().unwrap();
        if bus.failures.claim || bus.failures.claim_pids.contains(&self.pid) {
            return Err(TransportError::ClaimInterfaceFailed {
                interface,
                message: "busy".into(),
            });
        }
        bus.events.push(MockEvent::Claimed {
            pid: self.pid,
            interface,
        });
        Ok(MockTransport {
            pid: self.pid,
            bus: self.bus.clone(),
        })
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.events.push(MockEvent::DeviceClosed { pid: self.pid });
        }
    }
}

/// Claimed mock interface; records its release on drop.
#[derive(Debug)]
pub struct MockTransport {
    pid: u16,
    bus: SharedBus,
}

impl UsbTransport for MockTransport {
    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut bus = self.bus.lock().unwrap();
        let index = bus.transfers;
        bus.transfers += 1;

        if bus.failures.transfer_at == Some(index) {
            return Err(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        let accepted = if bus.failures.short_write_at == Some(index) {
            data.len() / 2
        } else {
            data.len()
        };

        bus.events.push(MockEvent::Transfer(MockTransfer {
            pid: self.pid,
            request,
            data: data[..accepted].to_vec(),
            timeout,
        }));
        Ok(accepted)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.events.push(MockEvent::InterfaceReleased { pid: self.pid });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQ: VendorRequest = VendorRequest {
        request: 12,
        value: 0,
        index: 0x471,
    };

    #[test]
    fn test_mock_write_capture() {
        let backend = MockBackend::new().with_device(MockDeviceInfo::maskrom(0x2207, 0x350A));
        let info = backend.enumerate().unwrap().remove(0);
        let device = backend.open(&info).unwrap();
        let iface = device.claim_interface(0).unwrap();

        iface.control_out(REQ, b"Hello", Duration::from_secs(1)).unwrap();
        iface.control_out(REQ, b"World", Duration::from_secs(1)).unwrap();

        let transfers = backend.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].data, b"Hello");
        assert_eq!(transfers[1].data, b"World");
        assert_eq!(transfers[1].pid, 0x350A);
    }

    #[test]
    fn test_mock_release_order() {
        let backend = MockBackend::new().with_device(MockDeviceInfo::maskrom(0x2207, 0x350A));
        let info = backend.enumerate().unwrap().remove(0);
        {
            let device = backend.open(&info).unwrap();
            let _iface = device.claim_interface(0).unwrap();
        }

        assert_eq!(
            backend.events(),
            vec![
                MockEvent::Enumerated,
                MockEvent::Opened { pid: 0x350A },
                MockEvent::Claimed {
                    pid: 0x350A,
                    interface: 0
                },
                MockEvent::InterfaceReleased { pid: 0x350A },
                MockEvent::DeviceClosed { pid: 0x350A },
            ]
        );
    }

    #[test]
    fn test_mock_injected_failures() {
        let backend = MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x110A))
            .fail_transfer_at(1)
            .short_write_at(2);
        let info = backend.enumerate().unwrap().remove(0);
        let device = backend.open(&info).unwrap();
        let iface = device.claim_interface(0).unwrap();

        assert_eq!(iface.control_out(REQ, b"abcd", Duration::ZERO).unwrap(), 4);
        assert!(matches!(
            iface.control_out(REQ, b"abcd", Duration::ZERO),
            Err(TransportError::Timeout { .. })
        ));
        assert_eq!(iface.control_out(REQ, b"abcd", Duration::ZERO).unwrap(), 2);
    }

    #[test]
    fn test_mock_addresses_saturate() {
        let mut backend = MockBackend::new();
        for _ in 0..300 {
            backend = backend.with_device(MockDeviceInfo::maskrom(0x2207, 0x350A));
        }
        let devices = backend.enumerate().unwrap();
        assert_eq!(devices[0].address, 1);
        assert_eq!(devices[254].address, 255);
        assert_eq!(devices[299].address, u8::MAX);
    }

    #[test]
    fn test_mock_claim_failure_per_pid() {
        let backend = MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x350A))
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x110A))
            .fail_claim_for(0x350A);
        let devices = backend.enumerate().unwrap();

        let first = backend.open(&devices[0]).unwrap();
        assert!(matches!(
            first.claim_interface(0),
            Err(TransportError::ClaimInterfaceFailed { interface: 0, .. })
        ));
        let second = backend.open(&devices[1]).unwrap();
        assert!(second.claim_interface(0).is_ok());
    }
}

//! Maskrom device discovery and selection.
//!
//! A device is a boot candidate when it carries the Rockchip vendor id and
//! has no manufacturer string. The boot ROM leaves `iManufacturer` empty,
//! while loaders and running systems fill it in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::BootError;
use crate::protocol::constants::ROCKCHIP_VENDOR_ID;
use crate::transport::{DeviceDescriptor, UsbBackend};

/// Which maskrom device to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// First matching device on the bus.
    First,
    /// N-th matching device, counting from zero.
    Index(usize),
    /// First matching device with this product id.
    ProductId(u16),
}

impl Selection {
    /// Whether the user named a specific device.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Selection::First)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::First => write!(f, "first device"),
            Selection::Index(n) => write!(f, "device #{}", n),
            Selection::ProductId(pid) => write!(f, "PID 0x{:04x}", pid),
        }
    }
}

/// What one invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    List,
    Boot(Selection),
}

impl Mode {
    /// Combine the selection options; at most one may be given.
    pub fn resolve(
        list: bool,
        index: Option<usize>,
        product_id: Option<u16>,
    ) -> Result<Self, BootError> {
        let mut given = Vec::new();
        if list {
            given.push("list");
        }
        if index.is_some() {
            given.push("index");
        }
        if product_id.is_some() {
            given.push("product id");
        }
        if given.len() > 1 {
            return Err(BootError::SelectionConflict(given.join(" and ")));
        }

        Ok(match (list, index, product_id) {
            (true, _, _) => Mode::List,
            (_, Some(n), _) => Mode::Boot(Selection::Index(n)),
            (_, _, Some(pid)) => Mode::Boot(Selection::ProductId(pid)),
            _ => Mode::Boot(Selection::First),
        })
    }
}

/// A boot candidate and its position among all candidates.
#[derive(Debug, Clone)]
pub struct MaskromDevice<I> {
    pub index: usize,
    pub info: I,
}

impl<I: DeviceDescriptor> MaskromDevice<I> {
    pub fn product_id(&self) -> u16 {
        self.info.product_id()
    }
}

/// One line of the device listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListedDevice {
    pub index: usize,
    pub product_id: u16,
}

impl fmt::Display for ListedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device #{}: PID 0x{:04x}", self.index, self.product_id)
    }
}

/// Whether `info` looks like a device waiting in the boot ROM.
pub fn is_maskrom<I: DeviceDescriptor>(info: &I) -> bool {
    info.vendor_id() == ROCKCHIP_VENDOR_ID && !info.has_manufacturer_string()
}

/// Boot candidates from a single bus snapshot.
#[derive(Debug, Clone)]
pub struct DeviceSelector<I> {
    candidates: Vec<MaskromDevice<I>>,
}

impl<I: DeviceDescriptor> DeviceSelector<I> {
    /// Enumerate the bus once and keep the matching devices.
    #[instrument(level = "debug", skip(backend))]
    pub fn scan<B: UsbBackend<Info = I>>(backend: &B) -> Result<Self, BootError> {
        let devices = backend.enumerate().map_err(BootError::Enumeration)?;
        Ok(Self::from_snapshot(devices))
    }

    pub fn from_snapshot(devices: Vec<I>) -> Self {
        let candidates: Vec<_> = devices
            .into_iter()
            .filter(|d| {
                let keep = is_maskrom(d);
                if !keep && d.vendor_id() == ROCKCHIP_VENDOR_ID {
                    debug!(
                        location = %d.location(),
                        product_id = %format!("{:04X}", d.product_id()),
                        "Skipping device with manufacturer string"
                    );
                }
                keep
            })
            .enumerate()
            .map(|(index, info)| MaskromDevice { index, info })
            .collect();

        info!(count = candidates.len(), "Maskrom devices found");
        Self { candidates }
    }

    pub fn candidates(&self) -> &[MaskromDevice<I>] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// (index, product id) of every candidate, in enumeration order.
    pub fn list(&self) -> Vec<ListedDevice> {
        self.candidates
            .iter()
            .map(|c| ListedDevice {
                index: c.index,
                product_id: c.product_id(),
            })
            .collect()
    }

    pub fn select_first(&self) -> Result<&MaskromDevice<I>, BootError> {
        self.candidates
            .first()
            .ok_or(BootError::NotFound(Selection::First))
    }

    pub fn select_by_index(&self, index: usize) -> Result<&MaskromDevice<I>, BootError> {
        self.candidates
            .get(index)
            .ok_or(BootError::NotFound(Selection::Index(index)))
    }

    pub fn select_by_product_id(&self, pid: u16) -> Result<&MaskromDevice<I>, BootError> {
        self.candidates
            .iter()
            .find(|c| c.product_id() == pid)
            .ok_or(BootError::NotFound(Selection::ProductId(pid)))
    }

    pub fn select(&self, selection: Selection) -> Result<&MaskromDevice<I>, BootError> {
        match selection {
            Selection::First => self.select_first(),
            Selection::Index(n) => self.select_by_index(n),
            Selection::ProductId(pid) => self.select_by_product_id(pid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockBackend, MockDeviceInfo};

    fn bus() -> MockBackend {
        MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x1d6b, 0x350A))
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x350A))
            .with_device(MockDeviceInfo::running(0x2207, 0x0006, "rockchip"))
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x110A))
    }

    #[test]
    fn test_filter_vendor_and_manufacturer() {
        let selector = DeviceSelector::scan(&bus()).unwrap();
        assert_eq!(
            selector.list(),
            vec![
                ListedDevice {
                    index: 0,
                    product_id: 0x350A
                },
                ListedDevice {
                    index: 1,
                    product_id: 0x110A
                },
            ]
        );
    }

    #[test]
    fn test_listing_format() {
        let backend = MockBackend::new()
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x350A))
            .with_device(MockDeviceInfo::maskrom(0x2207, 0x110A));
        let lines: Vec<String> = DeviceSelector::scan(&backend)
            .unwrap()
            .list()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(lines, vec!["Device #0: PID 0x350a", "Device #1: PID 0x110a"]);
    }

    #[test]
    fn test_foreign_vendor_never_selected() {
        let backend = MockBackend::new().with_device(MockDeviceInfo::maskrom(0x1d6b, 0x350A));
        let selector = DeviceSelector::scan(&backend).unwrap();
        assert!(selector.is_empty());
        assert!(matches!(
            selector.select_first(),
            Err(BootError::NotFound(Selection::First))
        ));
        assert!(selector.select_by_index(0).is_err());
        assert!(selector.select_by_product_id(0x350A).is_err());
    }

    #[test]
    fn test_select_modes() {
        let selector = DeviceSelector::scan(&bus()).unwrap();
        assert_eq!(selector.select_first().unwrap().product_id(), 0x350A);
        assert_eq!(selector.select_by_index(1).unwrap().product_id(), 0x110A);
        assert_eq!(selector.select_by_product_id(0x110A).unwrap().index, 1);
        assert!(matches!(
            selector.select(Selection::Index(2)),
            Err(BootError::NotFound(Selection::Index(2)))
        ));
        assert!(matches!(
            selector.select(Selection::ProductId(0x0006)),
            Err(BootError::NotFound(Selection::ProductId(0x0006)))
        ));
    }

    #[test]
    fn test_mode_resolution() {
        assert_eq!(Mode::resolve(false, None, None).unwrap(), Mode::Boot(Selection::First));
        assert_eq!(Mode::resolve(true, None, None).unwrap(), Mode::List);
        assert_eq!(
            Mode::resolve(false, Some(2), None).unwrap(),
            Mode::Boot(Selection::Index(2))
        );
        assert_eq!(
            Mode::resolve(false, None, Some(0x350A)).unwrap(),
            Mode::Boot(Selection::ProductId(0x350A))
        );
    }

    #[test]
    fn test_mode_conflicts() {
        for (list, index, pid) in [
            (true, Some(0), None),
            (true, None, Some(0x350A)),
            (false, Some(1), Some(0x350A)),
        ] {
            assert!(matches!(
                Mode::resolve(list, index, pid),
                Err(BootError::SelectionConflict(_))
            ));
        }
    }
}

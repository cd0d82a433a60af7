//! Protocol constants for the Rockchip maskrom USB boot protocol.

use std::time::Duration;

// ============================================================================
// Device Identification
// ============================================================================

/// Fuzhou Rockchip Electronics Vendor ID
pub const ROCKCHIP_VENDOR_ID: u16 = 0x2207;

/// Product id family (high byte) that boots from plaintext images.
pub const PLAINTEXT_PID_FAMILY: u16 = 0x3500;

/// Mask selecting the family byte of a product id.
pub const PID_FAMILY_MASK: u16 = 0xFF00;

/// The boot ROM exposes a single interface.
pub const BOOT_INTERFACE: u8 = 0;

// ============================================================================
// Framing
// ============================================================================

/// Maximum payload carried by one control transfer.
pub const BLOCK_SIZE: usize = 4096;

/// Length of the big-endian CRC16 trailer on the terminal frame.
pub const TRAILER_LEN: usize = 2;

/// Seed of the running CRC16 accumulator.
pub const CRC16_SEED: u16 = 0xFFFF;

/// RC4 key burnt into the boot ROM.
pub const RC4_KEY: [u8; 16] = [
    0x7c, 0x4e, 0x03, 0x04, 0x55, 0x05, 0x09, 0x07, //
    0x2d, 0x2c, 0x7b, 0x38, 0x17, 0x0d, 0x17, 0x11,
];

// ============================================================================
// Control Transfers
// ============================================================================

/// bRequest used for every image download transfer.
pub const BOOT_REQUEST: u8 = 12;

/// wValue used for every image download transfer.
pub const BOOT_VALUE: u16 = 0;

/// wIndex selecting the stage-1 (TPL / DDR init) image.
pub const FUNCTION_STAGE1: u16 = 0x471;

/// wIndex selecting the stage-2 (SPL / loader) image.
pub const FUNCTION_STAGE2: u16 = 0x472;

/// Timeout for interior frames.
pub const INTERIOR_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timeout for the terminal frame; the ROM validates and jumps before acking.
pub const TERMINAL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default pause after each interior frame.
pub const DEFAULT_PACING: Duration = Duration::from_millis(1);

/// Whether images for this product id are RC4 encrypted on the wire.
#[inline]
pub const fn requires_encryption(pid: u16) -> bool {
    (pid & PID_FAMILY_MASK) != PLAINTEXT_PID_FAMILY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_follows_pid_family() {
        assert!(!requires_encryption(0x350A));
        assert!(!requires_encryption(0x350B));
        assert!(requires_encryption(0x330C));
        assert!(requires_encryption(0x110A));
        assert!(requires_encryption(0x0035));
    }
}

//! Running CRC16 used by the boot ROM to verify a downloaded image.
//!
//! CCITT polynomial 0x1021, MSB first, no reflection and no final XOR.
//! The accumulator starts at [`CRC16_SEED`] and is folded over every byte
//! that goes on the wire.

use super::constants::CRC16_SEED;

const POLY: u16 = 0x1021;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Fold `data` into `crc` and return the new accumulator.
pub fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &b| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ b)]
    })
}

/// Running checksum over one image transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    value: u16,
}

impl Checksum {
    pub fn new() -> Self {
        Self { value: CRC16_SEED }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.value = crc16_update(self.value, data);
    }

    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_keeps_seed() {
        assert_eq!(crc16_update(0xFFFF, &[]), 0xFFFF);
        assert_eq!(Checksum::new().value(), 0xFFFF);
    }

    #[test]
    fn test_check_value() {
        // CRC-16/IBM-3740 (a.k.a. CCITT-FALSE) check value.
        assert_eq!(crc16_update(0xFFFF, b"123456789"), 0x29B1);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 + 3) as u8).collect();
        let mut sum = Checksum::new();
        for chunk in data.chunks(4096) {
            sum.update(chunk);
        }
        assert_eq!(sum.value(), crc16_update(0xFFFF, &data));
        assert_eq!(sum.value(), crc16_update(0xFFFF, &data));
    }
}

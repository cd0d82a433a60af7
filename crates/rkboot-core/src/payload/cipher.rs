//! Conditional RC4 encryption of frame payloads.
//!
//! Every product family except 0x35xx expects the image RC4 encrypted with
//! a fixed key. The keystream runs continuously across all frames of one
//! image and restarts for the next image.

use std::fmt;

use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};

use crate::protocol::constants::{RC4_KEY, requires_encryption};

/// Whether frames go on the wire encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Plaintext,
    Rc4,
}

impl CipherMode {
    /// Mode used by a device with the given product id.
    pub fn for_product(pid: u16) -> Self {
        if requires_encryption(pid) {
            CipherMode::Rc4
        } else {
            CipherMode::Plaintext
        }
    }

    pub fn is_encrypted(self) -> bool {
        self == CipherMode::Rc4
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherMode::Plaintext => write!(f, "plaintext"),
            CipherMode::Rc4 => write!(f, "rc4"),
        }
    }
}

/// Keystream state for one image.
pub struct CipherGate {
    keystream: Option<Rc4<U16>>,
}

impl CipherGate {
    /// Fresh gate; an RC4 gate starts at keystream position zero.
    pub fn new(mode: CipherMode) -> Self {
        let keystream = match mode {
            CipherMode::Plaintext => None,
            CipherMode::Rc4 => Some(Rc4::new(&RC4_KEY.into())),
        };
        Self { keystream }
    }

    pub fn mode(&self) -> CipherMode {
        if self.keystream.is_some() {
            CipherMode::Rc4
        } else {
            CipherMode::Plaintext
        }
    }

    /// Write the wire form of `input` into `output`.
    ///
    /// `output` must be exactly as long as `input`.
    pub fn apply(&mut self, input: &[u8], output: &mut [u8]) {
        output.copy_from_slice(input);
        if let Some(keystream) = self.keystream.as_mut() {
            keystream.apply_keystream(output);
        }
    }
}

impl fmt::Debug for CipherGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherGate")
            .field("mode", &self.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt(data: &[u8]) -> Vec<u8> {
        let mut gate = CipherGate::new(CipherMode::Rc4);
        let mut out = vec![0u8; data.len()];
        gate.apply(data, &mut out);
        out
    }

    #[test]
    fn test_mode_for_product() {
        assert_eq!(CipherMode::for_product(0x350A), CipherMode::Plaintext);
        assert_eq!(CipherMode::for_product(0x110A), CipherMode::Rc4);
        assert_eq!(CipherMode::for_product(0x320A), CipherMode::Rc4);
    }

    #[test]
    fn test_plaintext_gate_copies() {
        let mut gate = CipherGate::new(CipherMode::Plaintext);
        let mut out = [0u8; 4];
        gate.apply(b"abcd", &mut out);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn test_encryption_is_deterministic() {
        let plain: Vec<u8> = (0..=255u8).collect();
        let a = encrypt(&plain);
        let b = encrypt(&plain);
        assert_eq!(a, b);
        assert_ne!(a, plain);
    }

    #[test]
    fn test_decrypt_recovers_plaintext() {
        let plain = b"maskrom stage one image".to_vec();
        let cipher = encrypt(&plain);
        assert_eq!(encrypt(&cipher), plain);
    }

    #[test]
    fn test_keystream_continues_across_calls() {
        let plain = vec![0x5Au8; 100];
        let whole = encrypt(&plain);

        let mut gate = CipherGate::new(CipherMode::Rc4);
        let mut first = vec![0u8; 40];
        let mut second = vec![0u8; 60];
        gate.apply(&plain[..40], &mut first);
        gate.apply(&plain[40..], &mut second);
        first.extend_from_slice(&second);
        assert_eq!(first, whole);
    }
}

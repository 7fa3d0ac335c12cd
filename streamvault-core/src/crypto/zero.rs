//! Zeroization utilities for transient secrets.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A byte buffer that zeroizes its contents on drop.
///
/// Used for transient secrets (PIN bytes, intermediate key copies) that
/// outlive a single expression.
#[derive(ZeroizeOnDrop)]
pub struct SecureBuffer {
    data: Vec<u8>,
}

impl SecureBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for SecureBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for SecureBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Overwrite a byte slice with zeros.
pub fn zeroize_bytes(data: &mut [u8]) {
    data.zeroize();
}

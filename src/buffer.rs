//! Byte buffer used for records, handshake messages and key material.
//!
//! [`Buf`] wraps `Vec<u8>` and is the in/out type for every crypto provider
//! operation, so AEAD implementations can seal and open in place.

use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Growable byte buffer.
///
/// The `Debug` output only shows the length, so buffers holding secrets can be
/// logged safely.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Buf(Vec::with_capacity(capacity))
    }

    /// Create a new buffer from a slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    /// Clear the buffer, removing all data.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Extend the buffer with a slice of bytes.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Push a single byte onto the buffer.
    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Resize the buffer to the specified length, filling with the given value.
    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    /// Truncate the buffer to the specified length.
    /// If `len` is greater than the buffer's current length, this has no effect.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Remove `n` bytes from the front of the buffer.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.0.len());
        self.0.drain(..n);
    }

    /// Insert bytes at the front of the buffer.
    pub fn prepend(&mut self, data: &[u8]) {
        self.0.splice(0..0, data.iter().copied());
    }

    /// Overwrite the contents with zeros and clear.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }

    /// Convert the buffer into the underlying `Vec<u8>`.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl<'a> Extend<&'a u8> for Buf {
    fn extend<T: IntoIterator<Item = &'a u8>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().copied());
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

impl Zeroize for Buf {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Trait for types that can be converted into a `Buf`.
pub trait ToBuf {
    /// Convert this value into a `Buf`.
    fn to_buf(self) -> Buf;
}

impl ToBuf for Vec<u8> {
    fn to_buf(self) -> Buf {
        Buf(self)
    }
}

impl ToBuf for &[u8] {
    fn to_buf(self) -> Buf {
        self.to_vec().to_buf()
    }
}

/// Implement the `aead::Buffer` trait for `Buf` to support in-place AEAD operations.
#[cfg(feature = "rust-crypto")]
impl aes_gcm::aead::Buffer for Buf {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        self.0.extend_from_slice(other);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_and_prepend() {
        let mut b = Buf::from_slice(&[1, 2, 3, 4]);
        b.drain_front(2);
        assert_eq!(&*b, &[3, 4]);
        b.prepend(&[9, 8]);
        assert_eq!(&*b, &[9, 8, 3, 4]);
        b.drain_front(10);
        assert!(b.is_empty());
    }

    #[test]
    fn debug_hides_content() {
        let b = Buf::from_slice(b"secret");
        assert_eq!(format!("{:?}", b), "Buf { len: 6 }");
    }
}

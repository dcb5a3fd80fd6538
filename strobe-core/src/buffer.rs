//! Fixed-capacity byte buffers.
//!
//! Allocated once at startup and never resized. Writes that would cross
//! the capacity are refused rather than grown.

use crate::error::CoreError;

/// A zero-initialised byte arena with a fixed capacity.
#[derive(Debug)]
pub struct FixedBuffer {
    bytes: Vec<u8>,
}

impl FixedBuffer {
    /// Reserve exactly `capacity` bytes, failing instead of aborting
    /// when the allocator cannot satisfy the request.
    pub fn allocate(what: &'static str, capacity: usize) -> Result<Self, CoreError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| CoreError::Allocation {
                what,
                bytes: capacity,
            })?;
        bytes.resize(capacity, 0);
        Ok(Self { bytes })
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Copy `data` to `offset`. Returns `false` (and writes nothing) when
    /// the write would not fit.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> bool {
        match offset.checked_add(data.len()) {
            Some(end) if end <= self.bytes.len() => {
                self.bytes[offset..end].copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    /// The first `len` bytes (clamped to the capacity).
    pub fn head(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(self.bytes.len())]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_within_capacity() {
        let mut buf = FixedBuffer::allocate("test", 8).unwrap();
        assert!(buf.write_at(2, &[1, 2, 3]));
        assert_eq!(buf.head(5), &[0, 0, 1, 2, 3]);
    }

    #[test]
    fn refuses_overflowing_write() {
        let mut buf = FixedBuffer::allocate("test", 4).unwrap();
        assert!(!buf.write_at(2, &[1, 2, 3]));
        assert_eq!(buf.head(4), &[0, 0, 0, 0]);
        assert!(!buf.write_at(usize::MAX, &[1]));
    }

    #[test]
    fn head_is_clamped() {
        let buf = FixedBuffer::allocate("test", 3).unwrap();
        assert_eq!(buf.head(100).len(), 3);
    }
}

//! Reusable copy buffer

use packetcopy_types::BufferSize;

/// Fixed-capacity buffer reused for every sub-chunk of every packet.
///
/// Allocated once per copier; a sub-chunk never exceeds its capacity.
#[derive(Debug)]
pub struct CopyBuffer {
    data: Vec<u8>,
}

impl CopyBuffer {
    /// Allocate a zeroed buffer of `size` bytes
    pub fn new(size: BufferSize) -> Self {
        Self {
            data: vec![0; size.get()],
        }
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Size of the next sub-chunk when `remaining` bytes are still to be copied
    pub fn chunk_len(&self, remaining: u64) -> usize {
        remaining.min(self.data.len() as u64) as usize
    }

    /// Mutable view of the first `len` bytes, clamped to the capacity
    pub fn slice_mut(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.data.len());
        &mut self.data[..len]
    }

    /// Read-only view of the first `len` bytes, clamped to the capacity
    pub fn slice(&self, len: usize) -> &[u8] {
        let len = len.min(self.data.len());
        &self.data[..len]
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new(BufferSize::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_len_is_bounded_by_capacity() {
        let buffer = CopyBuffer::new(BufferSize::new(4096).unwrap());
        assert_eq!(buffer.capacity(), 4096);
        assert_eq!(buffer.chunk_len(100), 100);
        assert_eq!(buffer.chunk_len(4096), 4096);
        assert_eq!(buffer.chunk_len(1 << 40), 4096);
        assert_eq!(buffer.chunk_len(0), 0);
    }

    #[test]
    fn test_slices_clamp() {
        let mut buffer = CopyBuffer::new(BufferSize::new(4096).unwrap());
        buffer.slice_mut(3).copy_from_slice(b"abc");
        assert_eq!(buffer.slice(3), b"abc");
        assert_eq!(buffer.slice_mut(10_000).len(), 4096);
    }

    #[test]
    fn test_default_is_one_mebibyte() {
        assert_eq!(CopyBuffer::default().capacity(), 1024 * 1024);
    }
}

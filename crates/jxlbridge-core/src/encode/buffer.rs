//! Growable output buffer for compressed data.

use log::trace;

use crate::error::Error;

/// Capacity a fresh [`OutputBuffer`] starts with.
pub const INITIAL_CAPACITY: usize = 4096;

/// Byte buffer the encoder drains into.
///
/// Bytes before [`len`](Self::len) are written output. Everything after is
/// spare room handed to the engine. Growing doubles the capacity and never
/// disturbs the written prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    data: Vec<u8>,
    len: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// A capacity of zero is bumped to one so doubling makes progress.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unwritten tail of the buffer.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Mark `n` more bytes of the spare tail as written.
    ///
    /// # Errors
    ///
    /// [`Error::OutputOverrun`] if `n` exceeds the spare tail. The buffer is
    /// left unchanged.
    pub fn advance(&mut self, n: usize) -> Result<(), Error> {
        let available = self.data.len() - self.len;
        if n > available {
            return Err(Error::OutputOverrun {
                written: n,
                available,
            });
        }
        self.len += n;
        Ok(())
    }

    /// Double the capacity.
    pub fn grow(&mut self) {
        let capacity = self.data.len().saturating_mul(2);
        trace!("growing output buffer {} -> {} bytes", self.data.len(), capacity);
        self.data.resize(capacity, 0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The written bytes, trimmed to their exact length.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.len);
        self.data.shrink_to_fit();
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let buffer = OutputBuffer::new();
        assert_eq!(buffer.capacity(), 4096);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut buffer = OutputBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.grow();
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn test_write_grow_trim() {
        let mut buffer = OutputBuffer::with_capacity(4);
        buffer.spare_mut()[..3].copy_from_slice(&[1, 2, 3]);
        buffer.advance(3).unwrap();
        assert_eq!(buffer.spare_mut().len(), 1);

        buffer.grow();
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);
        assert_eq!(buffer.spare_mut().len(), 5);

        buffer.spare_mut()[0] = 4;
        buffer.advance(1).unwrap();
        assert_eq!(buffer.into_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_advance_past_spare_is_rejected() {
        let mut buffer = OutputBuffer::with_capacity(4);
        buffer.advance(3).unwrap();

        let err = buffer.advance(2).unwrap_err();
        assert_eq!(
            err,
            Error::OutputOverrun {
                written: 2,
                available: 1
            }
        );
        assert_eq!(buffer.len(), 3);

        buffer.advance(1).unwrap();
        assert!(buffer.spare_mut().is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: writing in arbitrary chunks, growing whenever the spare
        /// room runs out, yields exactly the bytes written.
        #[test]
        fn prop_chunked_writes_survive_growth(
            initial in 1usize..=32,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..50), 0..20),
        ) {
            let mut buffer = OutputBuffer::with_capacity(initial);
            let mut expected = Vec::new();

            for chunk in &chunks {
                let mut rest = chunk.as_slice();
                while !rest.is_empty() {
                    let spare = buffer.spare_mut();
                    let n = spare.len().min(rest.len());
                    spare[..n].copy_from_slice(&rest[..n]);
                    buffer.advance(n).unwrap();
                    rest = &rest[n..];
                    if !rest.is_empty() {
                        buffer.grow();
                    }
                }
                expected.extend_from_slice(chunk);
            }

            prop_assert!(buffer.capacity() >= buffer.len());
            prop_assert_eq!(buffer.into_vec(), expected);
        }

        /// Property: grow doubles capacity and keeps the written prefix.
        #[test]
        fn prop_grow_doubles(initial in 1usize..=1024, written in 0usize..=1024) {
            let mut buffer = OutputBuffer::with_capacity(initial);
            let n = written.min(initial);
            for (i, b) in buffer.spare_mut()[..n].iter_mut().enumerate() {
                *b = i as u8;
            }
            buffer.advance(n).unwrap();
            let before = buffer.as_slice().to_vec();

            buffer.grow();
            prop_assert_eq!(buffer.capacity(), initial * 2);
            prop_assert_eq!(buffer.as_slice(), before.as_slice());
        }
    }
}

//! Frame placement inside a contiguous pixel buffer.
//!
//! Frames are stored back to back in display order, so frame `i` of a buffer
//! with `frame_size` bytes per frame lives at `i * frame_size`. These helpers
//! express that layout as indexed accessors instead of address arithmetic.

use std::ops::Range;

use crate::error::Error;

/// Byte range of frame `frame_index`, `None` on overflow.
pub fn frame_range(frame_index: u32, frame_size: usize) -> Option<Range<usize>> {
    let start = (frame_index as usize).checked_mul(frame_size)?;
    let end = start.checked_add(frame_size)?;
    Some(start..end)
}

fn checked_range(
    available: usize,
    frame_index: u32,
    frame_size: usize,
) -> Result<Range<usize>, Error> {
    match frame_range(frame_index, frame_size) {
        Some(range) if range.end <= available => Ok(range),
        Some(range) => Err(Error::OutputTooSmall {
            frame: frame_index,
            start: range.start,
            end: range.end,
            available,
        }),
        None => Err(Error::OutputTooSmall {
            frame: frame_index,
            start: usize::MAX,
            end: usize::MAX,
            available,
        }),
    }
}

/// Mutable view of one frame inside `buffer`.
pub fn frame_slice(buffer: &mut [u8], frame_index: u32, frame_size: usize) -> Result<&mut [u8], Error> {
    let range = checked_range(buffer.len(), frame_index, frame_size)?;
    Ok(&mut buffer[range])
}

/// Read-only view of one frame inside `buffer`.
pub fn frame_ref(buffer: &[u8], frame_index: u32, frame_size: usize) -> Result<&[u8], Error> {
    let range = checked_range(buffer.len(), frame_index, frame_size)?;
    Ok(&buffer[range])
}

/// Destination for decoded frames.
///
/// The decode driver asks for one region per frame, in increasing frame
/// order, and hands it to the engine for the rest of the call.
pub trait FrameSink<'buf> {
    fn frame_region(&mut self, frame_index: u32, frame_size: usize) -> Result<&'buf mut [u8], Error>;
}

/// Safe [`FrameSink`] over a caller-provided slice.
///
/// Requests that do not fit fail with [`Error::OutputTooSmall`] rather than
/// writing past the region.
#[derive(Debug)]
pub struct FrameBuffer<'buf> {
    rest: &'buf mut [u8],
    /// Offset of `rest` within the original slice.
    consumed: usize,
    total: usize,
    next_frame: u32,
}

impl<'buf> FrameBuffer<'buf> {
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        let total = buffer.len();
        Self {
            rest: buffer,
            consumed: 0,
            total,
            next_frame: 0,
        }
    }
}

impl<'buf> FrameSink<'buf> for FrameBuffer<'buf> {
    fn frame_region(&mut self, frame_index: u32, frame_size: usize) -> Result<&'buf mut [u8], Error> {
        if frame_index < self.next_frame {
            return Err(Error::FrameOutOfOrder {
                frame: frame_index,
                next: self.next_frame,
            });
        }
        let range = checked_range(self.total, frame_index, frame_size)?;
        if range.start < self.consumed {
            return Err(Error::FrameOutOfOrder {
                frame: frame_index,
                next: self.next_frame,
            });
        }

        let rest = std::mem::take(&mut self.rest);
        let (_, rest) = rest.split_at_mut(range.start - self.consumed);
        let (region, rest) = rest.split_at_mut(frame_size);

        self.rest = rest;
        self.consumed = range.end;
        self.next_frame = frame_index + 1;
        Ok(region)
    }
}

/// Sink for probes: any request for pixel space is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrames;

impl<'buf> FrameSink<'buf> for NoFrames {
    fn frame_region(&mut self, frame_index: u32, frame_size: usize) -> Result<&'buf mut [u8], Error> {
        Err(Error::OutputTooSmall {
            frame: frame_index,
            start: 0,
            end: frame_size,
            available: 0,
        })
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
        /// Property: every frame handed out by FrameBuffer is exactly the
        /// slice frame_slice would return for the same index.
        #[test]
        fn prop_frame_buffer_matches_frame_slice(
            frame_size in 1usize..=64,
            frames in 1u32..=8,
        ) {
            let total = frame_size * frames as usize;
            let mut pixels = vec![0u8; total];
            {
                let mut sink = FrameBuffer::new(&mut pixels);
                for i in 0..frames {
                    let region = sink.frame_region(i, frame_size).unwrap();
                    region.fill(i as u8 + 1);
                }
            }
            for i in 0..frames {
                let frame = frame_ref(&pixels, i, frame_size).unwrap();
                prop_assert!(frame.iter().all(|&b| b == i as u8 + 1));
            }
        }

        /// Property: frame_slice never returns a view past the buffer end.
        #[test]
        fn prop_frame_slice_in_bounds(
            len in 0usize..=256,
            frame_size in 0usize..=64,
            index in 0u32..=16,
        ) {
            let mut buffer = vec![0u8; len];
            match frame_slice(&mut buffer, index, frame_size) {
                Ok(view) => {
                    prop_assert_eq!(view.len(), frame_size);
                    prop_assert!((index as usize + 1) * frame_size <= len);
                }
                Err(_) => prop_assert!((index as usize + 1) * frame_size > len),
            }
        }
    }
}

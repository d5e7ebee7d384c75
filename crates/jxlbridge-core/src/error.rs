//! Error taxonomy shared by the decode and encode drivers.

use thiserror::Error;

/// A codec engine rejected an operation.
///
/// Engines only report *that* something failed, never why, so this carries
/// the name of the rejected operation for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("codec engine rejected {operation}")]
pub struct EngineError {
    /// Name of the engine operation that failed (e.g. "set_basic_info").
    pub operation: &'static str,
}

impl EngineError {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

/// Errors produced while driving a codec engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The engine could not be created or rejected a configuration step.
    #[error("engine initialization failed: {0}")]
    EngineInit(&'static str),

    /// The engine reported an unrecoverable parse error.
    #[error("compressed stream is corrupt")]
    StreamCorrupt,

    /// The engine asked for more input than was supplied.
    #[error("compressed stream is truncated")]
    TruncatedInput,

    /// The engine failed while producing compressed output.
    #[error("engine failed while producing output")]
    Encode,

    /// The engine reported writing more bytes than the region it was given.
    #[error("engine reported {written} bytes written into a {available} byte region")]
    OutputOverrun { written: usize, available: usize },

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel data length doesn't match the dimensions.
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Quality outside 0..=100.
    #[error("Invalid quality {0}: must be within 0..=100")]
    InvalidQuality(i64),

    /// Effort outside 1..=10.
    #[error("Invalid effort {0}: must be within 1..=10")]
    InvalidEffort(i64),

    /// Frame or buffer size overflows `usize`.
    #[error("image too large: {width}x{height} does not fit in memory")]
    ImageTooLarge { width: u32, height: u32 },

    /// The caller's pixel region cannot hold the requested frame.
    #[error("output region too small: frame {frame} needs bytes {start}..{end}, region holds {available}")]
    OutputTooSmall {
        frame: u32,
        start: usize,
        end: usize,
        available: usize,
    },

    /// A frame region was requested behind one already handed out.
    #[error("frame {frame} requested after frame {next} was already bound")]
    FrameOutOfOrder { frame: u32, next: u32 },

    /// The engine's buffer size disagrees with width * height * 4 * sample width.
    #[error("engine wants {engine} bytes per frame, layout gives {expected}")]
    FrameSizeMismatch { expected: usize, engine: usize },

    /// An event arrived in a state that cannot accept it.
    #[error("unexpected {event} event while {state}")]
    UnexpectedEvent {
        state: &'static str,
        event: &'static str,
    },

    /// The stream ended before the header was seen.
    #[error("stream ended without basic image info")]
    MissingBasicInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::new("set_color_encoding");
        assert_eq!(err.to_string(), "codec engine rejected set_color_encoding");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDimensions {
            width: 0,
            height: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid dimensions: width (0) and height (10) must be non-zero"
        );

        let err = Error::UnexpectedEvent {
            state: "HeaderPending",
            event: "FullImage",
        };
        assert_eq!(err.to_string(), "unexpected FullImage event while HeaderPending");
    }
}

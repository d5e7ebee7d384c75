//! The incremental codec engine protocol.
//!
//! The drivers never compress or decompress anything themselves. They talk to
//! an engine through the traits in this module, whose methods mirror the
//! engine's push/pull status protocol one call at a time:
//!
//! - [`DecoderEngine`] is fed a complete compressed buffer and reports
//!   [`DecoderStatus`] events each time [`DecoderEngine::process_input`] runs.
//! - [`EncoderEngine`] is configured, handed one frame, and then drained with
//!   [`EncoderEngine::process_output`] until it reports success.
//! - [`Backend`] creates a fresh engine per call. Engines release their
//!   resources on drop, so returning early from a driver is enough to clean up.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Error};

/// Status reported by [`DecoderEngine::process_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStatus {
    /// The whole stream has been processed.
    Success,
    /// Unrecoverable parse error.
    Error,
    /// The engine ran out of input.
    NeedMoreInput,
    /// Basic image info is available via [`DecoderEngine::basic_info`].
    BasicInfo,
    /// A frame header is available via [`DecoderEngine::frame_header`].
    Frame,
    /// The engine needs an output region for the current frame.
    NeedImageOutBuffer,
    /// The current frame has been written to its output region.
    FullImage,
    /// Any other engine event, identified by its raw code.
    Other(u32),
}

impl DecoderStatus {
    /// Short event name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            DecoderStatus::Success => "Success",
            DecoderStatus::Error => "Error",
            DecoderStatus::NeedMoreInput => "NeedMoreInput",
            DecoderStatus::BasicInfo => "BasicInfo",
            DecoderStatus::Frame => "Frame",
            DecoderStatus::NeedImageOutBuffer => "NeedImageOutBuffer",
            DecoderStatus::FullImage => "FullImage",
            DecoderStatus::Other(_) => "Other",
        }
    }
}

bitflags! {
    /// Set of informational decoder events to subscribe to.
    ///
    /// Bit values match libjxl's `JxlDecoderStatus` codes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventMask: u32 {
        /// Image dimensions, bit depth and animation timing.
        const BASIC_INFO = 0x40;
        /// Per-frame header with the frame's duration.
        const FRAME      = 0x400;
        /// A frame has been fully written to its output region.
        const FULL_IMAGE = 0x1000;
    }
}

/// Status reported by [`EncoderEngine::process_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderStatus {
    /// All output has been written.
    Success,
    /// Unrecoverable error.
    Error,
    /// The output region filled up before the engine finished.
    NeedMoreOutput,
}

/// Result of one [`EncoderEngine::process_output`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputProgress {
    pub status: EncoderStatus,
    /// Bytes written at the start of the region handed to the engine.
    pub written: usize,
}

/// Sample type of an interleaved pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Uint8,
    Uint16,
}

impl DataType {
    /// Width of one sample in bytes.
    pub fn sample_width(self) -> usize {
        match self {
            DataType::Uint8 => 1,
            DataType::Uint16 => 2,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Native,
    Big,
}

/// Layout of the pixels exchanged with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormat {
    pub num_channels: u32,
    pub data_type: DataType,
    pub endianness: Endianness,
    /// Row alignment in bytes, 0 for tightly packed rows.
    pub align: usize,
}

impl PixelFormat {
    /// 8-bit RGBA in native byte order.
    pub const RGBA8: PixelFormat = PixelFormat {
        num_channels: 4,
        data_type: DataType::Uint8,
        endianness: Endianness::Native,
        align: 0,
    };

    /// 16-bit RGBA with big-endian samples.
    pub const RGBA16_BE: PixelFormat = PixelFormat {
        num_channels: 4,
        data_type: DataType::Uint16,
        endianness: Endianness::Big,
        align: 0,
    };

    /// Pixel format the decoder emits for a given bit depth.
    ///
    /// Only exactly 16 bits selects 16-bit samples; every other depth is
    /// delivered as 8-bit samples.
    pub fn for_bit_depth(bits_per_sample: u32) -> PixelFormat {
        if bits_per_sample == 16 {
            PixelFormat::RGBA16_BE
        } else {
            PixelFormat::RGBA8
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.num_channels as usize * self.data_type.sample_width()
    }

    /// Bytes needed for one tightly packed frame, `None` on overflow.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Animation timing from the image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnimationHeader {
    pub tps_numerator: u32,
    pub tps_denominator: u32,
    pub num_loops: u32,
}

/// Image-level metadata, read on decode and written on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicInfo {
    pub xsize: u32,
    pub ysize: u32,
    pub bits_per_sample: u32,
    pub alpha_bits: u32,
    pub num_extra_channels: u32,
    /// Encode with the original color profile instead of the engine's
    /// internal one, disabling implicit profile stripping.
    pub uses_original_profile: bool,
    pub have_animation: bool,
    pub animation: AnimationHeader,
}

/// Per-frame metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Display duration in animation ticks.
    pub duration: u32,
    pub is_last: bool,
}

/// sRGB color encoding handed to the encoder: sRGB primaries and white
/// point with the non-linear sRGB transfer curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorEncoding {
    pub is_gray: bool,
}

impl ColorEncoding {
    pub fn srgb() -> Self {
        Self { is_gray: false }
    }
}

/// Settings applied to the frame being encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub distance: f32,
    pub effort: u32,
    /// Bit-exact reconstruction, stronger than a zero distance.
    pub lossless: bool,
}

/// libjxl's quality to distance mapping.
///
/// Monotone decreasing: quality 100 maps to 0, quality 90 to 1.0, quality 0
/// to 25.
pub fn reference_distance(quality: f32) -> f32 {
    if quality >= 100.0 {
        0.0
    } else if quality >= 30.0 {
        0.1 + (100.0 - quality) * 0.09
    } else {
        53.0 / 3000.0 * quality * quality - 23.0 / 20.0 * quality + 25.0
    }
}

/// An incremental decoder.
///
/// `'buf` bounds both the compressed input and the output regions: the
/// engine may keep reading and writing them across `process_input` calls.
pub trait DecoderEngine<'buf> {
    fn subscribe_events(&mut self, events: EventMask) -> Result<(), EngineError>;

    fn set_input(&mut self, data: &'buf [u8]) -> Result<(), EngineError>;

    /// Declare that no further input will follow.
    fn close_input(&mut self);

    /// Run until the next subscribed event or terminal status.
    fn process_input(&mut self) -> DecoderStatus;

    /// Valid after [`DecoderStatus::BasicInfo`].
    fn basic_info(&self) -> Result<BasicInfo, EngineError>;

    /// Valid after [`DecoderStatus::Frame`].
    fn frame_header(&self) -> Result<FrameHeader, EngineError>;

    /// Bytes the engine needs to write the current frame in `format`.
    fn image_out_buffer_size(&self, format: &PixelFormat) -> Result<usize, EngineError>;

    /// Bind the region the current frame is written into.
    fn set_image_out_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: &'buf mut [u8],
    ) -> Result<(), EngineError>;

    /// Skip pixel production for the current frame.
    fn skip_current_frame(&mut self) -> Result<(), EngineError>;
}

/// An incremental encoder.
pub trait EncoderEngine {
    fn set_basic_info(&mut self, info: &BasicInfo) -> Result<(), EngineError>;

    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> Result<(), EngineError>;

    /// The engine's authoritative quality to distance mapping.
    fn distance_from_quality(&self, quality: f32) -> f32 {
        reference_distance(quality)
    }

    fn create_frame_settings(&mut self, settings: &FrameSettings) -> Result<(), EngineError>;

    /// Submit one frame. The engine copies the pixels before returning.
    fn add_image_frame(&mut self, format: &PixelFormat, pixels: &[u8]) -> Result<(), EngineError>;

    /// Declare that no further frames will follow.
    fn close_input(&mut self);

    /// Write as much compressed output as fits into `out`.
    fn process_output(&mut self, out: &mut [u8]) -> OutputProgress;
}

/// Factory for engine instances. Each driver call takes its own engine.
pub trait Backend {
    type Decoder<'buf>: DecoderEngine<'buf>;
    type Encoder: EncoderEngine;

    fn decoder<'buf>(&self) -> Result<Self::Decoder<'buf>, Error>;

    fn encoder(&self) -> Result<Self::Encoder, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_mask_bits() {
        let mask = EventMask::BASIC_INFO | EventMask::FRAME | EventMask::FULL_IMAGE;
        assert_eq!(mask.bits(), 0x1440);
        assert!(mask.contains(EventMask::FRAME));
        assert!(!EventMask::FRAME.contains(EventMask::FULL_IMAGE));
        assert_eq!(EventMask::BASIC_INFO.union(EventMask::FRAME).bits(), 0x440);
        assert!(EventMask::empty().is_empty());
    }

    #[test]
    fn test_pixel_format_for_bit_depth() {
        assert_eq!(PixelFormat::for_bit_depth(8), PixelFormat::RGBA8);
        assert_eq!(PixelFormat::for_bit_depth(16), PixelFormat::RGBA16_BE);
        // Other depths are converted to 8-bit by the engine
        assert_eq!(PixelFormat::for_bit_depth(10), PixelFormat::RGBA8);
        assert_eq!(PixelFormat::for_bit_depth(32), PixelFormat::RGBA8);
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(PixelFormat::RGBA8.frame_size(2, 2), Some(16));
        assert_eq!(PixelFormat::RGBA16_BE.frame_size(3, 5), Some(120));
        assert_eq!(PixelFormat::RGBA16_BE.frame_size(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn test_reference_distance() {
        assert_eq!(reference_distance(100.0), 0.0);
        assert!((reference_distance(90.0) - 1.0).abs() < 1e-5);
        assert!((reference_distance(0.0) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_reference_distance_monotone() {
        let mut previous = f32::INFINITY;
        for q in 0..=100 {
            let d = reference_distance(q as f32);
            assert!(d <= previous, "distance rose at quality {}", q);
            previous = d;
        }
    }
}

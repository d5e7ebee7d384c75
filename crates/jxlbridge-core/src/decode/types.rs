//! Core types for the decode driver.

use serde::{Deserialize, Serialize};

use crate::engine::{AnimationHeader, PixelFormat};

/// Options for a single decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Stop after header discovery. Animations are still walked to count
    /// their frames, but no pixels are produced.
    pub config_only: bool,
    /// Decode every frame of an animation instead of stopping after the first.
    pub decode_all: bool,
}

impl DecodeOptions {
    /// Metadata probe: dimensions, depth, frame count and durations.
    pub fn probe() -> Self {
        Self {
            config_only: true,
            decode_all: false,
        }
    }

    /// Decode only the first frame.
    pub fn first_frame() -> Self {
        Self::default()
    }

    /// Decode every frame.
    pub fn all_frames() -> Self {
        Self {
            config_only: false,
            decode_all: true,
        }
    }
}

/// Animation timing reported by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnimationInfo {
    /// Ticks per second numerator.
    pub tps_numerator: u32,
    /// Ticks per second denominator.
    pub tps_denominator: u32,
    /// Loop count, 0 for infinite.
    pub num_loops: u32,
}

impl AnimationInfo {
    /// Convert a frame duration in ticks to seconds.
    ///
    /// Returns 0.0 when the tick rate is undefined.
    pub fn ticks_to_seconds(&self, ticks: u32) -> f64 {
        if self.tps_numerator == 0 {
            return 0.0;
        }
        ticks as f64 * self.tps_denominator as f64 / self.tps_numerator as f64
    }
}

impl From<AnimationHeader> for AnimationInfo {
    fn from(header: AnimationHeader) -> Self {
        Self {
            tps_numerator: header.tps_numerator,
            tps_denominator: header.tps_denominator,
            num_loops: header.num_loops,
        }
    }
}

/// Image metadata gathered while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    /// Frames seen: decoded frames, or counted frames on a probe.
    pub frame_count: u32,
    /// Present only for animated images.
    pub animation: Option<AnimationInfo>,
}

impl ImageInfo {
    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    /// Pixel format frames are delivered in.
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::for_bit_depth(self.bit_depth)
    }

    /// Bytes in one decoded frame, `None` on overflow.
    pub fn frame_size(&self) -> Option<usize> {
        self.pixel_format().frame_size(self.width, self.height)
    }

    /// Bytes needed to hold `frames` decoded frames, `None` on overflow.
    pub fn buffer_size(&self, frames: u32) -> Option<usize> {
        self.frame_size()?.checked_mul(frames as usize)
    }
}

/// Outcome of a decode call. Pixels live in the caller's frame sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeReport {
    pub info: ImageInfo,
    /// Tick duration of each frame whose header was seen, in frame order.
    pub durations: Vec<u32>,
}

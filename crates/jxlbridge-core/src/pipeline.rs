//! Whole-image decode and encode on top of a [`Backend`].
//!
//! These calls own their buffers: decoding probes the stream first, sizes
//! the pixel buffer from the probe and then decodes into it, so callers never
//! pre-size anything themselves.
//!
//! # Examples
//!
//! ```ignore
//! use jxlbridge_core::{decode_all, encode, EncodeSettings, LibJxl};
//!
//! let animation = decode_all(&LibJxl, &bytes)?;
//! for frame in &animation.frames {
//!     let seconds = animation.frame_seconds(frame);
//!     println!("{}x{} for {:.2}s", frame.width, frame.height, seconds);
//! }
//!
//! let jxl = encode(&LibJxl, &pixels, 640, 480, &EncodeSettings::default())?;
//! ```

use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

use crate::decode::{run_decoder, DecodeOptions, DecodeReport, FrameBuffer, ImageInfo, NoFrames};
use crate::encode::{run_encoder, EncodeSettings, OutputBuffer};
use crate::engine::{Backend, DataType, PixelFormat};
use crate::error::Error;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// Bit depth reported by the stream. 16 means `pixels` holds big-endian
    /// `u16` samples; anything else means `u8` samples.
    pub bit_depth: u32,
    /// Interleaved RGBA, row-major.
    pub pixels: Vec<u8>,
    /// Display duration in animation ticks, 0 for still images.
    pub duration: u32,
}

impl DecodedFrame {
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::for_bit_depth(self.bit_depth)
    }

    pub fn is_16bit(&self) -> bool {
        self.pixel_format().data_type == DataType::Uint16
    }

    /// Decode big-endian 16-bit samples. `None` for 8-bit frames.
    pub fn samples_u16(&self) -> Option<Vec<u16>> {
        if !self.is_16bit() {
            return None;
        }
        Some(
            self.pixels
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    /// View an 8-bit frame as an `RgbaImage`.
    pub fn to_rgba8(&self) -> Option<RgbaImage> {
        if self.is_16bit() {
            return None;
        }
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// View a 16-bit frame as an RGBA image with native `u16` samples.
    pub fn to_rgba16(&self) -> Option<ImageBuffer<Rgba<u16>, Vec<u16>>> {
        ImageBuffer::from_raw(self.width, self.height, self.samples_u16()?)
    }

    /// Convert into a `DynamicImage`, 8 or 16 bits per sample.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        if self.is_16bit() {
            self.to_rgba16().map(DynamicImage::ImageRgba16)
        } else {
            self.to_rgba8().map(DynamicImage::ImageRgba8)
        }
    }
}

/// Every frame of a stream with its timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub info: ImageInfo,
    pub frames: Vec<DecodedFrame>,
}

impl Animation {
    /// Duration of `frame` in seconds, 0.0 for still images.
    pub fn frame_seconds(&self, frame: &DecodedFrame) -> f64 {
        self.info
            .animation
            .map_or(0.0, |anim| anim.ticks_to_seconds(frame.duration))
    }

    /// Frame durations in ticks, in frame order.
    pub fn durations(&self) -> Vec<u32> {
        self.frames.iter().map(|frame| frame.duration).collect()
    }
}

/// Read dimensions, bit depth, frame count and animation timing.
///
/// Animated streams are walked to count frames, but frame payloads are not
/// decoded or validated.
pub fn probe<B: Backend>(backend: &B, data: &[u8]) -> Result<ImageInfo, Error> {
    probe_report(backend, data).map(|report| report.info)
}

/// Probe, keeping the per-frame durations seen along the way.
pub fn probe_report<B: Backend>(backend: &B, data: &[u8]) -> Result<DecodeReport, Error> {
    run_decoder(backend.decoder()?, data, DecodeOptions::probe(), NoFrames)
}

/// Decode the first frame.
pub fn decode<B: Backend>(backend: &B, data: &[u8]) -> Result<DecodedFrame, Error> {
    let info = probe(backend, data)?;
    let frame_size = frame_size(&info)?;

    let mut pixels = vec![0u8; frame_size];
    let report = run_decoder(
        backend.decoder()?,
        data,
        DecodeOptions::first_frame(),
        FrameBuffer::new(&mut pixels),
    )?;

    Ok(DecodedFrame {
        width: report.info.width,
        height: report.info.height,
        bit_depth: report.info.bit_depth,
        pixels,
        duration: report.durations.first().copied().unwrap_or(0),
    })
}

/// Decode every frame.
///
/// A still image yields a single frame.
pub fn decode_all<B: Backend>(backend: &B, data: &[u8]) -> Result<Animation, Error> {
    let info = probe(backend, data)?;
    let frame_size = frame_size(&info)?;
    let total = info.buffer_size(info.frame_count).ok_or(Error::ImageTooLarge {
        width: info.width,
        height: info.height,
    })?;

    let mut pixels = vec![0u8; total];
    let report = run_decoder(
        backend.decoder()?,
        data,
        DecodeOptions::all_frames(),
        FrameBuffer::new(&mut pixels),
    )?;

    let frames = pixels
        .chunks_exact(frame_size.max(1))
        .take(report.info.frame_count as usize)
        .enumerate()
        .map(|(i, frame)| DecodedFrame {
            width: report.info.width,
            height: report.info.height,
            bit_depth: report.info.bit_depth,
            pixels: frame.to_vec(),
            duration: report.durations.get(i).copied().unwrap_or(0),
        })
        .collect();

    Ok(Animation {
        info: report.info,
        frames,
    })
}

/// Encode RGBA8 pixels.
pub fn encode<B: Backend>(
    backend: &B,
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, Error> {
    run_encoder(backend.encoder()?, pixels, width, height, settings, OutputBuffer::new())
}

/// Encode any image, converting it to RGBA8 first.
pub fn encode_image<B: Backend>(
    backend: &B,
    image: &DynamicImage,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, Error> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    encode(backend, rgba.as_raw(), width, height, settings)
}

fn frame_size(info: &ImageInfo) -> Result<usize, Error> {
    info.frame_size().ok_or(Error::ImageTooLarge {
        width: info.width,
        height: info.height,
    })
}


// ============================================================================
// Property-Based Tests
// ============================================================================

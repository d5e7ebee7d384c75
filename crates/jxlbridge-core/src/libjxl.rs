//! [`Backend`] over the reference libjxl library.
//!
//! Each engine owns one libjxl handle and destroys it on drop. libjxl keeps
//! raw pointers to the input and to bound output regions, which is what the
//! `'buf` lifetime on [`LibJxlDecoder`] pins down.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use jpegxl_sys::color::color_encoding::JxlColorEncoding;
use jpegxl_sys::common::types::{JxlBool, JxlDataType, JxlEndianness, JxlPixelFormat};
use jpegxl_sys::decode::{
    JxlDecoder, JxlDecoderCloseInput, JxlDecoderCreate, JxlDecoderDestroy,
    JxlDecoderGetBasicInfo, JxlDecoderGetFrameHeader, JxlDecoderImageOutBufferSize,
    JxlDecoderProcessInput, JxlDecoderSetImageOutBuffer, JxlDecoderSetInput,
    JxlDecoderSkipCurrentFrame, JxlDecoderStatus, JxlDecoderSubscribeEvents,
};
use jpegxl_sys::encoder::encode::{
    JxlColorEncodingSetToSRGB, JxlEncoder,
    JxlEncoderAddImageFrame, JxlEncoderCloseInput, JxlEncoderCreate, JxlEncoderDestroy,
    JxlEncoderDistanceFromQuality, JxlEncoderFrameSettingId, JxlEncoderFrameSettings,
    JxlEncoderFrameSettingsCreate, JxlEncoderFrameSettingsSetOption, JxlEncoderInitBasicInfo,
    JxlEncoderProcessOutput, JxlEncoderSetBasicInfo, JxlEncoderSetColorEncoding,
    JxlEncoderSetFrameDistance, JxlEncoderSetFrameLossless, JxlEncoderStatus,
};
use jpegxl_sys::metadata::codestream_header::{JxlBasicInfo, JxlFrameHeader};

use crate::engine::{
    AnimationHeader, Backend, BasicInfo, ColorEncoding, DataType, DecoderEngine, DecoderStatus,
    EncoderEngine, EncoderStatus, Endianness, EventMask, FrameHeader, FrameSettings,
    OutputProgress, PixelFormat,
};
use crate::error::{EngineError, Error};

/// libjxl backend with the default memory manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibJxl;

impl Backend for LibJxl {
    type Decoder<'buf> = LibJxlDecoder<'buf>;
    type Encoder = LibJxlEncoder;

    fn decoder<'buf>(&self) -> Result<LibJxlDecoder<'buf>, Error> {
        // SAFETY: a null memory manager selects libjxl's default allocator.
        let raw = unsafe { JxlDecoderCreate(ptr::null()) };
        let handle = NonNull::new(raw).ok_or(Error::EngineInit("JxlDecoderCreate"))?;
        Ok(LibJxlDecoder {
            handle,
            _buf: PhantomData,
        })
    }

    fn encoder(&self) -> Result<LibJxlEncoder, Error> {
        // SAFETY: as above.
        let raw = unsafe { JxlEncoderCreate(ptr::null()) };
        let handle = NonNull::new(raw).ok_or(Error::EngineInit("JxlEncoderCreate"))?;
        Ok(LibJxlEncoder {
            handle,
            settings: ptr::null_mut(),
        })
    }
}

fn jxl_bool(value: bool) -> JxlBool {
    if value {
        JxlBool::True
    } else {
        JxlBool::False
    }
}

fn to_jxl_format(format: &PixelFormat) -> JxlPixelFormat {
    JxlPixelFormat {
        num_channels: format.num_channels,
        data_type: match format.data_type {
            DataType::Uint8 => JxlDataType::Uint8,
            DataType::Uint16 => JxlDataType::Uint16,
        },
        endianness: match format.endianness {
            Endianness::Native => JxlEndianness::Native,
            Endianness::Big => JxlEndianness::Big,
        },
        align: format.align,
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// One libjxl decoder instance.
pub struct LibJxlDecoder<'buf> {
    handle: NonNull<JxlDecoder>,
    _buf: PhantomData<&'buf mut [u8]>,
}

impl LibJxlDecoder<'_> {
    fn check(status: JxlDecoderStatus, operation: &'static str) -> Result<(), EngineError> {
        match status {
            JxlDecoderStatus::Success => Ok(()),
            _ => Err(EngineError::new(operation)),
        }
    }
}

impl<'buf> DecoderEngine<'buf> for LibJxlDecoder<'buf> {
    fn subscribe_events(&mut self, events: EventMask) -> Result<(), EngineError> {
        // SAFETY: the handle is live for as long as self.
        let status = unsafe { JxlDecoderSubscribeEvents(self.handle.as_ptr(), events.bits() as i32) };
        Self::check(status, "JxlDecoderSubscribeEvents")
    }

    fn set_input(&mut self, data: &'buf [u8]) -> Result<(), EngineError> {
        // SAFETY: `data` outlives the decoder through 'buf.
        let status = unsafe { JxlDecoderSetInput(self.handle.as_ptr(), data.as_ptr(), data.len()) };
        Self::check(status, "JxlDecoderSetInput")
    }

    fn close_input(&mut self) {
        // SAFETY: the handle is live.
        unsafe { JxlDecoderCloseInput(self.handle.as_ptr()) }
    }

    fn process_input(&mut self) -> DecoderStatus {
        // SAFETY: the handle is live, input and bound regions outlive it.
        let status = unsafe { JxlDecoderProcessInput(self.handle.as_ptr()) };
        match status {
            JxlDecoderStatus::Success => DecoderStatus::Success,
            JxlDecoderStatus::Error => DecoderStatus::Error,
            JxlDecoderStatus::NeedMoreInput => DecoderStatus::NeedMoreInput,
            JxlDecoderStatus::BasicInfo => DecoderStatus::BasicInfo,
            JxlDecoderStatus::Frame => DecoderStatus::Frame,
            JxlDecoderStatus::NeedImageOutBuffer => DecoderStatus::NeedImageOutBuffer,
            JxlDecoderStatus::FullImage => DecoderStatus::FullImage,
            other => DecoderStatus::Other(other as u32),
        }
    }

    fn basic_info(&self) -> Result<BasicInfo, EngineError> {
        let mut info = MaybeUninit::<JxlBasicInfo>::uninit();
        // SAFETY: libjxl fills the whole struct on success.
        let info = unsafe {
            Self::check(
                JxlDecoderGetBasicInfo(self.handle.as_ptr(), info.as_mut_ptr()),
                "JxlDecoderGetBasicInfo",
            )?;
            info.assume_init()
        };
        Ok(BasicInfo {
            xsize: info.xsize,
            ysize: info.ysize,
            bits_per_sample: info.bits_per_sample,
            alpha_bits: info.alpha_bits,
            num_extra_channels: info.num_extra_channels,
            uses_original_profile: info.uses_original_profile == JxlBool::True,
            have_animation: info.have_animation == JxlBool::True,
            animation: AnimationHeader {
                tps_numerator: info.animation.tps_numerator,
                tps_denominator: info.animation.tps_denominator,
                num_loops: info.animation.num_loops,
            },
        })
    }

    fn frame_header(&self) -> Result<FrameHeader, EngineError> {
        let mut header = MaybeUninit::<JxlFrameHeader>::uninit();
        // SAFETY: libjxl fills the whole struct on success.
        let header = unsafe {
            Self::check(
                JxlDecoderGetFrameHeader(self.handle.as_ptr(), header.as_mut_ptr()),
                "JxlDecoderGetFrameHeader",
            )?;
            header.assume_init()
        };
        Ok(FrameHeader {
            duration: header.duration,
            is_last: header.is_last == JxlBool::True,
        })
    }

    fn image_out_buffer_size(&self, format: &PixelFormat) -> Result<usize, EngineError> {
        let format = to_jxl_format(format);
        let mut size = 0usize;
        // SAFETY: both pointers refer to live locals.
        let status =
            unsafe { JxlDecoderImageOutBufferSize(self.handle.as_ptr(), &format, &mut size) };
        Self::check(status, "JxlDecoderImageOutBufferSize")?;
        Ok(size)
    }

    fn set_image_out_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: &'buf mut [u8],
    ) -> Result<(), EngineError> {
        let format = to_jxl_format(format);
        // SAFETY: `buffer` outlives the decoder through 'buf and libjxl writes
        // at most `buffer.len()` bytes.
        let status = unsafe {
            JxlDecoderSetImageOutBuffer(
                self.handle.as_ptr(),
                &format,
                buffer.as_mut_ptr().cast::<c_void>(),
                buffer.len(),
            )
        };
        Self::check(status, "JxlDecoderSetImageOutBuffer")
    }

    fn skip_current_frame(&mut self) -> Result<(), EngineError> {
        // SAFETY: the handle is live.
        let status = unsafe { JxlDecoderSkipCurrentFrame(self.handle.as_ptr()) };
        Self::check(status, "JxlDecoderSkipCurrentFrame")
    }
}

impl Drop for LibJxlDecoder<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle came from JxlDecoderCreate and is destroyed once.
        unsafe { JxlDecoderDestroy(self.handle.as_ptr()) }
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// One libjxl encoder instance.
pub struct LibJxlEncoder {
    handle: NonNull<JxlEncoder>,
    /// Owned by the encoder, null until `create_frame_settings`.
    settings: *mut JxlEncoderFrameSettings,
}

impl LibJxlEncoder {
    fn check(status: JxlEncoderStatus, operation: &'static str) -> Result<(), EngineError> {
        match status {
            JxlEncoderStatus::Success => Ok(()),
            _ => Err(EngineError::new(operation)),
        }
    }
}

impl EncoderEngine for LibJxlEncoder {
    fn set_basic_info(&mut self, info: &BasicInfo) -> Result<(), EngineError> {
        let mut raw = MaybeUninit::<JxlBasicInfo>::uninit();
        // SAFETY: JxlEncoderInitBasicInfo initializes every field.
        let mut raw = unsafe {
            JxlEncoderInitBasicInfo(raw.as_mut_ptr());
            raw.assume_init()
        };
        raw.xsize = info.xsize;
        raw.ysize = info.ysize;
        raw.bits_per_sample = info.bits_per_sample;
        raw.alpha_bits = info.alpha_bits;
        raw.num_extra_channels = info.num_extra_channels;
        raw.uses_original_profile = jxl_bool(info.uses_original_profile);
        raw.have_animation = jxl_bool(info.have_animation);
        raw.animation.tps_numerator = info.animation.tps_numerator;
        raw.animation.tps_denominator = info.animation.tps_denominator;
        raw.animation.num_loops = info.animation.num_loops;

        // SAFETY: the handle is live and `raw` is fully initialized.
        let status = unsafe { JxlEncoderSetBasicInfo(self.handle.as_ptr(), &raw) };
        Self::check(status, "JxlEncoderSetBasicInfo")
    }

    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> Result<(), EngineError> {
        let mut raw = MaybeUninit::<JxlColorEncoding>::uninit();
        // SAFETY: the setter initializes every field.
        let raw = unsafe {
            JxlColorEncodingSetToSRGB(raw.as_mut_ptr(), encoding.is_gray);
            raw.assume_init()
        };
        // SAFETY: the handle is live.
        let status = unsafe { JxlEncoderSetColorEncoding(self.handle.as_ptr(), &raw) };
        Self::check(status, "JxlEncoderSetColorEncoding")
    }

    fn distance_from_quality(&self, quality: f32) -> f32 {
        // SAFETY: pure function.
        unsafe { JxlEncoderDistanceFromQuality(quality) }
    }

    fn create_frame_settings(&mut self, settings: &FrameSettings) -> Result<(), EngineError> {
        // SAFETY: the handle is live; the settings object is owned by it.
        unsafe {
            let frame = JxlEncoderFrameSettingsCreate(self.handle.as_ptr(), ptr::null());
            if frame.is_null() {
                return Err(EngineError::new("JxlEncoderFrameSettingsCreate"));
            }
            Self::check(
                JxlEncoderSetFrameDistance(frame, settings.distance),
                "JxlEncoderSetFrameDistance",
            )?;
            Self::check(
                JxlEncoderFrameSettingsSetOption(
                    frame,
                    JxlEncoderFrameSettingId::Effort,
                    i64::from(settings.effort),
                ),
                "JxlEncoderFrameSettingsSetOption",
            )?;
            if settings.lossless {
                Self::check(
                    JxlEncoderSetFrameLossless(frame, true),
                    "JxlEncoderSetFrameLossless",
                )?;
            }
            self.settings = frame;
        }
        Ok(())
    }

    fn add_image_frame(&mut self, format: &PixelFormat, pixels: &[u8]) -> Result<(), EngineError> {
        if self.settings.is_null() {
            return Err(EngineError::new("JxlEncoderAddImageFrame"));
        }
        let format = to_jxl_format(format);
        // SAFETY: libjxl copies the pixels before returning.
        let status = unsafe {
            JxlEncoderAddImageFrame(
                self.settings,
                &format,
                pixels.as_ptr().cast::<c_void>(),
                pixels.len(),
            )
        };
        Self::check(status, "JxlEncoderAddImageFrame")
    }

    fn close_input(&mut self) {
        // SAFETY: the handle is live.
        unsafe { JxlEncoderCloseInput(self.handle.as_ptr()) }
    }

    fn process_output(&mut self, out: &mut [u8]) -> OutputProgress {
        let mut next_out = out.as_mut_ptr();
        let mut avail_out = out.len();
        // SAFETY: libjxl writes at most `avail_out` bytes from `next_out`.
        let status = unsafe {
            JxlEncoderProcessOutput(self.handle.as_ptr(), &mut next_out, &mut avail_out)
        };
        let written = out.len() - avail_out;
        let status = match status {
            JxlEncoderStatus::Success => EncoderStatus::Success,
            JxlEncoderStatus::NeedMoreOutput => EncoderStatus::NeedMoreOutput,
            _ => EncoderStatus::Error,
        };
        OutputProgress { status, written }
    }
}

impl Drop for LibJxlEncoder {
    fn drop(&mut self) {
        // SAFETY: the handle came from JxlEncoderCreate and is destroyed once.
        // Frame settings are released with it.
        unsafe { JxlEncoderDestroy(self.handle.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpegxl_sys::encoder::encode::{JxlEncoderInitFrameHeader, JxlEncoderSetFrameHeader};

    use crate::encode::{run_encoder, OutputBuffer};
    use crate::{decode, decode_all, encode, is_jxl, probe, probe_report, EncodeSettings};

    fn red_2x2() -> Vec<u8> {
        [255u8, 0, 0, 255].repeat(4)
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let v = (i * 13 % 256) as u8;
                [v, 255 - v, v / 2, 255]
            })
            .collect()
    }

    /// Encode a lossless 8-bit animation, one `(pixels, duration)` per frame.
    fn encode_animation(width: u32, height: u32, frames: &[(Vec<u8>, u32)]) -> Vec<u8> {
        let mut engine = LibJxl.encoder().unwrap();
        engine
            .set_basic_info(&BasicInfo {
                xsize: width,
                ysize: height,
                bits_per_sample: 8,
                alpha_bits: 8,
                num_extra_channels: 1,
                uses_original_profile: true,
                have_animation: true,
                animation: AnimationHeader {
                    tps_numerator: 10,
                    tps_denominator: 1,
                    num_loops: 0,
                },
            })
            .unwrap();
        engine.set_color_encoding(&ColorEncoding::srgb()).unwrap();
        engine
            .create_frame_settings(&FrameSettings {
                distance: 0.0,
                effort: 1,
                lossless: true,
            })
            .unwrap();

        for (pixels, duration) in frames {
            let mut header = MaybeUninit::<JxlFrameHeader>::uninit();
            unsafe {
                JxlEncoderInitFrameHeader(header.as_mut_ptr());
                let mut header = header.assume_init();
                header.duration = *duration;
                let status = JxlEncoderSetFrameHeader(engine.settings, &header);
                assert!(matches!(status, JxlEncoderStatus::Success));
            }
            engine.add_image_frame(&PixelFormat::RGBA8, pixels).unwrap();
        }
        engine.close_input();

        let mut out = OutputBuffer::with_capacity(64);
        loop {
            let progress = engine.process_output(out.spare_mut());
            out.advance(progress.written).unwrap();
            match progress.status {
                EncoderStatus::Success => break,
                EncoderStatus::NeedMoreOutput => out.grow(),
                EncoderStatus::Error => panic!("libjxl failed to encode the animation"),
            }
        }
        out.into_vec()
    }

    #[test]
    fn test_red_2x2_lossless_round_trip() {
        let pixels = red_2x2();
        let jxl = encode(&LibJxl, &pixels, 2, 2, &EncodeSettings::lossless()).unwrap();
        assert!(is_jxl(&jxl));

        let info = probe(&LibJxl, &jxl).unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(info.bit_depth, 8);
        assert_eq!(info.frame_count, 1);
        assert!(!info.is_animated());

        let frame = decode(&LibJxl, &jxl).unwrap();
        assert_eq!(frame.pixels, pixels);
    }

    #[test]
    fn test_lossy_encode_keeps_dimensions() {
        let pixels = gradient(16, 8);
        let jxl = encode(&LibJxl, &pixels, 16, 8, &EncodeSettings::new(50, 3)).unwrap();

        let frame = decode(&LibJxl, &jxl).unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.pixels.len(), pixels.len());
    }

    #[test]
    fn test_chunked_drain_matches_single_pass() {
        let pixels = gradient(32, 32);
        let settings = EncodeSettings::lossless();
        let chunked = run_encoder(
            LibJxl.encoder().unwrap(),
            &pixels,
            32,
            32,
            &settings,
            OutputBuffer::with_capacity(1),
        )
        .unwrap();
        let whole = run_encoder(
            LibJxl.encoder().unwrap(),
            &pixels,
            32,
            32,
            &settings,
            OutputBuffer::with_capacity(1 << 20),
        )
        .unwrap();
        assert_eq!(chunked, whole);
    }

    #[test]
    fn test_animation_probe_and_decode_all() {
        let frames: Vec<(Vec<u8>, u32)> = (1..=3u8)
            .map(|i| ([i * 40, 0, 255 - i * 40, 255].repeat(4 * 2), u32::from(i)))
            .collect();
        let jxl = encode_animation(4, 2, &frames);

        let report = probe_report(&LibJxl, &jxl).unwrap();
        assert_eq!(report.info.frame_count, 3);
        assert!(report.info.is_animated());
        assert_eq!(report.durations, vec![1, 2, 3]);

        let animation = decode_all(&LibJxl, &jxl).unwrap();
        assert_eq!(animation.frames.len(), 3);
        for (decoded, (pixels, duration)) in animation.frames.iter().zip(&frames) {
            assert_eq!(&decoded.pixels, pixels);
            assert_eq!(decoded.duration, *duration);
        }
        assert!((animation.frame_seconds(&animation.frames[2]) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_and_truncation_fail() {
        assert!(decode(&LibJxl, b"definitely not a jxl file").is_err());

        let jxl = encode(&LibJxl, &gradient(16, 16), 16, 16, &EncodeSettings::lossless()).unwrap();
        assert!(decode(&LibJxl, &jxl[..jxl.len() / 2]).is_err());
    }
}

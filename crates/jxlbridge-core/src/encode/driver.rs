//! The encode pipeline.

use log::{debug, trace, warn};

use super::buffer::OutputBuffer;
use super::settings::EncodeSettings;
use crate::engine::{BasicInfo, ColorEncoding, EncoderEngine, EncoderStatus, FrameSettings, PixelFormat};
use crate::error::{EngineError, Error};

/// Check dimensions, pixel length and settings before any engine call.
pub fn validate_input(
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: &EncodeSettings,
) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }

    let expected = PixelFormat::RGBA8
        .frame_size(width, height)
        .ok_or(Error::ImageTooLarge { width, height })?;
    if pixels.len() != expected {
        return Err(Error::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }

    settings.validate()
}

/// Header written for an RGBA8 frame.
fn basic_info(width: u32, height: u32, lossless: bool) -> BasicInfo {
    BasicInfo {
        xsize: width,
        ysize: height,
        bits_per_sample: 8,
        alpha_bits: 8,
        num_extra_channels: 1,
        uses_original_profile: lossless,
        ..Default::default()
    }
}

/// Encode one RGBA8 frame with `engine`, draining into `out`.
///
/// Quality 100 is lossless: the header keeps the original profile, distance
/// is 0 and the engine's quality mapping is not consulted. Any other quality
/// goes through [`EncoderEngine::distance_from_quality`].
///
/// # Errors
///
/// - [`Error::InvalidDimensions`], [`Error::InvalidPixelData`],
///   [`Error::InvalidQuality`] or [`Error::InvalidEffort`] before the engine
///   is touched
/// - [`Error::EngineInit`] if a configuration step is rejected
/// - [`Error::Encode`] if the engine fails while producing output
/// - [`Error::OutputOverrun`] if the engine reports more bytes than it was
///   offered
pub fn run_encoder<E: EncoderEngine>(
    mut engine: E,
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: &EncodeSettings,
    mut out: OutputBuffer,
) -> Result<Vec<u8>, Error> {
    validate_input(pixels, width, height, settings)?;

    let lossless = settings.is_lossless();
    let init = |e: EngineError| Error::EngineInit(e.operation);

    engine
        .set_basic_info(&basic_info(width, height, lossless))
        .map_err(init)?;
    engine
        .set_color_encoding(&ColorEncoding::srgb())
        .map_err(init)?;

    let distance = if lossless {
        0.0
    } else {
        engine.distance_from_quality(settings.quality as f32)
    };
    engine
        .create_frame_settings(&FrameSettings {
            distance,
            effort: settings.effort,
            lossless,
        })
        .map_err(init)?;

    engine
        .add_image_frame(&PixelFormat::RGBA8, pixels)
        .map_err(init)?;
    engine.close_input();

    loop {
        let progress = engine.process_output(out.spare_mut());
        out.advance(progress.written).inspect_err(|err| warn!("encoder output: {}", err))?;
        match progress.status {
            EncoderStatus::Success => break,
            EncoderStatus::NeedMoreOutput => {
                trace!("encoder needs more output after {} bytes", out.len());
                out.grow();
            }
            EncoderStatus::Error => {
                warn!("encoder failed after {} bytes", out.len());
                return Err(Error::Encode);
            }
        }
    }

    debug!(
        "encoded {}x{} at quality {} effort {}: {} bytes",
        width,
        height,
        settings.quality,
        settings.effort,
        out.len()
    );
    Ok(out.into_vec())
}

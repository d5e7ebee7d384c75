//! Encoding WASM bindings.
//!
//! Both functions take an optional quality (0-100, default 75, 100 is
//! lossless) and effort (1-10, default 7) and are exported with the `libjxl`
//! feature.
//!
//! # Example
//!
//! ```typescript
//! import { encode_jxl } from '@jxlbridge/wasm';
//!
//! const imageData = ctx.getImageData(0, 0, width, height);
//! const jxl = encode_jxl(new Uint8Array(imageData.data.buffer), width, height, 90);
//! const blob = new Blob([jxl], { type: 'image/jxl' });
//! ```

use jxlbridge_core::{Backend, EncodeSettings, Error};
#[cfg(feature = "libjxl")]
use wasm_bindgen::prelude::*;

use crate::types::JsDecodedImage;

/// Settings from optional JavaScript arguments.
pub(crate) fn settings_from(quality: Option<u32>, effort: Option<u32>) -> EncodeSettings {
    let defaults = EncodeSettings::default();
    EncodeSettings {
        quality: quality.unwrap_or(defaults.quality),
        effort: effort.unwrap_or(defaults.effort),
    }
}

pub(crate) fn encode_with<B: Backend>(
    backend: &B,
    pixels: &[u8],
    width: u32,
    height: u32,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, Error> {
    jxlbridge_core::encode(backend, pixels, width, height, settings)
}

pub(crate) fn encode_image_with<B: Backend>(
    backend: &B,
    image: &JsDecodedImage,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, Error> {
    let frame = image.frame();
    encode_with(backend, &image.rgba8_pixels(), frame.width, frame.height, settings)
}

/// Encode RGBA8 pixels to JPEG XL.
///
/// # Errors
///
/// Throws if the dimensions, pixel length, quality or effort are invalid, or
/// if the engine fails.
#[cfg(feature = "libjxl")]
#[wasm_bindgen]
pub fn encode_jxl(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: Option<u32>,
    effort: Option<u32>,
) -> Result<Vec<u8>, JsValue> {
    let settings = settings_from(quality, effort);
    encode_with(&jxlbridge_core::LibJxl, pixels, width, height, &settings)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode a decoded image to JPEG XL. 16-bit images are reduced to 8 bits.
///
/// # Errors
///
/// As for `encode_jxl`.
#[cfg(feature = "libjxl")]
#[wasm_bindgen]
pub fn encode_jxl_from_image(
    image: &JsDecodedImage,
    quality: Option<u32>,
    effort: Option<u32>,
) -> Result<Vec<u8>, JsValue> {
    let settings = settings_from(quality, effort);
    encode_image_with(&jxlbridge_core::LibJxl, image, &settings)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}


// ============================================================================
// Property-Based Tests
// ============================================================================

//! Decoding WASM bindings.
//!
//! # Functions
//!
//! - [`is_jxl`] - Check whether bytes look like a JPEG XL file
//! - `probe_jxl` - Read dimensions, bit depth and frame count
//! - `decode_jxl` - Decode the first frame
//! - `decode_jxl_all` - Decode every frame with its timing
//!
//! The decoding functions need a codec engine and are exported with the
//! `libjxl` feature.
//!
//! # Example
//!
//! ```typescript
//! import { is_jxl, probe_jxl, decode_jxl_all } from '@jxlbridge/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! if (is_jxl(bytes)) {
//!   const info = probe_jxl(bytes);
//!   console.log(`${info.width}x${info.height}, ${info.frame_count} frame(s)`);
//!   const animation = decode_jxl_all(bytes);
//!   const first = animation.frame(0);
//! }
//! ```

use jxlbridge_core::{Backend, Error};
use wasm_bindgen::prelude::*;

use crate::types::{JsAnimation, JsDecodedImage, JsImageInfo};

/// Check whether `bytes` start with a JPEG XL signature.
#[wasm_bindgen]
pub fn is_jxl(bytes: &[u8]) -> bool {
    jxlbridge_core::is_jxl(bytes)
}

pub(crate) fn probe_with<B: Backend>(backend: &B, bytes: &[u8]) -> Result<JsImageInfo, Error> {
    jxlbridge_core::probe(backend, bytes).map(JsImageInfo::from_info)
}

pub(crate) fn decode_with<B: Backend>(backend: &B, bytes: &[u8]) -> Result<JsDecodedImage, Error> {
    jxlbridge_core::decode(backend, bytes).map(JsDecodedImage::from_frame)
}

pub(crate) fn decode_all_with<B: Backend>(backend: &B, bytes: &[u8]) -> Result<JsAnimation, Error> {
    jxlbridge_core::decode_all(backend, bytes).map(JsAnimation::from_animation)
}

/// Read image metadata without decoding pixels.
///
/// # Errors
///
/// Throws if the bytes are not a valid, complete JPEG XL stream header.
#[cfg(feature = "libjxl")]
#[wasm_bindgen]
pub fn probe_jxl(bytes: &[u8]) -> Result<JsImageInfo, JsValue> {
    probe_with(&jxlbridge_core::LibJxl, bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Decode the first frame of a JPEG XL image.
///
/// # Errors
///
/// Throws if the stream is corrupt or truncated.
#[cfg(feature = "libjxl")]
#[wasm_bindgen]
pub fn decode_jxl(bytes: &[u8]) -> Result<JsDecodedImage, JsValue> {
    decode_with(&jxlbridge_core::LibJxl, bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Decode every frame of a JPEG XL image.
///
/// # Errors
///
/// Throws if the stream is corrupt or truncated.
#[cfg(feature = "libjxl")]
#[wasm_bindgen]
pub fn decode_jxl_all(bytes: &[u8]) -> Result<JsAnimation, JsValue> {
    decode_all_with(&jxlbridge_core::LibJxl, bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlbridge_core::testing::{write_container, ContainerHeader, MemoryCodec};

    fn still() -> Vec<u8> {
        let pixels = [0u8, 128, 255, 255].repeat(6);
        write_container(&ContainerHeader::still(3, 2, 8), &[(pixels.as_slice(), 0)])
    }

    #[test]
    fn test_is_jxl() {
        assert!(is_jxl(&[0xFF, 0x0A, 0x00]));
        assert!(!is_jxl(&still()));
    }

    #[test]
    fn test_probe_with() {
        let info = probe_with(&MemoryCodec::new(), &still()).unwrap();
        assert_eq!(info.width(), 3);
        assert_eq!(info.height(), 2);
        assert_eq!(info.frame_count(), 1);
        assert!(!info.animated());
    }

    #[test]
    fn test_decode_with() {
        let image = decode_with(&MemoryCodec::new(), &still()).unwrap();
        assert_eq!(image.byte_length(), 3 * 2 * 4);
        assert_eq!(&image.pixels()[..4], &[0, 128, 255, 255]);
    }

    #[test]
    fn test_decode_all_with() {
        let frames: Vec<Vec<u8>> = (0..2u8).map(|i| vec![i; 4]).collect();
        let data = write_container(
            &ContainerHeader::animated(1, 1, 4),
            &[(frames[0].as_slice(), 2), (frames[1].as_slice(), 6)],
        );
        let animation = decode_all_with(&MemoryCodec::new(), &data).unwrap();
        assert_eq!(animation.length(), 2);
        assert_eq!(animation.delays(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_errors_propagate() {
        let result = decode_with(&MemoryCodec::new(), b"nope");
        assert!(matches!(result, Err(Error::StreamCorrupt)));
    }
}

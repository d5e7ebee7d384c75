//! WASM-compatible wrapper types for decoded images.
//!
//! These types wrap the core jxlbridge types and expose their fields through
//! getters, converting between Rust and JavaScript representations.

use jxlbridge_core::{Animation, DecodedFrame, ImageInfo};
use wasm_bindgen::prelude::*;

/// Image metadata for JavaScript.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy)]
pub struct JsImageInfo {
    info: ImageInfo,
}

#[wasm_bindgen]
impl JsImageInfo {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.info.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Bits per sample. 16 means decoded pixels are big-endian `u16`.
    #[wasm_bindgen(getter)]
    pub fn bit_depth(&self) -> u32 {
        self.info.bit_depth
    }

    #[wasm_bindgen(getter)]
    pub fn frame_count(&self) -> u32 {
        self.info.frame_count
    }

    #[wasm_bindgen(getter)]
    pub fn animated(&self) -> bool {
        self.info.is_animated()
    }

    /// Animation loop count, 0 for infinite or for still images.
    #[wasm_bindgen(getter)]
    pub fn num_loops(&self) -> u32 {
        self.info.animation.map_or(0, |anim| anim.num_loops)
    }

    /// All fields as a plain JavaScript object.
    pub fn to_object(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.info).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl JsImageInfo {
    pub(crate) fn from_info(info: ImageInfo) -> Self {
        Self { info }
    }
}

/// A decoded frame for JavaScript.
///
/// The pixel data lives in WASM memory; `pixels()` copies it out as a
/// `Uint8Array`.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct JsDecodedImage {
    frame: DecodedFrame,
}

#[wasm_bindgen]
impl JsDecodedImage {
    /// Wrap 8-bit RGBA pixels, e.g. from a canvas, for `encode_jxl_from_image`.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> JsDecodedImage {
        JsDecodedImage {
            frame: DecodedFrame {
                width,
                height,
                bit_depth: 8,
                pixels,
                duration: 0,
            },
        }
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.frame.height
    }

    #[wasm_bindgen(getter)]
    pub fn bit_depth(&self) -> u32 {
        self.frame.bit_depth
    }

    /// Display duration in animation ticks.
    #[wasm_bindgen(getter)]
    pub fn duration(&self) -> u32 {
        self.frame.duration
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.frame.pixels.len()
    }

    /// Raw RGBA sample bytes as a `Uint8Array` (copied).
    pub fn pixels(&self) -> Vec<u8> {
        self.frame.pixels.clone()
    }

    /// 16-bit samples as a `Uint16Array`, `undefined` for 8-bit images.
    pub fn samples16(&self) -> Option<Vec<u16>> {
        self.frame.samples_u16()
    }

    /// Pixels reduced to 8 bits per sample, suitable for `ImageData`.
    pub fn rgba8(&self) -> Vec<u8> {
        self.rgba8_pixels()
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl JsDecodedImage {
    pub(crate) fn from_frame(frame: DecodedFrame) -> Self {
        Self { frame }
    }

    pub(crate) fn frame(&self) -> &DecodedFrame {
        &self.frame
    }

    /// 8-bit samples, keeping the high byte of 16-bit ones.
    pub(crate) fn rgba8_pixels(&self) -> Vec<u8> {
        match self.frame.samples_u16() {
            Some(samples) => samples.iter().map(|s| (s >> 8) as u8).collect(),
            None => self.frame.pixels.clone(),
        }
    }
}

/// All frames of an animation for JavaScript.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct JsAnimation {
    animation: Animation,
}

#[wasm_bindgen]
impl JsAnimation {
    #[wasm_bindgen(getter)]
    pub fn info(&self) -> JsImageInfo {
        JsImageInfo::from_info(self.animation.info)
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.animation.frames.len()
    }

    /// Frame `index`, `undefined` past the end.
    pub fn frame(&self, index: usize) -> Option<JsDecodedImage> {
        self.animation.frames.get(index).cloned().map(JsDecodedImage::from_frame)
    }

    /// Frame durations in ticks.
    pub fn durations(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(self.animation.durations().as_slice())
    }

    /// Frame durations in seconds.
    pub fn delays_seconds(&self) -> Vec<f64> {
        self.delays()
    }
}

impl JsAnimation {
    pub(crate) fn from_animation(animation: Animation) -> Self {
        Self { animation }
    }

    pub(crate) fn delays(&self) -> Vec<f64> {
        self.animation
            .frames
            .iter()
            .map(|frame| self.animation.frame_seconds(frame))
            .collect()
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
        /// Property: 8-bit reduction keeps the high byte of every 16-bit
        /// sample and yields one byte per sample.
        #[test]
        fn prop_rgba8_keeps_high_byte(samples in prop::collection::vec(any::<u16>(), 4..=64)) {
            let samples = &samples[..samples.len() / 4 * 4];
            let pixels: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
            let image = JsDecodedImage::from_frame(DecodedFrame {
                width: (samples.len() / 4) as u32,
                height: 1,
                bit_depth: 16,
                pixels,
                duration: 0,
            });

            let reduced = image.rgba8_pixels();
            prop_assert_eq!(reduced.len(), samples.len());
            for (byte, sample) in reduced.iter().zip(samples) {
                prop_assert_eq!(*byte, (sample >> 8) as u8);
            }
        }

        /// Property: 8-bit images pass through unchanged.
        #[test]
        fn prop_rgba8_identity_for_eight_bit(pixels in prop::collection::vec(any::<u8>(), 0..64)) {
            let image = JsDecodedImage::new(1, 1, pixels.clone());
            prop_assert_eq!(image.rgba8_pixels(), pixels);
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_durations_array() {
        let animation = Animation {
            info: ImageInfo::default(),
            frames: vec![DecodedFrame {
                width: 1,
                height: 1,
                bit_depth: 8,
                pixels: vec![0; 4],
                duration: 7,
            }],
        };
        let js = JsAnimation::from_animation(animation);
        assert_eq!(js.durations().to_vec(), vec![7]);
    }

    #[wasm_bindgen_test]
    fn test_info_to_object() {
        let info = JsImageInfo::from_info(ImageInfo {
            width: 3,
            height: 4,
            bit_depth: 8,
            frame_count: 1,
            animation: None,
        });
        let value = info.to_object().unwrap();
        let back: ImageInfo = serde_wasm_bindgen::from_value(value).unwrap();
        assert_eq!(back.width, 3);
        assert_eq!(back.height, 4);
    }
}

//! jxlbridge WASM - host bindings for jxlbridge
//!
//! This crate exposes the jxlbridge-core drivers to hosts in two forms:
//!
//! - `abi` - a C ABI (`allocate`, `deallocate`, `decode`, `encode`) for hosts
//!   that manage linear memory themselves
//! - `decode` / `encode` / `types` - wasm-bindgen bindings for JavaScript
//!
//! Everything that needs a codec engine is exported with the `libjxl`
//! feature.
//!
//! # Usage
//!
//! ```typescript
//! import init, { decode_jxl, encode_jxl } from '@jxlbridge/wasm';
//!
//! await init();
//!
//! const image = decode_jxl(new Uint8Array(await file.arrayBuffer()));
//! console.log(`Decoded ${image.width}x${image.height}`);
//! ```

use wasm_bindgen::prelude::*;

pub mod abi;
mod decode;
mod encode;
mod types;

pub use decode::is_jxl;
#[cfg(feature = "libjxl")]
pub use decode::{decode_jxl, decode_jxl_all, probe_jxl};
#[cfg(feature = "libjxl")]
pub use encode::{encode_jxl, encode_jxl_from_image};
pub use types::{JsAnimation, JsDecodedImage, JsImageInfo};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
    set_panic_hook();
}

/// Route panic messages to `console.error` when the
/// `console_error_panic_hook` feature is on.
fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

//! jxlbridge Core - JPEG XL decode and encode drivers
//!
//! This crate drives an incremental, event-emitting JPEG XL codec engine:
//! it feeds compressed bytes or pixels in, reacts to the engine's status
//! events, and collects image metadata, frame timing, decoded pixels or
//! compressed output.
//!
//! - [`engine`]: the engine protocol traits and the types crossing them
//! - [`decode`]: the decode state machine and loop
//! - [`encode`]: the encode pipeline and its growable output buffer
//! - [`probe`], [`decode()`], [`decode_all`], [`encode()`]: whole-image calls
//!   that size their own buffers
//!
//! With the `libjxl` feature, [`LibJxl`] provides a real engine.

pub mod decode;
pub mod encode;
pub mod engine;
pub mod error;
#[cfg(feature = "libjxl")]
pub mod libjxl;
mod pipeline;
pub mod signature;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use decode::{AnimationInfo, DecodeOptions, DecodeReport, ImageInfo};
pub use encode::{EncodeSettings, OutputBuffer};
pub use engine::Backend;
pub use error::{EngineError, Error};
#[cfg(feature = "libjxl")]
pub use libjxl::LibJxl;
pub use pipeline::{
    decode, decode_all, encode, encode_image, probe, probe_report, Animation, DecodedFrame,
};
pub use signature::is_jxl;

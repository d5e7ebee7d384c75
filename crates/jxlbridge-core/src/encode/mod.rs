//! Encode pipeline.
//!
//! One RGBA8 frame goes in, a compressed buffer comes out:
//!
//! 1. Inputs are validated without touching the engine
//! 2. The engine is configured: header, sRGB color encoding, frame settings
//! 3. The frame is submitted and input closed
//! 4. Output is drained into an [`OutputBuffer`] that doubles whenever the
//!    engine runs out of room, then trimmed to its exact length
//!
//! # Examples
//!
//! ```ignore
//! use jxlbridge_core::encode::{run_encoder, EncodeSettings, OutputBuffer};
//!
//! let pixels = vec![128u8; 64 * 64 * 4];
//! let engine = backend.encoder()?;
//! let jxl = run_encoder(engine, &pixels, 64, 64, &EncodeSettings::default(), OutputBuffer::new())?;
//! ```

mod buffer;
mod driver;
mod settings;

pub use buffer::{OutputBuffer, INITIAL_CAPACITY};
pub use driver::{run_encoder, validate_input};
pub use settings::{EncodeSettings, DEFAULT_EFFORT, DEFAULT_QUALITY, LOSSLESS_QUALITY};

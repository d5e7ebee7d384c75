//! Decode pipeline.
//!
//! A decode call feeds the whole compressed buffer to an engine and reacts to
//! its events until the stream is done:
//!
//! - [`DecodeOptions::probe`] reads dimensions, depth, frame count and frame
//!   durations without producing pixels
//! - [`DecodeOptions::first_frame`] decodes the first frame only
//! - [`DecodeOptions::all_frames`] decodes every frame of an animation
//!
//! Decoded frames are written back to back into regions handed out by a
//! [`FrameSink`]. Frames of 16-bit images hold big-endian `u16` samples;
//! everything else is delivered as `u8`.
//!
//! # Examples
//!
//! ```ignore
//! use jxlbridge_core::decode::{run_decoder, DecodeOptions, FrameBuffer, NoFrames};
//!
//! let probe = run_decoder(backend.decoder()?, &data, DecodeOptions::probe(), NoFrames)?;
//! let mut pixels = vec![0u8; probe.info.buffer_size(1).unwrap()];
//! let report = run_decoder(
//!     backend.decoder()?,
//!     &data,
//!     DecodeOptions::first_frame(),
//!     FrameBuffer::new(&mut pixels),
//! )?;
//! ```

mod driver;
mod frames;
mod state;
mod types;

pub use driver::{run_decoder, DECODE_EVENTS};
pub use frames::{frame_range, frame_ref, frame_slice, FrameBuffer, FrameSink, NoFrames};
pub use state::{DecodeMachine, DecodeState};
pub use types::{AnimationInfo, DecodeOptions, DecodeReport, ImageInfo};

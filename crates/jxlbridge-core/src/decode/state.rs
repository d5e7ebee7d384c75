//! The decode state machine.
//!
//! Every engine event is applied through [`DecodeMachine::on_event`], which
//! moves between a small set of named states:
//!
//! ```text
//! HeaderPending --BasicInfo--> FramePending --Frame--> BufferPending
//!       |                           ^                      |
//!       | (probe, still image)      |   (probe: skip)      | NeedImageOutBuffer
//!       v                           +----------------------+
//!     Done <--FullImage (last)-- FrameReady <--------------+ (bind region)
//! ```
//!
//! `Success` from any state after the header ends the call, `Error` and
//! `NeedMoreInput` fail it. Events a state cannot accept are protocol
//! violations. Unsubscribed events are ignored.

use std::marker::PhantomData;

use log::trace;

use super::frames::FrameSink;
use super::types::{DecodeOptions, DecodeReport, ImageInfo};
use crate::engine::{DecoderEngine, DecoderStatus, FrameHeader, PixelFormat};
use crate::error::Error;

/// Named states of a decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for basic image info.
    HeaderPending,
    /// Waiting for the next frame header.
    FramePending,
    /// Frame header seen, waiting for the output buffer request.
    BufferPending,
    /// Output region bound, waiting for the frame to complete.
    FrameReady,
    Done,
    Failed,
}

impl DecodeState {
    pub fn name(self) -> &'static str {
        match self {
            DecodeState::HeaderPending => "HeaderPending",
            DecodeState::FramePending => "FramePending",
            DecodeState::BufferPending => "BufferPending",
            DecodeState::FrameReady => "FrameReady",
            DecodeState::Done => "Done",
            DecodeState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DecodeState::Done | DecodeState::Failed)
    }
}

/// Applies engine events to the decode state for one call.
pub struct DecodeMachine<'buf, E, S> {
    engine: E,
    sink: S,
    options: DecodeOptions,
    state: DecodeState,
    error: Option<Error>,
    info: ImageInfo,
    format: PixelFormat,
    current_frame: FrameHeader,
    durations: Vec<u32>,
    _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf, E, S> DecodeMachine<'buf, E, S>
where
    E: DecoderEngine<'buf>,
    S: FrameSink<'buf>,
{
    /// Wrap an engine that already has its input set.
    pub fn new(engine: E, sink: S, options: DecodeOptions) -> Self {
        Self {
            engine,
            sink,
            options,
            state: DecodeState::HeaderPending,
            error: None,
            info: ImageInfo::default(),
            format: PixelFormat::RGBA8,
            current_frame: FrameHeader::default(),
            durations: Vec::new(),
            _buf: PhantomData,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Metadata gathered so far.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    /// The error that moved the machine to [`DecodeState::Failed`].
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Ask the engine for its next event.
    pub fn poll_engine(&mut self) -> DecoderStatus {
        self.engine.process_input()
    }

    /// Apply one engine event. Terminal states ignore further events.
    pub fn on_event(&mut self, event: DecoderStatus) -> DecodeState {
        if self.state.is_terminal() {
            return self.state;
        }
        trace!("decode event {} in state {}", event.name(), self.state.name());

        match self.transition(event) {
            Ok(next) => self.state = next,
            Err(err) => {
                self.error = Some(err);
                self.state = DecodeState::Failed;
            }
        }
        self.state
    }

    /// Consume the machine, yielding the report if it reached `Done`.
    ///
    /// The engine is dropped here, releasing its resources.
    pub fn finish(self) -> Result<DecodeReport, Error> {
        match self.state {
            DecodeState::Done => Ok(DecodeReport {
                info: self.info,
                durations: self.durations,
            }),
            DecodeState::Failed => Err(self.error.unwrap_or(Error::StreamCorrupt)),
            state => Err(Error::UnexpectedEvent {
                state: state.name(),
                event: "end of call",
            }),
        }
    }

    fn transition(&mut self, event: DecoderStatus) -> Result<DecodeState, Error> {
        use DecodeState::*;

        match (self.state, event) {
            (_, DecoderStatus::Error) => Err(Error::StreamCorrupt),
            (_, DecoderStatus::NeedMoreInput) => Err(Error::TruncatedInput),
            (state, DecoderStatus::Other(_)) => Ok(state),
            (HeaderPending, DecoderStatus::Success) => Err(Error::MissingBasicInfo),
            (_, DecoderStatus::Success) => Ok(Done),
            (HeaderPending, DecoderStatus::BasicInfo) => self.on_basic_info(),
            (FramePending, DecoderStatus::Frame) => self.on_frame_header(),
            (BufferPending, DecoderStatus::NeedImageOutBuffer) => self.on_buffer_request(),
            (FrameReady, DecoderStatus::FullImage) => Ok(self.on_full_image()),
            (state, event) => Err(Error::UnexpectedEvent {
                state: state.name(),
                event: event.name(),
            }),
        }
    }

    fn on_basic_info(&mut self) -> Result<DecodeState, Error> {
        let basic = self.engine.basic_info().map_err(|_| Error::StreamCorrupt)?;
        if basic.xsize == 0 || basic.ysize == 0 {
            return Err(Error::StreamCorrupt);
        }

        self.info.width = basic.xsize;
        self.info.height = basic.ysize;
        self.info.bit_depth = basic.bits_per_sample;
        self.format = PixelFormat::for_bit_depth(basic.bits_per_sample);
        if basic.have_animation {
            self.info.animation = Some(basic.animation.into());
        }

        if self.options.config_only && !basic.have_animation {
            self.info.frame_count = 1;
            return Ok(DecodeState::Done);
        }
        Ok(DecodeState::FramePending)
    }

    fn on_frame_header(&mut self) -> Result<DecodeState, Error> {
        let header = self.engine.frame_header().map_err(|_| Error::StreamCorrupt)?;

        let index = self.info.frame_count as usize;
        self.durations.truncate(index);
        self.durations.push(header.duration);
        self.current_frame = header;

        Ok(DecodeState::BufferPending)
    }

    fn on_buffer_request(&mut self) -> Result<DecodeState, Error> {
        if self.options.config_only {
            // Count the frame without paying for its pixels. The payload is
            // not validated.
            self.info.frame_count += 1;
            self.engine
                .skip_current_frame()
                .map_err(|_| Error::StreamCorrupt)?;
            return Ok(DecodeState::FramePending);
        }

        let frame_size = self
            .format
            .frame_size(self.info.width, self.info.height)
            .ok_or(Error::ImageTooLarge {
                width: self.info.width,
                height: self.info.height,
            })?;
        let engine_size = self
            .engine
            .image_out_buffer_size(&self.format)
            .map_err(|_| Error::StreamCorrupt)?;
        if engine_size != frame_size {
            return Err(Error::FrameSizeMismatch {
                expected: frame_size,
                engine: engine_size,
            });
        }

        let region = self.sink.frame_region(self.info.frame_count, frame_size)?;
        self.engine
            .set_image_out_buffer(&self.format, region)
            .map_err(|_| Error::StreamCorrupt)?;
        self.info.frame_count += 1;

        Ok(DecodeState::FrameReady)
    }

    fn on_full_image(&mut self) -> DecodeState {
        let animated = self.info.is_animated();
        if !self.options.decode_all || (animated && self.current_frame.is_last) {
            DecodeState::Done
        } else {
            DecodeState::FramePending
        }
    }
}

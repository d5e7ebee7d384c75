//! Test doubles for the engine protocol.
//!
//! - [`ScriptedDecoder`] replays a fixed list of events, for exercising the
//!   decode state machine one event at a time.
//! - [`MemoryCodec`] is a complete in-memory backend. Its container is a
//!   trivial header plus run-length coded byte planes, which is enough to
//!   round-trip pixels, carry animations and make lossy output shrink as the
//!   distance grows. Nothing about it resembles a real bitstream.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::engine::{
    AnimationHeader, Backend, BasicInfo, ColorEncoding, DecoderEngine, DecoderStatus,
    EncoderEngine, EncoderStatus, EventMask, FrameHeader, FrameSettings, OutputProgress,
    PixelFormat,
};
use crate::error::{EngineError, Error};

// ============================================================================
// Scripted decoder
// ============================================================================

/// Calls observed by a [`ScriptedDecoder`] or [`MemoryDecoder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderCalls {
    pub subscribed: Option<EventMask>,
    pub input_len: usize,
    pub input_closed: bool,
    pub process_calls: usize,
    pub skipped: u32,
    /// Length of every region bound with `set_image_out_buffer`.
    pub bound: Vec<usize>,
    pub formats: Vec<PixelFormat>,
}

/// Decoder that replays a fixed event script.
///
/// Bound regions are filled with `frame number + 1` when the script emits
/// `FullImage`. An exhausted script reports `NeedMoreInput`.
pub struct ScriptedDecoder<'buf> {
    events: VecDeque<DecoderStatus>,
    basic_info: Option<BasicInfo>,
    frames: Vec<FrameHeader>,
    frame_cursor: usize,
    buffer_size: Option<usize>,
    out: Option<&'buf mut [u8]>,
    calls: Rc<RefCell<DecoderCalls>>,
}

impl<'buf> ScriptedDecoder<'buf> {
    pub fn new(events: impl IntoIterator<Item = DecoderStatus>) -> Self {
        Self {
            events: events.into_iter().collect(),
            basic_info: None,
            frames: Vec::new(),
            frame_cursor: 0,
            buffer_size: None,
            out: None,
            calls: Rc::default(),
        }
    }

    pub fn with_basic_info(mut self, info: BasicInfo) -> Self {
        self.basic_info = Some(info);
        self
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = FrameHeader>) -> Self {
        self.frames = frames.into_iter().collect();
        self
    }

    /// Report this size from `image_out_buffer_size` instead of the real one.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Shared handle to the call log, usable after the engine is consumed.
    pub fn calls(&self) -> Rc<RefCell<DecoderCalls>> {
        Rc::clone(&self.calls)
    }
}

impl<'buf> DecoderEngine<'buf> for ScriptedDecoder<'buf> {
    fn subscribe_events(&mut self, events: EventMask) -> Result<(), EngineError> {
        self.calls.borrow_mut().subscribed = Some(events);
        Ok(())
    }

    fn set_input(&mut self, data: &'buf [u8]) -> Result<(), EngineError> {
        self.calls.borrow_mut().input_len = data.len();
        Ok(())
    }

    fn close_input(&mut self) {
        self.calls.borrow_mut().input_closed = true;
    }

    fn process_input(&mut self) -> DecoderStatus {
        self.calls.borrow_mut().process_calls += 1;
        let event = self.events.pop_front().unwrap_or(DecoderStatus::NeedMoreInput);
        if event == DecoderStatus::FullImage {
            self.frame_cursor += 1;
            if let Some(out) = self.out.take() {
                out.fill(self.frame_cursor as u8);
            }
        }
        event
    }

    fn basic_info(&self) -> Result<BasicInfo, EngineError> {
        self.basic_info.ok_or(EngineError::new("basic_info"))
    }

    fn frame_header(&self) -> Result<FrameHeader, EngineError> {
        self.frames
            .get(self.frame_cursor)
            .copied()
            .ok_or(EngineError::new("frame_header"))
    }

    fn image_out_buffer_size(&self, format: &PixelFormat) -> Result<usize, EngineError> {
        if let Some(size) = self.buffer_size {
            return Ok(size);
        }
        let info = self.basic_info()?;
        format
            .frame_size(info.xsize, info.ysize)
            .ok_or(EngineError::new("image_out_buffer_size"))
    }

    fn set_image_out_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: &'buf mut [u8],
    ) -> Result<(), EngineError> {
        let mut calls = self.calls.borrow_mut();
        calls.bound.push(buffer.len());
        calls.formats.push(*format);
        self.out = Some(buffer);
        Ok(())
    }

    fn skip_current_frame(&mut self) -> Result<(), EngineError> {
        self.calls.borrow_mut().skipped += 1;
        self.frame_cursor += 1;
        Ok(())
    }
}

// ============================================================================
// In-memory container
// ============================================================================

const MAGIC: &[u8; 4] = b"MEMC";
const HEADER_LEN: usize = 30;
const FRAME_HEADER_LEN: usize = 8;

/// Image-level fields of an in-memory container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub width: u32,
    pub height: u32,
    /// 8 or 16.
    pub bit_depth: u32,
    pub animation: Option<AnimationHeader>,
}

impl ContainerHeader {
    pub fn still(width: u32, height: u32, bit_depth: u32) -> Self {
        Self {
            width,
            height,
            bit_depth,
            animation: None,
        }
    }

    pub fn animated(width: u32, height: u32, tps_numerator: u32) -> Self {
        Self {
            width,
            height,
            bit_depth: 8,
            animation: Some(AnimationHeader {
                tps_numerator,
                tps_denominator: 1,
                num_loops: 0,
            }),
        }
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::for_bit_depth(self.bit_depth)
    }
}

/// Serialize frames of interleaved RGBA samples into a container.
///
/// 16-bit frames are given as big-endian sample bytes. Each frame is paired
/// with its duration in ticks.
pub fn write_container(header: &ContainerHeader, frames: &[(&[u8], u32)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.push(header.bit_depth as u8);
    out.push(u8::from(header.animation.is_some()));
    out.extend_from_slice(&header.width.to_le_bytes());
    out.extend_from_slice(&header.height.to_le_bytes());
    let anim = header.animation.unwrap_or_default();
    out.extend_from_slice(&anim.tps_numerator.to_le_bytes());
    out.extend_from_slice(&anim.tps_denominator.to_le_bytes());
    out.extend_from_slice(&anim.num_loops.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());

    let bytes_per_pixel = header.format().bytes_per_pixel();
    for (pixels, duration) in frames {
        let mut payload = Vec::new();
        pack_planes(pixels, bytes_per_pixel, &mut payload);
        out.extend_from_slice(&duration.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
    }
    out
}

fn pack_planes(pixels: &[u8], bytes_per_pixel: usize, out: &mut Vec<u8>) {
    for plane in 0..bytes_per_pixel {
        let mut run: Option<(u8, u8)> = None;
        for &value in pixels.iter().skip(plane).step_by(bytes_per_pixel) {
            run = match run {
                Some((current, len)) if current == value && len < u8::MAX => Some((current, len + 1)),
                Some((current, len)) => {
                    out.extend_from_slice(&[len, current]);
                    Some((value, 1))
                }
                None => Some((value, 1)),
            };
        }
        if let Some((current, len)) = run {
            out.extend_from_slice(&[len, current]);
        }
    }
}

fn unpack_planes(payload: &[u8], bytes_per_pixel: usize, out: &mut [u8]) -> Option<()> {
    if payload.len() % 2 != 0 || out.len() % bytes_per_pixel != 0 {
        return None;
    }
    let pixel_count = out.len() / bytes_per_pixel;
    let mut planar = Vec::with_capacity(out.len());
    for pair in payload.chunks_exact(2) {
        if pair[0] == 0 {
            return None;
        }
        planar.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
    }
    if planar.len() != out.len() {
        return None;
    }
    for (i, sample) in out.iter_mut().enumerate() {
        let (pixel, plane) = (i / bytes_per_pixel, i % bytes_per_pixel);
        *sample = planar[plane * pixel_count + pixel];
    }
    Some(())
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

// ============================================================================
// In-memory decoder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Frame,
    AwaitBuffer,
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    header: FrameHeader,
    payload_start: usize,
    payload_end: usize,
}

/// Decoder half of [`MemoryCodec`].
pub struct MemoryDecoder<'buf> {
    input: &'buf [u8],
    subscribed: EventMask,
    fail: Option<&'static str>,
    phase: Phase,
    pos: usize,
    header: Option<ContainerHeader>,
    frame_count: u32,
    frame_index: u32,
    frame: Option<PendingFrame>,
    skip: bool,
    out: Option<&'buf mut [u8]>,
    calls: Rc<RefCell<DecoderCalls>>,
}

impl<'buf> MemoryDecoder<'buf> {
    fn new(fail: Option<&'static str>, calls: Rc<RefCell<DecoderCalls>>) -> Self {
        Self {
            input: &[],
            subscribed: EventMask::empty(),
            fail,
            phase: Phase::Header,
            pos: 0,
            header: None,
            frame_count: 0,
            frame_index: 0,
            frame: None,
            skip: false,
            out: None,
            calls,
        }
    }

    fn check(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.fail == Some(operation) {
            return Err(EngineError::new(operation));
        }
        Ok(())
    }

    fn parse_header(&mut self) -> Result<ContainerHeader, DecoderStatus> {
        let data = self.input;
        let prefix = data.len().min(MAGIC.len());
        if data[..prefix] != MAGIC[..prefix] {
            return Err(DecoderStatus::Error);
        }
        if data.len() < HEADER_LEN {
            return Err(DecoderStatus::NeedMoreInput);
        }

        let bit_depth = data[4] as u32;
        if bit_depth != 8 && bit_depth != 16 {
            return Err(DecoderStatus::Error);
        }
        let animation = (data[5] & 1 == 1).then(|| AnimationHeader {
            tps_numerator: read_u32(data, 14),
            tps_denominator: read_u32(data, 18),
            num_loops: read_u32(data, 22),
        });
        self.frame_count = read_u32(data, 26);
        self.pos = HEADER_LEN;
        Ok(ContainerHeader {
            width: read_u32(data, 6),
            height: read_u32(data, 10),
            bit_depth,
            animation,
        })
    }

    fn parse_frame(&mut self) -> Result<PendingFrame, DecoderStatus> {
        let data = self.input;
        if data.len() < self.pos + FRAME_HEADER_LEN {
            return Err(DecoderStatus::NeedMoreInput);
        }
        let duration = read_u32(data, self.pos);
        let payload_len = read_u32(data, self.pos + 4) as usize;
        let payload_start = self.pos + FRAME_HEADER_LEN;
        self.pos = payload_start;
        Ok(PendingFrame {
            header: FrameHeader {
                duration,
                is_last: self.frame_index + 1 == self.frame_count,
            },
            payload_start,
            payload_end: payload_start + payload_len,
        })
    }

    /// Decode the pending frame into the bound region.
    fn write_frame(&mut self, frame: PendingFrame) -> DecoderStatus {
        let Some(header) = self.header else {
            return DecoderStatus::Error;
        };
        let Some(out) = self.out.take() else {
            return DecoderStatus::Error;
        };
        let payload = &self.input[frame.payload_start..frame.payload_end];
        match unpack_planes(payload, header.format().bytes_per_pixel(), out) {
            Some(()) => DecoderStatus::FullImage,
            None => DecoderStatus::Error,
        }
    }
}

impl<'buf> DecoderEngine<'buf> for MemoryDecoder<'buf> {
    fn subscribe_events(&mut self, events: EventMask) -> Result<(), EngineError> {
        self.check("subscribe_events")?;
        self.subscribed = events;
        self.calls.borrow_mut().subscribed = Some(events);
        Ok(())
    }

    fn set_input(&mut self, data: &'buf [u8]) -> Result<(), EngineError> {
        self.check("set_input")?;
        self.input = data;
        self.calls.borrow_mut().input_len = data.len();
        Ok(())
    }

    fn close_input(&mut self) {
        self.calls.borrow_mut().input_closed = true;
    }

    fn process_input(&mut self) -> DecoderStatus {
        self.calls.borrow_mut().process_calls += 1;
        loop {
            match self.phase {
                Phase::Header => {
                    let header = match self.parse_header() {
                        Ok(header) => header,
                        Err(status) => return status,
                    };
                    self.header = Some(header);
                    self.phase = Phase::Frame;
                    if self.subscribed.contains(EventMask::BASIC_INFO) {
                        return DecoderStatus::BasicInfo;
                    }
                }
                Phase::Frame => {
                    if self.frame_index == self.frame_count {
                        self.phase = Phase::Finished;
                        continue;
                    }
                    let frame = match self.parse_frame() {
                        Ok(frame) => frame,
                        Err(status) => return status,
                    };
                    self.frame = Some(frame);
                    self.phase = Phase::AwaitBuffer;
                    if self.subscribed.contains(EventMask::FRAME) {
                        return DecoderStatus::Frame;
                    }
                }
                Phase::AwaitBuffer => {
                    let Some(frame) = self.frame else {
                        return DecoderStatus::Error;
                    };
                    let wants_pixels = self.subscribed.contains(EventMask::FULL_IMAGE);
                    if wants_pixels && !self.skip && self.out.is_none() {
                        return DecoderStatus::NeedImageOutBuffer;
                    }
                    if self.input.len() < frame.payload_end {
                        return DecoderStatus::NeedMoreInput;
                    }

                    let status = (wants_pixels && !self.skip).then(|| self.write_frame(frame));
                    self.pos = frame.payload_end;
                    self.frame_index += 1;
                    self.frame = None;
                    self.skip = false;
                    self.phase = Phase::Frame;
                    if let Some(status) = status {
                        return status;
                    }
                }
                Phase::Finished => return DecoderStatus::Success,
            }
        }
    }

    fn basic_info(&self) -> Result<BasicInfo, EngineError> {
        self.check("basic_info")?;
        let header = self.header.ok_or(EngineError::new("basic_info"))?;
        Ok(BasicInfo {
            xsize: header.width,
            ysize: header.height,
            bits_per_sample: header.bit_depth,
            alpha_bits: header.bit_depth,
            num_extra_channels: 1,
            uses_original_profile: true,
            have_animation: header.animation.is_some(),
            animation: header.animation.unwrap_or_default(),
        })
    }

    fn frame_header(&self) -> Result<FrameHeader, EngineError> {
        self.check("frame_header")?;
        self.frame
            .map(|frame| frame.header)
            .ok_or(EngineError::new("frame_header"))
    }

    fn image_out_buffer_size(&self, format: &PixelFormat) -> Result<usize, EngineError> {
        self.check("image_out_buffer_size")?;
        let header = self.header.ok_or(EngineError::new("image_out_buffer_size"))?;
        format
            .frame_size(header.width, header.height)
            .ok_or(EngineError::new("image_out_buffer_size"))
    }

    fn set_image_out_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: &'buf mut [u8],
    ) -> Result<(), EngineError> {
        self.check("set_image_out_buffer")?;
        let header = self.header.ok_or(EngineError::new("set_image_out_buffer"))?;
        let expected = format.frame_size(header.width, header.height);
        if self.phase != Phase::AwaitBuffer
            || *format != header.format()
            || expected != Some(buffer.len())
        {
            return Err(EngineError::new("set_image_out_buffer"));
        }
        let mut calls = self.calls.borrow_mut();
        calls.bound.push(buffer.len());
        calls.formats.push(*format);
        self.out = Some(buffer);
        Ok(())
    }

    fn skip_current_frame(&mut self) -> Result<(), EngineError> {
        self.check("skip_current_frame")?;
        if self.phase != Phase::AwaitBuffer {
            return Err(EngineError::new("skip_current_frame"));
        }
        self.calls.borrow_mut().skipped += 1;
        self.skip = true;
        Ok(())
    }
}

// ============================================================================
// In-memory encoder
// ============================================================================

/// Calls observed by a [`MemoryEncoder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderCalls {
    pub basic_info: Option<BasicInfo>,
    pub color_encoding: Option<ColorEncoding>,
    pub frame_settings: Option<FrameSettings>,
    pub frames_added: usize,
    pub input_closed: bool,
    /// Size of the region offered to every `process_output` call.
    pub regions: Vec<usize>,
}

/// Encoder half of [`MemoryCodec`].
///
/// Lossy frames drop low bits from every sample, more as the distance grows,
/// so coarser settings always produce runs at least as long.
pub struct MemoryEncoder {
    fail: Option<&'static str>,
    output: Vec<u8>,
    emitted: usize,
    calls: Rc<RefCell<EncoderCalls>>,
}

impl MemoryEncoder {
    fn check(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.fail == Some(operation) {
            return Err(EngineError::new(operation));
        }
        Ok(())
    }

    /// Number of low bits cleared for a lossy distance.
    pub fn dropped_bits(distance: f32) -> u32 {
        (distance.max(0.0) as u32).min(7)
    }
}

impl EncoderEngine for MemoryEncoder {
    fn set_basic_info(&mut self, info: &BasicInfo) -> Result<(), EngineError> {
        self.check("set_basic_info")?;
        if info.xsize == 0 || info.ysize == 0 || info.bits_per_sample != 8 {
            return Err(EngineError::new("set_basic_info"));
        }
        self.calls.borrow_mut().basic_info = Some(*info);
        Ok(())
    }

    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> Result<(), EngineError> {
        self.check("set_color_encoding")?;
        self.calls.borrow_mut().color_encoding = Some(*encoding);
        Ok(())
    }

    fn create_frame_settings(&mut self, settings: &FrameSettings) -> Result<(), EngineError> {
        self.check("create_frame_settings")?;
        self.calls.borrow_mut().frame_settings = Some(*settings);
        Ok(())
    }

    fn add_image_frame(&mut self, format: &PixelFormat, pixels: &[u8]) -> Result<(), EngineError> {
        self.check("add_image_frame")?;
        let calls = self.calls.borrow().clone();
        let (Some(info), Some(settings)) = (calls.basic_info, calls.frame_settings) else {
            return Err(EngineError::new("add_image_frame"));
        };
        if *format != PixelFormat::RGBA8 || format.frame_size(info.xsize, info.ysize) != Some(pixels.len()) {
            return Err(EngineError::new("add_image_frame"));
        }

        let frame: Vec<u8> = if settings.lossless {
            pixels.to_vec()
        } else {
            let mask = 0xFFu8 << Self::dropped_bits(settings.distance);
            pixels.iter().map(|&v| v & mask).collect()
        };
        let header = ContainerHeader::still(info.xsize, info.ysize, 8);
        self.output = write_container(&header, &[(frame.as_slice(), 0)]);
        self.calls.borrow_mut().frames_added += 1;
        Ok(())
    }

    fn close_input(&mut self) {
        self.calls.borrow_mut().input_closed = true;
    }

    fn process_output(&mut self, out: &mut [u8]) -> OutputProgress {
        self.calls.borrow_mut().regions.push(out.len());
        let closed = self.calls.borrow().input_closed;
        if self.fail == Some("process_output") || !closed || self.output.is_empty() {
            return OutputProgress {
                status: EncoderStatus::Error,
                written: 0,
            };
        }

        if self.fail == Some("overrun") {
            return OutputProgress {
                status: EncoderStatus::NeedMoreOutput,
                written: out.len() + 1,
            };
        }

        // Like libjxl, fill the region before asking for more room.
        let remaining = &self.output[self.emitted..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.emitted += n;

        let status = if self.emitted == self.output.len() {
            EncoderStatus::Success
        } else {
            EncoderStatus::NeedMoreOutput
        };
        OutputProgress { status, written: n }
    }
}

// ============================================================================
// Backend
// ============================================================================

/// In-memory backend producing [`MemoryDecoder`] and [`MemoryEncoder`].
#[derive(Debug, Clone)]
pub struct MemoryCodec {
    fail: Option<&'static str>,
    decoder_calls: Rc<RefCell<DecoderCalls>>,
    encoder_calls: Rc<RefCell<EncoderCalls>>,
}

impl Default for MemoryCodec {
    fn default() -> Self {
        Self {
            fail: None,
            decoder_calls: Rc::default(),
            encoder_calls: Rc::default(),
        }
    }
}

impl MemoryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named engine operation fail. `"create_decoder"` and
    /// `"create_encoder"` fail engine construction, `"overrun"` makes the
    /// encoder claim one byte more than the region it was offered.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.fail = Some(operation);
        self
    }

    /// Calls seen by the most recently created decoder.
    pub fn decoder_calls(&self) -> DecoderCalls {
        self.decoder_calls.borrow().clone()
    }

    /// Calls seen by the most recently created encoder.
    pub fn encoder_calls(&self) -> EncoderCalls {
        self.encoder_calls.borrow().clone()
    }
}

impl Backend for MemoryCodec {
    type Decoder<'buf> = MemoryDecoder<'buf>;
    type Encoder = MemoryEncoder;

    fn decoder<'buf>(&self) -> Result<MemoryDecoder<'buf>, Error> {
        if self.fail == Some("create_decoder") {
            return Err(Error::EngineInit("create_decoder"));
        }
        *self.decoder_calls.borrow_mut() = DecoderCalls::default();
        Ok(MemoryDecoder::new(self.fail, Rc::clone(&self.decoder_calls)))
    }

    fn encoder(&self) -> Result<MemoryEncoder, Error> {
        if self.fail == Some("create_encoder") {
            return Err(Error::EngineInit("create_encoder"));
        }
        *self.encoder_calls.borrow_mut() = EncoderCalls::default();
        Ok(MemoryEncoder {
            fail: self.fail,
            output: Vec::new(),
            emitted: 0,
            calls: Rc::clone(&self.encoder_calls),
        })
    }
}

//! C ABI for hosts that manage linear memory themselves.
//!
//! A host allocates input and output blocks with [`allocate`], calls
//! `decode` / `encode`, and releases every block (including the one `encode`
//! returns) with [`deallocate`].
//!
//! Decoding is a two-pass protocol. A config-only pass reports dimensions,
//! bit depth and frame count, from which the host sizes the pixel block
//! (`width * height * 4 * (bit_depth == 16 ? 2 : 1) * frames`) and the
//! duration block (`frames` entries), then decodes for real.
//!
//! `decode` and `encode` are exported with the `libjxl` feature. The generic
//! [`decode_raw`] and [`encode_raw`] behind them work with any backend.

use std::ffi::{c_int, c_void};
use std::ptr;
use std::slice;

use jxlbridge_core::decode::{run_decoder, DecodeOptions, DecodeReport, FrameSink};
use jxlbridge_core::{Backend, EncodeSettings, Error};
use libc::size_t;
use log::warn;

/// Allocate a block of `size` bytes with the system allocator.
///
/// Returns null if the allocation fails.
#[no_mangle]
pub extern "C" fn allocate(size: size_t) -> *mut u8 {
    // SAFETY: malloc has no preconditions.
    unsafe { libc::malloc(size).cast::<u8>() }
}

/// Release a block from [`allocate`] or from `encode`.
///
/// # Safety
///
/// `ptr` must be null or a block returned by [`allocate`] / `encode` that has
/// not been released yet.
#[no_mangle]
pub unsafe extern "C" fn deallocate(ptr: *mut u8) {
    libc::free(ptr.cast::<c_void>())
}

/// Frame sink over a host block of unknown length.
///
/// The host vouches for the length by sizing the block from a config-only
/// pass.
struct RawFrames {
    base: *mut u8,
}

impl<'buf> FrameSink<'buf> for RawFrames {
    fn frame_region(&mut self, frame_index: u32, frame_size: usize) -> Result<&'buf mut [u8], Error> {
        let range = jxlbridge_core::decode::frame_range(frame_index, frame_size);
        match range {
            Some(range) if !self.base.is_null() => {
                // SAFETY: the host guarantees the block holds every frame the
                // stream reports; regions are handed out once each, in order.
                Ok(unsafe { slice::from_raw_parts_mut(self.base.add(range.start), frame_size) })
            }
            _ => Err(Error::OutputTooSmall {
                frame: frame_index,
                start: 0,
                end: frame_size,
                available: 0,
            }),
        }
    }
}

/// Write `value` through `out` unless it is null.
unsafe fn store<T>(out: *mut T, value: T) {
    if !out.is_null() {
        *out = value;
    }
}

/// Decode `compressed` with `backend` into host-provided blocks.
///
/// Returns 1 on success and 0 on failure. Metadata outputs are written only
/// on success; pixels of a failed call may be partially written. Any output
/// pointer may be null, in which case that output is skipped. `out_pixels`
/// is ignored when `config_only` is set.
///
/// # Safety
///
/// - `compressed` must be valid for `compressed_size` bytes, or null with a
///   size of 0
/// - `out_durations` must be null or hold one `u32` per reported frame
/// - `out_pixels` must be null or large enough for every frame decoded, as
///   sized from a config-only pass over the same input
/// - other output pointers must be null or valid for one write
#[allow(clippy::too_many_arguments)]
pub unsafe fn decode_raw<B: Backend>(
    backend: &B,
    compressed: *const u8,
    compressed_size: size_t,
    config_only: bool,
    decode_all: bool,
    out_width: *mut u32,
    out_height: *mut u32,
    out_bit_depth: *mut u32,
    out_frame_count: *mut u32,
    out_durations: *mut u32,
    out_pixels: *mut u8,
) -> c_int {
    let data: &[u8] = if compressed.is_null() {
        if compressed_size != 0 {
            warn!("decode: null input with size {}", compressed_size);
            return 0;
        }
        &[]
    } else {
        slice::from_raw_parts(compressed, compressed_size)
    };

    let options = DecodeOptions {
        config_only,
        decode_all,
    };
    let result = backend.decoder().and_then(|engine| {
        let sink = RawFrames {
            base: if config_only { ptr::null_mut() } else { out_pixels },
        };
        run_decoder(engine, data, options, sink)
    });

    match result {
        Ok(report) => {
            write_report(&report, out_width, out_height, out_bit_depth, out_frame_count, out_durations);
            1
        }
        Err(err) => {
            warn!("decode: {}", err);
            0
        }
    }
}

unsafe fn write_report(
    report: &DecodeReport,
    out_width: *mut u32,
    out_height: *mut u32,
    out_bit_depth: *mut u32,
    out_frame_count: *mut u32,
    out_durations: *mut u32,
) {
    store(out_width, report.info.width);
    store(out_height, report.info.height);
    store(out_bit_depth, report.info.bit_depth);
    store(out_frame_count, report.info.frame_count);
    if !out_durations.is_null() {
        let durations = slice::from_raw_parts_mut(out_durations, report.durations.len());
        durations.copy_from_slice(&report.durations);
    }
}

/// Encode RGBA8 pixels with `backend`.
///
/// Returns a block from [`allocate`] holding the compressed bytes, with its
/// length in `*out_size`. On failure returns null and sets `*out_size` to 0.
///
/// # Safety
///
/// `pixels` must be valid for `width * height * 4` bytes and `out_size`
/// must be null or valid for one write.
pub unsafe fn encode_raw<B: Backend>(
    backend: &B,
    pixels: *const u8,
    width: c_int,
    height: c_int,
    out_size: *mut size_t,
    quality: c_int,
    effort: c_int,
) -> *mut u8 {
    store(out_size, 0);
    match encode_checked(backend, pixels, width, height, quality, effort) {
        Ok(bytes) => {
            let out = allocate(bytes.len());
            if out.is_null() {
                warn!("encode: allocating {} bytes failed", bytes.len());
                return ptr::null_mut();
            }
            ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
            store(out_size, bytes.len());
            out
        }
        Err(err) => {
            warn!("encode: {}", err);
            ptr::null_mut()
        }
    }
}

unsafe fn encode_checked<B: Backend>(
    backend: &B,
    pixels: *const u8,
    width: c_int,
    height: c_int,
    quality: c_int,
    effort: c_int,
) -> Result<Vec<u8>, Error> {
    let w = u32::try_from(width).unwrap_or(0);
    let h = u32::try_from(height).unwrap_or(0);
    if w == 0 || h == 0 {
        return Err(Error::InvalidDimensions { width: w, height: h });
    }
    let settings = EncodeSettings {
        quality: u32::try_from(quality).map_err(|_| Error::InvalidQuality(quality.into()))?,
        effort: u32::try_from(effort).map_err(|_| Error::InvalidEffort(effort.into()))?,
    };
    let len = (w as usize)
        .checked_mul(h as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or(Error::ImageTooLarge { width: w, height: h })?;
    if pixels.is_null() {
        return Err(Error::InvalidPixelData {
            expected: len,
            actual: 0,
        });
    }

    let pixels = slice::from_raw_parts(pixels, len);
    jxlbridge_core::encode(backend, pixels, w, h, &settings)
}

/// Decode with libjxl. See [`decode_raw`].
///
/// # Safety
///
/// As for [`decode_raw`].
#[cfg(feature = "libjxl")]
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn decode(
    compressed: *const u8,
    compressed_size: size_t,
    config_only: c_int,
    decode_all: c_int,
    out_width: *mut u32,
    out_height: *mut u32,
    out_bit_depth: *mut u32,
    out_frame_count: *mut u32,
    out_durations: *mut u32,
    out_pixels: *mut u8,
) -> c_int {
    decode_raw(
        &jxlbridge_core::LibJxl,
        compressed,
        compressed_size,
        config_only != 0,
        decode_all != 0,
        out_width,
        out_height,
        out_bit_depth,
        out_frame_count,
        out_durations,
        out_pixels,
    )
}

/// Encode with libjxl. See [`encode_raw`].
///
/// # Safety
///
/// As for [`encode_raw`].
#[cfg(feature = "libjxl")]
#[no_mangle]
pub unsafe extern "C" fn encode(
    pixels: *const u8,
    width: c_int,
    height: c_int,
    out_size: *mut size_t,
    quality: c_int,
    effort: c_int,
) -> *mut u8 {
    encode_raw(&jxlbridge_core::LibJxl, pixels, width, height, out_size, quality, effort)
}

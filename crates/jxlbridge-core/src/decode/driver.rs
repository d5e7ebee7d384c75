//! The decode loop.

use log::{debug, warn};

use super::frames::FrameSink;
use super::state::DecodeMachine;
use super::types::{DecodeOptions, DecodeReport};
use crate::engine::{DecoderEngine, EventMask};
use crate::error::Error;

/// Events every decode call subscribes to.
pub const DECODE_EVENTS: EventMask = EventMask::BASIC_INFO
    .union(EventMask::FRAME)
    .union(EventMask::FULL_IMAGE);

/// Drive `engine` over `compressed` until it finishes or fails.
///
/// Frames are written into regions handed out by `sink`, frame `i` at index
/// `i`. Pixels of a failed call may be partially written but never outside
/// the regions the sink provided. The engine is dropped before returning.
///
/// # Errors
///
/// - [`Error::EngineInit`] if the engine rejects subscription or input
/// - [`Error::StreamCorrupt`] if the engine reports a parse error or rejects
///   a header query, frame skip or output buffer request
/// - [`Error::TruncatedInput`] if the engine runs out of input
/// - [`Error::OutputTooSmall`] if the sink cannot hold a frame
pub fn run_decoder<'buf, E, S>(
    mut engine: E,
    compressed: &'buf [u8],
    options: DecodeOptions,
    sink: S,
) -> Result<DecodeReport, Error>
where
    E: DecoderEngine<'buf>,
    S: FrameSink<'buf>,
{
    engine
        .subscribe_events(DECODE_EVENTS)
        .map_err(|e| Error::EngineInit(e.operation))?;
    engine
        .set_input(compressed)
        .map_err(|e| Error::EngineInit(e.operation))?;
    engine.close_input();

    let mut machine = DecodeMachine::new(engine, sink, options);
    loop {
        let event = machine.poll_engine();
        if machine.on_event(event).is_terminal() {
            break;
        }
    }

    match machine.finish() {
        Ok(report) => {
            debug!(
                "decoded {}x{} at {} bits, {} frame(s)",
                report.info.width, report.info.height, report.info.bit_depth, report.info.frame_count
            );
            Ok(report)
        }
        Err(err) => {
            warn!("decode failed: {}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::frames::{frame_ref, FrameBuffer, NoFrames};
    use crate::engine::{Backend, DecoderStatus};
    use crate::testing::{write_container, ContainerHeader, MemoryCodec, ScriptedDecoder};

    fn red_2x2() -> Vec<u8> {
        [255u8, 0, 0, 255].repeat(4)
    }

    fn three_frame_animation() -> Vec<u8> {
        let frames: Vec<Vec<u8>> = (1..=3u8).map(|i| vec![i * 10; 2 * 2 * 4]).collect();
        write_container(
            &ContainerHeader::animated(2, 2, 100),
            &[(frames[0].as_slice(), 10), (frames[1].as_slice(), 20), (frames[2].as_slice(), 30)],
        )
    }

    #[test]
    fn test_subscribes_and_closes_input() {
        let codec = MemoryCodec::new();
        let data = write_container(&ContainerHeader::still(2, 2, 8), &[(red_2x2().as_slice(), 0)]);
        run_decoder(codec.decoder().unwrap(), &data, DecodeOptions::probe(), NoFrames).unwrap();

        let calls = codec.decoder_calls();
        assert_eq!(calls.subscribed.map(|mask| mask.bits()), Some(0x1440));
        assert_eq!(calls.input_len, data.len());
        assert!(calls.input_closed);
    }

    #[test]
    fn test_probe_still_image() {
        let codec = MemoryCodec::new();
        let data = write_container(&ContainerHeader::still(2, 2, 8), &[(red_2x2().as_slice(), 0)]);
        let report = run_decoder(codec.decoder().unwrap(), &data, DecodeOptions::probe(), NoFrames).unwrap();

        assert_eq!(report.info.width, 2);
        assert_eq!(report.info.height, 2);
        assert_eq!(report.info.bit_depth, 8);
        assert_eq!(report.info.frame_count, 1);
        assert!(codec.decoder_calls().bound.is_empty());
    }

    #[test]
    fn test_decode_red_2x2() {
        let codec = MemoryCodec::new();
        let data = write_container(&ContainerHeader::still(2, 2, 8), &[(red_2x2().as_slice(), 0)]);
        let mut pixels = vec![0u8; 16];
        let report = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::first_frame(),
            FrameBuffer::new(&mut pixels),
        )
        .unwrap();

        assert_eq!(report.info.frame_count, 1);
        assert_eq!(report.durations, vec![0]);
        assert_eq!(pixels, red_2x2());
    }

    #[test]
    fn test_probe_animation_counts_frames_and_durations() {
        let codec = MemoryCodec::new();
        let data = three_frame_animation();
        let report = run_decoder(codec.decoder().unwrap(), &data, DecodeOptions::probe(), NoFrames).unwrap();

        assert_eq!(report.info.frame_count, 3);
        assert_eq!(report.durations, vec![10, 20, 30]);
        assert_eq!(
            report.info.animation.map(|a| a.tps_numerator),
            Some(100)
        );
        assert_eq!(codec.decoder_calls().skipped, 3);
    }

    #[test]
    fn test_decode_all_places_frames_back_to_back() {
        let codec = MemoryCodec::new();
        let data = three_frame_animation();
        let mut pixels = vec![0u8; 3 * 16];
        let report = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::all_frames(),
            FrameBuffer::new(&mut pixels),
        )
        .unwrap();

        assert_eq!(report.info.frame_count, 3);
        assert_eq!(report.durations, vec![10, 20, 30]);
        for i in 0..3u32 {
            let frame = frame_ref(&pixels, i, 16).unwrap();
            assert!(frame.iter().all(|&b| b == (i as u8 + 1) * 10));
        }
    }

    #[test]
    fn test_first_frame_of_animation_stops_early() {
        let codec = MemoryCodec::new();
        let data = three_frame_animation();
        let mut pixels = vec![0u8; 16];
        let report = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::first_frame(),
            FrameBuffer::new(&mut pixels),
        )
        .unwrap();

        assert_eq!(report.info.frame_count, 1);
        assert_eq!(report.durations, vec![10]);
        assert!(pixels.iter().all(|&b| b == 10));
    }

    #[test]
    fn test_decode_all_of_still_image_yields_one_frame() {
        let codec = MemoryCodec::new();
        let data = write_container(&ContainerHeader::still(2, 2, 8), &[(red_2x2().as_slice(), 0)]);
        let mut pixels = vec![0u8; 32];
        let report = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::all_frames(),
            FrameBuffer::new(&mut pixels),
        )
        .unwrap();

        assert_eq!(report.info.frame_count, 1);
        assert_eq!(&pixels[..16], red_2x2().as_slice());
        assert_eq!(&pixels[16..], &[0u8; 16]);
    }

    #[test]
    fn test_sixteen_bit_frames_are_big_endian() {
        let codec = MemoryCodec::new();
        let samples: Vec<u8> = [0x1234u16, 0xABCD, 0x0001, 0xFFFF]
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();
        let data = write_container(&ContainerHeader::still(1, 1, 16), &[(samples.as_slice(), 0)]);
        let mut pixels = vec![0u8; 8];
        let report = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::first_frame(),
            FrameBuffer::new(&mut pixels),
        )
        .unwrap();

        assert_eq!(report.info.bit_depth, 16);
        assert_eq!(pixels, samples);
    }

    #[test]
    fn test_truncated_input_fails_inside_region() {
        let codec = MemoryCodec::new();
        let data = three_frame_animation();
        let truncated = &data[..data.len() - 5];
        let mut pixels = vec![0xEEu8; 3 * 16 + 8];
        let result = run_decoder(
            codec.decoder().unwrap(),
            truncated,
            DecodeOptions::all_frames(),
            FrameBuffer::new(&mut pixels[..3 * 16]),
        );

        assert_eq!(result, Err(Error::TruncatedInput));
        assert_eq!(&pixels[3 * 16..], &[0xEEu8; 8]);
    }

    #[test]
    fn test_corrupt_input_fails() {
        let codec = MemoryCodec::new();
        let result = run_decoder(
            codec.decoder().unwrap(),
            b"not an image at all",
            DecodeOptions::probe(),
            NoFrames,
        );
        assert_eq!(result, Err(Error::StreamCorrupt));
    }

    #[test]
    fn test_empty_input_is_truncated() {
        let codec = MemoryCodec::new();
        let result = run_decoder(codec.decoder().unwrap(), &[], DecodeOptions::probe(), NoFrames);
        assert_eq!(result, Err(Error::TruncatedInput));
    }

    #[test]
    fn test_region_too_small_fails() {
        let codec = MemoryCodec::new();
        let data = three_frame_animation();
        let mut pixels = vec![0u8; 2 * 16];
        let result = run_decoder(
            codec.decoder().unwrap(),
            &data,
            DecodeOptions::all_frames(),
            FrameBuffer::new(&mut pixels),
        );
        assert!(matches!(result, Err(Error::OutputTooSmall { frame: 2, .. })));
    }

    #[test]
    fn test_subscription_failure_is_engine_init() {
        let codec = MemoryCodec::new().failing("subscribe_events");
        let result = run_decoder(codec.decoder().unwrap(), &[], DecodeOptions::probe(), NoFrames);
        assert_eq!(result, Err(Error::EngineInit("subscribe_events")));
    }

    #[test]
    fn test_rejected_buffer_calls_are_stream_corrupt() {
        let data = three_frame_animation();
        let cases = [
            ("image_out_buffer_size", DecodeOptions::all_frames()),
            ("set_image_out_buffer", DecodeOptions::all_frames()),
            ("skip_current_frame", DecodeOptions::probe()),
        ];
        for (op, options) in cases {
            let codec = MemoryCodec::new().failing(op);
            let mut pixels = vec![0u8; 3 * 16];
            let result = run_decoder(
                codec.decoder().unwrap(),
                &data,
                options,
                FrameBuffer::new(&mut pixels),
            );
            assert_eq!(result, Err(Error::StreamCorrupt), "{}", op);
        }
    }

    #[test]
    fn test_scripted_unsubscribed_events_are_skipped() {
        let info = crate::engine::BasicInfo {
            xsize: 1,
            ysize: 1,
            bits_per_sample: 8,
            ..Default::default()
        };
        let engine = ScriptedDecoder::new([
            DecoderStatus::Other(0x20),
            DecoderStatus::BasicInfo,
            DecoderStatus::Other(0x80),
        ])
        .with_basic_info(info);
        let calls = engine.calls();
        let report = run_decoder(engine, &[], DecodeOptions::probe(), NoFrames).unwrap();

        assert_eq!(report.info.frame_count, 1);
        assert_eq!(calls.borrow().process_calls, 2);
    }
}

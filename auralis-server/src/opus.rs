//! Opus/WebM encoding for mastered chunks.
//!
//! Fixed configuration: WebM container, Opus codec, 192 kbps VBR, complexity
//! 10, application=audio. Opus only accepts 8/12/16/24/48 kHz input, so the
//! writer resamples the pipeline's canonical 44.1 kHz rate up to 48 kHz
//! immediately before handing frames to the encoder; the WebM `CodecPrivate`
//! (OpusHead) always records 48 kHz regardless of the source rate.

use audiopus::coder::Encoder as OpusEncoder;
use audiopus::{Application, Bitrate, Channels as OpusChannels, SampleRate};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::io::Cursor;
use webm::mux::{AudioCodecId, SegmentBuilder, SegmentMode, Writer};

use crate::error::AuralisError;

const OPUS_SAMPLE_RATE: u32 = 48_000;
const FRAME_MS: u32 = 20;
const FRAME_SAMPLES: usize = (OPUS_SAMPLE_RATE as usize * FRAME_MS as usize) / 1000; // 960
const OPUS_PRESKIP_SAMPLES: u16 = 312;

fn opus_head_codec_private(channels: u8) -> [u8; 19] {
    let mut head = [0u8; 19];
    head[0..8].copy_from_slice(b"OpusHead");
    head[8] = 1;
    head[9] = channels;
    head[10..12].copy_from_slice(&OPUS_PRESKIP_SAMPLES.to_le_bytes());
    head[12..16].copy_from_slice(&OPUS_SAMPLE_RATE.to_le_bytes());
    head[16..18].copy_from_slice(&0i16.to_le_bytes());
    head[18] = 0;
    head
}

fn build_resampler(source_rate: u32, channels: usize) -> Result<SincFixedIn<f32>, AuralisError> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    SincFixedIn::<f32>::new(
        OPUS_SAMPLE_RATE as f64 / source_rate as f64,
        2.0,
        params,
        1024,
        channels,
    )
    .map_err(|e| AuralisError::EncodeError { reason: format!("resampler init failed: {e}") })
}

/// Encode interleaved-by-channel PCM (channel-major, `(channels, frames)`) at
/// `source_rate` to a WebM/Opus byte blob. Mono input is duplicated to
/// stereo. Constructs a fresh encoder and resampler per call, so concurrent
/// calls are safe.
pub fn encode(pcm: &[Vec<f32>], source_rate: u32) -> Result<Vec<u8>, AuralisError> {
    let channels_in = pcm.len();
    if channels_in == 0 {
        return Err(AuralisError::EncodeError { reason: "empty PCM buffer".to_string() });
    }

    let stereo: Vec<Vec<f32>> = if channels_in == 1 {
        vec![pcm[0].clone(), pcm[0].clone()]
    } else {
        vec![pcm[0].clone(), pcm[1].clone()]
    };

    let resampled = if source_rate == OPUS_SAMPLE_RATE {
        stereo
    } else {
        let mut resampler = build_resampler(source_rate, 2)?;
        resample_all(&mut resampler, stereo)?
    };

    let mut encoder = OpusEncoder::new(SampleRate::Hz48000, OpusChannels::Stereo, Application::Audio)
        .map_err(|e| AuralisError::EncodeError { reason: format!("encoder init failed: {e}") })?;
    encoder
        .set_bitrate(Bitrate::BitsPerSecond(192_000))
        .map_err(|e| AuralisError::EncodeError { reason: format!("set_bitrate failed: {e}") })?;
    encoder
        .set_vbr(true)
        .map_err(|e| AuralisError::EncodeError { reason: format!("set_vbr failed: {e}") })?;
    encoder
        .set_complexity(10)
        .map_err(|e| AuralisError::EncodeError { reason: format!("set_complexity failed: {e}") })?;

    let buffer = Cursor::new(Vec::<u8>::new());
    let writer = Writer::new(buffer);
    let builder = SegmentBuilder::new(writer)
        .map_err(|e| AuralisError::EncodeError { reason: format!("segment builder failed: {e}") })?;
    let builder = builder
        .set_mode(SegmentMode::File)
        .map_err(|e| AuralisError::EncodeError { reason: format!("set_mode failed: {e}") })?;

    let codec_private = opus_head_codec_private(2);
    let (builder, track) = builder
        .add_audio_track(OPUS_SAMPLE_RATE, 2, AudioCodecId::Opus, None)
        .map_err(|e| AuralisError::EncodeError { reason: format!("add_audio_track failed: {e}") })?;
    let builder = builder
        .set_codec_private(track, &codec_private)
        .map_err(|e| AuralisError::EncodeError { reason: format!("set_codec_private failed: {e}") })?;

    let mut segment = builder.build();

    let interleaved = interleave(&resampled);
    let total_frames = interleaved.len() / 2;
    let mut encoded_frame = vec![0u8; 4000];
    let mut timestamp_ns = 0u64;

    let mut offset = 0usize;
    while offset < total_frames {
        let take = FRAME_SAMPLES.min(total_frames - offset);
        let mut frame: Vec<f32> = interleaved[offset * 2..(offset + take) * 2].to_vec();
        if take < FRAME_SAMPLES {
            frame.resize(FRAME_SAMPLES * 2, 0.0);
        }

        let len = encoder
            .encode_float(&frame, &mut encoded_frame)
            .map_err(|e| AuralisError::EncodeError { reason: format!("opus encode failed: {e}") })?;

        segment
            .add_frame(track, &encoded_frame[..len], timestamp_ns, true)
            .map_err(|e| AuralisError::EncodeError { reason: format!("mux add_frame failed: {e}") })?;

        timestamp_ns += (FRAME_MS as u64) * 1_000_000;
        offset += take;
    }

    let writer = segment
        .finalize(None)
        .map_err(|_| AuralisError::EncodeError { reason: "segment finalize failed".to_string() })?;

    Ok(writer.into_inner().into_inner())
}

fn resample_all(resampler: &mut SincFixedIn<f32>, channels: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, AuralisError> {
    let chunk_size = 1024usize;
    let num_channels = channels.len();
    let total = channels[0].len();
    let mut out: Vec<Vec<f32>> = vec![Vec::new(); num_channels];

    let mut offset = 0usize;
    while offset < total {
        let take = chunk_size.min(total - offset);
        let mut frames: Vec<Vec<f32>> = channels.iter().map(|c| c[offset..offset + take].to_vec()).collect();
        if take < chunk_size {
            for f in frames.iter_mut() {
                f.resize(chunk_size, 0.0);
            }
        }

        let resampled = resampler
            .process(&frames, None)
            .map_err(|e| AuralisError::EncodeError { reason: format!("resample failed: {e}") })?;

        for (ch, data) in resampled.into_iter().enumerate() {
            out[ch].extend(data);
        }

        offset += take;
    }

    Ok(out)
}

fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels[0].len();
    let mut out = Vec::with_capacity(frames * channels.len());
    for i in 0..frames {
        for ch in channels {
            out.push(*ch.get(i).unwrap_or(&0.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_mono_silence_produces_bytes() {
        let pcm = vec![vec![0.0f32; 44_100]];
        let blob = encode(&pcm, 44_100).unwrap();
        assert!(!blob.is_empty());
        assert_eq!(&blob[0..4], b"\x1a\x45\xdf\xa3"); // EBML header magic
    }

    #[test]
    fn test_encode_empty_channels_errors() {
        let pcm: Vec<Vec<f32>> = vec![];
        assert!(encode(&pcm, 44_100).is_err());
    }

    #[test]
    fn test_encode_stereo_at_native_rate_skips_resample() {
        let pcm = vec![vec![0.0f32; 48_000], vec![0.0f32; 48_000]];
        let blob = encode(&pcm, 48_000).unwrap();
        assert!(!blob.is_empty());
    }
}

//! Full-track multichannel decode, used by the streaming pipeline. Unlike
//! `loader::load_audio` (which downmixes to mono for fingerprint-only
//! callers), this keeps each channel distinct so the mastering pipeline can
//! process true stereo.

use crate::error::{FingerprintError, Result};
use ndarray::Array2;
use std::fs::File;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::probe::Hint;

pub struct DecodedTrack {
    /// (channels, frames)
    pub pcm: Array2<f64>,
    pub sample_rate: u32,
}

impl DecodedTrack {
    pub fn channels(&self) -> u16 {
        self.pcm.shape()[0] as u16
    }

    pub fn duration_s(&self) -> f64 {
        self.pcm.shape()[1] as f64 / self.sample_rate.max(1) as f64
    }
}

/// Decode a whole file into a `(channels, frames)` PCM block. Runs
/// synchronously; callers dispatch it via `spawn_blocking`.
pub fn decode_file(path: &str) -> Result<DecodedTrack> {
    if !std::path::Path::new(path).exists() {
        return Err(FingerprintError::FileNotFound(path.to_string()));
    }

    let file = File::open(path)
        .map_err(|e| FingerprintError::FileNotFound(format!("{path}: {e}")))?;
    let source = ReadOnlySource::new(file);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = std::path::Path::new(path).extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &Default::default())
        .map_err(|e| FingerprintError::UnsupportedFormat(format!("probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| FingerprintError::InvalidAudio("no audio tracks found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| FingerprintError::InvalidAudio("no sample rate found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| FingerprintError::InvalidAudio("no channel info found".to_string()))?
        .count()
        .max(1);

    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| FingerprintError::DecodingError(format!("decoder init failed: {e}")))?;

    let mut per_channel: Vec<Vec<f64>> = vec![Vec::new(); channels];
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                match decoder.decode(&packet) {
                    Ok(buf) => collect_channels(&mut per_channel, &buf, channels),
                    Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                    Err(e) => return Err(FingerprintError::DecodingError(e.to_string())),
                }
            }
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(symphonia::core::errors::Error::Unsupported(_)) => break,
            Err(e) => return Err(FingerprintError::DecodingError(e.to_string())),
        }
    }

    let frames = per_channel.iter().map(|c| c.len()).max().unwrap_or(0);
    if frames == 0 {
        return Err(FingerprintError::InvalidAudio("no audio samples decoded".to_string()));
    }

    let mut pcm = Array2::<f64>::zeros((channels, frames));
    for (ch, data) in per_channel.into_iter().enumerate() {
        for (i, v) in data.into_iter().enumerate() {
            pcm[[ch, i]] = v;
        }
    }

    if !pcm.iter().all(|v| v.is_finite()) {
        return Err(FingerprintError::InvalidAudio("audio contains NaN or infinite values".to_string()));
    }

    Ok(DecodedTrack { pcm, sample_rate })
}

fn collect_channels(per_channel: &mut [Vec<f64>], buf: &AudioBufferRef, channels: usize) {
    macro_rules! process_buffer {
        ($buf:expr, $norm_fn:expr) => {{
            if $buf.frames() == 0 {
                return;
            }
            let ch_count = channels.min($buf.spec().channels.count());
            for ch in 0..ch_count {
                let plane = $buf.chan(ch);
                per_channel[ch].extend(plane.iter().map(|&v| $norm_fn(v)));
            }
        }};
    }

    match buf {
        AudioBufferRef::F32(fbuf) => process_buffer!(fbuf, |v: f32| v as f64),
        AudioBufferRef::F64(fbuf) => process_buffer!(fbuf, |v: f64| v),
        AudioBufferRef::S8(ibuf) => process_buffer!(ibuf, |v: i8| v as f64 / i8::MAX as f64),
        AudioBufferRef::S16(ibuf) => process_buffer!(ibuf, |v: i16| v as f64 / i16::MAX as f64),
        AudioBufferRef::S24(ibuf) => process_buffer!(ibuf, |v: symphonia::core::sample::i24| {
            v.into_i32() as f64 / (2_i32.pow(23) - 1) as f64
        }),
        AudioBufferRef::S32(ibuf) => process_buffer!(ibuf, |v: i32| v as f64 / i32::MAX as f64),
        AudioBufferRef::U8(ubuf) => process_buffer!(ubuf, |v: u8| ((v as f64 / 255.0) - 0.5) * 2.0),
        AudioBufferRef::U16(ubuf) => process_buffer!(ubuf, |v: u16| ((v as f64 / 65535.0) - 0.5) * 2.0),
        AudioBufferRef::U24(ubuf) => process_buffer!(ubuf, |v: symphonia::core::sample::u24| {
            ((v.into_u32() as f64 / (2_u32.pow(24) - 1) as f64) - 0.5) * 2.0
        }),
        AudioBufferRef::U32(ubuf) => process_buffer!(ubuf, |v: u32| ((v as f64 / u32::MAX as f64) - 0.5) * 2.0),
    }
}

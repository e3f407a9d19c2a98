// Chunk Geometry and Crossfade
// Pure window arithmetic shared by the streaming pipeline
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use ndarray::{s, Array2};

pub const CHUNK_DURATION_S: f64 = 15.0;
pub const CHUNK_INTERVAL_S: f64 = 10.0;
pub const OVERLAP_S: f64 = CHUNK_DURATION_S - CHUNK_INTERVAL_S;

/// Total chunk count for a track of the given duration.
pub fn total_chunks(total_duration_s: f64) -> usize {
    if total_duration_s <= 0.0 {
        return 0;
    }
    (total_duration_s / CHUNK_INTERVAL_S).ceil() as usize
}

/// Span (in seconds) of chunk `i`, clipped to `[0, total_duration_s]`.
pub fn window_for(i: usize, total_duration_s: f64) -> (f64, f64) {
    let start = i as f64 * CHUNK_INTERVAL_S;
    let end = (start + CHUNK_DURATION_S).min(total_duration_s);
    (start.min(total_duration_s), end)
}

/// A block of interleaved-by-channel PCM, shape `(frames, channels)` logically,
/// stored channel-major as `(channels, frames)` to match the DSP modules.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub data: Array2<f64>, // (channels, frames)
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn channels(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn silence(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            data: Array2::zeros((channels.max(1), frames)),
            sample_rate,
        }
    }
}

/// Source abstraction `load_window` reads from. Implementors decode PCM for
/// an arbitrary `[start_s, end_s)` span of a track, zero-padding reads past
/// end-of-file.
pub trait WaveformSource {
    fn channels(&self) -> usize;
    fn sample_rate(&self) -> u32;
    /// Read `[start_s, end_s)` seconds of audio. May return fewer frames than
    /// requested if the underlying decode hits EOF before `end_s`; callers
    /// zero-pad.
    fn read_span(&self, start_s: f64, end_s: f64) -> Array2<f64>;
}

const CONTEXT_S: f64 = 5.0;
const MIN_READ_S: f64 = 0.1; // 100ms floor for empty reads

/// Read the PCM span for chunk `i`, optionally padded with up to `CONTEXT_S`
/// seconds of lookahead/lookbehind context on each side. Out-of-range reads
/// are zero-padded to the requested length; an empty read returns 100ms of
/// silence instead of an empty buffer.
pub fn load_window<S: WaveformSource>(
    source: &S,
    i: usize,
    with_context: bool,
    total_duration_s: f64,
) -> PcmBuffer {
    let (mut start_s, mut end_s) = window_for(i, total_duration_s);
    if with_context {
        start_s = (start_s - CONTEXT_S).max(0.0);
        end_s = (end_s + CONTEXT_S).min(total_duration_s.max(end_s));
    }

    let sr = source.sample_rate();
    let channels = source.channels().max(1);
    let requested_frames = (((end_s - start_s).max(0.0)) * sr as f64).round() as usize;

    if requested_frames == 0 {
        let min_frames = (MIN_READ_S * sr as f64).round().max(1.0) as usize;
        return PcmBuffer::silence(channels, min_frames, sr);
    }

    let read = source.read_span(start_s, end_s);
    let read_frames = read.shape()[1];

    if read_frames >= requested_frames {
        PcmBuffer {
            data: read.slice(s![.., ..requested_frames]).to_owned(),
            sample_rate: sr,
        }
    } else {
        let mut padded = Array2::zeros((channels, requested_frames));
        padded.slice_mut(s![.., ..read_frames]).assign(&read);
        PcmBuffer {
            data: padded,
            sample_rate: sr,
        }
    }
}

/// Extract exactly the audio belonging to chunk `i` from a processed window
/// that may carry leading overlap context and/or trailing context.
pub fn extract_segment(
    processed: &PcmBuffer,
    i: usize,
    total_chunks: usize,
    total_duration_s: f64,
    sr: u32,
) -> PcmBuffer {
    let channels = processed.channels();
    let frames = processed.frames();

    let (skip_s, keep_s) = if i == 0 {
        (0.0, CHUNK_DURATION_S)
    } else if i + 1 < total_chunks {
        (OVERLAP_S, CHUNK_DURATION_S)
    } else {
        let remaining = (total_duration_s - i as f64 * CHUNK_INTERVAL_S).max(0.0);
        (OVERLAP_S, remaining)
    };

    let skip_frames = (skip_s * sr as f64).round() as usize;
    let keep_frames = (keep_s * sr as f64).round() as usize;

    let available_start = skip_frames.min(frames);
    let available = frames.saturating_sub(available_start);
    let take = available.min(keep_frames);

    let mut out = Array2::zeros((channels.max(1), keep_frames));
    if take > 0 {
        out.slice_mut(s![.., ..take])
            .assign(&processed.data.slice(s![.., available_start..available_start + take]));
    }

    PcmBuffer {
        data: out,
        sample_rate: sr,
    }
}

/// Equal-power crossfade: `fade_out[k] = cos²(πk/2n)`, `fade_in[k] = sin²(πk/2n)`.
/// `n = min(|tail|, |head|, OVERLAP·sr)`. Falls back to plain concatenation
/// when `n <= 0`.
pub fn crossfade(tail: &PcmBuffer, head: &PcmBuffer, sr: u32) -> PcmBuffer {
    let overlap_frames = (OVERLAP_S * sr as f64).round() as usize;
    let n = overlap_frames.min(tail.frames()).min(head.frames());
    let channels = tail.channels().max(head.channels()).max(1);

    if n == 0 {
        let total = tail.frames() + head.frames();
        let mut out = Array2::zeros((channels, total));
        out.slice_mut(s![.., ..tail.frames()]).assign(&tail.data);
        out.slice_mut(s![.., tail.frames()..]).assign(&head.data);
        return PcmBuffer { data: out, sample_rate: sr };
    }

    let tail_prefix = tail.frames() - n;
    let total = tail_prefix + n + (head.frames() - n);
    let mut out = Array2::zeros((channels, total));

    out.slice_mut(s![.., ..tail_prefix])
        .assign(&tail.data.slice(s![.., ..tail_prefix]));

    for k in 0..n {
        let theta = std::f64::consts::PI * k as f64 / (2.0 * n as f64);
        let fade_out = theta.cos().powi(2);
        let fade_in = theta.sin().powi(2);
        for ch in 0..channels {
            let t = if ch < tail.channels() { tail.data[[ch, tail_prefix + k]] } else { 0.0 };
            let h = if ch < head.channels() { head.data[[ch, k]] } else { 0.0 };
            out[[ch, tail_prefix + k]] = t * fade_out + h * fade_in;
        }
    }

    let head_suffix_start = tail_prefix + n;
    out.slice_mut(s![.., head_suffix_start..])
        .assign(&head.data.slice(s![.., n..]));

    PcmBuffer { data: out, sample_rate: sr }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentSource {
        channels: usize,
        sample_rate: u32,
        duration_s: f64,
    }

    impl WaveformSource for SilentSource {
        fn channels(&self) -> usize {
            self.channels
        }
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
        fn read_span(&self, start_s: f64, end_s: f64) -> Array2<f64> {
            let clipped_end = end_s.min(self.duration_s);
            let frames = (((clipped_end - start_s).max(0.0)) * self.sample_rate as f64).round() as usize;
            Array2::zeros((self.channels, frames))
        }
    }

    #[test]
    fn test_total_chunks() {
        assert_eq!(total_chunks(0.0), 0);
        assert_eq!(total_chunks(10.0), 1);
        assert_eq!(total_chunks(10.1), 2);
        assert_eq!(total_chunks(100.0), 10);
    }

    #[test]
    fn test_window_for_first_and_last() {
        let (s0, e0) = window_for(0, 100.0);
        assert_eq!(s0, 0.0);
        assert_eq!(e0, 15.0);

        let (s1, e1) = window_for(9, 100.0);
        assert_eq!(s1, 90.0);
        assert_eq!(e1, 100.0); // clipped
    }

    #[test]
    fn test_load_window_zero_pads_eof() {
        let source = SilentSource { channels: 2, sample_rate: 44100, duration_s: 12.0 };
        let pcm = load_window(&source, 0, false, 12.0);
        let expected = (CHUNK_DURATION_S.min(12.0) * 44100.0).round() as usize;
        assert_eq!(pcm.frames(), expected);
    }

    #[test]
    fn test_load_window_empty_returns_min_silence() {
        let source = SilentSource { channels: 1, sample_rate: 44100, duration_s: 0.0 };
        let pcm = load_window(&source, 0, false, 0.0);
        assert!(pcm.frames() > 0);
    }

    #[test]
    fn test_crossfade_preserves_duration() {
        let sr = 44100u32;
        let tail = PcmBuffer { data: Array2::ones((1, 100_000)), sample_rate: sr };
        let head = PcmBuffer { data: Array2::ones((1, 100_000)), sample_rate: sr };
        let out = crossfade(&tail, &head, sr);
        let n = (OVERLAP_S * sr as f64).round() as usize;
        assert_eq!(out.frames(), tail.frames() + head.frames() - n);
    }

    #[test]
    fn test_crossfade_degenerate_falls_back_to_concat() {
        let tail = PcmBuffer { data: Array2::ones((1, 10)), sample_rate: 0 };
        let head = PcmBuffer { data: Array2::ones((1, 10)), sample_rate: 0 };
        let out = crossfade(&tail, &head, 0);
        assert_eq!(out.frames(), 20);
    }

    #[test]
    fn test_crossfade_power_sums_to_one() {
        let n = 100usize;
        for k in 0..n {
            let theta = std::f64::consts::PI * k as f64 / (2.0 * n as f64);
            let fade_out = theta.cos().powi(2);
            let fade_in = theta.sin().powi(2);
            assert!((fade_out + fade_in - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extract_segment_first_chunk() {
        let sr = 44100u32;
        let frames = (CHUNK_DURATION_S * sr as f64) as usize;
        let processed = PcmBuffer { data: Array2::ones((1, frames)), sample_rate: sr };
        let seg = extract_segment(&processed, 0, 5, 100.0, sr);
        assert_eq!(seg.frames(), (CHUNK_DURATION_S * sr as f64).round() as usize);
    }

    #[test]
    fn test_extract_segment_middle_chunk_skips_overlap() {
        let sr = 44100u32;
        let frames = ((CHUNK_DURATION_S + OVERLAP_S) * sr as f64) as usize;
        let processed = PcmBuffer { data: Array2::ones((1, frames)), sample_rate: sr };
        let seg = extract_segment(&processed, 1, 5, 100.0, sr);
        assert_eq!(seg.frames(), (CHUNK_DURATION_S * sr as f64).round() as usize);
    }
}

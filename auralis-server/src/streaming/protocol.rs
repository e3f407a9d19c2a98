//! JSON wire protocol shared by the WebSocket and (metadata-only) HTTP
//! surfaces. Every message is `{"type": ..., "data": {...}}`.

use serde::{Deserialize, Serialize};

/// Stay safely below the 1 MB WebSocket frame limit: a chunk's base64 PCM
/// payload is split into frames no larger than this.
pub const MAX_FRAME_PAYLOAD_BYTES: usize = 400 * 1024;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamRequest {
    AudioStreamRequest {
        track_id: u64,
        #[serde(default = "default_preset")]
        preset: String,
        #[serde(default = "default_intensity")]
        intensity: f32,
        #[serde(default)]
        enhanced: bool,
    },
}

fn default_preset() -> String { "adaptive".to_string() }
fn default_intensity() -> f32 { 1.0 }

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", content = "data")]
pub enum StreamMessage {
    #[serde(rename = "audio_stream_start")]
    Start(StreamStart),
    #[serde(rename = "audio_chunk")]
    Chunk(AudioChunkFrame),
    #[serde(rename = "audio_stream_end")]
    End(StreamEnd),
    #[serde(rename = "audio_stream_error")]
    Error(StreamError),
}

#[derive(Debug, Serialize, Clone)]
pub struct StreamStart {
    pub track_id: u64,
    pub preset: String,
    pub intensity: f32,
    pub sample_rate: u32,
    pub channels: u16,
    pub total_chunks: u32,
    pub chunk_duration: f64,
    pub total_duration: f32,
}

#[derive(Debug, Serialize, Clone)]
pub struct AudioChunkFrame {
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub frame_index: u32,
    pub frame_count: u32,
    pub samples: String, // base64
    pub sample_count: u32,
    pub crossfade_samples: u32,
}

#[derive(Debug, Serialize, Clone)]
pub struct StreamEnd {
    pub track_id: u64,
    pub total_samples: u64,
    pub duration: f32,
}

#[derive(Debug, Serialize, Clone)]
pub struct StreamError {
    pub track_id: u64,
    pub error: String,
    pub code: String,
    pub chunk: Option<u32>,
}

impl StreamMessage {
    pub fn start(
        track_id: u64,
        preset: &str,
        intensity: f32,
        sample_rate: u32,
        channels: u16,
        total_chunks: u32,
        total_duration: f32,
    ) -> Self {
        StreamMessage::Start(StreamStart {
            track_id,
            preset: preset.to_string(),
            intensity,
            sample_rate,
            channels,
            total_chunks,
            chunk_duration: auralis_dsp::chunk_ops::CHUNK_DURATION_S,
            total_duration,
        })
    }

    pub fn end(track_id: u64, total_samples: u64, duration: f32) -> Self {
        StreamMessage::End(StreamEnd { track_id, total_samples, duration })
    }

    pub fn stream_error(track_id: u64, error: String, code: &'static str, chunk: Option<u32>) -> Self {
        StreamMessage::Error(StreamError { track_id, error, code: code.to_string(), chunk })
    }

    /// Split a whole chunk's base64-encoded Opus payload into one or more
    /// `audio_chunk` frames, none exceeding `MAX_FRAME_PAYLOAD_BYTES`.
    pub fn chunk_frames(
        chunk_index: u32,
        chunk_count: u32,
        opus_bytes: &[u8],
        sample_count: u32,
        crossfade_samples: u32,
    ) -> Vec<StreamMessage> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(opus_bytes);

        let frame_char_cap = MAX_FRAME_PAYLOAD_BYTES;
        let total_len = encoded.len();
        let frame_count = if total_len == 0 {
            1
        } else {
            total_len.div_ceil(frame_char_cap) as u32
        };

        (0..frame_count)
            .map(|frame_index| {
                let start = (frame_index as usize) * frame_char_cap;
                let end = (start + frame_char_cap).min(total_len);
                let samples = encoded[start..end].to_string();
                StreamMessage::Chunk(AudioChunkFrame {
                    chunk_index,
                    chunk_count,
                    frame_index,
                    frame_count,
                    samples,
                    sample_count,
                    crossfade_samples: if frame_index == 0 { crossfade_samples } else { 0 },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_frames_small_payload_is_one_frame() {
        let frames = StreamMessage::chunk_frames(0, 4, b"tiny", 100, 0);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_chunk_frames_large_payload_splits() {
        let bytes = vec![0u8; MAX_FRAME_PAYLOAD_BYTES]; // base64 inflates ~4/3
        let frames = StreamMessage::chunk_frames(0, 4, &bytes, 44100, 0);
        assert!(frames.len() > 1);
        for f in &frames {
            if let StreamMessage::Chunk(c) = f {
                assert!(c.samples.len() <= MAX_FRAME_PAYLOAD_BYTES);
            }
        }
    }

    #[test]
    fn test_chunk_frames_crossfade_only_on_first_frame() {
        let bytes = vec![0u8; MAX_FRAME_PAYLOAD_BYTES * 2];
        let frames = StreamMessage::chunk_frames(0, 4, &bytes, 44100, 2205);
        assert!(frames.len() > 1, "test requires a multi-frame chunk");
        for (i, f) in frames.iter().enumerate() {
            if let StreamMessage::Chunk(c) = f {
                if i == 0 {
                    assert_eq!(c.crossfade_samples, 2205);
                } else {
                    assert_eq!(c.crossfade_samples, 0);
                }
            }
        }
    }

    #[test]
    fn test_start_message_serializes_with_type_tag() {
        let msg = StreamMessage::start(1, "adaptive", 1.0, 44100, 2, 4, 32.0);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "audio_stream_start");
        assert_eq!(json["data"]["track_id"], 1);
    }
}

use thiserror::Error;

/// Failures the renderer reports to the user.
///
/// Only `DecodeFailure` is terminal. Transcription problems fall back to an empty
/// lyric sequence and capture problems leave preview playback running.
#[derive(Debug, Error)]
pub enum VizError {
    #[error("decode failed: {0}")]
    DecodeFailure(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailure(String),

    #[error("transcription not authorized: {0}")]
    AuthorizationFailure(String),

    #[error("no supported recording format (tried {tried})")]
    CaptureUnsupported { tried: String },

    #[error("capture surface is {actual_w}x{actual_h} but export expects {expected_w}x{expected_h}")]
    CaptureMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("capture sink error: {0}")]
    Capture(String),

    #[error("audio playback error: {0}")]
    Playback(String),
}

impl VizError {
    /// Failures the caller can retry without touching the running render.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthorizationFailure(_) | Self::TranscriptionFailure(_))
    }
}

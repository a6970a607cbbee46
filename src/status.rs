use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    Recording,
    Finished,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Recording => "recording",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricStatus {
    None,
    Transcribing,
    Loaded(usize),
    /// Transcription failed; rendering continues without lyrics.
    Failed(String),
    /// Access was denied; a retry can follow once credentials are fixed.
    Unauthorized(String),
}

impl LyricStatus {
    /// True whenever no lyric lines are available to draw.
    pub fn is_without_lyrics(&self) -> bool {
        !matches!(self, Self::Loaded(n) if *n > 0)
    }
}

/// Plain-text state shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub phase: Phase,
    pub lyrics: LyricStatus,
    pub notice: Option<String>,
}

impl Status {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            lyrics: LyricStatus::None,
            notice: None,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase.label())?;
        match &self.lyrics {
            LyricStatus::None => write!(f, " | no lyrics")?,
            LyricStatus::Transcribing => write!(f, " | no lyrics (transcribing)")?,
            LyricStatus::Loaded(0) => write!(f, " | no lyrics")?,
            LyricStatus::Loaded(n) => write!(f, " | lyrics: {n} lines")?,
            LyricStatus::Failed(why) => write!(f, " | no lyrics (transcription failed: {why})")?,
            LyricStatus::Unauthorized(why) => {
                write!(f, " | no lyrics (not authorized: {why}; press r to retry)")?
            }
        }
        if let Some(notice) = &self.notice {
            write!(f, " | {notice}")?;
        }
        Ok(())
    }
}

use crate::error::VizError;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Display time for a line that carries no duration.
pub const DEFAULT_LINE_DURATION_S: f32 = 3.0;
const UNTIMED_CADENCE_S: f32 = 2.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LyricStyle {
    #[default]
    Normal,
    Impact,
    Glitch,
    Soft,
}

impl LyricStyle {
    /// Unknown tags fall back to `Normal`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "impact" => Self::Impact,
            "glitch" => Self::Glitch,
            "soft" => Self::Soft,
            _ => Self::Normal,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LyricLine {
    pub time: f32,
    pub duration: Option<f32>,
    pub text: String,
    pub style: Option<LyricStyle>,
    pub emoji: Option<String>,
}

impl LyricLine {
    pub fn new(time: f32, text: impl Into<String>) -> Self {
        Self {
            time,
            duration: None,
            text: text.into(),
            style: None,
            emoji: None,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_style(mut self, style: LyricStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn effective_duration(&self) -> f32 {
        self.duration.unwrap_or(DEFAULT_LINE_DURATION_S)
    }

    pub fn style(&self) -> LyricStyle {
        self.style.unwrap_or_default()
    }

    /// First character of the emoji hint, used for glyph particles.
    pub fn emoji_glyph(&self) -> Option<char> {
        self.emoji.as_deref().and_then(|e| e.chars().next())
    }

    pub fn contains(&self, t: f32) -> bool {
        self.time <= t && t < self.time + self.effective_duration()
    }
}

/// Immutable ordered lyric sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LyricTrack {
    lines: Vec<LyricLine>,
}

impl LyricTrack {
    /// Keeps the given order; selection is first-match in this order.
    pub fn new(lines: Vec<LyricLine>) -> Self {
        Self { lines }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            let lines = parse_transcription(&raw)
                .with_context(|| format!("invalid lyric json in {}", path.display()))?;
            return Ok(Self::new(lines));
        }
        Self::parse_lrc(&raw)
    }

    pub fn parse_lrc(input: &str) -> Result<Self> {
        let mut timed = Vec::<LyricLine>::new();
        let mut untimed = Vec::<String>::new();

        for raw_line in input.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let (stamps, text, had_tag) = split_lrc_tags(line);
            let text = text.trim();
            if !stamps.is_empty() {
                if text.is_empty() {
                    continue;
                }
                timed.extend(stamps.into_iter().map(|ts| LyricLine::new(ts, text)));
            } else if !had_tag {
                untimed.push(text.to_string());
            }
        }

        if timed.is_empty() && untimed.is_empty() {
            return Err(anyhow!("no lyric lines found"));
        }
        if timed.is_empty() {
            timed = untimed
                .into_iter()
                .enumerate()
                .map(|(i, text)| LyricLine::new(i as f32 * UNTIMED_CADENCE_S, text))
                .collect();
        }

        timed.sort_by(|a, b| a.time.total_cmp(&b.time));
        // Each line holds until the next one starts.
        for i in 0..timed.len().saturating_sub(1) {
            let gap = timed[i + 1].time - timed[i].time;
            if gap > 0.0 {
                timed[i].duration = Some(gap);
            }
        }
        Ok(Self { lines: timed })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    /// First line in sequence order with `time <= t < time + duration`.
    pub fn active_index(&self, t: f32) -> Option<usize> {
        self.lines.iter().position(|line| line.contains(t))
    }

    pub fn active_line(&self, t: f32) -> Option<&LyricLine> {
        self.active_index(t).and_then(|i| self.lines.get(i))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptionPayload {
    Lines(Vec<Value>),
    Wrapped { lines: Vec<Value> },
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default, alias = "start")]
    time: Option<Value>,
    #[serde(default, alias = "dur")]
    duration: Option<Value>,
    #[serde(default, alias = "line")]
    text: Option<Value>,
    #[serde(default)]
    style: Option<Value>,
    #[serde(default)]
    emoji: Option<Value>,
}

/// Coerces a transcription response into lyric lines.
///
/// Accepts a bare array or `{"lines": [...]}`. Entries without a finite non-negative
/// time or without text are dropped; the order of the remaining entries is kept.
pub fn parse_transcription(json: &str) -> Result<Vec<LyricLine>, VizError> {
    let payload: TranscriptionPayload = serde_json::from_str(json.trim())
        .map_err(|e| VizError::TranscriptionFailure(format!("malformed response: {e}")))?;
    let entries = match payload {
        TranscriptionPayload::Lines(v) | TranscriptionPayload::Wrapped { lines: v } => v,
    };
    let total = entries.len();
    let lines: Vec<LyricLine> = entries.into_iter().filter_map(coerce_line).collect();
    if lines.len() < total {
        debug!(
            dropped = total - lines.len(),
            kept = lines.len(),
            "dropped invalid lyric entries"
        );
    }
    Ok(lines)
}

fn coerce_line(entry: Value) -> Option<LyricLine> {
    let raw: RawLine = serde_json::from_value(entry).ok()?;
    let time = raw.time.as_ref().and_then(seconds)?;
    if time < 0.0 {
        return None;
    }
    let text = raw.text.as_ref().and_then(Value::as_str)?.trim();
    if text.is_empty() {
        return None;
    }
    let duration = raw
        .duration
        .as_ref()
        .and_then(seconds)
        .filter(|d| *d > 0.0);
    let style = raw
        .style
        .as_ref()
        .and_then(Value::as_str)
        .map(LyricStyle::from_tag);
    let emoji = raw
        .emoji
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string);
    Some(LyricLine {
        time,
        duration,
        text: text.to_string(),
        style,
        emoji,
    })
}

fn seconds(v: &Value) -> Option<f32> {
    let s: f64 = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let s = s as f32;
    s.is_finite().then_some(s)
}

fn split_lrc_tags(line: &str) -> (Vec<f32>, &str, bool) {
    let mut rest = line;
    let mut stamps = Vec::<f32>::new();
    let mut had_tag = false;
    while let Some(after_open) = rest.strip_prefix('[') {
        let Some(close) = after_open.find(']') else {
            break;
        };
        had_tag = true;
        if let Some(ts) = parse_lrc_stamp(&after_open[..close]) {
            stamps.push(ts);
        }
        rest = &after_open[close + 1..];
    }
    (stamps, rest, had_tag)
}

/// `mm:ss`, `mm:ss.xx` or `hh:mm:ss.xx`; metadata tags (`ti:`, `ar:`) yield `None`.
fn parse_lrc_stamp(token: &str) -> Option<f32> {
    if token.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let secs = |s: &str| s.replace(',', ".").parse::<f32>().ok();
    let parts: Vec<&str> = token.split(':').collect();
    match parts.as_slice() {
        [m, s] => Some(m.parse::<u32>().ok()? as f32 * 60.0 + secs(s)?),
        [h, m, s] => Some(
            h.parse::<u32>().ok()? as f32 * 3600.0 + m.parse::<u32>().ok()? as f32 * 60.0 + secs(s)?,
        ),
        _ => None,
    }
}

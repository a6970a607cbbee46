//! Lyric transcription through an external command.
//!
//! The command receives the raw audio file on stdin and the optional hint in
//! `NEONVIZ_HINT`, and prints the transcription JSON on stdout. Exit code 77 or an
//! authorization message on stderr reports an access problem the user can fix and
//! retry.

use crate::error::VizError;
use crate::lyrics::{LyricLine, parse_transcription};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{debug, info, warn};

pub const HINT_ENV: &str = "NEONVIZ_HINT";
pub const AUTH_EXIT_CODE: i32 = 77;

pub type TranscriptionOutcome = Result<Vec<LyricLine>, VizError>;

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[u8], hint: Option<&str>) -> TranscriptionOutcome;
}

#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    /// Splits `command_line` on whitespace; the first word is the program.
    pub fn new(command_line: &str) -> Result<Self, VizError> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| VizError::TranscriptionFailure("empty transcriber command".into()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&self, audio: &[u8], hint: Option<&str>) -> TranscriptionOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(hint) = hint {
            cmd.env(HINT_ENV, hint);
        }

        let mut child = cmd.spawn().map_err(|err| {
            let why = if err.kind() == io::ErrorKind::NotFound {
                format!("{} not found in PATH", self.program)
            } else {
                format!("failed to run {}: {err}", self.program)
            };
            VizError::TranscriptionFailure(why)
        })?;

        // Feed stdin from a scoped thread so a chatty child cannot deadlock on stdout.
        let stdin = child.stdin.take();
        let output = thread::scope(|s| {
            if let Some(mut stdin) = stdin {
                s.spawn(move || {
                    if let Err(err) = stdin.write_all(audio) {
                        debug!("transcriber closed stdin early: {err}");
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| VizError::TranscriptionFailure(format!("wait for {}: {e}", self.program)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let detail = stderr.trim();
            let detail = if detail.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                detail.to_string()
            };
            if output.status.code() == Some(AUTH_EXIT_CODE) || mentions_authorization(&detail) {
                return Err(VizError::AuthorizationFailure(detail));
            }
            return Err(VizError::TranscriptionFailure(detail));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_transcription(&stdout)
    }
}

fn mentions_authorization(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["unauthorized", "forbidden", "401", "403", "api key", "permission denied"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Runs one transcription off the render thread; the receiver yields exactly one outcome.
pub fn spawn_transcription(
    transcriber: Arc<dyn Transcriber>,
    audio: Arc<Vec<u8>>,
    hint: Option<String>,
) -> Receiver<TranscriptionOutcome> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("transcription".to_string())
        .spawn({
            let tx = tx.clone();
            move || {
                info!(bytes = audio.len(), "transcription started");
                let outcome = transcriber.transcribe(&audio, hint.as_deref());
                match &outcome {
                    Ok(lines) => info!(lines = lines.len(), "transcription finished"),
                    Err(err) => warn!("transcription failed: {err}"),
                }
                let _ = tx.send(outcome);
            }
        });
    if let Err(err) = spawned {
        let _ = tx.send(Err(VizError::TranscriptionFailure(format!(
            "spawn transcription thread: {err}"
        ))));
    }
    rx
}

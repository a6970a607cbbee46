use crate::dimensions::{AspectRatio, ExportConfiguration, ResolutionTier};
use crate::profile::VisualProfile;
use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "neonviz",
    version,
    about = "Audio-reactive visualizer: live terminal preview or fixed-resolution video export"
)]
pub struct Config {
    #[arg(long, value_name = "FILE")]
    pub audio: PathBuf,

    /// Local lyric file (.lrc or transcription-format .json).
    #[arg(long, value_name = "FILE")]
    pub lyrics: Option<PathBuf>,

    /// External transcription command; receives audio bytes on stdin, prints JSON lines.
    #[arg(long, value_name = "CMD")]
    pub transcriber: Option<String>,

    #[arg(long)]
    pub hint: Option<String>,

    /// Render headless at the export resolution and save a video file.
    #[arg(long, default_value_t = false)]
    pub export: bool,

    #[arg(long, value_enum, default_value_t = ResolutionTier::Standard)]
    pub resolution: ResolutionTier,

    #[arg(long, value_enum, default_value_t = AspectRatio::Landscape)]
    pub aspect: AspectRatio,

    #[arg(long, value_enum, default_value_t = VisualProfile::Neon)]
    pub profile: VisualProfile,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Encoder used for `--export`.
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn export_configuration(&self) -> ExportConfiguration {
        ExportConfiguration {
            resolution_tier: self.resolution,
            aspect_ratio: self.aspect,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fps == 0 {
            bail!("--fps must be >= 1");
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                bail!("--title must not be blank");
            }
        }
        if let Some(cmd) = &self.transcriber {
            if cmd.trim().is_empty() {
                bail!("--transcriber must name a command");
            }
        }
        Ok(())
    }

    /// Title shown when no lyric line is available: `--title`, else the audio file stem.
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.trim().to_string();
        }
        self.audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "NEONVIZ".to_string())
    }
}

pub mod analyzer;
pub mod app;
pub mod audio;
pub mod background;
pub mod capture;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod font;
pub mod logging;
pub mod lyrics;
pub mod particles;
pub mod present;
pub mod profile;
pub mod rain;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod surface;
pub mod transcription;
pub mod typography;
pub mod waveform;

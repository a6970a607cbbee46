//! Live preview output: the composed frame drawn into the terminal with half-block
//! cells (two pixels per cell), plus a one-line status bar.

use crate::surface::Surface;
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, ClearType},
};
use std::io::{BufWriter, Stdout, Write, stdout};
use std::time::Duration;

const STATUS_ROWS: u16 = 1;
const HALF_BLOCK: char = '\u{2580}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Quit,
    RetryTranscription,
}

/// Where finished frames go in preview mode.
pub trait FramePresenter {
    /// Current pixel size of the live container.
    fn container_size(&mut self) -> (u32, u32);

    fn present(&mut self, frame: &Surface, status: &str) -> anyhow::Result<()>;

    /// Non-blocking; at most one command per call.
    fn poll_command(&mut self) -> Option<UserCommand>;
}

/// Maps a key press to a command.
pub fn command_for_key(code: KeyCode, modifiers: KeyModifiers) -> Option<UserCommand> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(UserCommand::Quit),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(UserCommand::Quit),
        KeyCode::Char('r') => Some(UserCommand::RetryTranscription),
        _ => None,
    }
}

/// Owns the terminal while it lives: raw mode on the alternate screen, cursor
/// hidden. Dropping it hands the terminal back.
pub struct TerminalPresenter {
    out: BufWriter<Stdout>,
    cells: (u16, u16),
    colors: CellColors,
}

impl TerminalPresenter {
    pub fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Drop undoes raw mode if anything below fails.
        let mut presenter = Self {
            out: BufWriter::with_capacity(1 << 20, stdout()),
            cells: (0, 0),
            colors: CellColors::default(),
        };
        presenter
            .out
            .execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        presenter
            .out
            .execute(terminal::Clear(ClearType::All))
            .context("clear screen")?;
        presenter.out.execute(cursor::Hide).context("hide cursor")?;
        presenter.cells = terminal::size().context("query terminal size")?;
        Ok(presenter)
    }
}

impl Drop for TerminalPresenter {
    fn drop(&mut self) {
        // Sync output, autowrap and colors may be mid-frame.
        let _ = self.out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
        let _ = self.out.execute(cursor::Show);
        let _ = self.out.execute(terminal::LeaveAlternateScreen);
    }
}

impl FramePresenter for TerminalPresenter {
    fn container_size(&mut self) -> (u32, u32) {
        if let Ok(size) = terminal::size() {
            self.cells = size;
        }
        let (cols, rows) = self.cells;
        (
            cols as u32,
            rows.saturating_sub(STATUS_ROWS) as u32 * 2,
        )
    }

    fn present(&mut self, frame: &Surface, status: &str) -> anyhow::Result<()> {
        let (cols, rows) = self.cells;
        let visual_rows = rows.saturating_sub(STATUS_ROWS) as usize;
        if frame.width() != cols as usize || frame.height() != visual_rows * 2 {
            // Resized between sizing and presenting; the next tick catches up.
            return Ok(());
        }
        let out = &mut self.out;
        out.write_all(b"\x1b[?2026h")?;
        write_half_blocks(frame, &mut *out, &mut self.colors)?;

        write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", visual_rows + 1)?;
        let line: String = status.chars().take(cols as usize).collect();
        write!(out, "{line}")?;
        out.write_all(b"\x1b[?7h\x1b[?2026l")?;
        out.flush()?;
        Ok(())
    }

    fn poll_command(&mut self) -> Option<UserCommand> {
        while event::poll(Duration::ZERO).ok()? {
            match event::read().ok()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(cmd) = command_for_key(key.code, key.modifiers) {
                        return Some(cmd);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct CellColors {
    fg: Option<[u8; 3]>,
    bg: Option<[u8; 3]>,
}

/// Paints `frame` from the home position: the top pixel of each cell is the
/// foreground of `▀`, the bottom pixel its background.
pub fn write_half_blocks(
    frame: &Surface,
    out: &mut dyn Write,
    colors: &mut CellColors,
) -> std::io::Result<()> {
    let w = frame.width();
    let rows = frame.height() / 2;
    let px = frame.pixels();
    // Autowrap off while painting full-width rows.
    out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
    colors.fg = None;
    colors.bg = None;
    for row in 0..rows {
        for x in 0..w {
            let top = (row * 2 * w + x) * 4;
            let bot = ((row * 2 + 1) * w + x) * 4;
            let fg = [px[top], px[top + 1], px[top + 2]];
            let bg = [px[bot], px[bot + 1], px[bot + 2]];
            if colors.fg != Some(fg) {
                write!(out, "\x1b[38;2;{};{};{}m", fg[0], fg[1], fg[2])?;
                colors.fg = Some(fg);
            }
            if colors.bg != Some(bg) {
                write!(out, "\x1b[48;2;{};{};{}m", bg[0], bg[1], bg[2])?;
                colors.bg = Some(bg);
            }
            write!(out, "{HALF_BLOCK}")?;
        }
        out.write_all(b"\r\n")?;
    }
    Ok(())
}

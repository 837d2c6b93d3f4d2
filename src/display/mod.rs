//! Where annotated frames go, and where operator commands come from.

mod headless;
mod terminal;

pub use headless::HeadlessDisplay;
pub use terminal::TerminalDisplay;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::camera::Frame;
use crate::config::{DisplayConfig, DisplayMode};

/// Operator request picked up between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reload,
}

/// Per-frame status shown next to the image
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub source: String,
    pub frame: u64,
    pub fps: Option<f64>,
    pub faces: usize,
    /// Recognized labels in the current frame
    pub recognized: Vec<String>,
    pub gallery_size: usize,
    /// Transient message, e.g. a failed reload
    pub notice: Option<String>,
}

impl Status {
    pub fn summary(&self) -> String {
        let fps = self
            .fps
            .map(|f| format!("{:.1} fps", f))
            .unwrap_or_else(|| "-- fps".to_string());
        let names = if self.recognized.is_empty() {
            "-".to_string()
        } else {
            self.recognized.join(", ")
        };
        format!(
            " {} | frame {} | {} | faces: {} | recognized: {} | gallery: {} ",
            self.source, self.frame, fps, self.faces, names, self.gallery_size
        )
    }
}

pub trait FrameSink {
    fn present(&mut self, frame: &Frame, status: &Status) -> Result<()>;

    /// Wait up to `wait` for an operator command
    fn poll_command(&mut self, wait: Duration) -> Result<Option<Command>>;

    fn close(&mut self) {}
}

impl FrameSink for Box<dyn FrameSink> {
    fn present(&mut self, frame: &Frame, status: &Status) -> Result<()> {
        (**self).present(frame, status)
    }

    fn poll_command(&mut self, wait: Duration) -> Result<Option<Command>> {
        (**self).poll_command(wait)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Map a key press to a command
pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('r') => Some(Command::Reload),
        _ => None,
    }
}

pub fn from_config(config: &DisplayConfig) -> Result<Box<dyn FrameSink>> {
    match config.mode {
        DisplayMode::Terminal => Ok(Box::new(TerminalDisplay::new()?)),
        DisplayMode::Headless => Ok(Box::new(HeadlessDisplay::new(config.snapshot_path.clone()))),
    }
}

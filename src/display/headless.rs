use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::camera::Frame;

use super::{Command, FrameSink, Status};

/// Sink for unattended runs. Optionally keeps the latest annotated frame on
/// disk; never asks the session to stop.
pub struct HeadlessDisplay {
    snapshot_path: Option<PathBuf>,
    presented: u64,
}

impl HeadlessDisplay {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            snapshot_path,
            presented: 0,
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl FrameSink for HeadlessDisplay {
    fn present(&mut self, frame: &Frame, status: &Status) -> Result<()> {
        self.presented += 1;

        if let Some(path) = &self.snapshot_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            frame
                .save(path)
                .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        }

        if let Some(notice) = &status.notice {
            tracing::info!(notice = %notice, frame = status.frame, "Session notice");
        }
        Ok(())
    }

    fn poll_command(&mut self, _wait: Duration) -> Result<Option<Command>> {
        Ok(None)
    }
}

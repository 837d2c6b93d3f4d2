use std::io::Read;
use std::time::Duration;

use crate::error::CameraError;

use super::{Camera, Frame};

/// Largest still image accepted from a snapshot endpoint
const MAX_SNAPSHOT_BYTES: u64 = 32 * 1024 * 1024;

/// Camera exposing its latest still frame over HTTP (IP camera
/// `/snapshot.jpg` style). Every read is bounded by the agent timeout.
pub struct SnapshotCamera {
    url: String,
    timeout: Duration,
    agent: Option<ureq::Agent>,
}

impl SnapshotCamera {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
            agent: None,
        }
    }

    fn fetch(&self, agent: &ureq::Agent) -> Result<Frame, CameraError> {
        let response = agent
            .get(&self.url)
            .call()
            .map_err(|e| CameraError::Read(format!("snapshot request failed: {}", e)))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_SNAPSHOT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| CameraError::Read(format!("snapshot body: {}", e)))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| CameraError::Read(format!("snapshot decode: {}", e)))?;

        Ok(image.to_rgb8())
    }
}

impl Camera for SnapshotCamera {
    fn describe(&self) -> String {
        format!("snapshot camera {}", self.url)
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        // One frame proves the endpoint is reachable and serves images
        let frame = self.fetch(&agent).map_err(|e| CameraError::Unavailable {
            source_name: self.url.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            url = %self.url,
            width = frame.width(),
            height = frame.height(),
            "Snapshot camera opened"
        );
        self.agent = Some(agent);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| CameraError::Read("camera is not open".to_string()))?;
        self.fetch(agent)
    }

    fn release(&mut self) {
        if self.agent.take().is_some() {
            tracing::info!(url = %self.url, "Snapshot camera released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_camera_is_unavailable() {
        let mut camera = SnapshotCamera::new("http://127.0.0.1:9/snapshot.jpg", Duration::from_millis(200));
        assert!(matches!(camera.open(), Err(CameraError::Unavailable { .. })));
        // Release after a failed open is harmless
        camera.release();
    }

    #[test]
    fn test_read_before_open() {
        let mut camera = SnapshotCamera::new("http://127.0.0.1:9/snapshot.jpg", Duration::from_millis(200));
        assert!(matches!(camera.read_frame(), Err(CameraError::Read(_))));
    }
}

//! Frame sources.
//!
//! A camera is opened once, read frame by frame and released exactly once.
//! Implementations must tolerate `release` on a camera that never opened.

mod device;
mod replay;
mod snapshot;

pub use device::DeviceCamera;
pub use replay::ReplayCamera;
pub use snapshot::SnapshotCamera;

use std::time::Duration;

use crate::config::{CameraConfig, CameraKind};
use crate::error::CameraError;

/// One captured frame, 8-bit RGB
pub type Frame = image::RgbImage;

pub trait Camera {
    /// Human-readable source description for logs
    fn describe(&self) -> String;

    /// Acquire the device. Fails with [`CameraError::Unavailable`].
    fn open(&mut self) -> Result<(), CameraError>;

    /// Grab the next frame
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    fn release(&mut self);
}

impl Camera for Box<dyn Camera> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn open(&mut self) -> Result<(), CameraError> {
        (**self).open()
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Build the configured camera. Nothing is acquired until `open`.
pub fn from_config(config: &CameraConfig) -> Result<Box<dyn Camera>, CameraError> {
    match config.kind {
        CameraKind::Device => Ok(Box::new(
            DeviceCamera::new(config.device_index).with_resolution(config.width, config.height),
        )),
        CameraKind::Snapshot => Ok(Box::new(SnapshotCamera::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
        ))),
        CameraKind::Replay => {
            let directory = config.directory.clone().ok_or_else(|| CameraError::Unavailable {
                source_name: "replay".to_string(),
                reason: "camera.directory is not set".to_string(),
            })?;
            Ok(Box::new(ReplayCamera::new(
                directory,
                config.extensions.clone(),
                config.looped,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_without_directory() {
        let config = CameraConfig {
            kind: CameraKind::Replay,
            directory: None,
            ..CameraConfig::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(CameraError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_snapshot_from_config() {
        let config = CameraConfig {
            kind: CameraKind::Snapshot,
            ..CameraConfig::default()
        };
        let camera = from_config(&config).ok().unwrap();
        assert!(camera.describe().contains("snapshot.jpg"));
    }

    #[test]
    fn test_default_is_first_capture_device() {
        let camera = from_config(&CameraConfig::default()).ok().unwrap();
        assert_eq!(camera.describe(), "capture device 0");
    }
}

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use crate::error::CameraError;

use super::{Camera, Frame};

/// Local capture device (webcam) opened through OpenCV's videoio.
pub struct DeviceCamera {
    index: i32,
    width: Option<u32>,
    height: Option<u32>,
    capture: Option<VideoCapture>,
}

impl DeviceCamera {
    pub fn new(index: i32) -> Self {
        Self {
            index,
            width: None,
            height: None,
            capture: None,
        }
    }

    /// Request a capture resolution; the driver may pick the nearest mode.
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn unavailable(&self, reason: impl Into<String>) -> CameraError {
        CameraError::Unavailable {
            source_name: format!("device {}", self.index),
            reason: reason.into(),
        }
    }
}

/// Convert a BGR capture into an RGB frame.
fn mat_to_frame(mat: &Mat) -> Result<Frame, CameraError> {
    if mat.empty() {
        return Err(CameraError::Read("empty frame".to_string()));
    }

    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| CameraError::Read(format!("colour conversion failed: {}", e)))?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb
        .data_bytes()
        .map_err(|e| CameraError::Read(e.to_string()))?
        .to_vec();

    Frame::from_raw(width, height, bytes)
        .ok_or_else(|| CameraError::Read(format!("unexpected frame layout {}x{}", width, height)))
}

impl Camera for DeviceCamera {
    fn describe(&self) -> String {
        format!("capture device {}", self.index)
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let mut capture = VideoCapture::new(self.index, videoio::CAP_ANY)
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !capture.is_opened().map_err(|e| self.unavailable(e.to_string()))? {
            return Err(self.unavailable("device could not be opened"));
        }

        if let Some(width) = self.width {
            capture
                .set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)
                .map_err(|e| self.unavailable(e.to_string()))?;
        }
        if let Some(height) = self.height {
            capture
                .set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)
                .map_err(|e| self.unavailable(e.to_string()))?;
        }

        tracing::info!(
            index = self.index,
            width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0),
            height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0),
            "Capture device opened"
        );

        self.capture = Some(capture);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| CameraError::Read("device not opened".to_string()))?;

        let mut mat = Mat::default();
        let grabbed = capture
            .read(&mut mat)
            .map_err(|e| CameraError::Read(e.to_string()))?;
        if !grabbed {
            return Err(CameraError::Read("device returned no frame".to_string()));
        }

        mat_to_frame(&mat)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                tracing::warn!(index = self.index, error = %e, "Failed to release capture device");
            }
        }
    }
}

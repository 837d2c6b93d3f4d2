use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::CameraError;

use super::{Camera, Frame};

/// Plays a directory of image files as a frame stream, in path order.
pub struct ReplayCamera {
    directory: PathBuf,
    extensions: Vec<String>,
    looped: bool,
    frames: Vec<PathBuf>,
    position: usize,
    opened: bool,
}

impl ReplayCamera {
    pub fn new(directory: PathBuf, extensions: Vec<String>, looped: bool) -> Self {
        Self {
            directory,
            extensions,
            looped,
            frames: Vec::new(),
            position: 0,
            opened: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn discover_frames(directory: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut frames = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    frames.push(path.to_path_buf());
                }
            }
        }
    }

    // Path order is playback order
    frames.sort();
    frames
}

impl Camera for ReplayCamera {
    fn describe(&self) -> String {
        format!("replay camera {}", self.directory.display())
    }

    fn open(&mut self) -> Result<(), CameraError> {
        if !self.directory.is_dir() {
            return Err(CameraError::Unavailable {
                source_name: self.directory.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let frames = discover_frames(&self.directory, &self.extensions);
        if frames.is_empty() {
            return Err(CameraError::Unavailable {
                source_name: self.directory.display().to_string(),
                reason: "no image files found".to_string(),
            });
        }

        tracing::info!(
            directory = ?self.directory,
            frames = frames.len(),
            looped = self.looped,
            "Replay camera opened"
        );
        self.frames = frames;
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.opened {
            return Err(CameraError::Read("camera is not open".to_string()));
        }

        if self.position >= self.frames.len() {
            if !self.looped {
                return Err(CameraError::EndOfStream);
            }
            self.position = 0;
        }

        let path = &self.frames[self.position];
        self.position += 1;

        let image = image::open(path)
            .map_err(|e| CameraError::Read(format!("{}: {}", path.display(), e)))?;
        Ok(image.to_rgb8())
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            self.frames.clear();
            tracing::info!(directory = ?self.directory, "Replay camera released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string()]
    }

    fn write_frame(path: &Path, shade: u8) {
        Frame::from_pixel(2, 2, image::Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_discover_frames() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("b.jpg")).unwrap();
        File::create(dir.path().join("a.PNG")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.png")).unwrap();

        let frames = discover_frames(dir.path(), &extensions());
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.PNG"),
                PathBuf::from("b.jpg"),
                PathBuf::from("sub/c.png"),
            ]
        );
    }

    #[test]
    fn test_plays_in_order_then_ends() {
        let dir = tempdir().unwrap();
        write_frame(&dir.path().join("001.png"), 10);
        write_frame(&dir.path().join("002.png"), 20);

        let mut camera = ReplayCamera::new(dir.path().to_path_buf(), extensions(), false);
        camera.open().unwrap();
        assert_eq!(camera.frame_count(), 2);

        assert_eq!(camera.read_frame().unwrap().get_pixel(0, 0)[0], 10);
        assert_eq!(camera.read_frame().unwrap().get_pixel(0, 0)[0], 20);
        assert!(matches!(camera.read_frame(), Err(CameraError::EndOfStream)));

        camera.release();
        assert!(matches!(camera.read_frame(), Err(CameraError::Read(_))));
    }

    #[test]
    fn test_looped_replay_wraps() {
        let dir = tempdir().unwrap();
        write_frame(&dir.path().join("only.png"), 42);

        let mut camera = ReplayCamera::new(dir.path().to_path_buf(), extensions(), true);
        camera.open().unwrap();
        for _ in 0..3 {
            assert_eq!(camera.read_frame().unwrap().get_pixel(1, 1)[0], 42);
        }
    }

    #[test]
    fn test_open_failures() {
        let dir = tempdir().unwrap();

        let mut empty = ReplayCamera::new(dir.path().to_path_buf(), extensions(), false);
        assert!(matches!(empty.open(), Err(CameraError::Unavailable { .. })));

        let mut missing = ReplayCamera::new(dir.path().join("missing"), extensions(), false);
        assert!(matches!(missing.open(), Err(CameraError::Unavailable { .. })));
    }

    #[test]
    fn test_undecodable_frame_is_read_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();

        let mut camera = ReplayCamera::new(dir.path().to_path_buf(), extensions(), false);
        camera.open().unwrap();
        assert!(matches!(camera.read_frame(), Err(CameraError::Read(_))));
    }
}

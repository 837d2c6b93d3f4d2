use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgresql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// e.g. "host=localhost user=facewatch dbname=facewatch"
    #[serde(default)]
    pub postgresql_url: Option<String>,

    #[serde(default)]
    pub pool_size: Option<u32>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_sqlite_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facewatch")
        .join("gallery.db")
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            postgresql_url: None,
            pool_size: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Maximum euclidean distance accepted as a match. Lower is stricter.
    ///
    /// The 0.6 default suits 128-d dlib encodings. The bundled ONNX embedder
    /// produces L2-normalised 512-d ArcFace vectors, where distance is
    /// `sqrt(2 - 2 * cosine)`: a cosine cut-off of 0.5 is a distance of 1.0,
    /// and 0.6 accepts only near-identical captures. Tune it against your
    /// own gallery when using that embedder.
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

fn default_tolerance() -> f32 {
    0.6
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    /// Local capture device such as a webcam
    #[default]
    Device,
    Snapshot,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub kind: CameraKind,

    /// Capture device index, 0 is the system default camera
    #[serde(default)]
    pub device_index: i32,

    /// Requested capture resolution for devices
    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,

    /// Still-image endpoint for snapshot cameras
    #[serde(default = "default_camera_url")]
    pub url: String,

    /// Deadline for a single frame read
    #[serde(default = "default_camera_timeout_secs")]
    pub timeout_secs: u64,

    /// Frame directory for replay cameras
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Restart replay from the first frame when exhausted
    #[serde(default)]
    pub looped: bool,

    #[serde(default = "default_frame_extensions")]
    pub extensions: Vec<String>,
}

fn default_camera_url() -> String {
    "http://127.0.0.1:8080/snapshot.jpg".to_string()
}

fn default_camera_timeout_secs() -> u64 {
    5
}

fn default_frame_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "bmp".to_string(),
    ]
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: CameraKind::default(),
            device_index: 0,
            width: None,
            height: None,
            url: default_camera_url(),
            timeout_secs: default_camera_timeout_secs(),
            directory: None,
            looped: false,
            extensions: default_frame_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Onnx,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Providers in order of preference; the first that probes successfully wins
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_download_models")]
    pub download_models: bool,

    #[serde(default = "default_remote_endpoint")]
    pub remote_endpoint: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::Onnx, ProviderKind::Remote]
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("facewatch")
        .join("models")
}

fn default_download_models() -> bool {
    true
}

fn default_remote_endpoint() -> String {
    "http://127.0.0.1:5005".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    10
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            models_dir: default_models_dir(),
            download_models: default_download_models(),
            remote_endpoint: default_remote_endpoint(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Terminal,
    Headless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub mode: DisplayMode,

    /// Headless mode writes the latest annotated frame here
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub show_distance: bool,

    #[serde(default = "default_box_thickness")]
    pub box_thickness: u32,

    /// Hershey font scale for labels
    #[serde(default = "default_text_scale")]
    pub text_scale: f64,
}

fn default_box_thickness() -> u32 {
    2
}

fn default_text_scale() -> f64 {
    1.0
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            snapshot_path: None,
            show_distance: false,
            box_thickness: default_box_thickness(),
            text_scale: default_text_scale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Throughput is reported every this many frames
    #[serde(default = "default_report_every")]
    pub report_every: u64,

    /// Bounded wait for operator input after each frame
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub max_frames: Option<u64>,
}

fn default_report_every() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            report_every: default_report_every(),
            poll_interval_ms: default_poll_interval_ms(),
            max_frames: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facewatch")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("FACEWATCH_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!((config.matching.tolerance - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.session.report_every, 30);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.detector.providers, vec![ProviderKind::Onnx, ProviderKind::Remote]);
        assert_eq!(config.camera.kind, CameraKind::Device);
        assert_eq!(config.camera.device_index, 0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [matching]
            tolerance = 0.45

            [camera]
            kind = "replay"
            directory = "/tmp/frames"
            "#,
        )
        .unwrap();

        assert!((config.matching.tolerance - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.camera.kind, CameraKind::Replay);
        assert_eq!(config.camera.directory, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(config.camera.timeout_secs, 5);
        assert_eq!(config.display.mode, DisplayMode::Terminal);
    }

    #[test]
    fn test_device_camera_section() {
        let config: Config = toml::from_str(
            r#"
            [camera]
            kind = "device"
            device_index = 2
            width = 1280
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.kind, CameraKind::Device);
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.width, Some(1280));
        assert_eq!(config.camera.height, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.matching.tolerance = 0.5;
        config.display.mode = DisplayMode::Headless;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!((loaded.matching.tolerance - 0.5).abs() < f32::EPSILON);
        assert_eq!(loaded.display.mode, DisplayMode::Headless);
    }
}

//! Live recognition session.
//!
//! A session owns one camera, one store connection, its own gallery cache
//! and a display sink. It drives capture, detection, matching, annotation
//! and display one frame at a time until the operator quits, the camera
//! stops delivering frames, or a frame limit is reached.

mod throughput;

pub use throughput::ThroughputMeter;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::annotate::{annotate, AnnotateStyle};
use crate::camera::Camera;
use crate::config::{Config, StoreConfig};
use crate::db::Database;
use crate::display::{Command, FrameSink, Status};
use crate::error::{MatchError, SessionError};
use crate::faces::{BoundingBox, FaceEmbedder, GalleryCache, MatchResult, Matcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Operator asked to quit
    UserQuit,
    /// The camera failed to deliver a frame
    CameraReadFailed(String),
    /// The configured frame limit was reached
    FrameLimit,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Log throughput every this many frames; 0 disables
    pub report_every: u64,
    /// Bounded wait for operator input after each frame
    pub poll_interval: Duration,
    pub max_frames: Option<u64>,
    pub style: AnnotateStyle,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            report_every: 30,
            poll_interval: Duration::from_millis(1),
            max_frames: None,
            style: AnnotateStyle::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            report_every: config.session.report_every,
            poll_interval: Duration::from_millis(config.session.poll_interval_ms),
            max_frames: config.session.max_frames,
            style: AnnotateStyle::from(&config.display),
        }
    }
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub frames: u64,
    pub faces_seen: u64,
    /// Recognitions per label
    pub recognized: BTreeMap<String, u64>,
    pub unknown: u64,
    /// Frames shown without annotation because detection failed
    pub skipped_frames: u64,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    pub average_fps: f64,
}

/// Everything that must be given back when the session ends, whatever the
/// exit path: sink closed, camera released, store connection closed.
struct SessionResources<C: Camera, S: FrameSink> {
    camera: C,
    sink: S,
    store: Option<Database>,
}

impl<C: Camera, S: FrameSink> Drop for SessionResources<C, S> {
    fn drop(&mut self) {
        self.sink.close();
        self.camera.release();
        if let Some(store) = self.store.take() {
            if let Err(e) = store.close() {
                tracing::warn!(error = %e, "Failed to close gallery store");
            }
        }
        tracing::info!(camera = %self.camera.describe(), "Session resources released");
    }
}

pub struct Session<C: Camera, E: FaceEmbedder, S: FrameSink> {
    resources: SessionResources<C, S>,
    embedder: E,
    matcher: Matcher,
    cache: GalleryCache,
    options: SessionOptions,
}

impl<C: Camera, E: FaceEmbedder, S: FrameSink> Session<C, E, S> {
    /// Acquire the camera, connect to the store and load the gallery.
    ///
    /// Any failure is fatal and releases whatever was already acquired.
    pub fn open(
        camera: C,
        store_config: &StoreConfig,
        embedder: E,
        sink: S,
        matcher: Matcher,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let mut resources = SessionResources {
            camera,
            sink,
            store: None,
        };

        resources.camera.open()?;
        let store = resources.store.insert(Database::open(store_config)?);
        let cache = GalleryCache::load(store)?;

        tracing::info!(
            camera = %resources.camera.describe(),
            embedder = embedder.name(),
            store = store.backend_name(),
            gallery = cache.gallery().len(),
            tolerance = matcher.tolerance(),
            "Session ready"
        );

        Ok(Self {
            resources,
            embedder,
            matcher,
            cache,
            options,
        })
    }

    pub fn gallery_size(&self) -> usize {
        self.cache.gallery().len()
    }

    /// Run until stopped. Consumes the session, so a stopped session cannot
    /// be restarted; resources are released on return, including error
    /// returns.
    pub fn run(mut self) -> Result<SessionReport, SessionError> {
        tracing::info!("Session running");

        let started = Instant::now();
        let mut meter = ThroughputMeter::new(self.options.report_every, started);
        let mut status = Status {
            source: self.resources.camera.describe(),
            gallery_size: self.gallery_size(),
            ..Status::default()
        };

        let mut frames = 0u64;
        let mut faces_seen = 0u64;
        let mut recognized: BTreeMap<String, u64> = BTreeMap::new();
        let mut unknown = 0u64;
        let mut skipped_frames = 0u64;

        let stop_reason = loop {
            if let Some(max) = self.options.max_frames {
                if frames >= max {
                    break StopReason::FrameLimit;
                }
            }

            let mut frame = match self.resources.camera.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, frames, "Camera read failed, stopping session");
                    break StopReason::CameraReadFailed(e.to_string());
                }
            };
            frames += 1;

            // The snapshot stays valid even if a reload happens mid-frame
            let gallery = self.cache.snapshot();
            let mut names = Vec::new();

            match self.embedder.detect_and_embed(&frame) {
                Ok(observations) => {
                    let mut matched: Vec<(BoundingBox, MatchResult)> = Vec::with_capacity(observations.len());
                    for observation in &observations {
                        let result = match self.matcher.match_face(&observation.embedding, &gallery) {
                            Ok(result) => result,
                            Err(MatchError::NonFiniteQuery { index }) => {
                                tracing::warn!(frame = frames, index, "Embedding has non-finite values, face ignored");
                                continue;
                            }
                            Err(e) => return Err(e.into()),
                        };
                        match &result.label {
                            Some(label) => {
                                *recognized.entry(label.clone()).or_default() += 1;
                                names.push(label.clone());
                            }
                            None => unknown += 1,
                        }
                        matched.push((observation.bbox, result));
                    }
                    faces_seen += matched.len() as u64;

                    let items: Vec<(BoundingBox, &MatchResult)> =
                        matched.iter().map(|(bbox, result)| (*bbox, result)).collect();
                    if let Err(e) = annotate(&mut frame, &items, &self.options.style) {
                        tracing::warn!(error = %e, frame = frames, "Annotation failed, showing raw frame");
                    }
                    status.faces = matched.len();
                }
                Err(e) => {
                    skipped_frames += 1;
                    status.faces = 0;
                    tracing::warn!(error = %e, frame = frames, "Face detection failed, showing raw frame");
                }
            }

            status.frame = frames;
            status.recognized = names;
            if let Some(fps) = meter.tick(Instant::now()) {
                tracing::info!(
                    fps = %format!("{:.1}", fps),
                    frame = frames,
                    faces = status.faces,
                    recognized = ?status.recognized,
                    "Throughput"
                );
                status.fps = Some(fps);
            }

            self.resources
                .sink
                .present(&frame, &status)
                .map_err(|e| SessionError::Display(format!("{:#}", e)))?;
            status.notice = None;

            let command = self
                .resources
                .sink
                .poll_command(self.options.poll_interval)
                .map_err(|e| SessionError::Display(format!("{:#}", e)))?;

            match command {
                Some(Command::Quit) => {
                    tracing::info!(frames, "Quit requested");
                    break StopReason::UserQuit;
                }
                Some(Command::Reload) => {
                    status.notice = Some(self.reload_gallery());
                    status.gallery_size = self.gallery_size();
                }
                None => {}
            }
        };

        let elapsed = started.elapsed();
        let average_fps = if elapsed.as_secs_f64() > 0.0 {
            frames as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        tracing::info!(
            frames,
            faces = faces_seen,
            unknown,
            skipped = skipped_frames,
            reason = ?stop_reason,
            average_fps = %format!("{:.1}", average_fps),
            "Session stopped"
        );

        Ok(SessionReport {
            frames,
            faces_seen,
            recognized,
            unknown,
            skipped_frames,
            stop_reason,
            elapsed,
            average_fps,
        })
    }

    /// Reload from the store; a failure keeps the current snapshot.
    fn reload_gallery(&mut self) -> String {
        let Some(store) = self.resources.store.as_ref() else {
            return "Gallery store not connected".to_string();
        };

        match self.cache.reload(store) {
            Ok(()) => format!("Gallery reloaded: {} entries", self.cache.gallery().len()),
            Err(e) => {
                tracing::warn!(error = %e, "Gallery reload failed, keeping previous gallery");
                format!("Gallery reload failed: {}", e)
            }
        }
    }
}

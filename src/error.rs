//! Error types for the matching engine and its collaborators.

use thiserror::Error;

/// Errors raised by the gallery store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached when the adapter was constructed.
    #[error("gallery store unreachable: {0}")]
    Connectivity(String),

    /// A query against a connected store failed.
    #[error("gallery store query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded into a gallery entry.
    #[error("corrupt gallery entry {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for StoreError {
    fn from(e: postgres::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Connectivity(e.to_string())
    }
}

/// Errors raised while building the in-memory gallery.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entry at `index` does not share the gallery's embedding length.
    #[error("gallery entry {index} has {actual} dimensions, expected {expected}")]
    InconsistentDimension {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by the matching engine.
#[derive(Error, Debug, PartialEq)]
pub enum MatchError {
    #[error("query embedding has {actual} dimensions, gallery has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query embedding has a non-finite value at index {index}")]
    NonFiniteQuery { index: usize },

    #[error("tolerance must be a finite non-negative number, got {0}")]
    InvalidTolerance(f32),
}

/// Errors raised by camera sources.
#[derive(Error, Debug)]
pub enum CameraError {
    /// The camera could not be acquired.
    #[error("camera {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// A single frame read failed.
    #[error("frame read failed: {0}")]
    Read(String),

    /// A finite source has no more frames.
    #[error("end of frame stream")]
    EndOfStream,
}

/// Errors raised by detector/embedder providers.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Inference or transport failed for one frame.
    #[error("embedder failed: {0}")]
    Backend(String),

    /// A provider failed its startup probe.
    #[error("provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// No configured provider passed its probe.
    #[error("no face embedder available ({0})")]
    NoProvider(String),

    /// The produced embedding does not fit the gallery.
    #[error("embedding has {actual} dimensions, gallery has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<anyhow::Error> for EmbedError {
    fn from(e: anyhow::Error) -> Self {
        EmbedError::Backend(format!("{:#}", e))
    }
}

/// Errors that end a live session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gallery(#[from] GalleryError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("display failed: {0}")]
    Display(String),
}

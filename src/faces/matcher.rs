//! Nearest-template matching with a reject threshold.
//!
//! Every enrolled embedding competes on its own: an identity with several
//! templates is represented by whichever one lies closest to the query.
//! Distances are never averaged per identity.

use serde::Serialize;

use crate::error::MatchError;

use super::gallery::Gallery;

/// Label shown for faces that match nothing in the gallery
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Default acceptance distance for the embedding space
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Outcome of matching one observation against the gallery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Matched identity, `None` when the face is unknown
    pub label: Option<String>,
    /// Distance to the nearest template, absent for an empty gallery
    pub distance: Option<f32>,
    /// Number of distance computations performed
    pub compared: usize,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            label: None,
            distance: None,
            compared: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.label.is_some()
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    tolerance: f32,
}

impl Matcher {
    pub fn new(tolerance: f32) -> Result<Self, MatchError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(MatchError::InvalidTolerance(tolerance));
        }
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Classify `query` by its nearest gallery template.
    ///
    /// Ties go to the lowest gallery index. A nearest distance equal to the
    /// tolerance is still accepted. A query containing NaN or infinity is
    /// rejected rather than reported as infinitely far.
    pub fn match_face(&self, query: &[f32], gallery: &Gallery) -> Result<MatchResult, MatchError> {
        let Some(expected) = gallery.dimension() else {
            return Ok(MatchResult::unknown());
        };

        if query.len() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        if let Some(index) = query.iter().position(|v| !v.is_finite()) {
            return Err(MatchError::NonFiniteQuery { index });
        }

        let mut best_index = 0;
        let mut best_distance = f32::INFINITY;
        let mut compared = 0;

        for (i, template) in gallery.embeddings().iter().enumerate() {
            let distance = euclidean_distance(query, template);
            compared += 1;
            if distance < best_distance {
                best_distance = distance;
                best_index = i;
            }
        }

        let label = if best_distance <= self.tolerance {
            Some(gallery.labels()[best_index].clone())
        } else {
            None
        };

        Ok(MatchResult {
            label,
            distance: Some(best_distance),
            compared,
        })
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Euclidean (L2) distance between two embeddings of equal length
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

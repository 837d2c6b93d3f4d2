use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::db::{Database, Metadata};
use crate::error::EmbedError;

use super::detector::FaceEmbedder;
use super::gallery::Gallery;

/// Enroll the single face found in the image at `path` under `label`.
///
/// The image must contain exactly one face, and its embedding must match the
/// dimension of whatever is already enrolled. The source path is recorded
/// in the entry's metadata.
pub fn enroll_from_image(
    db: &Database,
    embedder: &mut dyn FaceEmbedder,
    label: &str,
    path: &Path,
    metadata: Metadata,
) -> Result<i64> {
    let label = label.trim();
    if label.is_empty() {
        return Err(anyhow!("Label must not be empty"));
    }

    let frame = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_rgb8();

    let observations = embedder
        .detect_and_embed(&frame)
        .with_context(|| format!("Face detection failed for {}", path.display()))?;

    let observation = match observations.len() {
        0 => return Err(anyhow!("No face found in {}", path.display())),
        1 => &observations[0],
        n => {
            return Err(anyhow!(
                "Found {} faces in {}; enrollment needs exactly one",
                n,
                path.display()
            ))
        }
    };

    let gallery = Gallery::from_entries(db.list_all()?)?;
    if let Some(expected) = gallery.dimension() {
        let actual = observation.embedding.len();
        if actual != expected {
            return Err(EmbedError::DimensionMismatch { expected, actual }.into());
        }
    }

    let mut metadata = metadata;
    metadata.insert(
        "source".to_string(),
        Value::String(path.display().to_string()),
    );
    metadata.insert("embedder".to_string(), Value::String(embedder.name().to_string()));

    let id = db.enroll(label, &observation.embedding, Some(&metadata))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Frame;
    use crate::faces::detector::{BoundingBox, Observation};

    struct FixedEmbedder {
        observations: Vec<Observation>,
    }

    impl FaceEmbedder for FixedEmbedder {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect_and_embed(&mut self, _frame: &Frame) -> Result<Vec<Observation>, EmbedError> {
            Ok(self.observations.clone())
        }
    }

    fn face(embedding: Vec<f32>) -> Observation {
        Observation {
            bbox: BoundingBox::new(0, 4, 4, 0),
            embedding,
        }
    }

    fn write_image(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("face.png");
        Frame::from_pixel(4, 4, image::Rgb([128, 128, 128]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_enroll_single_face_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path());
        let db = Database::open_in_memory().unwrap();
        let mut embedder = FixedEmbedder { observations: vec![face(vec![0.1, 0.2])] };

        let mut metadata = Metadata::new();
        metadata.insert("team".to_string(), Value::String("ops".to_string()));
        let id = enroll_from_image(&db, &mut embedder, " Alice ", &path, metadata).unwrap();

        let entries = db.list_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].label, "Alice");
        assert_eq!(entries[0].embedding, vec![0.1, 0.2]);
        assert_eq!(entries[0].metadata["team"], "ops");
        assert_eq!(
            entries[0].metadata["source"],
            Value::String(path.display().to_string())
        );
    }

    #[test]
    fn test_enroll_requires_exactly_one_face() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path());
        let db = Database::open_in_memory().unwrap();

        let mut none = FixedEmbedder { observations: Vec::new() };
        assert!(enroll_from_image(&db, &mut none, "Alice", &path, Metadata::new()).is_err());

        let mut two = FixedEmbedder {
            observations: vec![face(vec![0.0, 1.0]), face(vec![1.0, 0.0])],
        };
        assert!(enroll_from_image(&db, &mut two, "Alice", &path, Metadata::new()).is_err());

        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_enroll_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path());
        let db = Database::open_in_memory().unwrap();
        db.enroll("Bob", &[0.0, 0.0, 0.0], None).unwrap();

        let mut embedder = FixedEmbedder { observations: vec![face(vec![0.1, 0.2])] };
        let err = enroll_from_image(&db, &mut embedder, "Alice", &path, Metadata::new()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EmbedError>(),
            Some(EmbedError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn test_enroll_missing_image() {
        let db = Database::open_in_memory().unwrap();
        let mut embedder = FixedEmbedder { observations: vec![face(vec![0.1])] };
        let result = enroll_from_image(
            &db,
            &mut embedder,
            "Alice",
            Path::new("/nonexistent/face.png"),
            Metadata::new(),
        );
        assert!(result.is_err());
    }
}

//! In-memory gallery snapshot used by the matcher.

use std::sync::Arc;

use crate::db::{Database, GalleryEntry, Metadata};
use crate::error::GalleryError;

/// Read-only projection of the store: labels, embeddings and metadata in
/// the order the store returned them.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    labels: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadata: Vec<Metadata>,
    dimension: Option<usize>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Result<Self, GalleryError> {
        let mut gallery = Gallery {
            labels: Vec::with_capacity(entries.len()),
            embeddings: Vec::with_capacity(entries.len()),
            metadata: Vec::with_capacity(entries.len()),
            dimension: None,
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let actual = entry.embedding.len();
            match gallery.dimension {
                None => gallery.dimension = Some(actual),
                Some(expected) if expected != actual => {
                    return Err(GalleryError::InconsistentDimension {
                        index,
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            }

            gallery.labels.push(entry.label);
            gallery.embeddings.push(entry.embedding);
            gallery.metadata.push(entry.metadata);
        }

        Ok(gallery)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Common embedding length, absent for an empty gallery
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// Distinct labels in first-seen order
    pub fn identities(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for label in &self.labels {
            if !seen.contains(&label.as_str()) {
                seen.push(label);
            }
        }
        seen
    }
}

/// Holds the current gallery snapshot. A reload builds a complete new
/// gallery before swapping it in; snapshots handed out earlier stay valid.
#[derive(Debug, Default)]
pub struct GalleryCache {
    current: Arc<Gallery>,
}

impl GalleryCache {
    /// Cache with an empty gallery
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(db: &Database) -> Result<Self, GalleryError> {
        let mut cache = Self::new();
        cache.reload(db)?;
        Ok(cache)
    }

    /// Replace the whole cache with the store's current contents.
    /// On error the previous snapshot stays installed.
    pub fn reload(&mut self, db: &Database) -> Result<(), GalleryError> {
        let entries = db.list_all()?;
        let gallery = Gallery::from_entries(entries)?;

        tracing::info!(
            entries = gallery.len(),
            identities = gallery.identities().len(),
            dimension = ?gallery.dimension(),
            "Loaded known faces from gallery store"
        );

        self.current = Arc::new(gallery);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Gallery> {
        Arc::clone(&self.current)
    }

    pub fn gallery(&self) -> &Gallery {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::Matcher;
    use chrono::Utc;

    fn entry(id: i64, label: &str, embedding: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            id,
            label: label.to_string(),
            embedding,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_store_is_valid() {
        let db = Database::open_in_memory().unwrap();
        let cache = GalleryCache::load(&db).unwrap();
        assert!(cache.gallery().is_empty());
        assert_eq!(cache.gallery().dimension(), None);
    }

    #[test]
    fn test_preserves_store_order_and_alignment() {
        let gallery = Gallery::from_entries(vec![
            entry(1, "Alice", vec![1.0, 0.0]),
            entry(2, "Bob", vec![0.0, 1.0]),
            entry(3, "Alice", vec![0.5, 0.5]),
        ])
        .unwrap();

        assert_eq!(gallery.labels(), &["Alice", "Bob", "Alice"]);
        assert_eq!(gallery.embeddings()[1], vec![0.0, 1.0]);
        assert_eq!(gallery.metadata().len(), 3);
        assert_eq!(gallery.dimension(), Some(2));
        assert_eq!(gallery.identities(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let result = Gallery::from_entries(vec![
            entry(1, "Alice", vec![1.0, 0.0]),
            entry(2, "Bob", vec![0.0, 1.0, 0.0]),
        ]);

        assert!(matches!(
            result,
            Err(GalleryError::InconsistentDimension { index: 1, expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_reload_twice_is_identical() {
        let db = Database::open_in_memory().unwrap();
        db.enroll("Alice", &[0.1, 0.2, 0.3], None).unwrap();
        db.enroll("Bob", &[0.4, 0.5, 0.6], None).unwrap();

        let mut cache = GalleryCache::load(&db).unwrap();
        let first = cache.snapshot();
        cache.reload(&db).unwrap();
        let second = cache.snapshot();

        assert_eq!(first.labels(), second.labels());
        assert_eq!(first.embeddings(), second.embeddings());
    }

    #[test]
    fn test_old_snapshot_survives_reload() {
        let db = Database::open_in_memory().unwrap();
        db.enroll("Alice", &[1.0, 0.0], None).unwrap();

        let mut cache = GalleryCache::load(&db).unwrap();
        let before = cache.snapshot();

        db.delete_by_label("Alice").unwrap();
        cache.reload(&db).unwrap();

        assert_eq!(before.len(), 1);
        assert!(cache.gallery().is_empty());
    }

    #[test]
    fn test_deleted_identity_unknown_after_reload() {
        let db = Database::open_in_memory().unwrap();
        db.enroll("Alice", &[0.9, 0.0], None).unwrap();
        db.enroll("Alice", &[0.0, 0.4], None).unwrap();
        db.enroll("Bob", &[-0.9, 0.0], None).unwrap();

        let matcher = Matcher::new(0.6).unwrap();
        let query = [0.0, 0.0];
        let mut cache = GalleryCache::load(&db).unwrap();

        let before = matcher.match_face(&query, &cache.snapshot()).unwrap();
        assert_eq!(before.label.as_deref(), Some("Alice"));
        assert!((before.distance.unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(before.compared, 3);

        assert_eq!(db.delete_by_label("Alice").unwrap(), 2);
        cache.reload(&db).unwrap();

        let after = matcher.match_face(&query, &cache.snapshot()).unwrap();
        assert_eq!(after.label, None);
        assert_eq!(after.display_label(), "Unknown");
        assert!((after.distance.unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(after.compared, 1);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let db = Database::open_in_memory().unwrap();
        db.enroll("Alice", &[1.0, 0.0], None).unwrap();
        let mut cache = GalleryCache::load(&db).unwrap();

        db.enroll("Bob", &[1.0, 0.0, 0.0], None).unwrap();
        assert!(cache.reload(&db).is_err());
        assert_eq!(cache.gallery().labels(), &["Alice"]);
    }
}

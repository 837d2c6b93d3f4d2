//! SQLite backend implementation.

use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::StoreError;

use super::embeddings::{embedding_to_bytes, metadata_to_json};
use super::entries::{now_timestamp, GalleryEntry, Metadata, RawEntry};
use super::schema::SCHEMA;

pub struct SqliteDb {
    conn: Connection,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connectivity(format!("{}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Connectivity(format!("{}: {}", path.display(), e)))?;
        let db = Self { conn };
        db.ping()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Touch the file so an unusable path fails here rather than on first query
    fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| StoreError::Connectivity(e.to_string()))
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn enroll(
        &self,
        label: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO gallery_entries (label, embedding, dimension, metadata, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                label,
                embedding_to_bytes(embedding),
                embedding.len() as i64,
                metadata_to_json(metadata),
                now_timestamp(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_all(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, embedding, metadata, created_at FROM gallery_entries ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RawEntry {
                id: row.get(0)?,
                label: row.get(1)?,
                embedding: row.get(2)?,
                metadata: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.decode()?);
        }
        Ok(entries)
    }

    pub fn delete_by_label(&self, label: &str) -> Result<usize, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM gallery_entries WHERE label = ?", params![label])?;
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM gallery_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn labels(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT label, COUNT(*)
            FROM gallery_entries
            GROUP BY label
            ORDER BY MIN(id)
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut labels = Vec::new();
        for row in rows {
            labels.push(row?);
        }
        Ok(labels)
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Query(format!("close failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, SqliteDb) {
        let dir = tempdir().unwrap();
        let db = SqliteDb::open(&dir.path().join("gallery.db")).unwrap();
        db.initialize().unwrap();
        (dir, db)
    }

    #[test]
    fn test_enroll_and_list_in_insertion_order() {
        let (_dir, db) = open_temp();

        let mut meta = Metadata::new();
        meta.insert("source".to_string(), serde_json::json!("door-cam"));

        let a = db.enroll("Alice", &[0.1, 0.2], Some(&meta)).unwrap();
        let b = db.enroll("Bob", &[0.3, 0.4], None).unwrap();
        let c = db.enroll("Alice", &[0.5, 0.6], None).unwrap();
        assert!(a < b && b < c);

        let entries = db.list_all().unwrap();
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Alice", "Bob", "Alice"]);
        assert_eq!(entries[0].embedding, vec![0.1, 0.2]);
        assert_eq!(entries[0].metadata.get("source"), Some(&serde_json::json!("door-cam")));
        assert!(entries[1].metadata.is_empty());
    }

    #[test]
    fn test_enroll_does_not_deduplicate() {
        let (_dir, db) = open_temp();
        db.enroll("Alice", &[1.0, 0.0], None).unwrap();
        db.enroll("Alice", &[1.0, 0.0], None).unwrap();
        assert_eq!(db.count().unwrap(), 2);
        assert_eq!(db.labels().unwrap(), vec![("Alice".to_string(), 2)]);
    }

    #[test]
    fn test_delete_by_label_is_exact() {
        let (_dir, db) = open_temp();
        db.enroll("Alice", &[1.0], None).unwrap();
        db.enroll("alice", &[2.0], None).unwrap();
        db.enroll("Alice", &[3.0], None).unwrap();

        assert_eq!(db.delete_by_label("Alice").unwrap(), 2);
        assert_eq!(db.delete_by_label("Alice").unwrap(), 0);
        assert_eq!(db.delete_by_label("Nobody").unwrap(), 0);

        let remaining = db.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].label, "alice");
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let (_dir, db) = open_temp();
        db.conn
            .execute(
                "INSERT INTO gallery_entries (label, embedding, dimension, metadata, created_at) VALUES ('X', x'000000', 1, '{}', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(matches!(db.list_all(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_unusable_path_is_connectivity_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = SqliteDb::open(&blocker.join("gallery.db"));
        assert!(matches!(result, Err(StoreError::Connectivity(_))));
    }

    #[test]
    fn test_close_consumes_handle() {
        let (_dir, db) = open_temp();
        db.enroll("Alice", &[1.0], None).unwrap();
        assert!(db.close().is_ok());
    }
}

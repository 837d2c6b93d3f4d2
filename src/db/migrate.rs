//! SQLite-to-PostgreSQL gallery migration.
//!
//! Copies every gallery entry with its original id, then resets the
//! PostgreSQL sequence so new enrollments continue after the highest id.

use anyhow::{Context, Result};
use postgres::NoTls;
use rusqlite::Connection;

use super::postgres_schema::POSTGRES_SCHEMA;

/// Migrate all gallery entries from a SQLite file to a PostgreSQL database.
/// Returns the number of entries copied.
pub fn migrate_sqlite_to_postgres(sqlite_path: &std::path::Path, postgres_url: &str) -> Result<u64> {
    let sqlite = Connection::open(sqlite_path)
        .with_context(|| format!("Failed to open SQLite database: {}", sqlite_path.display()))?;

    let mut pg = postgres::Client::connect(postgres_url, NoTls)
        .with_context(|| "Failed to connect to PostgreSQL")?;

    pg.batch_execute(POSTGRES_SCHEMA)
        .with_context(|| "Failed to create PostgreSQL schema")?;

    let count = migrate_entries(&sqlite, &mut pg)?;
    reset_sequence(&mut pg)?;

    tracing::info!(entries = count, "Gallery migration complete");
    Ok(count)
}

fn migrate_entries(sqlite: &Connection, pg: &mut postgres::Client) -> Result<u64> {
    let mut stmt = sqlite.prepare(
        "SELECT id, label, embedding, dimension, metadata, created_at FROM gallery_entries ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Vec<u8>>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut transaction = pg.transaction()?;
    let mut count = 0u64;
    for row in rows {
        let (id, label, embedding, dimension, metadata, created_at) = row?;
        let dimension = dimension as i32;
        // Rows whose id already exists are skipped and report 0
        count += transaction.execute(
            r#"
            INSERT INTO gallery_entries (id, label, embedding, dimension, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
            &[&id, &label, &embedding, &dimension, &metadata, &created_at],
        )?;
    }
    transaction.commit()?;

    tracing::info!(entries = count, "Copied gallery entries");
    Ok(count)
}

fn reset_sequence(pg: &mut postgres::Client) -> Result<()> {
    let row = pg.query_one("SELECT COALESCE(MAX(id), 0) FROM gallery_entries", &[])?;
    let max_id: i64 = row.get(0);
    if max_id > 0 {
        pg.execute(
            "SELECT setval('gallery_entries_id_seq', $1)",
            &[&max_id],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteDb;
    use tempfile::tempdir;

    /// Needs a disposable database, e.g.
    /// `FACEWATCH_TEST_POSTGRES_URL="host=localhost user=postgres dbname=facewatch_test"`.
    fn test_url() -> Option<String> {
        std::env::var("FACEWATCH_TEST_POSTGRES_URL").ok()
    }

    #[test]
    fn test_second_migration_copies_nothing() {
        let Some(url) = test_url() else {
            return;
        };

        let mut pg = postgres::Client::connect(&url, NoTls).unwrap();
        pg.batch_execute("DROP TABLE IF EXISTS gallery_entries").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.db");
        let sqlite = SqliteDb::open(&path).unwrap();
        sqlite.enroll("Alice", &[0.1, 0.2], None).unwrap();
        sqlite.enroll("Bob", &[0.3, 0.4], None).unwrap();
        drop(sqlite);

        assert_eq!(migrate_sqlite_to_postgres(&path, &url).unwrap(), 2);
        assert_eq!(migrate_sqlite_to_postgres(&path, &url).unwrap(), 0);

        let row = pg.query_one("SELECT COUNT(*) FROM gallery_entries", &[]).unwrap();
        assert_eq!(row.get::<_, i64>(0), 2);
    }
}

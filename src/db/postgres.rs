//! PostgreSQL backend implementation.

use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::time::Duration;

use crate::error::StoreError;

use super::embeddings::{embedding_to_bytes, metadata_to_json};
use super::entries::{now_timestamp, GalleryEntry, Metadata, RawEntry};
use super::postgres_schema::POSTGRES_SCHEMA;

pub struct PgDb {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PgDb {
    /// Building the pool opens the first connection, so an unreachable
    /// server fails here.
    pub fn open(url: &str, pool_size: u32, connect_timeout: Duration) -> Result<Self, StoreError> {
        let pg_config: postgres::Config = url
            .parse()
            .map_err(|e| StoreError::Connectivity(format!("invalid PostgreSQL URL: {}", e)))?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(connect_timeout)
            .build(manager)?;
        Ok(Self { pool })
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut client = self.pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;
        Ok(())
    }

    pub fn enroll(
        &self,
        label: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<i64, StoreError> {
        let mut client = self.pool.get()?;
        let bytes = embedding_to_bytes(embedding);
        let dimension = embedding.len() as i32;
        let metadata = metadata_to_json(metadata);
        let created_at = now_timestamp();
        let row = client.query_one(
            r#"
            INSERT INTO gallery_entries (label, embedding, dimension, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
            &[&label, &bytes, &dimension, &metadata, &created_at],
        )?;
        Ok(row.get(0))
    }

    pub fn list_all(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let mut client = self.pool.get()?;
        let rows = client.query(
            "SELECT id, label, embedding, metadata, created_at FROM gallery_entries ORDER BY id",
            &[],
        )?;

        rows.iter()
            .map(|row| {
                RawEntry {
                    id: row.get(0),
                    label: row.get(1),
                    embedding: row.get(2),
                    metadata: row.get(3),
                    created_at: row.get(4),
                }
                .decode()
            })
            .collect()
    }

    pub fn delete_by_label(&self, label: &str) -> Result<usize, StoreError> {
        let mut client = self.pool.get()?;
        let deleted = client.execute("DELETE FROM gallery_entries WHERE label = $1", &[&label])?;
        Ok(deleted as usize)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let mut client = self.pool.get()?;
        let row = client.query_one("SELECT COUNT(*) FROM gallery_entries", &[])?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    pub fn labels(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut client = self.pool.get()?;
        let rows = client.query(
            r#"
            SELECT label, COUNT(*)
            FROM gallery_entries
            GROUP BY label
            ORDER BY MIN(id)
            "#,
            &[],
        )?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, i64>(1) as usize))
            .collect())
    }

    pub fn close(self) -> Result<(), StoreError> {
        // Dropping the pool closes every pooled connection
        drop(self.pool);
        Ok(())
    }
}

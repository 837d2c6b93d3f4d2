//! Gallery store adapter.
//!
//! The persistent store owns every enrolled entry. Callers get snapshots
//! through [`Database::list_all`] and never hold references into the store.

mod schema;
pub mod embeddings;
pub mod entries;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod postgres_schema;
#[cfg(feature = "postgres")]
pub mod migrate;

pub use entries::{GalleryEntry, Metadata};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    // No arguments beyond self
    ($self:expr, $method:ident()) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method(),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method(),
        }
    };
    // With arguments
    ($self:expr, $method:ident($($arg:expr),+ $(,)?)) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method($($arg),+),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method($($arg),+),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PgDb),
}

pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Connect to the configured store and make sure the schema exists.
    ///
    /// Fails with [`StoreError::Connectivity`] when the store cannot be
    /// reached; nothing can be matched without a gallery.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.backend == StoreBackend::Postgresql {
            #[cfg(feature = "postgres")]
            {
                let url = config.postgresql_url.as_deref().ok_or_else(|| {
                    StoreError::Connectivity("PostgreSQL URL not configured".to_string())
                })?;
                let pool_size = config.pool_size.unwrap_or(4);
                let timeout = std::time::Duration::from_secs(config.connect_timeout_secs);
                let pg = postgres::PgDb::open(url, pool_size, timeout)?;
                pg.initialize()?;
                tracing::info!(backend = "postgresql", "Gallery store connected");
                return Ok(Self { inner: DatabaseInner::Postgres(pg) });
            }

            #[cfg(not(feature = "postgres"))]
            {
                return Err(StoreError::Connectivity(
                    "PostgreSQL backend requested but facewatch was built without the `postgres` feature"
                        .to_string(),
                ));
            }
        }

        let db = sqlite::SqliteDb::open(&config.sqlite_path)?;
        db.initialize()?;
        tracing::info!(backend = "sqlite", path = ?config.sqlite_path, "Gallery store connected");
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    /// Private, throwaway SQLite store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = sqlite::SqliteDb::open_in_memory()?;
        db.initialize()?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.inner {
            DatabaseInner::Sqlite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(_) => "postgresql",
        }
    }

    /// Append one entry. Never deduplicates.
    pub fn enroll(
        &self,
        label: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<i64, StoreError> {
        let id = dispatch!(self, enroll(label, embedding, metadata))?;
        tracing::info!(label = %label, id, dimension = embedding.len(), "Enrolled face embedding");
        Ok(id)
    }

    /// Full unfiltered scan, in enrollment order.
    pub fn list_all(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        dispatch!(self, list_all())
    }

    /// Remove every entry whose label equals `label` exactly.
    /// Returns how many were removed; zero is not an error.
    pub fn delete_by_label(&self, label: &str) -> Result<usize, StoreError> {
        let deleted = dispatch!(self, delete_by_label(label))?;
        tracing::info!(label = %label, deleted, "Deleted face embeddings");
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        dispatch!(self, count())
    }

    /// Distinct labels with their entry counts, in first-enrolled order
    pub fn labels(&self) -> Result<Vec<(String, usize)>, StoreError> {
        dispatch!(self, labels())
    }

    /// Release the underlying connection. Consumes the handle.
    pub fn close(self) -> Result<(), StoreError> {
        let backend = self.backend_name();
        let result = match self.inner {
            DatabaseInner::Sqlite(db) => db.close(),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.close(),
        };
        tracing::info!(backend, "Gallery store connection closed");
        result
    }
}

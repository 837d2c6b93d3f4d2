pub const POSTGRES_SCHEMA: &str = r#"
-- PostgreSQL schema for facewatch

CREATE TABLE IF NOT EXISTS gallery_entries (
    id BIGSERIAL PRIMARY KEY,
    label TEXT NOT NULL,
    embedding BYTEA NOT NULL,
    dimension INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_gallery_entries_label ON gallery_entries(label);
"#;

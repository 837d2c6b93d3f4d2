pub const SCHEMA: &str = r#"
-- Gallery entries: one enrolled embedding per row, labels repeat freely
CREATE TABLE IF NOT EXISTS gallery_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    embedding BLOB NOT NULL,      -- little-endian f32
    dimension INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',  -- JSON object
    created_at TEXT NOT NULL      -- RFC 3339, UTC
);

CREATE INDEX IF NOT EXISTS idx_gallery_entries_label ON gallery_entries(label);
"#;

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::{Database, GalleryEntry};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(anyhow!("Unknown export format: {} (expected json or csv)", other)),
        }
    }

    /// Guess the format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// Gallery entry as written to a JSON export
#[derive(Debug, Serialize)]
struct ExportedEntry<'a> {
    id: i64,
    label: &'a str,
    dimension: usize,
    embedding: &'a [f32],
    metadata: &'a serde_json::Map<String, serde_json::Value>,
    created_at: String,
}

impl<'a> From<&'a GalleryEntry> for ExportedEntry<'a> {
    fn from(entry: &'a GalleryEntry) -> Self {
        Self {
            id: entry.id,
            label: &entry.label,
            dimension: entry.embedding.len(),
            embedding: &entry.embedding,
            metadata: &entry.metadata,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Export every gallery entry to a file. Returns the number of entries written.
pub fn export_gallery(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let entries = db.list_all()?;
    let count = entries.len();

    match format {
        ExportFormat::Json => export_json(&entries, output_path)?,
        ExportFormat::Csv => export_csv(&entries, output_path)?,
    }

    tracing::info!(
        entries = count,
        format = format.name(),
        path = ?output_path,
        "Exported gallery"
    );
    Ok(count)
}

fn export_json(entries: &[GalleryEntry], output_path: &Path) -> Result<()> {
    let exported: Vec<ExportedEntry> = entries.iter().map(ExportedEntry::from).collect();
    let json = serde_json::to_string_pretty(&exported)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(entries: &[GalleryEntry], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    // Embeddings are left out; they are only useful in the JSON export
    wtr.write_record(["id", "label", "dimension", "created_at", "metadata"])?;

    for entry in entries {
        wtr.write_record([
            entry.id.to_string(),
            entry.label.clone(),
            entry.embedding.len().to_string(),
            entry.created_at.to_rfc3339(),
            serde_json::to_string(&entry.metadata)?,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

//! On-disk encoding of embeddings and metadata.

use crate::error::StoreError;

use super::entries::Metadata;

/// Convert f32 slice to bytes for storage
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to f32 vector
pub(crate) fn bytes_to_embedding(id: i64, bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            id,
            reason: format!("embedding blob of {} bytes is not a whole number of f32", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub(crate) fn metadata_to_json(metadata: Option<&Metadata>) -> String {
    match metadata {
        Some(map) => serde_json::Value::Object(map.clone()).to_string(),
        None => "{}".to_string(),
    }
}

pub(crate) fn json_to_metadata(id: i64, json: &str) -> Result<Metadata, StoreError> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupt {
            id,
            reason: format!("metadata is not a JSON object: {}", other),
        }),
        Err(e) => Err(StoreError::Corrupt {
            id,
            reason: format!("metadata is not valid JSON: {}", e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_conversion() {
        let original = vec![1.5, -2.3, 0.0, 100.0];
        let bytes = embedding_to_bytes(&original);
        let recovered = bytes_to_embedding(1, &bytes).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_truncated_blob_is_corrupt() {
        let err = bytes_to_embedding(7, &[0, 0, 128]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { id: 7, .. }));
    }

    #[test]
    fn test_metadata_must_be_object() {
        assert!(json_to_metadata(1, "{\"camera\": \"door\"}").is_ok());
        assert!(matches!(
            json_to_metadata(2, "[1, 2]"),
            Err(StoreError::Corrupt { id: 2, .. })
        ));
        assert_eq!(metadata_to_json(None), "{}");
    }
}

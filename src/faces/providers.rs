//! Startup selection of the face embedder.
//!
//! Providers are tried in the configured rank order. The first one whose
//! probe succeeds serves the whole process.

use anyhow::Result;
use std::time::Duration;

use crate::config::{DetectorConfig, ProviderKind};
use crate::error::EmbedError;

use super::detector::{FaceEmbedder, OnnxEmbedder};
use super::remote::RemoteEmbedder;

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Onnx => "onnx",
            ProviderKind::Remote => "remote",
        }
    }
}

/// Create the best available embedder for this configuration
pub fn select(config: &DetectorConfig) -> Result<Box<dyn FaceEmbedder>, EmbedError> {
    first_available(
        config
            .providers
            .iter()
            .map(|kind| (kind.name(), move || probe(*kind, config))),
    )
}

fn probe(kind: ProviderKind, config: &DetectorConfig) -> Result<Box<dyn FaceEmbedder>> {
    match kind {
        ProviderKind::Onnx => {
            let embedder = OnnxEmbedder::load(&config.models_dir, config.download_models)?;
            Ok(Box::new(embedder))
        }
        ProviderKind::Remote => {
            let embedder = RemoteEmbedder::new(
                &config.remote_endpoint,
                Duration::from_secs(config.timeout_secs),
            );
            embedder.probe()?;
            Ok(Box::new(embedder))
        }
    }
}

fn first_available<I, F>(candidates: I) -> Result<Box<dyn FaceEmbedder>, EmbedError>
where
    I: IntoIterator<Item = (&'static str, F)>,
    F: FnOnce() -> Result<Box<dyn FaceEmbedder>>,
{
    let mut failures = Vec::new();

    for (name, try_create) in candidates {
        match try_create() {
            Ok(embedder) => {
                tracing::info!(provider = name, "Face embedder selected");
                return Ok(embedder);
            }
            Err(e) => {
                let unavailable = EmbedError::Unavailable {
                    provider: name.to_string(),
                    reason: format!("{:#}", e),
                };
                tracing::warn!(error = %unavailable, "Face embedder provider unavailable");
                failures.push(unavailable.to_string());
            }
        }
    }

    if failures.is_empty() {
        return Err(EmbedError::NoProvider("no providers configured".to_string()));
    }

    Err(EmbedError::NoProvider(failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Frame;
    use crate::faces::detector::Observation;
    use anyhow::anyhow;

    struct Named(&'static str);

    impl FaceEmbedder for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn detect_and_embed(&mut self, _frame: &Frame) -> Result<Vec<Observation>, EmbedError> {
            Ok(Vec::new())
        }
    }

    type Candidate = (&'static str, Box<dyn FnOnce() -> Result<Box<dyn FaceEmbedder>>>);

    fn candidate(
        name: &'static str,
        create: impl FnOnce() -> Result<Box<dyn FaceEmbedder>> + 'static,
    ) -> Candidate {
        (name, Box::new(create))
    }

    #[test]
    fn test_first_successful_probe_wins() {
        let candidates: Vec<Candidate> = vec![
            candidate("first", || Err(anyhow!("model missing"))),
            candidate("second", || Ok(Box::new(Named("second")))),
            candidate("third", || panic!("never probed")),
        ];

        let embedder = first_available(candidates).unwrap();
        assert_eq!(embedder.name(), "second");
    }

    #[test]
    fn test_no_provider_lists_failures() {
        let candidates: Vec<Candidate> = vec![
            candidate("onnx", || Err(anyhow!("model missing"))),
            candidate("remote", || Err(anyhow!("connection refused"))),
        ];

        let err = first_available(candidates).err().unwrap();
        let message = err.to_string();
        assert!(matches!(err, EmbedError::NoProvider(_)));
        assert!(message.contains("onnx"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_empty_provider_list() {
        let config = DetectorConfig {
            providers: Vec::new(),
            ..DetectorConfig::default()
        };
        assert!(matches!(select(&config), Err(EmbedError::NoProvider(_))));
    }

    #[test]
    fn test_select_with_nothing_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            providers: vec![ProviderKind::Onnx, ProviderKind::Remote],
            models_dir: dir.path().to_path_buf(),
            download_models: false,
            remote_endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
        assert!(matches!(select(&config), Err(EmbedError::NoProvider(_))));
    }
}

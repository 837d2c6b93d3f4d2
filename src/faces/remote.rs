use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use crate::camera::Frame;
use crate::error::EmbedError;

use super::detector::{BoundingBox, FaceEmbedder, Observation};

/// Face embedding service reached over HTTP.
///
/// The service accepts `POST /detect` with a base64 JPEG and answers with
/// one box and embedding per face. `GET /health` is used as the startup probe.
pub struct RemoteEmbedder {
    endpoint: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct DetectRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    faces: Vec<RemoteFace>,
}

#[derive(Debug, Deserialize)]
struct RemoteFace {
    /// top, right, bottom, left
    #[serde(rename = "box")]
    bbox: [i32; 4],
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the service is up
    pub fn probe(&self) -> Result<()> {
        let url = format!("{}/health", self.endpoint);
        self.agent
            .get(&url)
            .call()
            .map_err(|e| anyhow!("Health check failed: {}", e))?;
        Ok(())
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Observation>> {
        let request = DetectRequest {
            image: encode_jpeg(frame)?,
        };

        let url = format!("{}/detect", self.endpoint);
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| anyhow!("Detect request failed: {}", e))?;

        let detect_response: DetectResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse detect response: {}", e))?;

        Ok(into_observations(detect_response))
    }
}

impl FaceEmbedder for RemoteEmbedder {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn detect_and_embed(&mut self, frame: &Frame) -> Result<Vec<Observation>, EmbedError> {
        self.detect(frame).map_err(EmbedError::from)
    }
}

fn into_observations(response: DetectResponse) -> Vec<Observation> {
    response
        .faces
        .into_iter()
        .map(|face| {
            let [top, right, bottom, left] = face.bbox;
            Observation {
                bbox: BoundingBox::new(top, right, bottom, left),
                embedding: face.embedding,
            }
        })
        .collect()
}

fn encode_jpeg(frame: &Frame) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    frame
        .write_with_encoder(encoder)
        .map_err(|e| anyhow!("Failed to encode frame as JPEG: {}", e))?;
    Ok(BASE64.encode(buf.into_inner()))
}

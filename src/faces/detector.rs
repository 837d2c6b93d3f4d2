use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::camera::Frame;
use crate::error::EmbedError;

/// Face location in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl BoundingBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// A face found in one frame, paired with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
}

/// Detection plus embedding, whatever the backend.
pub trait FaceEmbedder {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Find every face in `frame` and embed it.
    fn detect_and_embed(&mut self, frame: &Frame) -> Result<Vec<Observation>, EmbedError>;
}

impl FaceEmbedder for Box<dyn FaceEmbedder> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect_and_embed(&mut self, frame: &Frame) -> Result<Vec<Observation>, EmbedError> {
        (**self).detect_and_embed(frame)
    }
}

const DETECTION_MODEL_FILE: &str = "ultraface-320.onnx";
const DETECTION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";
const EMBEDDING_MODEL_FILE: &str = "arcface-resnet100.onnx";
const EMBEDDING_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/arcface/model/arcfaceresnet100-11-int8.onnx";

/// Local ONNX pipeline: UltraFace (lightweight and fast) for detection,
/// ArcFace for 512-dim L2-normalised embeddings.
///
/// Distances between these embeddings are larger than between dlib
/// encodings, so `matching.tolerance` usually needs raising to around 1.0.
pub struct OnnxEmbedder {
    detection: Session,
    embedding: Session,
}

impl OnnxEmbedder {
    /// Load both models from `models_dir`, downloading missing files when
    /// `download` is set.
    pub fn load(models_dir: &Path, download: bool) -> Result<Self> {
        std::fs::create_dir_all(models_dir)?;

        let detection_path = ensure_model(models_dir, DETECTION_MODEL_FILE, DETECTION_MODEL_URL, download)?;
        let embedding_path = ensure_model(models_dir, EMBEDDING_MODEL_FILE, EMBEDDING_MODEL_URL, download)?;

        let detection = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&detection_path)?;

        let embedding = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&embedding_path)?;

        tracing::info!(models_dir = ?models_dir, "ONNX face models loaded");
        Ok(Self { detection, embedding })
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Observation>> {
        let img = DynamicImage::ImageRgb8(frame.clone());
        let (orig_width, orig_height) = img.dimensions();

        let face_boxes = run_ultraface_detection(&mut self.detection, &img)?;

        let mut observations = Vec::with_capacity(face_boxes.len());
        for (bbox, _confidence) in face_boxes {
            if bbox.is_empty() {
                continue;
            }

            let face_crop = crop_face(&img, &bbox, orig_width, orig_height);
            let embedding = run_arcface_embedding(&mut self.embedding, &face_crop)?;

            observations.push(Observation { bbox, embedding });
        }

        Ok(observations)
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn detect_and_embed(&mut self, frame: &Frame) -> Result<Vec<Observation>, EmbedError> {
        self.run(frame).map_err(EmbedError::from)
    }
}

/// Download a model file if it doesn't exist
fn ensure_model(models_dir: &Path, filename: &str, url: &str, download: bool) -> Result<PathBuf> {
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        if !download {
            return Err(anyhow!("model {} missing from {}", filename, models_dir.display()));
        }

        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        // Write to a temporary name so an interrupted download is not mistaken for a model
        let partial_path = models_dir.join(format!("{}.part", filename));
        let mut file = std::fs::File::create(&partial_path)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        std::fs::rename(&partial_path, &model_path)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

/// Run UltraFace detection model
fn run_ultraface_detection(session: &mut Session, img: &DynamicImage) -> Result<Vec<(BoundingBox, f32)>> {
    const INPUT_WIDTH: u32 = 320;
    const INPUT_HEIGHT: u32 = 240;
    const CONFIDENCE_THRESHOLD: f32 = 0.7;
    const NMS_THRESHOLD: f32 = 0.3;

    let (orig_width, orig_height) = img.dimensions();

    let resized = img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // NCHW, normalised to roughly [-1, 1]
    let plane = (INPUT_HEIGHT * INPUT_WIDTH) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];

    for y in 0..INPUT_HEIGHT as usize {
        for x in 0..INPUT_WIDTH as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * INPUT_WIDTH as usize + x;
            input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0;
            input_data[plane + idx] = (pixel[1] as f32 - 127.0) / 128.0;
            input_data[2 * plane + idx] = (pixel[2] as f32 - 127.0) / 128.0;
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
        input_data.into_boxed_slice(),
    ))?;

    let outputs = session.run(ort::inputs!["input" => input_tensor])?;

    let scores_value = outputs.get("scores")
        .ok_or_else(|| anyhow!("No scores output"))?;
    let boxes_value = outputs.get("boxes")
        .ok_or_else(|| anyhow!("No boxes output"))?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
    let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

    // scores: [1, anchors, 2] (background, face); boxes: [1, anchors, 4] normalised x1 y1 x2 y2
    let num_anchors = scores_shape[1] as usize;
    let mut face_boxes = Vec::new();

    for i in 0..num_anchors {
        let confidence = scores_data[i * 2 + 1];

        if confidence > CONFIDENCE_THRESHOLD {
            let x1 = (boxes_data[i * 4] * orig_width as f32) as i32;
            let y1 = (boxes_data[i * 4 + 1] * orig_height as f32) as i32;
            let x2 = (boxes_data[i * 4 + 2] * orig_width as f32) as i32;
            let y2 = (boxes_data[i * 4 + 3] * orig_height as f32) as i32;

            let left = x1.max(0);
            let top = y1.max(0);
            let bbox = BoundingBox {
                top,
                left,
                right: x2.min(orig_width as i32).max(left + 1),
                bottom: y2.min(orig_height as i32).max(top + 1),
            };

            face_boxes.push((bbox, confidence));
        }
    }

    Ok(nms(face_boxes, NMS_THRESHOLD))
}

/// Non-maximum suppression to remove overlapping detections
pub(crate) fn nms(mut boxes: Vec<(BoundingBox, f32)>, threshold: f32) -> Vec<(BoundingBox, f32)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(boxes[i]);

        for j in (i + 1)..boxes.len() {
            if !suppressed[j] && compute_iou(&boxes[i].0, &boxes[j].0) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection over Union between two bounding boxes
pub(crate) fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.left.max(b.left);
    let top = a.top.max(b.top);
    let right = a.right.min(b.right);
    let bottom = a.bottom.min(b.bottom);

    let intersection = ((right - left).max(0) * (bottom - top).max(0)) as f32;
    let area_a = (a.width() * a.height()) as f32;
    let area_b = (b.width() * b.height()) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Crop face region from image with 20% padding
fn crop_face(img: &DynamicImage, bbox: &BoundingBox, img_width: u32, img_height: u32) -> DynamicImage {
    let padding_x = (bbox.width() as f32 * 0.2) as i32;
    let padding_y = (bbox.height() as f32 * 0.2) as i32;

    let x = ((bbox.left - padding_x).max(0) as u32).min(img_width.saturating_sub(1));
    let y = ((bbox.top - padding_y).max(0) as u32).min(img_height.saturating_sub(1));
    let w = ((bbox.width() + padding_x * 2) as u32).min(img_width - x);
    let h = ((bbox.height() + padding_y * 2) as u32).min(img_height - y);

    img.crop_imm(x, y, w.max(1), h.max(1))
}

/// Run ArcFace embedding model
fn run_arcface_embedding(session: &mut Session, face_img: &DynamicImage) -> Result<Vec<f32>> {
    const INPUT_SIZE: u32 = 112;

    let resized = face_img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];

    for y in 0..INPUT_SIZE as usize {
        for x in 0..INPUT_SIZE as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * INPUT_SIZE as usize + x;
            // ArcFace normalization: (pixel - 127.5) / 127.5
            input_data[idx] = (pixel[0] as f32 - 127.5) / 127.5;
            input_data[plane + idx] = (pixel[1] as f32 - 127.5) / 127.5;
            input_data[2 * plane + idx] = (pixel[2] as f32 - 127.5) / 127.5;
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;

    // ArcFace ONNX model uses "data" as input name
    let outputs = session.run(ort::inputs!["data" => input_tensor])?;

    let embedding_output = outputs.iter().next()
        .ok_or_else(|| anyhow!("No embedding output"))?;

    let (_embedding_shape, embedding_data) = embedding_output.1
        .try_extract_tensor::<f32>()?;

    Ok(l2_normalize(embedding_data.to_vec()))
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

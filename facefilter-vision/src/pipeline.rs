use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;
use std::path::Path;

use crate::face::{self, Detection, FaceEncoding};

/// Detector thresholds used by [`Pipeline::detect_faces`].
#[derive(Debug, Clone, Copy)]
pub struct DetectOptions {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

/// Full pipeline: detect faces → align → encode
pub struct Pipeline {
    pub detector: Session,
    pub encoder: Session,
    pub options: DetectOptions,
}

impl Pipeline {
    pub fn new(
        detector_model: &Path,
        recognizer_model: &Path,
        options: DetectOptions,
    ) -> Result<Self> {
        Ok(Self {
            detector: crate::model::detector_session(detector_model)?,
            encoder: crate::model::recog_session(recognizer_model)?,
            options,
        })
    }

    /// All faces in the image.
    pub fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<Detection>> {
        face::detect_faces(
            &mut self.detector,
            img,
            self.options.score_threshold,
            self.options.nms_threshold,
        )
        .context("detecting faces")
    }

    /// One encoding per detection, in the same order.
    pub fn encode_faces(
        &mut self,
        img: &DynamicImage,
        detections: &[Detection],
    ) -> Result<Vec<FaceEncoding>> {
        detections
            .iter()
            .map(|d| {
                let aligned = face::align_face(img, d);
                face::encode_face(&mut self.encoder, &aligned).context("encoding face")
            })
            .collect()
    }

    /// Detect then encode every face in the image.
    pub fn faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceEncoding>> {
        let detections = self.detect_faces(img)?;
        self.encode_faces(img, &detections)
    }
}

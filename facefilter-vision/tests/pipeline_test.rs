use anyhow::Result;
use facefilter_vision::{distance, DetectOptions, Pipeline, ENCODING_LEN};
use std::path::PathBuf;

/// Model files live outside the repository; point `FACEFILTER_MODEL_DIR` at a
/// directory holding the YuNet and SFace ONNX exports to run these.
fn model_paths() -> Option<(PathBuf, PathBuf)> {
    let dir = PathBuf::from(std::env::var_os("FACEFILTER_MODEL_DIR")?);
    let detector = dir.join("face_detection_yunet_2023mar.onnx");
    let recognizer = dir.join("face_recognition_sface_2021dec.onnx");
    (detector.exists() && recognizer.exists()).then_some((detector, recognizer))
}

#[test]
fn test_pipeline_missing_models() {
    let missing = PathBuf::from("/nonexistent/model.onnx");
    let result = Pipeline::new(&missing, &missing, DetectOptions::default());
    assert!(result.is_err());
}

#[test]
fn test_blank_image_has_no_faces() -> Result<()> {
    env_logger::try_init().ok();
    let Some((detector, recognizer)) = model_paths() else {
        eprintln!("Skipping: FACEFILTER_MODEL_DIR not set");
        return Ok(());
    };
    let mut pipeline = Pipeline::new(&detector, &recognizer, DetectOptions::default())?;

    let img = image::DynamicImage::new_rgb8(320, 240);
    assert!(pipeline.faces(&img)?.is_empty());
    Ok(())
}

#[test]
fn test_sample_face_encodes_to_unit_vector() -> Result<()> {
    env_logger::try_init().ok();
    let Some((detector, recognizer)) = model_paths() else {
        eprintln!("Skipping: FACEFILTER_MODEL_DIR not set");
        return Ok(());
    };
    let Some(sample) = std::env::var_os("FACEFILTER_SAMPLE_FACE") else {
        eprintln!("Skipping: FACEFILTER_SAMPLE_FACE not set");
        return Ok(());
    };
    let mut pipeline = Pipeline::new(&detector, &recognizer, DetectOptions::default())?;

    let img = image::open(sample)?;
    let encodings = pipeline.faces(&img)?;
    assert!(!encodings.is_empty(), "expected a face in the sample image");

    let enc = &encodings[0];
    assert_eq!(enc.vector.len(), ENCODING_LEN);
    let norm = enc.vector.dot(&enc.vector).sqrt();
    assert!((norm - 1.0).abs() < 1e-3);

    // the same image encodes to the same face
    let again = pipeline.faces(&img)?;
    assert!(distance(enc, &again[0]) < 1e-4);
    Ok(())
}

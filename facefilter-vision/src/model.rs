use anyhow::{Context, Result};
use ort::{
    ep::{self, ExecutionProvider},
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
};
use std::path::Path;

pub fn session_builder() -> Result<SessionBuilder> {
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

fn load(path: &Path, what: &str) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!("{} model not found at {}", what, path.display());
    }
    let session = session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("loading {} model {}", what, path.display()))?;
    log::debug!("loaded {} model from {}", what, path.display());
    Ok(session)
}

/// YuNet face detector (`face_detection_yunet_2023mar.onnx`).
pub fn detector_session(path: &Path) -> Result<Session> {
    load(path, "detector")
}

/// SFace recognizer (`face_recognition_sface_2021dec.onnx`).
pub fn recog_session(path: &Path) -> Result<Session> {
    load(path, "recognizer")
}

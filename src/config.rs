use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::DEFAULT_TOLERANCE;

/// Compile-time override, otherwise the platform config directory.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACEFILTER_CONFIG_PATH") {
    Some(path) => PathBuf::from(path),
    None => data_root(ProjectDirs::config_dir).join("config.toml"),
});

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACEFILTER_DATA_DIR") {
    Some(path) => PathBuf::from(path),
    None => data_root(ProjectDirs::data_dir),
});

fn data_root(pick: impl Fn(&ProjectDirs) -> &Path) -> PathBuf {
    ProjectDirs::from("", "", "facefilter")
        .map(|dirs| pick(&dirs).to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum encoding distance accepted as the same person.
    pub tolerance: f32,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub detector_model: PathBuf,
    pub recognizer_model: PathBuf,
    /// Encoding store used when `--store` is not given.
    pub store: PathBuf,
    /// Longest side of match previews, in pixels.
    pub thumbnail_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            score_threshold: 0.6,
            nms_threshold: 0.3,
            detector_model: DATA_DIR.join("face_detection_yunet_2023mar.onnx"),
            recognizer_model: DATA_DIR.join("face_recognition_sface_2021dec.onnx"),
            store: DATA_DIR.join("encodings.ffks"),
            thumbnail_size: 256,
        }
    }
}

impl Config {
    pub fn detect_options(&self) -> facefilter_vision::DetectOptions {
        facefilter_vision::DetectOptions {
            score_threshold: self.score_threshold,
            nms_threshold: self.nms_threshold,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::images::{has_image_extension, label_for, list_images, load_image};
use crate::storage::KnownSet;
use crate::{FaceEncoding, Pipeline};

/// Anything that can turn an image into one encoding per visible face.
pub trait FaceEncoder {
    /// Encodings of every detected face; empty when there is none.
    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceEncoding>>;
}

impl FaceEncoder for Pipeline {
    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceEncoding>> {
        self.faces(img)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Unreadable,
    NoFace,
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable => write!(f, "unreadable image"),
            SkipReason::NoFace => write!(f, "no face detected"),
            SkipReason::Failed(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct EncodeReport {
    pub known: KnownSet,
    pub skipped: Vec<SkippedFile>,
}

/// Build a known set from a folder of one-face reference photos, labelled by
/// file stem.
///
/// Files that cannot be decoded or show no face are left out and listed in
/// [`EncodeReport::skipped`]. Extra faces beyond the first are ignored.
pub fn encode_folder<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    folder: &Path,
) -> Result<EncodeReport> {
    let files = list_images(folder)?;
    info!("Encoding {} reference image(s) from {}", files.len(), folder.display());

    let mut report = EncodeReport::default();
    for path in files {
        let label = label_for(&path);
        let skip = match load_image(&path) {
            Err(e) => {
                warn!("{:#}", e);
                Some(SkipReason::Unreadable)
            }
            Ok(img) => match encoder.encode_faces(&img) {
                Ok(encodings) => match encodings.into_iter().next() {
                    Some(encoding) => {
                        report.known.push(label.as_str(), encoding);
                        None
                    }
                    None => Some(SkipReason::NoFace),
                },
                Err(e) => Some(SkipReason::Failed(format!("{:#}", e))),
            },
        };

        if let Some(reason) = skip {
            warn!("Skipping reference '{}' ({}): {}", label, path.display(), reason);
            report.skipped.push(SkippedFile { path, reason });
        }
    }

    info!(
        "Encoded {} face(s), skipped {}",
        report.known.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Encode the first face of a single reference photo.
///
/// Unlike [`encode_folder`], every failure is an error: the caller asked for
/// this exact file.
pub fn encode_reference<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    path: &Path,
) -> Result<FaceEncoding> {
    if !path.is_file() {
        anyhow::bail!("Face image not found: {}", path.display());
    }
    if !has_image_extension(path) {
        anyhow::bail!("Not a PNG or JPEG image: {}", path.display());
    }
    let img = load_image(path)?;
    encoder
        .encode_faces(&img)
        .with_context(|| format!("encoding {}", path.display()))?
        .into_iter()
        .next()
        .with_context(|| format!("No faces found in {}", path.display()))
}

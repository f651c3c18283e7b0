//! Command interface for interactive front-ends: pick a folder, pick a face,
//! run the match and listen to [`MatchEvent`]s.

use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};

use crate::encoder::{encode_reference, FaceEncoder};
use crate::images::has_image_extension;
use crate::matcher::DEFAULT_TOLERANCE;
use crate::scanner::{matched_paths, scan_folder, MatchEvent, Probe};

#[derive(Debug, Clone)]
pub struct FilterSession {
    source_folder: Option<PathBuf>,
    face_image: Option<PathBuf>,
    pub tolerance: f32,
}

impl Default for FilterSession {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl FilterSession {
    pub fn new(tolerance: f32) -> Self {
        Self {
            source_folder: None,
            face_image: None,
            tolerance,
        }
    }

    pub fn select_folder(&mut self, folder: impl Into<PathBuf>) -> Result<()> {
        let folder = folder.into();
        if !folder.is_dir() {
            anyhow::bail!("Not a folder: {}", folder.display());
        }
        self.source_folder = Some(folder);
        Ok(())
    }

    pub fn select_face_image(&mut self, image: impl Into<PathBuf>) -> Result<()> {
        let image = image.into();
        if !image.is_file() {
            anyhow::bail!("Face image not found: {}", image.display());
        }
        if !has_image_extension(&image) {
            anyhow::bail!("Face image must be PNG or JPEG: {}", image.display());
        }
        self.face_image = Some(image);
        Ok(())
    }

    pub fn source_folder(&self) -> Option<&Path> {
        self.source_folder.as_deref()
    }

    pub fn face_image(&self) -> Option<&Path> {
        self.face_image.as_deref()
    }

    /// Encode the chosen face, scan the chosen folder and return the matching
    /// files in scan order.
    pub fn run_match<E, F>(&self, encoder: &mut E, on_event: F) -> Result<Vec<PathBuf>>
    where
        E: FaceEncoder + ?Sized,
        F: FnMut(MatchEvent),
    {
        let Some(folder) = self.source_folder.as_deref() else {
            anyhow::bail!("Please select an input folder first.");
        };
        let Some(face) = self.face_image.as_deref() else {
            anyhow::bail!("Please select a face photo first.");
        };

        let reference = encode_reference(encoder, face)?;
        let probe = Probe::Single {
            encoding: &reference,
            tolerance: self.tolerance,
        };
        let results = scan_folder(encoder, folder, &probe, on_event)?;
        let matched = matched_paths(&results);
        info!(
            "Found {} image(s) matching {}",
            matched.len(),
            face.display()
        );
        Ok(matched)
    }
}

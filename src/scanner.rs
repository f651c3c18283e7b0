use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::encoder::FaceEncoder;
use crate::images::{list_images, load_image};
use crate::matcher;
use crate::storage::KnownSet;
use crate::FaceEncoding;

/// What a candidate face is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    /// One reference face.
    Single {
        encoding: &'a FaceEncoding,
        tolerance: f32,
    },
    /// The nearest known face must carry `target` as its label.
    Known {
        set: &'a KnownSet,
        target: &'a str,
        tolerance: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub label: Option<String>,
    pub distance: f32,
}

impl Probe<'_> {
    /// Evaluate one candidate face.
    pub fn check(&self, face: &FaceEncoding) -> Option<FaceMatch> {
        match *self {
            Probe::Single {
                encoding,
                tolerance,
            } => {
                let distance = facefilter_vision::distance(encoding, face);
                matcher::matches(encoding, face, tolerance).then_some(FaceMatch {
                    label: None,
                    distance,
                })
            }
            Probe::Known {
                set,
                target,
                tolerance,
            } => match matcher::best_match(set, face, tolerance) {
                Some((label, distance)) if label == target => Some(FaceMatch {
                    label: Some(label.to_string()),
                    distance,
                }),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub path: PathBuf,
    pub is_match: bool,
    /// Set when a face matched.
    pub best: Option<FaceMatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// `current` of `total` files processed, counting skips.
    Progress { current: usize, total: usize },
    Matched(PathBuf),
}

/// Check every image in `folder` against `probe`, in file-name order.
///
/// `total` in progress events is the number of files with an image extension,
/// fixed before the scan starts. Unreadable files and files whose faces fail
/// to encode count toward progress but never match.
pub fn scan_folder<E, F>(
    encoder: &mut E,
    folder: &Path,
    probe: &Probe<'_>,
    mut on_event: F,
) -> Result<Vec<MatchResult>>
where
    E: FaceEncoder + ?Sized,
    F: FnMut(MatchEvent),
{
    let files = list_images(folder)?;
    let total = files.len();
    let mut results = Vec::with_capacity(total);

    for (i, path) in files.into_iter().enumerate() {
        let best = check_file(encoder, &path, probe);
        let is_match = best.is_some();
        if is_match {
            on_event(MatchEvent::Matched(path.clone()));
        }
        results.push(MatchResult {
            path,
            is_match,
            best,
        });
        on_event(MatchEvent::Progress {
            current: i + 1,
            total,
        });
    }

    Ok(results)
}

/// First matching face in the file, if any.
fn check_file<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    path: &Path,
    probe: &Probe<'_>,
) -> Option<FaceMatch> {
    let img = match load_image(path) {
        Ok(img) => img,
        Err(e) => {
            warn!("Skipping {:#}", e);
            return None;
        }
    };

    let faces = match encoder.encode_faces(&img) {
        Ok(faces) => faces,
        Err(e) => {
            warn!("Skipping {}: {:#}", path.display(), e);
            return None;
        }
    };
    debug!("{}: {} face(s)", path.display(), faces.len());

    faces.iter().find_map(|face| probe.check(face))
}

pub fn matched_paths(results: &[MatchResult]) -> Vec<PathBuf> {
    results
        .iter()
        .filter(|r| r.is_match)
        .map(|r| r.path.clone())
        .collect()
}

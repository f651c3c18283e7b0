use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::encoder::FaceEncoder;
use crate::scanner::{scan_folder, MatchEvent, MatchResult, Probe};
use crate::storage::KnownSet;

#[derive(Debug)]
pub struct SeparateReport {
    pub scanned: Vec<MatchResult>,
    /// Destination paths of the copies, in scan order.
    pub copied: Vec<PathBuf>,
    /// Matched sources that could not be copied, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Copy every image in `source` whose faces include `target` into
/// `destination`, keeping file names. Existing files there are overwritten.
///
/// A failed copy is logged and listed in [`SeparateReport::failed`]; the
/// remaining matches are still copied.
pub fn separate<E, F>(
    encoder: &mut E,
    known: &KnownSet,
    source: &Path,
    destination: &Path,
    target: &str,
    tolerance: f32,
    on_event: F,
) -> Result<SeparateReport>
where
    E: FaceEncoder + ?Sized,
    F: FnMut(MatchEvent),
{
    if !known.labels().iter().any(|l| l == target) {
        warn!("'{}' is not a label in the encoding store; nothing can match", target);
    }

    std::fs::create_dir_all(destination)
        .with_context(|| format!("creating {}", destination.display()))?;

    let probe = Probe::Known {
        set: known,
        target,
        tolerance,
    };
    let scanned = scan_folder(encoder, source, &probe, on_event)?;

    let mut copied = Vec::new();
    let mut failed = Vec::new();
    for result in scanned.iter().filter(|r| r.is_match) {
        let Some(name) = result.path.file_name() else {
            continue;
        };
        let dst = destination.join(name);
        if let Err(e) = std::fs::copy(&result.path, &dst) {
            warn!(
                "Could not copy {} to {}: {}",
                result.path.display(),
                dst.display(),
                e
            );
            failed.push((result.path.clone(), e.to_string()));
            continue;
        }
        info!(
            "Copied '{}' because it contains '{}'",
            name.to_string_lossy(),
            target
        );
        copied.push(dst);
    }

    Ok(SeparateReport {
        scanned,
        copied,
        failed,
    })
}

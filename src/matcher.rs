use crate::{storage::KnownSet, FaceEncoding};

/// Default L2 tolerance, calibrated for SFace encodings.
pub const DEFAULT_TOLERANCE: f32 = facefilter_vision::SFACE_L2_THRESHOLD;

/// Distance from `probe` to every known encoding, in set order.
pub fn face_distances(known: &KnownSet, probe: &FaceEncoding) -> Vec<f32> {
    known
        .encodings()
        .iter()
        .map(|e| facefilter_vision::distance(e, probe))
        .collect()
}

/// Nearest known face within `tolerance`.
///
/// Ties go to the lowest index. Acceptance is decided on the argmin itself, so
/// a farther face that happens to be within tolerance never wins.
pub fn best_match<'a>(
    known: &'a KnownSet,
    probe: &FaceEncoding,
    tolerance: f32,
) -> Option<(&'a str, f32)> {
    let (index, dist) = face_distances(known, probe)
        .into_iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, d)| match best {
            Some((_, b)) if d >= b || d.is_nan() => best,
            _ => Some((i, d)),
        })?;

    (dist <= tolerance).then(|| (known.labels()[index].as_str(), dist))
}

/// Single-reference form used when matching against one chosen photo.
pub fn matches(reference: &FaceEncoding, probe: &FaceEncoding, tolerance: f32) -> bool {
    facefilter_vision::distance(reference, probe) <= tolerance
}

//! YuNet post-processing.
//!
//! YuNet is anchor-free: every grid cell of the three feature maps
//! (strides 8, 16, 32) predicts a score, a box and five landmarks directly.
//! The model emits twelve tensors grouped by kind, each group ordered by
//! stride: `cls`, `obj`, `bbox`, `kps`.
//!
//! A cell (i, j) with deltas (dx, dy, dw, dh) decodes to
//! `cx = (j + dx) * stride`, `cy = (i + dy) * stride`, `w = exp(dw) * stride`,
//! `h = exp(dh) * stride`, all normalized by the input side. The score is the
//! geometric mean of the (already activated) `cls` and `obj` outputs.

use anyhow::Result;
use ndarray::Array2;

const STRIDES: [usize; 3] = [8, 16, 32];

/// Detection in coordinates normalized to the detector canvas.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10],
}

/// Per-stride prediction heads.
#[derive(Debug)]
pub struct Heads {
    /// `sqrt(cls * obj)`, shape `[cells, 1]`.
    pub scores: Vec<Array2<f32>>,
    /// Shape `[cells, 4]`.
    pub boxes: Vec<Array2<f32>>,
    /// Shape `[cells, 10]`.
    pub landmarks: Vec<Array2<f32>>,
}

fn fuse(cls: f32, obj: f32) -> f32 {
    (cls.clamp(0.0, 1.0) * obj.clamp(0.0, 1.0)).sqrt()
}

/// Reads one group of three tensors (one per stride) starting at `first`.
fn take_group(
    outputs: &[(&[i64], &[f32])],
    first: usize,
    width: usize,
    input_size: usize,
    kind: &str,
) -> Result<Vec<Array2<f32>>> {
    let mut group = Vec::with_capacity(STRIDES.len());
    for (k, stride) in STRIDES.iter().enumerate() {
        let idx = first + k;
        let cells = (input_size / stride) * (input_size / stride);
        let Some((shape, data)) = outputs.get(idx) else {
            anyhow::bail!("missing {} output at index {}", kind, idx);
        };
        if shape.len() != 3
            || shape[0] != 1
            || shape[1] as usize != cells
            || shape[2] as usize != width
        {
            anyhow::bail!(
                "unexpected {} shape at index {}: {:?}, expected [1, {}, {}]",
                kind,
                idx,
                shape,
                cells,
                width
            );
        }
        group.push(Array2::from_shape_vec((cells, width), data.to_vec())?);
    }
    Ok(group)
}

/// Split the twelve raw outputs into per-stride heads and fuse the
/// classification and objectness scores.
pub fn parse_outputs(outputs: &[(&[i64], &[f32])], input_size: usize) -> Result<Heads> {
    let cls = take_group(outputs, 0, 1, input_size, "cls")?;
    let obj = take_group(outputs, 3, 1, input_size, "obj")?;
    let boxes = take_group(outputs, 6, 4, input_size, "bbox")?;
    let landmarks = take_group(outputs, 9, 10, input_size, "kps")?;

    let scores = cls
        .into_iter()
        .zip(obj)
        .map(|(mut c, o)| {
            c.zip_mut_with(&o, |c, &o| *c = fuse(*c, o));
            c
        })
        .collect();

    Ok(Heads {
        scores,
        boxes,
        landmarks,
    })
}

/// Decode every cell whose fused score reaches `score_threshold`.
pub fn decode(
    heads: &Heads,
    score_threshold: f32,
    input_size: usize,
) -> Result<Vec<RawDetection>> {
    let size = input_size as f32;
    let mut detections = Vec::new();

    for (s, &stride) in STRIDES.iter().enumerate() {
        let grid = input_size / stride;
        let (scores, boxes, lms) = (&heads.scores[s], &heads.boxes[s], &heads.landmarks[s]);
        if scores.nrows() != grid * grid {
            anyhow::bail!(
                "stride {} expects {} cells, got {}",
                stride,
                grid * grid,
                scores.nrows()
            );
        }

        let stride = stride as f32;
        for idx in 0..grid * grid {
            let score = scores[[idx, 0]];
            if score < score_threshold {
                continue;
            }
            let (i, j) = ((idx / grid) as f32, (idx % grid) as f32);

            let cx = (j + boxes[[idx, 0]]) * stride / size;
            let cy = (i + boxes[[idx, 1]]) * stride / size;
            let w = boxes[[idx, 2]].exp() * stride / size;
            let h = boxes[[idx, 3]].exp() * stride / size;

            let mut landmarks = [0.0f32; 10];
            for k in 0..5 {
                landmarks[k * 2] = (j + lms[[idx, k * 2]]) * stride / size;
                landmarks[k * 2 + 1] = (i + lms[[idx, k * 2 + 1]]) * stride / size;
            }

            detections.push(RawDetection {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_heads(input_size: usize) -> Heads {
        let zeros = |width: usize| -> Vec<Array2<f32>> {
            STRIDES
                .iter()
                .map(|s| Array2::zeros(((input_size / s).pow(2), width)))
                .collect()
        };
        Heads {
            scores: zeros(1),
            boxes: zeros(4),
            landmarks: zeros(10),
        }
    }

    #[test]
    fn test_fuse() {
        assert!((fuse(0.81, 1.0) - 0.9).abs() < 1e-6);
        assert_eq!(fuse(-0.5, 1.0), 0.0);
        assert_eq!(fuse(2.0, 1.0), 1.0);
    }

    #[test]
    fn test_decode_single_cell() {
        let input_size = 640;
        let mut heads = empty_heads(input_size);

        // stride 32 grid is 20x20; light up cell (10, 10)
        let idx = 10 * 20 + 10;
        heads.scores[2][[idx, 0]] = 0.9;
        heads.boxes[2][[idx, 0]] = 0.5;
        heads.boxes[2][[idx, 1]] = 0.3;
        heads.boxes[2][[idx, 2]] = 4.0f32.ln();
        heads.boxes[2][[idx, 3]] = 4.0f32.ln();

        let detections = decode(&heads, 0.5, input_size).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];

        // cx = 10.5 * 32 / 640 = 0.525, cy = 10.3 * 32 / 640 = 0.515, w = h = 0.2
        assert!((det.bbox[0] - 0.425).abs() < 1e-5);
        assert!((det.bbox[1] - 0.415).abs() < 1e-5);
        assert!((det.bbox[2] - 0.2).abs() < 1e-5);
        assert!((det.bbox[3] - 0.2).abs() < 1e-5);
        assert!((det.score - 0.9).abs() < 1e-5);
        assert!((det.landmarks[0] - 0.5).abs() < 1e-5);
        assert!((det.landmarks[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_decode_below_threshold() {
        let heads = empty_heads(640);
        assert!(decode(&heads, 0.5, 640).unwrap().is_empty());
    }

    #[test]
    fn test_parse_outputs_rejects_missing_tensors() {
        let shape = [1i64, 6400, 1];
        let data = vec![0.0f32; 6400];
        let outputs = vec![(&shape[..], &data[..])];
        assert!(parse_outputs(&outputs, 640).is_err());
    }

    #[test]
    fn test_parse_outputs_fuses_scores() {
        let input_size = 64;
        let mut owned: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (width, fill) in [(1usize, 0.64f32), (1, 1.0), (4, 0.0), (10, 0.0)] {
            for stride in STRIDES {
                let cells = (input_size / stride).pow(2);
                owned.push((vec![1, cells as i64, width as i64], vec![fill; cells * width]));
            }
        }
        let outputs: Vec<(&[i64], &[f32])> = owned
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let heads = parse_outputs(&outputs, input_size).unwrap();
        assert_eq!(heads.scores.len(), 3);
        assert!((heads.scores[0][[0, 0]] - 0.8).abs() < 1e-6);
        assert_eq!(heads.boxes[1].ncols(), 4);
        assert_eq!(heads.landmarks[2].ncols(), 10);
    }
}

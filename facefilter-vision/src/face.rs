use crate::yunet;
use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array1, Array4};
use ort::{session::Session, value::Value};

/// Length of an SFace encoding.
pub const ENCODING_LEN: usize = 128;

/// YuNet is exported with a fixed [1, 3, 640, 640] input.
const DETECTOR_INPUT: u32 = 640;

/// SFace input side.
const ALIGNED_SIZE: u32 = 112;

/// ArcFace reference eye positions on a 112x112 crop.
const REF_LEFT_EYE: (f32, f32) = (38.3, 51.7);
const REF_RIGHT_EYE: (f32, f32) = (73.5, 51.5);

/// A face found by the detector, in source image pixels.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // 5 points as x,y pairs: eyes, nose tip, mouth corners
}

/// L2-normalized face encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding {
    pub vector: Array1<f32>,
}

impl FaceEncoding {
    /// Wraps a raw vector, rejecting anything that is not [`ENCODING_LEN`] long.
    pub fn from_vec(values: Vec<f32>) -> Result<Self> {
        if values.len() != ENCODING_LEN {
            anyhow::bail!(
                "face encoding must have {} values, got {}",
                ENCODING_LEN,
                values.len()
            );
        }
        Ok(Self {
            vector: Array1::from_vec(values),
        })
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.vector.to_vec()
    }
}

/// OpenCV's published SFace acceptance threshold, as an L2 distance between
/// normalized encodings. Equivalent to cosine similarity 0.363.
pub const SFACE_L2_THRESHOLD: f32 = 1.128;

/// L2 distance between two unit vectors whose cosine similarity is `cosine`.
pub fn l2_from_cosine(cosine: f32) -> f32 {
    (2.0 - 2.0 * cosine).max(0.0).sqrt()
}

/// Euclidean distance between two encodings.
pub fn distance(a: &FaceEncoding, b: &FaceEncoding) -> f32 {
    let diff = &a.vector - &b.vector;
    diff.dot(&diff).sqrt()
}

/// Pixel mapping between the source image and the square detector canvas.
struct Letterbox {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

impl Letterbox {
    fn new(width: u32, height: u32) -> Self {
        let scale = DETECTOR_INPUT as f32 / width.max(height) as f32;
        let new_w = (width as f32 * scale) as u32;
        let new_h = (height as f32 * scale) as u32;
        Self {
            scale,
            offset_x: ((DETECTOR_INPUT - new_w) / 2) as f32,
            offset_y: ((DETECTOR_INPUT - new_h) / 2) as f32,
        }
    }

    fn canvas(&self, img: &DynamicImage) -> RgbImage {
        let (w, h) = img.dimensions();
        let resized = img.resize_exact(
            (w as f32 * self.scale) as u32,
            (h as f32 * self.scale) as u32,
            image::imageops::FilterType::Triangle,
        );
        let mut canvas = DynamicImage::new_rgb8(DETECTOR_INPUT, DETECTOR_INPUT);
        image::imageops::overlay(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas.to_rgb8()
    }

    /// Maps a normalized canvas x coordinate back to source pixels.
    fn x(&self, v: f32) -> f32 {
        (v * DETECTOR_INPUT as f32 - self.offset_x) / self.scale
    }

    fn y(&self, v: f32) -> f32 {
        (v * DETECTOR_INPUT as f32 - self.offset_y) / self.scale
    }

    fn len(&self, v: f32) -> f32 {
        v * DETECTOR_INPUT as f32 / self.scale
    }
}

/// Packs an RGB image into planar BGR `f32` in [0, 255], the layout both
/// OpenCV-zoo models expect.
fn bgr_planar(img: &RgbImage) -> Vec<f32> {
    let pixel_count = (img.width() * img.height()) as usize;
    let mut data = vec![0.0f32; 3 * pixel_count];
    let (b, rest) = data.split_at_mut(pixel_count);
    let (g, r) = rest.split_at_mut(pixel_count);
    for (i, px) in img.pixels().enumerate() {
        r[i] = px[0] as f32;
        g[i] = px[1] as f32;
        b[i] = px[2] as f32;
    }
    data
}

/// Detect every face in an image with YuNet.
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Ok(vec![]);
    }

    let letterbox = Letterbox::new(width, height);
    let canvas = letterbox.canvas(img);
    let side = DETECTOR_INPUT as usize;
    let input = Array4::from_shape_vec((1, 3, side, side), bgr_planar(&canvas))?;
    let outputs = session.run(ort::inputs![Value::from_array(input)?])?;

    let mut tensors: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        tensors.push((shape.iter().copied().collect(), data.to_vec()));
    }
    let views: Vec<(&[i64], &[f32])> = tensors
        .iter()
        .map(|(s, d)| (s.as_slice(), d.as_slice()))
        .collect();

    let heads = yunet::parse_outputs(&views, side).context("parsing YuNet outputs")?;
    let raw = yunet::decode(&heads, score_threshold, side)?;

    let detections: Vec<Detection> = raw
        .into_iter()
        .map(|d| {
            let mut landmarks = [0.0f32; 10];
            for k in 0..5 {
                landmarks[k * 2] = letterbox.x(d.landmarks[k * 2]);
                landmarks[k * 2 + 1] = letterbox.y(d.landmarks[k * 2 + 1]);
            }
            Detection {
                bbox: [
                    letterbox.x(d.bbox[0]),
                    letterbox.y(d.bbox[1]),
                    letterbox.len(d.bbox[2]),
                    letterbox.len(d.bbox[3]),
                ],
                score: d.score,
                landmarks,
            }
        })
        .collect();

    if nms_threshold < 1.0 {
        Ok(nms(&detections, nms_threshold))
    } else {
        Ok(detections)
    }
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in sorted {
        if keep
            .iter()
            .all(|kept| iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    inter / (a[2] * a[3] + b[2] * b[3] - inter)
}

/// Rotate, scale and crop a face so its eyes land on the ArcFace reference
/// positions of a 112x112 crop.
pub fn align_face(img: &DynamicImage, detection: &Detection) -> DynamicImage {
    let size = ALIGNED_SIZE;
    let left_eye = (detection.landmarks[0], detection.landmarks[1]);
    let right_eye = (detection.landmarks[2], detection.landmarks[3]);

    let dx = right_eye.0 - left_eye.0;
    let dy = right_eye.1 - left_eye.1;
    let angle = dy.atan2(dx);
    let ref_dist = (REF_RIGHT_EYE.0 - REF_LEFT_EYE.0).hypot(REF_RIGHT_EYE.1 - REF_LEFT_EYE.1);
    let eye_dist = dx.hypot(dy).max(f32::EPSILON);
    let scale = ref_dist / eye_dist;

    let center = ((left_eye.0 + right_eye.0) / 2.0, (left_eye.1 + right_eye.1) / 2.0);
    let ref_center = (
        (REF_LEFT_EYE.0 + REF_RIGHT_EYE.0) / 2.0,
        (REF_LEFT_EYE.1 + REF_RIGHT_EYE.1) / 2.0,
    );

    // out = M * in + t, with M = scale * [cos sin; -sin cos]
    let (sin, cos) = angle.sin_cos();
    let (a, b, c, d) = (scale * cos, scale * sin, -scale * sin, scale * cos);
    let tx = ref_center.0 - (a * center.0 + b * center.1);
    let ty = ref_center.1 - (c * center.0 + d * center.1);
    let det = a * d - b * c;

    let src = img.to_rgb8();
    let (w, h) = src.dimensions();
    let mut out = RgbImage::new(size, size);

    for (ox, oy, px) in out.enumerate_pixels_mut() {
        let rx = ox as f32 - tx;
        let ry = oy as f32 - ty;
        let sx = (d * rx - b * ry) / det;
        let sy = (-c * rx + a * ry) / det;
        if sx < 0.0 || sy < 0.0 || sx >= w as f32 || sy >= h as f32 {
            continue;
        }

        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let p00 = src.get_pixel(x0, y0);
        let p10 = src.get_pixel(x1, y0);
        let p01 = src.get_pixel(x0, y1);
        let p11 = src.get_pixel(x1, y1);
        for ch in 0..3 {
            let v = p00[ch] as f32 * (1.0 - fx) * (1.0 - fy)
                + p10[ch] as f32 * fx * (1.0 - fy)
                + p01[ch] as f32 * (1.0 - fx) * fy
                + p11[ch] as f32 * fx * fy;
            px[ch] = v as u8;
        }
    }

    DynamicImage::ImageRgb8(out)
}

/// Run SFace on an aligned crop and L2-normalize the result.
pub fn encode_face(session: &mut Session, aligned: &DynamicImage) -> Result<FaceEncoding> {
    let crop = aligned
        .resize_exact(ALIGNED_SIZE, ALIGNED_SIZE, image::imageops::FilterType::Triangle)
        .to_rgb8();
    let side = ALIGNED_SIZE as usize;
    let input = Array4::from_shape_vec((1, 3, side, side), bgr_planar(&crop))?;
    let outputs = session.run(ort::inputs![Value::from_array(input)?])?;
    let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

    if data.len() < ENCODING_LEN {
        anyhow::bail!(
            "recognizer produced {} values, expected {}",
            data.len(),
            ENCODING_LEN
        );
    }

    let mut vector = Array1::from_vec(data[..ENCODING_LEN].to_vec());
    let norm = vector.dot(&vector).sqrt();
    if norm > 0.0 {
        vector /= norm;
    }
    Ok(FaceEncoding { vector })
}

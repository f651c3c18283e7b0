#![allow(dead_code)]

use anyhow::Result;
use facefilter::{FaceEncoder, FaceEncoding, ENCODING_LEN};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

pub const ALICE: [u8; 3] = [255, 0, 0];
pub const BOB: [u8; 3] = [0, 255, 0];
pub const STRANGER: [u8; 3] = [0, 0, 255];

/// Test encoder: every distinct non-black colour along the top row of an
/// image is one "face", encoded from its (thresholded) RGB value. The primary
/// colours used below are sqrt(2) apart, beyond the default tolerance.
#[derive(Default)]
pub struct ColorFaces {
    pub calls: usize,
}

impl FaceEncoder for ColorFaces {
    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceEncoding>> {
        self.calls += 1;
        let rgb = img.to_rgb8();
        let mut seen: Vec<[u8; 3]> = Vec::new();
        for x in 0..rgb.width() {
            let px = rgb.get_pixel(x, 0).0.map(|c| if c > 127 { 255 } else { 0 });
            if px != [0, 0, 0] && !seen.contains(&px) {
                seen.push(px);
            }
        }
        seen.into_iter().map(encoding_for).collect()
    }
}

pub fn encoding_for(color: [u8; 3]) -> Result<FaceEncoding> {
    let mut v = vec![0.0f32; ENCODING_LEN];
    for (slot, c) in v.iter_mut().zip(color) {
        *slot = c as f32 / 255.0;
    }
    FaceEncoding::from_vec(v)
}

/// Write a 32x16 image showing the given faces as vertical bands on black.
pub fn write_photo(path: &Path, faces: &[[u8; 3]]) {
    let mut img = RgbImage::new(32, 16);
    if !faces.is_empty() {
        let band = 32 / faces.len() as u32;
        for (x, _y, px) in img.enumerate_pixels_mut() {
            let i = ((x / band) as usize).min(faces.len() - 1);
            // leave a black gap between bands
            if x % band >= 2 {
                *px = Rgb(faces[i]);
            }
        }
    }
    img.save(path).unwrap();
}

pub fn write_garbage(path: &Path) {
    std::fs::write(path, b"this is not an image").unwrap();
}

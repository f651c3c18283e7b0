use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::images::{label_for, load_image};

/// Write a PNG thumbnail of `source` into `dir`, fitting `max_side` and keeping
/// the aspect ratio. Images already small enough are not enlarged.
pub fn write_thumbnail(source: &Path, dir: &Path, max_side: u32) -> Result<PathBuf> {
    let img = load_image(source)?;
    let side = max_side.max(1);
    let thumb = if img.width() > side || img.height() > side {
        img.thumbnail(side, side)
    } else {
        img
    };

    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let out = dir.join(format!("{}.png", label_for(source)));
    thumb
        .save_with_format(&out, image::ImageFormat::Png)
        .with_context(|| format!("writing preview {}", out.display()))?;
    Ok(out)
}

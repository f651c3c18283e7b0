use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether the path has one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Image files directly inside `folder`, sorted by file name.
///
/// Only the extension is checked here; files that fail to decode are dealt
/// with by the caller.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("listing {}", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", folder.display()))?;
        let path = entry.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("reading image {}", path.display()))
}

/// File stem used as an identity label.
pub fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert!(has_image_extension(Path::new("a/b.png")));
        assert!(has_image_extension(Path::new("B.JPG")));
        assert!(has_image_extension(Path::new("c.Jpeg")));
        assert!(!has_image_extension(Path::new(".DS_Store")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("png")));
    }

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "c.txt", "d.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg", "d.jpeg"]);
    }

    #[test]
    fn test_list_missing_folder() {
        assert!(list_images(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_label_for() {
        assert_eq!(label_for(Path::new("refs/alice.jpg")), "alice");
        assert_eq!(label_for(Path::new("bob.smith.png")), "bob.smith");
    }
}

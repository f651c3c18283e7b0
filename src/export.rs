use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Pack `files` into a Deflate ZIP at `archive`, each under its file name.
///
/// When two files share a name the later one wins. On error the partial
/// archive is removed; the source files are never touched. Returns the number
/// of entries written.
pub fn export_zip(files: &[PathBuf], archive: &Path) -> Result<usize> {
    let entries = dedup_by_name(files);
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file =
        File::create(archive).with_context(|| format!("creating {}", archive.display()))?;

    // only an archive this call created is ours to remove
    if let Err(e) = write_zip(file, &entries) {
        let _ = std::fs::remove_file(archive);
        return Err(e);
    }
    info!("Wrote {} file(s) to {}", entries.len(), archive.display());
    Ok(entries.len())
}

/// Keeps the last path for each file name, at the position of its first
/// occurrence.
fn dedup_by_name(files: &[PathBuf]) -> Vec<(String, &Path)> {
    let mut order: Vec<(String, &Path)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for path in files {
        let Some(name) = path.file_name() else {
            continue;
        };
        let name = name.to_string_lossy().into_owned();
        match index.get(&name) {
            Some(&i) => {
                log::warn!("{} replaces an earlier '{}' in the archive", path.display(), name);
                order[i].1 = path.as_path();
            }
            None => {
                index.insert(name.clone(), order.len());
                order.push((name, path.as_path()));
            }
        }
    }
    order
}

fn write_zip(file: File, entries: &[(String, &Path)]) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in entries {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("adding {} to archive", name))?;
        zip.write_all(&data)?;
    }

    zip.finish()?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_export_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("nested").join("b.png");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(&a, b"alpha").unwrap();
        std::fs::write(&b, vec![7u8; 4096]).unwrap();

        let out = dir.path().join("out/matches.zip");
        assert_eq!(export_zip(&[a, b], &out).unwrap(), 2);

        let entries = read_archive(&out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a.jpg".to_string(), b"alpha".to_vec()));
        assert_eq!(entries[1], ("b.png".to_string(), vec![7u8; 4096]));
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["one", "two"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join("same.jpg"), sub).unwrap();
        }
        let files = vec![
            dir.path().join("one/same.jpg"),
            dir.path().join("two/same.jpg"),
        ];

        let out = dir.path().join("dup.zip");
        assert_eq!(export_zip(&files, &out).unwrap(), 1);
        assert_eq!(
            read_archive(&out),
            vec![("same.jpg".to_string(), b"two".to_vec())]
        );
    }

    #[test]
    fn test_missing_source_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("broken.zip");
        let err = export_zip(&[dir.path().join("gone.jpg")], &out);
        assert!(err.is_err());
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_archive_is_left_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        std::fs::write(&src, b"alpha").unwrap();
        let out = dir.path().join("locked.zip");
        std::fs::write(&out, b"previous export").unwrap();
        std::fs::set_permissions(&out, std::fs::Permissions::from_mode(0o444)).unwrap();

        // privileged users can still write; nothing to check then
        if std::fs::OpenOptions::new().write(true).open(&out).is_ok() {
            return;
        }

        assert!(export_zip(&[src], &out).is_err());
        assert_eq!(std::fs::read(&out).unwrap(), b"previous export");
    }

    #[test]
    fn test_empty_export() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.zip");
        assert_eq!(export_zip(&[], &out).unwrap(), 0);
        assert!(read_archive(&out).is_empty());
    }
}

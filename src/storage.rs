//! Encoding store: one file holding a [`KnownSet`].
//!
//! Layout (version 1): the four magic bytes `FFKS`, then the postcard encoding
//! of [`StoreFile`]:
//!
//! ```text
//! varint  version
//! varint  n                       number of encodings
//! n x {   varint len (= 128), len x f32 little-endian }
//! varint  m                       number of labels (= n)
//! m x {   varint len, len bytes UTF-8 }
//! ```

use crate::FaceEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"FFKS";
pub const STORE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("encoding store not found at {0}; run `facefilter encode` first")]
    Missing(PathBuf),
    #[error("accessing encoding store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a facefilter encoding store")]
    BadMagic(PathBuf),
    #[error("unsupported encoding store version {0}")]
    UnsupportedVersion(u16),
    #[error("decoding encoding store: {0}")]
    Decode(#[source] postcard::Error),
    #[error("encoding store: {0}")]
    Encode(#[source] postcard::Error),
    #[error("store holds {encodings} encodings but {labels} labels")]
    LengthMismatch { encodings: usize, labels: usize },
    #[error("encoding {index} has {len} values, expected {expected}")]
    BadEncodingLength {
        index: usize,
        len: usize,
        expected: usize,
    },
}

/// Reference encodings and their labels, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownSet {
    encodings: Vec<FaceEncoding>,
    labels: Vec<String>,
}

impl KnownSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, encoding: FaceEncoding) {
        self.labels.push(label.into());
        self.encodings.push(encoding);
    }

    pub fn encodings(&self) -> &[FaceEncoding] {
        &self.encodings
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u16,
    encodings: Vec<Vec<f32>>,
    labels: Vec<String>,
}

pub fn to_bytes(known: &KnownSet) -> Result<Vec<u8>, StoreError> {
    let file = StoreFile {
        version: STORE_VERSION,
        encodings: known.encodings.iter().map(FaceEncoding::to_vec).collect(),
        labels: known.labels.clone(),
    };
    let mut out = MAGIC.to_vec();
    out.extend(postcard::to_allocvec(&file).map_err(StoreError::Encode)?);
    Ok(out)
}

/// `origin` only labels errors.
pub fn from_bytes(data: &[u8], origin: &Path) -> Result<KnownSet, StoreError> {
    let body = data
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| StoreError::BadMagic(origin.to_path_buf()))?;
    let file: StoreFile = postcard::from_bytes(body).map_err(StoreError::Decode)?;

    if file.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(file.version));
    }
    if file.encodings.len() != file.labels.len() {
        return Err(StoreError::LengthMismatch {
            encodings: file.encodings.len(),
            labels: file.labels.len(),
        });
    }

    let mut known = KnownSet::new();
    for (index, (values, label)) in file.encodings.into_iter().zip(file.labels).enumerate() {
        let len = values.len();
        let encoding = FaceEncoding::from_vec(values).map_err(|_| StoreError::BadEncodingLength {
            index,
            len,
            expected: crate::ENCODING_LEN,
        })?;
        known.push(label, encoding);
    }
    Ok(known)
}

pub fn load_known_set(path: &Path) -> Result<KnownSet, StoreError> {
    if !path.exists() {
        return Err(StoreError::Missing(path.to_path_buf()));
    }
    let data = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_bytes(&data, path)
}

/// Replaces whatever store is at `path`.
pub fn save_known_set(path: &Path, known: &KnownSet) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, to_bytes(known)?).map_err(io)
}

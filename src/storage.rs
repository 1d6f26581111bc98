use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::extractor::PhotoMetadata;
use crate::model::{PhotoId, PhotoRecord};

const MAX_STEM_LEN: usize = 64;
const FALLBACK_STEM: &str = "photo";

/// Flat, append-only store for uploaded photos.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    upload_dir: PathBuf,
}

impl PhotoStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Persists `bytes` under a freshly generated name and returns the record.
    pub fn store(
        &self,
        original_filename: &str,
        bytes: &[u8],
        metadata: PhotoMetadata,
    ) -> Result<PhotoRecord> {
        fs::create_dir_all(&self.upload_dir).map_err(|source| Error::Storage {
            path: self.upload_dir.clone(),
            source,
        })?;

        let (id, stored_name) = generate_stored_name(original_filename);
        let stored_path = self.upload_dir.join(&stored_name);

        write_new_file(&stored_path, bytes).map_err(|source| Error::Storage {
            path: stored_path.clone(),
            source,
        })?;

        info!(
            "Stored {} as {} ({} bytes)",
            original_filename,
            stored_path.display(),
            bytes.len()
        );

        Ok(PhotoRecord {
            id,
            original_filename: original_filename.to_string(),
            stored_name,
            stored_path,
            coordinates: metadata.coordinates,
            captured_at: metadata.captured_at,
        })
    }
}

// 既存ファイルは上書きしない
fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Generates `<sanitised stem>_<uuid>` and the full stored file name.
pub fn generate_stored_name(original_filename: &str) -> (PhotoId, String) {
    // ディレクトリ部分は捨てる（パストラバーサル対策）
    let base = original_filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_filename);

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base, None),
    };

    let mut safe_stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    if safe_stem.chars().all(|c| c == '_') {
        safe_stem = FALLBACK_STEM.to_string();
    }

    let id = format!("{}_{}", safe_stem, Uuid::new_v4().simple());

    let ext = ext
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    let stored_name = match ext {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.clone(),
    };

    debug!("Generated stored name {} for {}", stored_name, original_filename);
    (PhotoId::new(id), stored_name)
}

/// Writes a KML document under a generated `<uuid>.kml` name.
pub fn save_kml(kml_dir: &Path, kml: &str) -> Result<PathBuf> {
    fs::create_dir_all(kml_dir).map_err(|source| Error::Storage {
        path: kml_dir.to_path_buf(),
        source,
    })?;

    let path = kml_dir.join(format!("{}.kml", Uuid::new_v4().simple()));
    write_new_file(&path, kml.as_bytes()).map_err(|source| Error::Storage {
        path: path.clone(),
        source,
    })?;

    info!("Written KML: {}", path.display());
    Ok(path)
}

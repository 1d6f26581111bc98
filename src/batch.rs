use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::admission::{admit, Rejection, DEFAULT_MAX_FILE_SIZE};
use crate::error::{Error, Result};
use crate::extractor::extract_from_bytes;
use crate::model::{Coordinates, PhotoId, PhotoRecord, Upload};
use crate::storage::{save_kml, PhotoStore};
use crate::writer::KmlWriter;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub upload_dir: PathBuf,
    pub kml_dir: PathBuf,
    /// 写真のリンク先。未指定ならアップロード先ディレクトリの絶対パスを指す file:// URL
    pub base_url: Option<String>,
    pub document_name: Option<String>,
    pub max_file_size: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            kml_dir: PathBuf::from("kml_files"),
            base_url: None,
            document_name: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Located(Coordinates),
    /// Stored, but without a usable GPS position.
    NoLocation,
    Unreadable(String),
    Rejected(Rejection),
    StorageFailed(String),
}

impl FileStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Unreadable(_) | Self::Rejected(_) | Self::StorageFailed(_)
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Located(c) => {
                write!(f, "located at {:.6}, {:.6}", c.latitude(), c.longitude())?;
                if let Some(alt) = c.altitude() {
                    write!(f, " ({:.2}m)", alt)?;
                }
                Ok(())
            }
            Self::NoLocation => write!(f, "stored, no GPS data"),
            Self::Unreadable(reason) => write!(f, "unreadable image: {}", reason),
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
            Self::StorageFailed(reason) => write!(f, "storage failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
    pub photo_id: Option<PhotoId>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub records: Vec<PhotoRecord>,
    pub kml: String,
}

impl BatchReport {
    pub fn located_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_location()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }
}

/// Admission, extraction and storage per upload, then one KML document.
pub struct BatchProcessor {
    config: BatchConfig,
    store: PhotoStore,
    writer: KmlWriter,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        let store = PhotoStore::new(&config.upload_dir);
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| directory_url(&config.upload_dir));

        let mut writer = KmlWriter::new(base_url);
        if let Some(name) = &config.document_name {
            writer = writer.with_document_name(name.clone());
        }

        Self {
            config,
            store,
            writer,
        }
    }

    /// Per-file failures are recorded in the report; only assembling the
    /// document itself can fail the batch.
    pub fn process<I>(&self, uploads: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = Upload>,
    {
        let mut outcomes = Vec::new();
        let mut records = Vec::new();

        for upload in uploads {
            let (status, record) = self.process_upload(&upload);
            outcomes.push(FileOutcome {
                filename: upload.filename,
                status,
                photo_id: record.as_ref().map(|r| r.id.clone()),
            });
            records.extend(record);
        }

        let kml = self.writer.to_kml_string(&records)?;

        let failed = outcomes.iter().filter(|o| o.status.is_failure()).count();
        info!(
            "Processed {} files: {} stored, {} located, {} failed",
            outcomes.len(),
            records.len(),
            records.iter().filter(|r| r.has_location()).count(),
            failed
        );

        Ok(BatchReport {
            outcomes,
            records,
            kml,
        })
    }

    pub fn process_upload(&self, upload: &Upload) -> (FileStatus, Option<PhotoRecord>) {
        let size = upload.bytes.len() as u64;
        if let Err(rejection) = admit(&upload.filename, size, self.config.max_file_size) {
            warn!("Rejected {}: {}", upload.filename, rejection);
            return (FileStatus::Rejected(rejection), None);
        }

        // 壊れた画像は保存しない
        let metadata = match extract_from_bytes(&upload.bytes) {
            Ok(metadata) => metadata,
            Err(Error::Unreadable(reason)) => {
                warn!("Unreadable image {}: {}", upload.filename, reason);
                return (FileStatus::Unreadable(reason), None);
            }
            Err(e) => {
                warn!("Failed to read {}: {}", upload.filename, e);
                return (FileStatus::Unreadable(e.to_string()), None);
            }
        };

        let record = match self.store.store(&upload.filename, &upload.bytes, metadata) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to store {}: {}", upload.filename, e);
                return (FileStatus::StorageFailed(e.to_string()), None);
            }
        };

        let status = match record.coordinates {
            Some(coordinates) => {
                info!(
                    "{}: lat={:.6}, lon={:.6}",
                    upload.filename,
                    coordinates.latitude(),
                    coordinates.longitude()
                );
                FileStatus::Located(coordinates)
            }
            None => {
                info!("{}: no GPS data", upload.filename);
                FileStatus::NoLocation
            }
        };

        (status, Some(record))
    }

    /// Writes the report's document into the configured KML directory.
    pub fn save(&self, report: &BatchReport) -> Result<PathBuf> {
        save_kml(&self.config.kml_dir, &report.kml)
    }
}

/// `file://` URL of a directory, so that links resolve wherever the KML is saved.
pub fn directory_url(dir: &Path) -> String {
    let absolute = match std::path::absolute(dir) {
        Ok(path) => path,
        Err(e) => {
            warn!("Failed to resolve {}: {}", dir.display(), e);
            dir.to_path_buf()
        }
    };

    let path = absolute.to_string_lossy().replace('\\', "/");
    let mut url = String::from("file://");
    if !path.starts_with('/') {
        // Windows のドライブレター
        url.push('/');
    }
    for c in path.chars() {
        match c {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '%' => url.push_str("%25"),
            '?' => url.push_str("%3F"),
            _ => url.push(c),
        }
    }
    url
}

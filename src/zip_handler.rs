use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::admission::{ImageFormat, DEFAULT_MAX_FILE_SIZE};
use crate::error::Result;
use crate::model::Upload;

/// Reads allow-listed photos out of a ZIP archive as uploads.
pub struct ZipHandler {
    zip_path: PathBuf,
    max_entry_size: u64,
}

impl ZipHandler {
    pub fn new<P: AsRef<Path>>(zip_path: P) -> Self {
        Self {
            zip_path: zip_path.as_ref().to_path_buf(),
            max_entry_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Entries above this size are read only up to `limit + 1` bytes, so that
    /// admission rejects them without inflating the whole entry.
    pub fn with_max_entry_size(mut self, limit: u64) -> Self {
        self.max_entry_size = limit;
        self
    }

    pub fn read_uploads(&self) -> Result<Vec<Upload>> {
        let file = File::open(&self.zip_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        info!(
            "Opened archive {:?} ({} entries)",
            self.zip_path,
            archive.len()
        );

        let mut uploads = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            // "../" を含むような危険なエントリ名は無視
            let Some(entry_path) = entry.enclosed_name() else {
                warn!("Skipping archive entry with unsafe name: {}", entry.name());
                continue;
            };
            let name = entry_path.to_string_lossy().into_owned();

            if ImageFormat::from_filename(&name).is_none() {
                debug!("Skipping non-image archive entry: {}", name);
                continue;
            }

            let read_limit = self.max_entry_size.saturating_add(1);
            let capacity = entry.size().min(read_limit) as usize;
            let mut bytes = Vec::with_capacity(capacity);
            entry.take(read_limit).read_to_end(&mut bytes)?;

            debug!("Read {} ({} bytes) from archive", name, bytes.len());
            uploads.push(Upload::new(name, bytes));
        }

        info!(
            "Found {} image entries in {:?}",
            uploads.len(),
            self.zip_path
        );
        Ok(uploads)
    }
}

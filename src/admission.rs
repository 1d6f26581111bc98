use std::fmt;

/// デフォルトのファイルサイズ上限（16MiB）
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Image encodings accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Heif,
    Webp,
}

impl ImageFormat {
    /// Look up an extension (without the dot) in the allow-list.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "heic" | "heif" => Some(Self::Heif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Look up a filename's extension in the allow-list.
    pub fn from_filename(filename: &str) -> Option<Self> {
        file_extension(filename).and_then(Self::from_extension)
    }
}

/// Text after the last dot of the final path component, if non-empty.
///
/// A bare `.jpg` counts as having the extension `jpg`.
pub fn file_extension(filename: &str) -> Option<&str> {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    base.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Why an upload was turned away before any processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingExtension,
    UnsupportedExtension(String),
    Empty,
    TooLarge { size: u64, limit: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExtension => write!(f, "file has no extension"),
            Self::UnsupportedExtension(ext) => write!(
                f,
                "unsupported file type '.{}' (expected JPG, PNG, TIFF, HEIC or WebP)",
                ext
            ),
            Self::Empty => write!(f, "file is empty"),
            Self::TooLarge { size, limit } => {
                write!(f, "file is at least {} bytes, limit is {} bytes", size, limit)
            }
        }
    }
}

impl std::error::Error for Rejection {}

/// Checks a submitted file against the extension allow-list and size ceiling.
pub fn admit(filename: &str, size: u64, max_file_size: u64) -> Result<ImageFormat, Rejection> {
    let ext = file_extension(filename).ok_or(Rejection::MissingExtension)?;

    let format = ImageFormat::from_extension(ext)
        .ok_or_else(|| Rejection::UnsupportedExtension(ext.to_ascii_lowercase()))?;

    if size == 0 {
        return Err(Rejection::Empty);
    }
    if size > max_file_size {
        return Err(Rejection::TooLarge {
            size,
            limit: max_file_size,
        });
    }

    Ok(format)
}

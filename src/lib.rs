pub mod admission;
pub mod batch;
pub mod error;
pub mod extractor;
pub mod model;
pub mod storage;
pub mod writer;
pub mod zip_handler;

pub use admission::{admit, ImageFormat, Rejection};
pub use batch::{BatchConfig, BatchProcessor, BatchReport, FileOutcome, FileStatus};
pub use error::{Error, Result};
pub use extractor::{extract_from_bytes, extract_from_path, PhotoMetadata};
pub use model::{Coordinates, PhotoId, PhotoRecord, Upload};
pub use storage::PhotoStore;
pub use writer::KmlWriter;
pub use zip_handler::ZipHandler;

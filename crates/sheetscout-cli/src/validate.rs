use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "json"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("path is not a file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("unsupported file format `{ext}`; supported: {}", SUPPORTED_EXTENSIONS.join(", "))]
    UnsupportedExtension { ext: String },
    #[error("file is {size_mb:.1} MB, which exceeds the {limit_mb} MB limit")]
    TooLarge { size_mb: f64, limit_mb: f64 },
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check that `path` is a readable workbook no larger than `max_size_mb`.
/// Returns the file size in bytes.
pub fn validate_file(path: &Path, max_size_mb: f64) -> Result<u64, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    let metadata = path.metadata().map_err(|source| ValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedExtension { ext });
    }

    let size_mb = metadata.len() as f64 / BYTES_PER_MB;
    if size_mb > max_size_mb {
        return Err(ValidationError::TooLarge {
            size_mb,
            limit_mb: max_size_mb,
        });
    }

    let mut probe = [0u8; 1];
    File::open(path)
        .and_then(|mut f| f.read(&mut probe))
        .map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(metadata.len())
}

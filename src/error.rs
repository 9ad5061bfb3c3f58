use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("failed to read settings {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to write settings {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
    #[error("malformed settings {path}: {source}")]
    Malformed { path: PathBuf, #[source] source: serde_json::Error },
}

/// Failures while validating or reading a workbook.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("no file selected")]
    NoPath,
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("unsupported file type '{0}' (expected .xlsx, .xlsm or .xls)")]
    UnsupportedExtension(String),
    #[error("file too large ({size_mb:.1} MB > {limit_mb} MB)")]
    TooLarge { size_mb: f64, limit_mb: u64 },
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("sheet '{0}' not found")]
    UnknownSheet(String),
    #[error("workbook contains no data")]
    Empty,
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("cannot reach update server: {0}")]
    Http(#[from] reqwest::Error),
    #[error("update server answered HTTP {0}")]
    Status(u16),
    #[error("malformed version manifest: {0}")]
    Manifest(String),
    #[error("version manifest lists no releases")]
    NoReleases,
    #[error("release {0} has no download url")]
    NoDownloadUrl(String),
    #[error("cannot compare versions '{current}' and '{remote}'")]
    Version { current: String, remote: String },
    #[error("install failed: {0}")]
    Io(#[from] std::io::Error),
}

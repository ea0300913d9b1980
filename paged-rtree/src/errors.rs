//! Error and result types shared by the page store, the tree and the query engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while storing or querying the spatial index
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{} is locked by another writer", .path.display())]
    Locked { path: PathBuf },

    #[error("Invalid file format in {} (bad magic: expected {expected:#010x}, found {actual:#010x})", .path.display())]
    BadMagic {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("Header size mismatch in {} (expected {expected}, found {actual})", .path.display())]
    HeaderSizeMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("Record size mismatch in {} (expected {expected}, found {actual})", .path.display())]
    RecordSizeMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("Corrupt file {} (expected {expected} bytes, found {actual})", .path.display())]
    CorruptFile {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Page {page_id} out of range (store holds {num_records} records)")]
    PageOutOfRange { page_id: u64, num_records: u32 },

    #[error("Store is opened read-only")]
    ReadOnly,

    #[error("Page size {record_size} too small: {kind} capacity would be {capacity} (need at least 2)")]
    Capacity {
        kind: &'static str,
        capacity: usize,
        record_size: usize,
    },

    #[error("Node too large for page {page_id}: {size} bytes (record size {record_size})")]
    NodeTooLarge {
        page_id: u32,
        size: usize,
        record_size: usize,
    },

    #[error("Dimensionality mismatch: tree has {expected} dimensions, key has {actual}")]
    DimensionalityMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SpatialError {
    /// `true` for the errors raised when an existing file is rejected on open.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SpatialError::BadMagic { .. }
                | SpatialError::HeaderSizeMismatch { .. }
                | SpatialError::RecordSizeMismatch { .. }
                | SpatialError::CorruptFile { .. }
        )
    }
}

impl From<bincode::error::EncodeError> for SpatialError {
    fn from(err: bincode::error::EncodeError) -> Self {
        SpatialError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for SpatialError {
    fn from(err: bincode::error::DecodeError) -> Self {
        SpatialError::Serialization(err.to_string())
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;

//! Error types for dataset preparation.
//!
//! Row-level problems (unparseable timestamps, missing media, undecodable
//! frames) are NOT errors: they are recorded as [`RowSkip`](crate::records::RowSkip)
//! diagnostics and the row is filtered out. The variants here abort an
//! operation, and at most one episode.

use std::path::PathBuf;
use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors that abort a stage or an episode.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("NPZ write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),

    #[error("NPZ read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// One of the two time series had no usable records.
    #[error("{stream} stream is empty after dropping unparseable timestamps")]
    EmptyStream { stream: &'static str },

    /// A stream handed to the aligner was not sorted ascending.
    #[error("{stream} stream is not sorted by timestamp (first violation at index {index})")]
    Unsorted { stream: &'static str, index: usize },

    /// Stacked arrays disagree on the sample count.
    #[error(
        "stacked arrays disagree on sample count: images={images}, depth={depth}, action={action}, gaze={gaze}"
    )]
    ShapeMismatch {
        images: usize,
        depth: usize,
        action: usize,
        gaze: usize,
    },

    /// An episode produced no valid samples.
    #[error("episode {episode} has no valid samples")]
    EmptyEpisode { episode: String },

    /// A required column is absent from a tabular file.
    #[error("column '{column}' missing from {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Generic(String),
}

impl DatasetError {
    /// Build a free-form error.
    pub fn generic(msg: impl Into<String>) -> Self {
        DatasetError::Generic(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_quotes_all_counts() {
        let err = DatasetError::ShapeMismatch {
            images: 10,
            depth: 10,
            action: 9,
            gaze: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("images=10"));
        assert!(msg.contains("action=9"));
    }

    #[test]
    fn test_generic() {
        let err = DatasetError::generic("boom");
        assert_eq!(err.to_string(), "boom");
    }
}

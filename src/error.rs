//! Crate-wide error type.
//!
//! One enum covering the three failure families the pipeline can hit:
//! preset/catalog configuration problems, voice-key validation, and
//! per-chunk generation failures (which carry the index of the chunk
//! that failed so a caller can resume from it).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A voice key was supplied that the catalog does not know about.
    /// Rejected before the model is ever invoked.
    #[error("unknown voice preset '{key}'; known presets: {known:?}")]
    UnknownVoice { key: String, known: Vec<String> },

    /// A preset file exists but cannot be read as named-array storage.
    #[error("bad voice preset {path}: {reason}", path = .path.display())]
    BadPreset { path: PathBuf, reason: String },

    /// The external generation service failed while processing one chunk.
    /// Earlier chunks may already be persisted to the work directory.
    #[error("generation failed on chunk {index}: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Failure reported by the external generation service itself.
    #[error("model error: {0}")]
    Model(String),

    /// Malformed NPY data inside an archive.
    #[error("invalid NPY data: {0}")]
    Npy(String),

    #[error("malformed config: {0}")]
    Config(String),

    #[error("{path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Attach a path to a bare `std::io::Error`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for every public engine operation.
///
/// Each operation either completes with its documented result or fails with
/// exactly one of these; nothing is retried or swallowed internally, and
/// partial results are never produced.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An operation was attempted before a model was loaded.
    #[error("no model is loaded")]
    NotReady,
    /// The audio source could not be opened.
    #[error("audio source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// The audio source could not be decoded into channel data.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// A sample buffer allocation failed.
    #[error("insufficient memory: {0}")]
    InsufficientMemory(String),
    /// The model file is absent from both the bundled and storage locations.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// The engine rejected the model file.
    #[error("failed to load model: {0}")]
    ModelLoadFailed(String),
    /// The engine returned a non-zero status from the inference call.
    #[error("transcription failed: {0}")]
    InferenceFailed(String),
}

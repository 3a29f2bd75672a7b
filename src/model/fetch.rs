use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::info;

use super::session::model_file_name;
use crate::error::EngineError;

/// Hugging Face mirror of the ggml model files.
const HF_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Collaborator that can populate local storage with a model file.
///
/// [`ModelSession`](super::ModelSession) performs no network I/O itself;
/// when a model is absent from both the bundled and storage locations and
/// acquisition is allowed, the session delegates here.
pub trait ModelFetcher: Send + Sync {
    /// Fetch the named model and write it to `dest`.
    ///
    /// A failure means the model remains unavailable; `dest` must not be
    /// left half-written.
    fn fetch(&self, model_name: &str, dest: &Path) -> Result<(), EngineError>;
}

/// Downloads ggml models over HTTP.
pub struct HttpFetcher {
    base_url: String,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            base_url: HF_BASE_URL.to_string(),
        }
    }

    /// Point the fetcher at a different host (mirrors, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFetcher for HttpFetcher {
    fn fetch(&self, model_name: &str, dest: &Path) -> Result<(), EngineError> {
        let url = format!("{}/{}", self.base_url, model_file_name(model_name));

        info!("Downloading model {} from {}", model_name, url);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::ModelNotFound(format!("create {}: {e}", parent.display()))
            })?;
        }

        let response = reqwest::blocking::Client::new()
            .get(&url)
            .send()
            .map_err(|e| EngineError::ModelNotFound(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::ModelNotFound(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length().unwrap_or(0);
        let pb = indicatif::ProgressBar::new(total_size);
        pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );

        // Download to a sibling temp file so a failed transfer never leaves
        // a truncated model behind.
        let temp_path = dest.with_extension("bin.tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| EngineError::ModelNotFound(format!("create {}: {e}", temp_path.display())))?;

        let bytes = response
            .bytes()
            .map_err(|e| EngineError::ModelNotFound(format!("read response: {e}")))?;
        file.write_all(&bytes)
            .map_err(|e| EngineError::ModelNotFound(format!("write model file: {e}")))?;
        pb.set_position(bytes.len() as u64);
        pb.finish_with_message("Download complete");

        fs::rename(&temp_path, dest)
            .map_err(|e| EngineError::ModelNotFound(format!("rename model file: {e}")))?;

        info!("Model saved to {}", dest.display());

        Ok(())
    }
}

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;
use whisper_rs::{WhisperContext, WhisperContextParameters};

use super::fetch::ModelFetcher;
use crate::error::EngineError;

/// Conventional prefix for ggml model files.
const MODEL_PREFIX: &str = "ggml";
/// Conventional extension for ggml model files.
const MODEL_EXT: &str = "bin";

/// File name for a model identifier, e.g. "base.en" -> "ggml-base.en.bin".
pub(crate) fn model_file_name(model_name: &str) -> String {
    format!("{MODEL_PREFIX}-{model_name}.{MODEL_EXT}")
}

/// Options for loading a model into a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Model identifier, e.g. "tiny", "base.en", "large-v3"
    pub model_name: String,
    /// Request hardware acceleration for this load
    pub use_acceleration: bool,
    /// Allow delegating to the configured fetcher when the model is absent
    pub allow_acquisition: bool,
}

impl LoadOptions {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            use_acceleration: true,
            allow_acquisition: true,
        }
    }

    pub fn with_acceleration(mut self, on: bool) -> Self {
        self.use_acceleration = on;
        self
    }

    pub fn with_acquisition(mut self, on: bool) -> Self {
        self.allow_acquisition = on;
        self
    }
}

/// Snapshot of the session state at query time.
///
/// All fields are zero/empty/false when no model is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub loaded: bool,
    pub accelerated: bool,
    /// Size of the model file in bytes (0 if unknown)
    pub size_bytes: u64,
    /// Language codes the engine can emit
    pub languages: Vec<String>,
}

/// Result of the capability probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SupportInfo {
    pub supported: bool,
    pub acceleration_supported: bool,
}

/// Owns the lifecycle of a loaded inference context.
///
/// At most one context is alive per session: `load` always unloads any
/// prior model first, `unload` is idempotent, and dropping the session
/// releases the context.
pub struct ModelSession {
    ctx: Option<WhisperContext>,
    model_name: Option<String>,
    model_path: Option<PathBuf>,
    accelerated: bool,
    bundled_dir: PathBuf,
    storage_dir: PathBuf,
    fetcher: Option<Box<dyn ModelFetcher>>,
}

impl ModelSession {
    /// Session resolving models against the given directories, with no
    /// acquisition collaborator.
    pub fn new(bundled_dir: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            ctx: None,
            model_name: None,
            model_path: None,
            accelerated: false,
            bundled_dir: bundled_dir.into(),
            storage_dir: storage_dir.into(),
            fetcher: None,
        }
    }

    /// Session that can delegate missing models to `fetcher`.
    pub fn with_fetcher(
        bundled_dir: impl Into<PathBuf>,
        storage_dir: impl Into<PathBuf>,
        fetcher: Box<dyn ModelFetcher>,
    ) -> Self {
        let mut session = Self::new(bundled_dir, storage_dir);
        session.fetcher = Some(fetcher);
        session
    }

    pub fn is_loaded(&self) -> bool {
        self.ctx.is_some()
    }

    /// Locate the model file: bundled location first, then writable storage.
    ///
    /// When neither exists, acquisition (if allowed and configured) places
    /// the file into storage.
    fn resolve_model_path(&self, opts: &LoadOptions) -> Result<PathBuf, EngineError> {
        let file_name = model_file_name(&opts.model_name);

        let bundled = self.bundled_dir.join(&file_name);
        if bundled.exists() {
            return Ok(bundled);
        }

        let stored = self.storage_dir.join(&file_name);
        if stored.exists() {
            return Ok(stored);
        }

        if !opts.allow_acquisition {
            return Err(EngineError::ModelNotFound(format!(
                "{} (acquisition disabled)",
                opts.model_name
            )));
        }
        let Some(fetcher) = self.fetcher.as_deref() else {
            return Err(EngineError::ModelNotFound(format!(
                "{} (no fetcher configured)",
                opts.model_name
            )));
        };

        fetcher.fetch(&opts.model_name, &stored)?;
        Ok(stored)
    }

    /// Load a model, replacing any previously loaded one.
    ///
    /// On failure the session is left in the unloaded state.
    pub fn load(&mut self, opts: &LoadOptions) -> Result<(), EngineError> {
        self.unload();

        let path = self.resolve_model_path(opts)?;
        let path_str = path.to_str().ok_or_else(|| {
            EngineError::ModelLoadFailed(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        info!("Loading model {} from {}", opts.model_name, path.display());

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu = opts.use_acceleration;
        ctx_params.gpu_device = 0;

        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| EngineError::ModelLoadFailed(format!("{}: {e}", path.display())))?;

        self.ctx = Some(ctx);
        self.model_name = Some(opts.model_name.clone());
        self.model_path = Some(path);
        self.accelerated = opts.use_acceleration;

        info!("Model {} loaded", opts.model_name);

        Ok(())
    }

    /// Release the held context, if any. Safe to call at any time.
    pub fn unload(&mut self) {
        if self.ctx.take().is_some() {
            info!(
                "Model {} unloaded",
                self.model_name.as_deref().unwrap_or("<unknown>")
            );
        }
        self.model_name = None;
        self.model_path = None;
        self.accelerated = false;
    }

    /// Borrow the live context, or fail when nothing is loaded.
    pub(crate) fn context(&self) -> Result<&WhisperContext, EngineError> {
        self.ctx.as_ref().ok_or(EngineError::NotReady)
    }

    /// Snapshot the current session state.
    pub fn info(&self) -> ModelInfo {
        let Some(name) = self.model_name.as_ref() else {
            return ModelInfo::default();
        };

        let size_bytes = self
            .model_path
            .as_deref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        ModelInfo {
            model_name: name.clone(),
            loaded: self.ctx.is_some(),
            accelerated: self.accelerated,
            size_bytes,
            languages: supported_languages(),
        }
    }

    /// Capability probe; needs no loaded model and has no side effects.
    pub fn is_supported() -> SupportInfo {
        SupportInfo {
            supported: true,
            acceleration_supported: cfg!(any(
                feature = "cuda",
                feature = "metal",
                feature = "coreml"
            )),
        }
    }
}

/// Every language code the engine's lookup table knows.
fn supported_languages() -> Vec<String> {
    (0..=whisper_rs::get_lang_max_id())
        .filter_map(whisper_rs::get_lang_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn session_with_dirs() -> (tempfile::TempDir, tempfile::TempDir, ModelSession) {
        let bundled = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let session = ModelSession::new(bundled.path(), storage.path());
        (bundled, storage, session)
    }

    #[test]
    fn test_model_file_name_convention() {
        assert_eq!(model_file_name("tiny"), "ggml-tiny.bin");
        assert_eq!(model_file_name("base.en"), "ggml-base.en.bin");
    }

    #[test]
    fn test_unload_before_load_is_noop() {
        let (_b, _s, mut session) = session_with_dirs();
        session.unload();
        session.unload();
        assert!(!session.is_loaded());
        assert!(session.context().is_err());
    }

    #[test]
    fn test_load_missing_model_with_acquisition_disabled() {
        let (_b, _s, mut session) = session_with_dirs();
        let opts = LoadOptions::new("tiny").with_acquisition(false);
        let err = session.load(&opts).unwrap_err();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_load_missing_model_without_fetcher() {
        let (_b, _s, mut session) = session_with_dirs();
        let err = session.load(&LoadOptions::new("tiny")).unwrap_err();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
    }

    #[test]
    fn test_resolution_prefers_bundled_over_storage() {
        let (bundled, storage, session) = session_with_dirs();
        fs::write(bundled.path().join("ggml-tiny.bin"), b"bundled").unwrap();
        fs::write(storage.path().join("ggml-tiny.bin"), b"stored").unwrap();

        let path = session
            .resolve_model_path(&LoadOptions::new("tiny"))
            .unwrap();
        assert_eq!(path, bundled.path().join("ggml-tiny.bin"));
    }

    #[test]
    fn test_resolution_falls_back_to_storage() {
        let (_bundled, storage, session) = session_with_dirs();
        fs::write(storage.path().join("ggml-tiny.bin"), b"stored").unwrap();

        let path = session
            .resolve_model_path(&LoadOptions::new("tiny"))
            .unwrap();
        assert_eq!(path, storage.path().join("ggml-tiny.bin"));
    }

    #[test]
    fn test_resolution_delegates_to_fetcher() {
        struct RecordingFetcher(Arc<AtomicBool>);
        impl ModelFetcher for RecordingFetcher {
            fn fetch(&self, _model_name: &str, dest: &Path) -> Result<(), EngineError> {
                self.0.store(true, Ordering::SeqCst);
                fs::write(dest, b"fetched").map_err(|e| {
                    EngineError::ModelNotFound(format!("write {}: {e}", dest.display()))
                })
            }
        }

        let bundled = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let called = Arc::new(AtomicBool::new(false));
        let fetcher = Box::new(RecordingFetcher(Arc::clone(&called)));
        let session = ModelSession::with_fetcher(bundled.path(), storage.path(), fetcher);

        let path = session
            .resolve_model_path(&LoadOptions::new("tiny"))
            .unwrap();
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(path, storage.path().join("ggml-tiny.bin"));
        assert_eq!(fs::read(&path).unwrap(), b"fetched");
    }

    #[test]
    fn test_load_rejects_corrupt_model_and_stays_unloaded() {
        let (bundled, _s, mut session) = session_with_dirs();
        fs::write(bundled.path().join("ggml-tiny.bin"), b"not a ggml model").unwrap();

        let err = session.load(&LoadOptions::new("tiny")).unwrap_err();
        assert!(matches!(err, EngineError::ModelLoadFailed(_)));
        assert!(!session.is_loaded());
        assert!(!session.info().loaded);
        assert!(session.info().model_name.is_empty());
    }

    #[test]
    fn test_info_empty_when_unloaded() {
        let (_b, _s, session) = session_with_dirs();
        let info = session.info();
        assert!(info.model_name.is_empty());
        assert!(!info.loaded);
        assert!(!info.accelerated);
        assert_eq!(info.size_bytes, 0);
        assert!(info.languages.is_empty());
    }

    #[test]
    fn test_is_supported_probe() {
        let support = ModelSession::is_supported();
        assert!(support.supported);
    }

    #[test]
    fn test_supported_languages_contains_common_codes() {
        let langs = supported_languages();
        assert!(langs.iter().any(|l| l == "en"));
        assert!(langs.iter().any(|l| l == "de"));
    }
}

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tracing::info;

use crate::audio;
use crate::error::EngineError;
use crate::model::{HttpFetcher, LoadOptions, ModelFetcher, ModelInfo, ModelSession, SupportInfo};
use crate::transcribe::{self, TranscribeOptions, Transcription};

/// Read-only location for models shipped alongside the application.
const DEFAULT_BUNDLED_DIR: &str = "models";

/// Blocking transcription facade over a single model session.
///
/// All operations serialize on an internal lock, so at most one call runs
/// against the engine context at a time; concurrent callers block. The
/// transcription call is long-running and the facade deliberately does not
/// pick a threading model for it: run it on a worker thread, a blocking
/// task, or inline, as the host sees fit. There is no mid-call
/// cancellation; abandoning the result is the only way out.
pub struct Transcriber {
    session: Mutex<ModelSession>,
}

impl Transcriber {
    /// Facade over explicit model directories, with no acquisition.
    pub fn new(bundled_dir: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            session: Mutex::new(ModelSession::new(bundled_dir, storage_dir)),
        }
    }

    /// Facade that can acquire missing models through `fetcher`.
    pub fn with_fetcher(
        bundled_dir: impl Into<PathBuf>,
        storage_dir: impl Into<PathBuf>,
        fetcher: Box<dyn ModelFetcher>,
    ) -> Self {
        Self {
            session: Mutex::new(ModelSession::with_fetcher(bundled_dir, storage_dir, fetcher)),
        }
    }

    /// Conventional setup: `models/` next to the process for bundled
    /// files, a per-user writable directory for fetched ones, and HTTP
    /// acquisition enabled.
    pub fn with_default_dirs() -> Self {
        Self::with_fetcher(
            DEFAULT_BUNDLED_DIR,
            default_storage_dir(),
            Box::new(HttpFetcher::new()),
        )
    }

    /// Load a model, replacing any previously loaded one.
    pub fn load_model(&self, opts: &LoadOptions) -> Result<(), EngineError> {
        self.lock().load(opts)
    }

    /// Unload the current model. Safe to call when nothing is loaded.
    pub fn unload_model(&self) {
        self.lock().unload();
    }

    /// Snapshot of the session state.
    pub fn model_info(&self) -> ModelInfo {
        self.lock().info()
    }

    /// Capability probe; requires no loaded model.
    pub fn is_supported() -> SupportInfo {
        ModelSession::is_supported()
    }

    /// Transcribe an audio file end to end.
    ///
    /// Fails with [`EngineError::NotReady`] before touching the source
    /// when no model is loaded. The session is held for the whole
    /// prepare/infer/decode span.
    pub fn transcribe_file(
        &self,
        path: impl AsRef<Path>,
        opts: &TranscribeOptions,
    ) -> Result<Transcription, EngineError> {
        let session = self.lock();
        let ctx = session.context()?;

        let prepared = audio::prepare(path.as_ref())?;

        let started = Instant::now();
        let state = transcribe::run_inference(ctx, &prepared.samples, opts)?;
        let decoded = transcribe::decode_output(&state, opts.word_timestamps)?;
        let processing_time_secs = started.elapsed().as_secs_f64();

        info!(
            "Transcribed {:.1}s of audio in {:.2}s: {} segments, language {}",
            prepared.duration_secs,
            processing_time_secs,
            decoded.segments.len(),
            decoded.language.as_deref().unwrap_or("unknown")
        );

        Ok(Transcription {
            text: decoded.text,
            segments: decoded.segments,
            language: decoded.language,
            processing_time_secs,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ModelSession> {
        // A poisoned lock means a prior caller panicked mid-call; the
        // session itself is still coherent, so keep serving.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Writable per-user location for fetched models.
fn default_storage_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".murmur").join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_transcriber() -> (tempfile::TempDir, tempfile::TempDir, Transcriber) {
        let bundled = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let t = Transcriber::new(bundled.path(), storage.path());
        (bundled, storage, t)
    }

    #[test]
    fn test_transcribe_before_load_is_not_ready() {
        let (_b, _s, t) = bare_transcriber();
        let err = t
            .transcribe_file("does-not-matter.wav", &TranscribeOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotReady));
    }

    #[test]
    fn test_unload_without_load_is_noop() {
        let (_b, _s, t) = bare_transcriber();
        t.unload_model();
        t.unload_model();
        assert!(!t.model_info().loaded);
    }

    #[test]
    fn test_model_info_empty_before_load() {
        let (_b, _s, t) = bare_transcriber();
        let info = t.model_info();
        assert!(info.model_name.is_empty());
        assert!(!info.loaded);
        assert_eq!(info.size_bytes, 0);
    }

    #[test]
    fn test_is_supported_probe() {
        assert!(Transcriber::is_supported().supported);
    }

    #[test]
    fn test_default_storage_dir_is_home_relative() {
        let dir = default_storage_dir();
        assert!(dir.ends_with(".murmur/models"));
    }

    /// End-to-end check against a real model; point MURMUR_TEST_MODEL_DIR
    /// at a directory containing ggml-tiny.bin to run it.
    #[test]
    #[ignore = "needs a ggml model file on disk"]
    fn test_transcribe_silence_end_to_end() {
        let model_dir =
            std::env::var("MURMUR_TEST_MODEL_DIR").expect("set MURMUR_TEST_MODEL_DIR");
        let storage = tempfile::tempdir().unwrap();
        let t = Transcriber::new(&model_dir, storage.path());

        let opts = LoadOptions::new("tiny").with_acceleration(false);
        t.load_model(&opts).unwrap();
        // A second load replaces the first context rather than leaking it.
        t.load_model(&opts).unwrap();
        assert!(t.model_info().loaded);

        let audio_dir = tempfile::tempdir().unwrap();
        let wav_path = audio_dir.path().join("silence.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
        for _ in 0..48000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let result = t
            .transcribe_file(&wav_path, &TranscribeOptions::default())
            .unwrap();

        assert!(result.processing_time_secs > 0.0);
        assert!(result.text.trim().len() < 40, "silence produced: {}", result.text);
        if let Some(lang) = &result.language {
            assert!(lang.chars().all(|c| c.is_ascii_alphabetic()));
        }

        // A missing source still fails cleanly with a loaded model.
        let err = t
            .transcribe_file(audio_dir.path().join("missing.wav"), &TranscribeOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceNotFound(_)));

        t.unload_model();
        t.unload_model();
        assert!(!t.model_info().loaded);
    }
}

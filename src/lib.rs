//! Local speech-to-text transcription built on whisper.cpp.
//!
//! The pipeline has four stages: an audio source is decoded and normalized
//! to 16kHz mono f32 ([`audio::prepare`]), a [`ModelSession`] owns the
//! loaded engine context, a single blocking inference call runs over the
//! prepared samples, and the engine's segment/token output is decoded into
//! a structured [`Transcription`].
//!
//! [`Transcriber`] ties the stages together behind the blocking operations
//! a host bridge needs: load/unload a model, query its state, probe
//! platform support, and transcribe a file. It serializes all calls on one
//! session; wrap it in whatever threading model fits the host.

pub mod audio;
mod error;
pub mod model;
pub mod transcribe;
mod transcriber;

pub use audio::{PreparedAudio, WHISPER_SAMPLE_RATE, prepare};
pub use error::EngineError;
pub use model::{HttpFetcher, LoadOptions, ModelFetcher, ModelInfo, ModelSession, SupportInfo};
pub use transcribe::{DecodingStrategy, Segment, TranscribeOptions, Transcription, Word};
pub use transcriber::Transcriber;

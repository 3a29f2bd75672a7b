use serde::{Deserialize, Serialize};

/// Token search strategy for decoding.
///
/// The variants carry mutually exclusive sub-parameters: greedy keeps a
/// best-of count, beam search a beam width and patience. Exactly one set
/// applies per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DecodingStrategy {
    Greedy { best_of: i32 },
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for DecodingStrategy {
    fn default() -> Self {
        DecodingStrategy::Greedy { best_of: 5 }
    }
}

impl DecodingStrategy {
    /// Beam search with the fixed width applied when a caller just asks
    /// for "beam".
    pub fn beam() -> Self {
        DecodingStrategy::BeamSearch {
            beam_size: 5,
            patience: -1.0,
        }
    }
}

/// Per-call transcription options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeOptions {
    /// Language code hint ("en", "de", ...); None means auto-detect
    pub language: Option<String>,
    /// Derive per-word timestamps from token-level timing
    pub word_timestamps: bool,
    /// Translate the output to English
    pub translate: bool,
    /// Worker thread count; None keeps the engine default
    pub thread_count: Option<i32>,
    /// Maximum text context tokens kept by the decoder
    pub max_context: i32,
    /// Token search strategy
    pub strategy: DecodingStrategy,
    /// Suppress the engine's non-speech token output
    pub suppress_non_speech: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: None,
            word_timestamps: false,
            translate: false,
            thread_count: None,
            max_context: 224,
            strategy: DecodingStrategy::default(),
            suppress_non_speech: true,
        }
    }
}

impl TranscribeOptions {
    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language = Some(code.into());
        self
    }

    pub fn with_word_timestamps(mut self, on: bool) -> Self {
        self.word_timestamps = on;
        self
    }

    pub fn with_translate(mut self, on: bool) -> Self {
        self.translate = on;
        self
    }

    pub fn with_threads(mut self, n: i32) -> Self {
        self.thread_count = Some(n);
        self
    }

    pub fn with_max_context(mut self, n: i32) -> Self {
        self.max_context = n;
        self
    }

    pub fn with_strategy(mut self, strategy: DecodingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_suppress_non_speech(mut self, on: bool) -> Self {
        self.suppress_non_speech = on;
        self
    }
}

use serde::{Deserialize, Serialize};
use whisper_rs::WhisperState;

use crate::error::EngineError;

/// A word with timing information, derived from token-level output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    /// The word text, trimmed of surrounding whitespace
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// A contiguous span of transcribed speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Individual words (when word timestamps were requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

/// Structured result of one transcription call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    /// All segment texts concatenated; segments carry their own spacing
    pub text: String,
    /// Segments in temporal order
    pub segments: Vec<Segment>,
    /// Dominant language detected (or forced) for the whole utterance
    pub language: Option<String>,
    /// Wall-clock seconds spent in inference and decoding
    pub processing_time_secs: f64,
}

/// Decoded segments before timing metadata is attached.
pub(crate) struct DecodedOutput {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: Option<String>,
}

/// Engine ticks are centiseconds.
fn ticks_to_secs(ticks: i64) -> f64 {
    ticks as f64 / 100.0
}

/// Turn a raw token into a word entry, or None for tokens that are not
/// speech: whitespace-only text, or engine-internal markers which are
/// bracketed ("[_BEG_]") or angle-bracketed ("<|endoftext|>").
fn word_from_token(text: &str, t0: i64, t1: i64, p: f32) -> Option<Word> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('[') || trimmed.starts_with('<') {
        return None;
    }

    Some(Word {
        text: trimmed.to_string(),
        start: ticks_to_secs(t0),
        end: ticks_to_secs(t1),
        confidence: p.clamp(0.0, 1.0),
    })
}

/// Walk the engine's segment/token output into structured form.
///
/// Segments are read in engine order; the full text is plain concatenation
/// of segment texts with no separator inserted. The detected-language id
/// is read once per call, for the whole utterance.
pub(crate) fn decode_output(
    state: &WhisperState,
    word_timestamps: bool,
) -> Result<DecodedOutput, EngineError> {
    let n_segments = state
        .full_n_segments()
        .map_err(|e| EngineError::InferenceFailed(format!("segment count: {e}")))?;

    let mut segments = Vec::with_capacity(n_segments as usize);
    let mut text = String::new();

    for i in 0..n_segments {
        let t0 = state
            .full_get_segment_t0(i)
            .map_err(|e| EngineError::InferenceFailed(format!("segment {i} start: {e}")))?;
        let t1 = state
            .full_get_segment_t1(i)
            .map_err(|e| EngineError::InferenceFailed(format!("segment {i} end: {e}")))?;
        let seg_text = state
            .full_get_segment_text(i)
            .map_err(|e| EngineError::InferenceFailed(format!("segment {i} text: {e}")))?;

        let words = if word_timestamps {
            Some(collect_words(state, i)?)
        } else {
            None
        };

        text.push_str(&seg_text);
        segments.push(Segment {
            start: ticks_to_secs(t0),
            end: ticks_to_secs(t1),
            text: seg_text,
            words,
        });
    }

    let language = state
        .full_lang_id_from_state()
        .ok()
        .and_then(|id| whisper_rs::get_lang_str(id).map(str::to_string));

    Ok(DecodedOutput {
        text,
        segments,
        language,
    })
}

fn collect_words(state: &WhisperState, segment: i32) -> Result<Vec<Word>, EngineError> {
    let n_tokens = state
        .full_n_tokens(segment)
        .map_err(|e| EngineError::InferenceFailed(format!("segment {segment} tokens: {e}")))?;

    let mut words = Vec::new();

    for j in 0..n_tokens {
        let token_text = match state.full_get_token_text(segment, j) {
            Ok(t) => t,
            // Sub-word pieces can split a multibyte character; such a
            // fragment cannot be a word on its own.
            Err(whisper_rs::WhisperError::InvalidUtf8 { .. }) => continue,
            Err(e) => {
                return Err(EngineError::InferenceFailed(format!(
                    "token {segment}/{j} text: {e}"
                )));
            }
        };
        let data = state.full_get_token_data(segment, j).map_err(|e| {
            EngineError::InferenceFailed(format!("token {segment}/{j} data: {e}"))
        })?;

        if let Some(word) = word_from_token(&token_text, data.t0, data.t1, data.p) {
            words.push(word);
        }
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_scale_to_seconds() {
        assert_eq!(ticks_to_secs(150), 1.5);
        assert_eq!(ticks_to_secs(320), 3.2);
        assert_eq!(ticks_to_secs(0), 0.0);
    }

    #[test]
    fn test_control_tokens_are_excluded() {
        let tokens = ["[_BEGIN_]", " hello", "<|endoftext|>", "world "];
        let words: Vec<Word> = tokens
            .iter()
            .filter_map(|t| word_from_token(t, 0, 10, 0.9))
            .collect();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "hello");
        assert_eq!(words[1].text, "world");
    }

    #[test]
    fn test_whitespace_only_token_is_excluded() {
        assert!(word_from_token("   ", 0, 10, 0.5).is_none());
        assert!(word_from_token("", 0, 10, 0.5).is_none());
        assert!(word_from_token("\n\t", 0, 10, 0.5).is_none());
    }

    #[test]
    fn test_word_timing_and_confidence() {
        let word = word_from_token(" there", 150, 320, 0.87).unwrap();
        assert_eq!(word.text, "there");
        assert_eq!(word.start, 1.5);
        assert_eq!(word.end, 3.2);
        assert!((word.confidence - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(word_from_token("a", 0, 1, 1.5).unwrap().confidence, 1.0);
        assert_eq!(word_from_token("a", 0, 1, -0.1).unwrap().confidence, 0.0);
    }

    #[test]
    fn test_transcription_serializes_without_empty_words() {
        let result = Transcription {
            text: " hello world".into(),
            segments: vec![Segment {
                start: 0.0,
                end: 1.2,
                text: " hello world".into(),
                words: None,
            }],
            language: Some("en".into()),
            processing_time_secs: 0.4,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["text"], " hello world");
        assert_eq!(json["language"], "en");
        assert!(json["segments"][0].get("words").is_none());
    }
}

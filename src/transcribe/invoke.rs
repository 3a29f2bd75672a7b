use tracing::debug;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperState};

use super::options::{DecodingStrategy, TranscribeOptions};
use crate::audio::WHISPER_SAMPLE_RATE;
use crate::error::EngineError;

/// Run one synchronous inference pass over prepared samples.
///
/// Builds the engine-native parameter block from `opts`. The engine's own
/// console side channels (progress, realtime text, timestamps, special
/// tokens) are always disabled; they are debugging aids, not part of the
/// structured output. The language override is borrowed by the parameter
/// block, which does not outlive this call.
///
/// This call blocks for a time proportional to audio length and model
/// size; callers are expected to run it off any latency-sensitive context.
pub(crate) fn run_inference(
    ctx: &WhisperContext,
    samples: &[f32],
    opts: &TranscribeOptions,
) -> Result<WhisperState, EngineError> {
    let strategy = match opts.strategy {
        DecodingStrategy::Greedy { best_of } => SamplingStrategy::Greedy { best_of },
        DecodingStrategy::BeamSearch {
            beam_size,
            patience,
        } => SamplingStrategy::BeamSearch {
            beam_size,
            patience,
        },
    };
    let mut params = FullParams::new(strategy);

    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params.set_translate(opts.translate);
    params.set_n_max_text_ctx(opts.max_context);
    params.set_suppress_non_speech_tokens(opts.suppress_non_speech);
    params.set_token_timestamps(opts.word_timestamps);
    if let Some(n) = opts.thread_count {
        params.set_n_threads(n);
    }
    params.set_language(Some(opts.language.as_deref().unwrap_or("auto")));

    debug!(
        "Running inference over {} samples ({:.1}s)",
        samples.len(),
        samples.len() as f32 / WHISPER_SAMPLE_RATE as f32
    );

    let mut state = ctx
        .create_state()
        .map_err(|e| EngineError::InferenceFailed(format!("create state: {e}")))?;

    state
        .full(params, samples)
        .map_err(|e| EngineError::InferenceFailed(format!("engine returned: {e}")))?;

    Ok(state)
}

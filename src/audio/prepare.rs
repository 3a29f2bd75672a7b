use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use crate::error::EngineError;

/// Whisper's required sample rate
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Audio normalized for inference: mono f32 at 16kHz.
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    /// Samples at 16kHz, mono, typically within [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Duration in seconds
    pub duration_secs: f32,
}

/// Decode an audio file into the fixed format the model expects.
///
/// Any container/codec the symphonia probe recognizes is accepted.
/// Multi-channel sources are averaged to mono per frame, and sources not at
/// 16kHz are resampled by linear interpolation. The source is read once and
/// never modified; the returned buffer is freshly allocated.
pub fn prepare(path: impl AsRef<Path>) -> Result<PreparedAudio, EngineError> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|_| EngineError::SourceNotFound(path.to_path_buf()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| EngineError::UnsupportedFormat(format!("probe failed: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EngineError::UnsupportedFormat("no audio track found".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let native_rate = codec_params.sample_rate.unwrap_or(WHISPER_SAMPLE_RATE);
    let channels = codec_params.channels.map_or(1, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| EngineError::UnsupportedFormat(format!("codec init failed: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(EngineError::UnsupportedFormat(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| EngineError::UnsupportedFormat(format!("decode: {e}")))?;

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        interleaved
            .try_reserve(sample_buf.samples().len())
            .map_err(|e| EngineError::InsufficientMemory(format!("sample buffer: {e}")))?;
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if interleaved.is_empty() {
        return Err(EngineError::UnsupportedFormat(
            "no audio samples decoded".into(),
        ));
    }

    debug!(
        "Decoded {} samples ({} ch at {}Hz) from {}",
        interleaved.len(),
        channels,
        native_rate,
        path.display()
    );

    let mono = if channels > 1 {
        mix_to_mono(&interleaved, channels)
    } else {
        interleaved
    };

    let samples = if native_rate != WHISPER_SAMPLE_RATE {
        resample_linear(&mono, native_rate, WHISPER_SAMPLE_RATE)?
    } else {
        mono
    };

    let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;

    info!(
        "Prepared {:.1}s of audio ({} samples at {}Hz)",
        duration_secs,
        samples.len(),
        WHISPER_SAMPLE_RATE
    );

    Ok(PreparedAudio {
        samples,
        duration_secs,
    })
}

/// Average sample values across channels per frame, producing one mono
/// sample per frame.
fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample by linear interpolation.
///
/// Produces exactly `floor(n / (from/to))` output samples; a trailing
/// fractional sample is dropped. For each output index the fractional
/// source position is split into a truncated lower index and a fraction;
/// the upper index is clamped to the last valid sample.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, EngineError> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (input.len() as f64 / ratio) as usize;

    let mut output = Vec::new();
    output
        .try_reserve_exact(out_len)
        .map_err(|e| EngineError::InsufficientMemory(format!("resample buffer: {e}")))?;

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let lower = pos as usize;
        let upper = (lower + 1).min(input.len() - 1);
        let frac = (pos - lower as f64) as f32;

        output.push(input[lower] * (1.0 - frac) + input[upper] * frac);
    }

    Ok(output)
}

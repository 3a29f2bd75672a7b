mod prepare;

pub use prepare::{PreparedAudio, WHISPER_SAMPLE_RATE, prepare};

mod decode;
mod invoke;
mod options;

pub use decode::{Segment, Transcription, Word};
pub use options::{DecodingStrategy, TranscribeOptions};

pub(crate) use decode::decode_output;
pub(crate) use invoke::run_inference;

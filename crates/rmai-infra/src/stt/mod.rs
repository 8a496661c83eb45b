//! Speech-to-text adapters and WAV helpers.

pub mod openai;
pub mod wav;

pub use openai::OpenAiSttBackend;
pub use wav::{encode_wav, read_wav_mono};

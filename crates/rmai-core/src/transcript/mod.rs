//! Live transcription.
//!
//! - `AudioWindow`: rolling PCM buffer with an audio clock
//! - `SegmentCommitter`: merges overlapping hypotheses and finalizes chunks
//! - `TranscriptionEngine`: drives an `SttBackend` over incoming frames
//! - `text`: stitching and punctuation clean-up helpers

pub mod committer;
pub mod engine;
pub mod stt;
pub mod text;
pub mod window;

pub use committer::SegmentCommitter;
pub use engine::{EngineSettings, StopReport, TranscriptionEngine, transcribe_recording};
pub use stt::SttBackend;
pub use window::AudioWindow;

//! Speech-to-text port.

use std::sync::Arc;

use rmai_types::error::TranscriptionError;
use rmai_types::transcript::TranscriptSegment;

/// Trait for speech-to-text backends.
///
/// Input is mono f32 PCM at `sample_rate`. Returned segment times are
/// relative to the start of `samples`; an empty vector means no speech.
/// Implementations live in rmai-infra (e.g., `OpenAiSttBackend`).
pub trait SttBackend: Send + Sync {
    fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> impl std::future::Future<Output = Result<Vec<TranscriptSegment>, TranscriptionError>> + Send;
}

impl<T: SttBackend> SttBackend for Arc<T> {
    fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> impl std::future::Future<Output = Result<Vec<TranscriptSegment>, TranscriptionError>> + Send
    {
        (**self).transcribe(samples, sample_rate)
    }
}

//! Transcription engine: audio frames in, transcript events out.

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use rmai_types::config::TranscriptionConfig;
use rmai_types::error::TranscriptionError;
use rmai_types::transcript::{TranscriptEvent, TranscriptSegment};

use super::committer::{STITCH_MAX_OVERLAP, SegmentCommitter};
use super::stt::SttBackend;
use super::text::{insert_paragraph_breaks, normalize_punctuation_spacing, stitch_with_overlap};
use super::window::AudioWindow;

/// Timing and detection knobs for [`TranscriptionEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sample_rate: u32,
    pub window_secs: f64,
    pub refresh_secs: f64,
    pub min_audio_secs: f64,
    pub chunk_secs: f64,
    pub activity_threshold: f32,
    pub paragraph_every: usize,
}

impl From<&TranscriptionConfig> for EngineSettings {
    fn from(config: &TranscriptionConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            window_secs: config.window_secs,
            refresh_secs: config.refresh_secs,
            min_audio_secs: config.min_audio_secs,
            chunk_secs: config.chunk_secs,
            activity_threshold: config.activity_threshold,
            paragraph_every: config.paragraph_every,
        }
    }
}

/// Summary returned when [`TranscriptionEngine::run`] exits.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub ok: bool,
    pub committed_chunks: usize,
    pub audio_secs: f64,
    pub stt_failures: usize,
}

/// Drives an [`SttBackend`] over a rolling audio window.
///
/// Timing uses the audio clock (samples received), not wall time, so the
/// engine behaves the same for live streams and for replayed recordings.
pub struct TranscriptionEngine<S> {
    stt: S,
    settings: EngineSettings,
    window: AudioWindow,
    committer: SegmentCommitter,
    last_attempt: Option<f64>,
    last_live: String,
    sentence_count: usize,
    committed_chunks: usize,
    stt_failures: usize,
    commit_sink: Option<mpsc::Sender<TranscriptEvent>>,
}

impl<S: SttBackend> TranscriptionEngine<S> {
    pub fn new(stt: S, settings: EngineSettings) -> Self {
        Self {
            window: AudioWindow::new(settings.sample_rate, settings.window_secs),
            committer: SegmentCommitter::new(settings.chunk_secs),
            stt,
            settings,
            last_attempt: None,
            last_live: String::new(),
            sentence_count: 0,
            committed_chunks: 0,
            stt_failures: 0,
            commit_sink: None,
        }
    }

    /// Also deliver every `Committed` event to `sink`.
    ///
    /// Unlike the broadcast channel, the sink applies backpressure instead
    /// of dropping events, so consumers that store the transcript never
    /// miss a chunk.
    pub fn with_commit_sink(mut self, sink: mpsc::Sender<TranscriptEvent>) -> Self {
        self.commit_sink = Some(sink);
        self
    }

    pub fn audio_time(&self) -> f64 {
        self.window.audio_time()
    }

    /// Feed one frame and return the events it produced.
    pub async fn push_frame(&mut self, frame: &[f32]) -> Vec<TranscriptEvent> {
        self.window.push(frame);
        let audio_time = self.window.audio_time();

        let due = self
            .last_attempt
            .is_none_or(|t| audio_time - t >= self.settings.refresh_secs);
        if !due || self.window.duration() <= self.settings.min_audio_secs {
            return Vec::new();
        }
        self.last_attempt = Some(audio_time);

        if !self.window.has_activity(self.settings.activity_threshold) {
            // Silence still moves the commit boundary forward.
            return self.commit(audio_time);
        }

        let result = self
            .stt
            .transcribe(self.window.samples(), self.window.sample_rate())
            .await;
        match result {
            Ok(segments) => self.absorb(segments, audio_time),
            Err(err) => {
                self.stt_failures += 1;
                tracing::warn!(error = %err, audio_time, "transcription tick failed");
                Vec::new()
            }
        }
    }

    fn absorb(&mut self, segments: Vec<TranscriptSegment>, audio_time: f64) -> Vec<TranscriptEvent> {
        let base = self.window.base_time();
        self.committer
            .merge(segments.iter().map(|s| s.shifted(base)).collect());

        let mut events = Vec::new();
        let live = self.committer.live_text();
        if live != self.last_live {
            events.push(TranscriptEvent::Live { text: live.clone() });
            self.last_live = live;
        }
        events.extend(self.commit(audio_time));
        events
    }

    fn commit(&mut self, audio_time: f64) -> Vec<TranscriptEvent> {
        self.committer
            .commit_ready(audio_time)
            .into_iter()
            .map(|(text, upto)| self.committed_event(&text, upto))
            .collect()
    }

    fn committed_event(&mut self, text: &str, upto: f64) -> TranscriptEvent {
        let mut normalized = normalize_punctuation_spacing(text);
        if !normalized.ends_with(char::is_whitespace) {
            normalized.push(' ');
        }
        let (text, count) = insert_paragraph_breaks(
            &normalized,
            self.sentence_count,
            self.settings.paragraph_every,
        );
        self.sentence_count = count;
        self.committed_chunks += 1;
        TranscriptEvent::Committed { text, upto }
    }

    /// Flush the uncommitted tail. Call once when the audio stream ends.
    pub fn finish(&mut self) -> Vec<TranscriptEvent> {
        let audio_time = self.window.audio_time();
        let mut events = self.commit(audio_time);
        if let Some(tail) = self.committer.flush() {
            events.push(self.committed_event(&tail, audio_time));
        }
        self.window.clear();
        self.last_live.clear();
        events
    }

    async fn emit(&self, batch: Vec<TranscriptEvent>, events: &broadcast::Sender<TranscriptEvent>) {
        for event in batch {
            if let (Some(sink), TranscriptEvent::Committed { .. }) = (&self.commit_sink, &event) {
                if sink.send(event.clone()).await.is_err() {
                    tracing::warn!("commit sink closed, chunk not delivered");
                }
            }
            let _ = events.send(event);
        }
    }

    /// Run until the frame channel closes or `cancel` fires.
    ///
    /// Every event is broadcast to `events`; a final `Stopped` event is sent
    /// after the tail is flushed. Send errors (no subscribers) are ignored.
    /// Cancellation also interrupts an STT request that is still in flight.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<Vec<f32>>,
        events: broadcast::Sender<TranscriptEvent>,
        cancel: CancellationToken,
    ) -> StopReport {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = frames.recv() => frame,
            };
            let Some(frame) = frame else { break };

            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.push_frame(&frame) => batch,
            };
            self.emit(batch, &events).await;
        }
        if cancel.is_cancelled() {
            tracing::debug!("transcription cancelled");
        }

        let tail = self.finish();
        self.emit(tail, &events).await;
        let ok = self.stt_failures == 0 || self.committed_chunks > 0;
        let _ = events.send(TranscriptEvent::Stopped { ok });

        tracing::info!(
            chunks = self.committed_chunks,
            audio_secs = self.window.audio_time(),
            stt_failures = self.stt_failures,
            "transcription stopped"
        );

        StopReport {
            ok,
            committed_chunks: self.committed_chunks,
            audio_secs: self.window.audio_time(),
            stt_failures: self.stt_failures,
        }
    }
}

/// Transcribe a complete recording in consecutive, non-overlapping pieces.
///
/// Used for uploaded files, where the rolling-window refresh would send
/// the same audio to the backend many times over.
pub async fn transcribe_recording<S: SttBackend>(
    stt: &S,
    samples: &[f32],
    sample_rate: u32,
    piece_secs: f64,
) -> Result<String, TranscriptionError> {
    if sample_rate == 0 {
        return Err(TranscriptionError::Config("sample rate must be positive".into()));
    }
    let piece_len = ((sample_rate as f64) * piece_secs).max(1.0) as usize;

    let mut parts = Vec::new();
    for piece in samples.chunks(piece_len) {
        let segments = stt.transcribe(piece, sample_rate).await?;
        let text: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        parts.push(stitch_with_overlap(&text, STITCH_MAX_OVERLAP));
    }

    let joined = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(normalize_punctuation_spacing(&joined).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Returns one segment covering the whole buffer, with a scripted text.
    struct FakeStt {
        texts: Mutex<Vec<String>>,
        calls: Mutex<usize>,
        fail: bool,
    }

    impl FakeStt {
        fn new(texts: &[&str]) -> Self {
            Self {
                texts: Mutex::new(texts.iter().rev().map(|t| t.to_string()).collect()),
                calls: Mutex::new(0),
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl SttBackend for FakeStt {
        async fn transcribe(
            &self,
            samples: &[f32],
            sample_rate: u32,
        ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(TranscriptionError::Stt("offline".into()));
            }
            let text = self.texts.lock().unwrap().pop().unwrap_or_default();
            let duration = samples.len() as f64 / sample_rate as f64;
            Ok(vec![TranscriptSegment::new(0.0, duration, text)])
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            sample_rate: 1000,
            window_secs: 4.0,
            refresh_secs: 0.5,
            min_audio_secs: 0.5,
            chunk_secs: 2.0,
            activity_threshold: 0.01,
            paragraph_every: 10,
        }
    }

    fn speech(secs: f64) -> Vec<f32> {
        let n = (1000.0 * secs) as usize;
        (0..n).map(|i| (i as f32 * 0.05).sin() * 0.5).collect()
    }

    #[tokio::test]
    async fn silent_audio_never_calls_backend() {
        let stt = Arc::new(FakeStt::new(&[]));
        let mut engine = TranscriptionEngine::new(stt.clone(), settings());
        for _ in 0..10 {
            let events = engine.push_frame(&vec![0.0; 500]).await;
            assert!(events.is_empty());
        }
        assert_eq!(stt.calls(), 0);
    }

    #[tokio::test]
    async fn waits_for_minimum_audio() {
        let stt = Arc::new(FakeStt::new(&["hi"]));
        let mut engine = TranscriptionEngine::new(stt.clone(), settings());
        assert!(engine.push_frame(&speech(0.3)).await.is_empty());
        assert_eq!(stt.calls(), 0);
    }

    #[tokio::test]
    async fn emits_live_then_committed() {
        let stt = Arc::new(FakeStt::new(&["hello there.", "hello there. general"]));
        let mut engine = TranscriptionEngine::new(stt, settings());

        let events = engine.push_frame(&speech(1.5)).await;
        assert_eq!(
            events,
            vec![TranscriptEvent::Live {
                text: "hello there.".to_string()
            }]
        );

        // Audio clock reaches the 2 s boundary.
        let events = engine.push_frame(&speech(0.5)).await;
        assert!(events.contains(&TranscriptEvent::Live {
            text: "hello there. general".to_string()
        }));
        assert!(events.contains(&TranscriptEvent::Committed {
            text: "hello there. general ".to_string(),
            upto: 2.0
        }));
    }

    #[tokio::test]
    async fn finish_flushes_tail() {
        let stt = Arc::new(FakeStt::new(&["pending words"]));
        let mut engine = TranscriptionEngine::new(stt, settings());
        engine.push_frame(&speech(1.0)).await;

        let events = engine.finish();
        assert_eq!(
            events,
            vec![TranscriptEvent::Committed {
                text: "pending words ".to_string(),
                upto: 1.0
            }]
        );
        assert!(engine.finish().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_skips_tick() {
        let mut stt = FakeStt::new(&[]);
        stt.fail = true;
        let stt = Arc::new(stt);
        let mut engine = TranscriptionEngine::new(stt.clone(), settings());
        assert!(engine.push_frame(&speech(1.0)).await.is_empty());
        assert_eq!(stt.calls(), 1);
    }

    #[tokio::test]
    async fn run_broadcasts_and_stops() {
        let stt = FakeStt::new(&["streamed text"]);
        let engine = TranscriptionEngine::new(stt, settings());
        let (frames_tx, frames_rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(engine.run(frames_rx, events_tx, cancel));
        frames_tx.send(speech(1.0)).await.unwrap();
        drop(frames_tx);

        let report = handle.await.unwrap();
        assert!(report.ok);
        assert_eq!(report.committed_chunks, 1);

        let mut received = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.last(), Some(&TranscriptEvent::Stopped { ok: true }));
        assert!(received.iter().any(|e| matches!(e, TranscriptEvent::Committed { .. })));
    }

    /// Accepts audio but never answers.
    struct StalledStt;

    impl SttBackend for StalledStt {
        async fn transcribe(
            &self,
            _samples: &[f32],
            _sample_rate: u32,
        ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_transcription() {
        let engine = TranscriptionEngine::new(StalledStt, settings());
        let (frames_tx, frames_rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(engine.run(frames_rx, events_tx, cancel.clone()));
        frames_tx.send(speech(1.0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let report = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("engine did not stop after cancel")
            .unwrap();
        assert_eq!(report.committed_chunks, 0);

        let mut last = None;
        while let Ok(event) = events_rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(TranscriptEvent::Stopped { .. })));
    }

    #[tokio::test]
    async fn commit_sink_receives_every_chunk_despite_lagging_subscriber() {
        let texts: Vec<String> = (0..12).map(|i| format!("sentence {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let engine = TranscriptionEngine::new(FakeStt::new(&refs), settings());
        let (sink_tx, mut sink_rx) = mpsc::channel(64);
        let engine = engine.with_commit_sink(sink_tx);

        let (frames_tx, frames_rx) = mpsc::channel(64);
        // A one-slot broadcast that nobody reads overflows immediately.
        let (events_tx, mut events_rx) = broadcast::channel(1);
        let handle = tokio::spawn(engine.run(frames_rx, events_tx, CancellationToken::new()));
        for _ in 0..24 {
            frames_tx.send(speech(0.5)).await.unwrap();
        }
        drop(frames_tx);

        let report = handle.await.unwrap();
        assert!(report.committed_chunks > 1);
        assert!(matches!(
            events_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));

        let mut stored = 0;
        while let Ok(event) = sink_rx.try_recv() {
            assert!(matches!(event, TranscriptEvent::Committed { .. }));
            stored += 1;
        }
        assert_eq!(stored, report.committed_chunks);
    }

    #[tokio::test]
    async fn recording_is_transcribed_in_pieces() {
        let stt = FakeStt::new(&["First piece.", "second piece"]);
        let text = transcribe_recording(&stt, &speech(3.0), 1000, 2.0).await.unwrap();
        assert_eq!(text, "First piece. second piece");
        assert_eq!(stt.calls(), 2);
    }
}

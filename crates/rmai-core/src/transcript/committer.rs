//! Turns overlapping rolling-window hypotheses into a stable transcript.
//!
//! Each STT pass over the rolling window yields segments with absolute
//! times. Newer passes re-transcribe audio the previous pass already saw, so
//! pending segments in the overlapping range are replaced. Text is finalized
//! in fixed `chunk_secs` slices of the audio clock.

use rmai_types::transcript::TranscriptSegment;

use super::text::stitch_with_overlap;

/// Maximum overlap removed when stitching adjacent segments.
pub const STITCH_MAX_OVERLAP: usize = 40;

#[derive(Debug, Clone)]
pub struct SegmentCommitter {
    pending: Vec<TranscriptSegment>,
    committed_upto: f64,
    next_boundary: f64,
    chunk_secs: f64,
}

impl SegmentCommitter {
    pub fn new(chunk_secs: f64) -> Self {
        let chunk_secs = if chunk_secs > 0.0 { chunk_secs } else { 1.0 };
        Self {
            pending: Vec::new(),
            committed_upto: 0.0,
            next_boundary: chunk_secs,
            chunk_secs,
        }
    }

    /// Absolute time up to which text has been finalized.
    pub fn committed_upto(&self) -> f64 {
        self.committed_upto
    }

    pub fn pending(&self) -> &[TranscriptSegment] {
        &self.pending
    }

    /// Merge a fresh hypothesis (absolute times) into the pending set.
    ///
    /// Pending segments ending after the new hypothesis starts are replaced
    /// by it; segments ending at or before `committed_upto` are ignored.
    pub fn merge(&mut self, segments: Vec<TranscriptSegment>) {
        let fresh: Vec<TranscriptSegment> = segments
            .into_iter()
            .filter(|s| s.end > self.committed_upto && !s.text.trim().is_empty())
            .collect();
        let Some(first_start) = fresh.iter().map(|s| s.start).reduce(f64::min) else {
            return;
        };
        self.pending.retain(|s| s.end <= first_start);
        self.pending.extend(fresh);
        self.pending
            .sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    /// Stitched text of everything not yet committed.
    pub fn live_text(&self) -> String {
        let parts: Vec<&str> = self
            .pending
            .iter()
            .filter(|s| s.end > self.committed_upto)
            .map(|s| s.text.as_str())
            .collect();
        stitch_with_overlap(&parts, STITCH_MAX_OVERLAP)
    }

    /// Finalize every chunk boundary the audio clock has passed.
    ///
    /// Returns `(text, upto)` for each non-empty committed chunk. Boundaries
    /// advance even when a chunk has no text.
    pub fn commit_ready(&mut self, audio_time: f64) -> Vec<(String, f64)> {
        let mut committed = Vec::new();
        while audio_time >= self.next_boundary {
            let until = self.next_boundary;
            let parts: Vec<&str> = self
                .pending
                .iter()
                .filter(|s| s.end <= until && s.end > self.committed_upto)
                .map(|s| s.text.as_str())
                .collect();
            let text = stitch_with_overlap(&parts, STITCH_MAX_OVERLAP)
                .trim()
                .to_string();
            if !text.is_empty() {
                committed.push((text, until));
            }

            self.committed_upto = until;
            self.next_boundary += self.chunk_secs;
            self.pending.retain(|s| s.end > until);
        }
        committed
    }

    /// Take whatever is still pending (used when transcription stops).
    pub fn flush(&mut self) -> Option<String> {
        let tail = self.live_text().trim().to_string();
        if let Some(last_end) = self.pending.iter().map(|s| s.end).reduce(f64::max) {
            self.committed_upto = self.committed_upto.max(last_end);
        }
        self.pending.clear();
        (!tail.is_empty()).then_some(tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    #[test]
    fn merge_replaces_overlapping_hypothesis() {
        let mut c = SegmentCommitter::new(10.0);
        c.merge(vec![seg(0.0, 2.0, "hello"), seg(2.0, 4.0, "wold")]);
        c.merge(vec![seg(2.0, 4.5, "world again")]);
        assert_eq!(c.pending().len(), 2);
        assert_eq!(c.pending()[1].text, "world again");
        assert_eq!(c.live_text(), "helloworld again");
    }

    #[test]
    fn merge_ignores_empty_and_committed_segments() {
        let mut c = SegmentCommitter::new(1.0);
        c.merge(vec![seg(0.0, 0.8, "early")]);
        c.commit_ready(1.0);
        c.merge(vec![seg(0.2, 0.9, "late dup"), seg(1.0, 1.5, "  ")]);
        assert!(c.pending().is_empty());
    }

    #[test]
    fn commit_ready_emits_chunks_and_advances() {
        let mut c = SegmentCommitter::new(5.0);
        c.merge(vec![
            seg(0.0, 2.0, "first part"),
            seg(2.0, 4.9, "part two."),
            seg(5.0, 7.0, "next chunk"),
        ]);

        assert!(c.commit_ready(4.0).is_empty());

        let committed = c.commit_ready(5.2);
        assert_eq!(committed, vec![("first part two.".to_string(), 5.0)]);
        assert!((c.committed_upto() - 5.0).abs() < f64::EPSILON);
        assert_eq!(c.live_text(), "next chunk");
    }

    #[test]
    fn commit_ready_skips_empty_chunks_but_moves_boundary() {
        let mut c = SegmentCommitter::new(2.0);
        c.merge(vec![seg(5.0, 5.5, "late words")]);
        let committed = c.commit_ready(6.0);
        assert_eq!(committed, vec![("late words".to_string(), 6.0)]);
        assert!((c.committed_upto() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flush_returns_tail_once() {
        let mut c = SegmentCommitter::new(10.0);
        c.merge(vec![seg(0.0, 1.0, "unfinished thought")]);
        assert_eq!(c.flush().as_deref(), Some("unfinished thought"));
        assert!(c.flush().is_none());
    }
}

//! Transcript types shared by the transcription engine, storage, and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recognized span of speech. Times are seconds.
///
/// Backends return times relative to the audio they were given; the engine
/// shifts them to absolute session time before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Same segment shifted by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            text: self.text.clone(),
        }
    }
}

/// Events pushed to live transcript subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Current uncommitted hypothesis; replaces any previous live text.
    Live { text: String },

    /// Finalized text covering audio up to `upto` seconds.
    Committed { text: String, upto: f64 },

    /// Transcription stopped; `ok` is false when it ended on an error.
    Stopped { ok: bool },
}

/// A committed transcript chunk stored for a meeting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub id: Uuid,
    pub session_id: Uuid,
    pub seq: i64,
    pub text: String,
    pub committed_upto: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_shift() {
        let seg = TranscriptSegment::new(0.5, 1.5, "hello");
        let shifted = seg.shifted(10.0);
        assert!((shifted.start - 10.5).abs() < f64::EPSILON);
        assert!((shifted.end - 11.5).abs() < f64::EPSILON);
        assert_eq!(shifted.text, "hello");
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = TranscriptEvent::Committed {
            text: "done.".to_string(),
            upto: 10.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "committed");
        assert_eq!(json["upto"], 10.0);

        let parsed: TranscriptEvent =
            serde_json::from_str(r#"{"type":"live","text":"hi"}"#).unwrap();
        assert_eq!(
            parsed,
            TranscriptEvent::Live {
                text: "hi".to_string()
            }
        );
    }
}

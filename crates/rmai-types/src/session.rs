//! Meeting session types.
//!
//! A meeting session groups a live transcript, the user's notes, the Q&A
//! exchanges asked during the meeting, and the studies surfaced along the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a meeting session.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'ended'))`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Ended => write!(f, "ended"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// What happens to a session's transcript and Q&A.
///
/// `OptOut` sessions still run transcription and Q&A live, but nothing
/// beyond the session row itself is written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    #[default]
    Keep,
    OptOut,
}

impl RetentionPolicy {
    pub fn persists(self) -> bool {
        matches!(self, RetentionPolicy::Keep)
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::Keep => write!(f, "keep"),
            RetentionPolicy::OptOut => write!(f, "opt_out"),
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "keep" => Ok(RetentionPolicy::Keep),
            "opt_out" | "optout" => Ok(RetentionPolicy::OptOut),
            other => Err(format!("invalid retention policy: '{other}'")),
        }
    }
}

/// A recorded research meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSession {
    pub id: Uuid,
    pub title: Option<String>,
    pub status: SessionStatus,
    pub retention: RetentionPolicy,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MeetingSession {
    /// A fresh active session with a time-sortable id.
    pub fn new(title: Option<String>, retention: RetentionPolicy) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            status: SessionStatus::Active,
            retention,
            notes: String::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled meeting")
    }
}

/// One question asked during a meeting and the assistant's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaExchange {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question: String,
    pub answer: String,
    pub used_web: bool,
    pub created_at: DateTime<Utc>,
}

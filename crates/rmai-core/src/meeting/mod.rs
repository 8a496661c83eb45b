//! Meeting sessions: lifecycle, transcript, notes, and in-session Q&A.

pub mod assistant;
pub mod repository;
pub mod service;

pub use assistant::{MeetingAssistant, SessionAsk, SessionReply};
pub use repository::SessionRepository;
pub use service::{MeetingService, SessionHistory};

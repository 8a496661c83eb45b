//! HTTP request handlers.

pub mod assistant;
pub mod live;
pub mod session;

use uuid::Uuid;

use crate::http::error::AppError;

/// Parse a UUID path parameter, returning 400 on invalid format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectChatError {
    #[error("{role} participant id must not be empty")]
    EmptyParticipantId { role: &'static str },
    #[error("invalid page origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid inbound envelope: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode outbound envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

//! Error taxonomy shared across services

use thiserror::Error;

/// A scenario switch named a scenario outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

/// Failures while decoding an inbound wire message.
///
/// Both variants are recoverable: the message is dropped and the
/// connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("malformed message envelope: {0}")]
    Malformed(String),

    #[error("invalid payload for tag '{tag}': {detail}")]
    Payload { tag: String, detail: String },
}

use thiserror::Error;

/// Errors produced by the call engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Local media (camera/microphone) could not be acquired.
    #[error("Media acquisition failed: {0}")]
    Media(String),

    /// An SDP or ICE step failed in the underlying peer connection.
    #[error("Negotiation step failed: {0}")]
    Negotiation(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

use thiserror::Error;

/// Errors surfaced to the transport harness.
///
/// The physics and search cores are total over well-formed numeric state and
/// never fail; the only error conditions are caller contract violations on
/// the per-tick entry path.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("invalid rule set: {0}")]
    InvalidRules(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

//! Error taxonomy.
//!
//! Fatal configuration errors abort the run before any challenge is issued;
//! per-account failures are recorded as outcomes and never surface here.
//! The binary makes the abort/continue decision in exactly one place.

use thiserror::Error;

/// All errors produced by pushcamp crates.
#[derive(Error, Debug)]
pub enum PushCampError {
    /// Bad or missing run configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A required credential pair could not be resolved.
    #[error("missing credentials: {0}")]
    Credentials(String),

    /// HTTP transport failure talking to the provider.
    #[error("http error: {0}")]
    Http(String),

    /// The provider answered but with an error payload.
    #[error("provider error: {0}")]
    Provider(String),

    /// A selection stage narrowed the target set to zero accounts.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// None of the requested group names resolved.
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// The result log could not be created, read, or resumed.
    #[error("result log error: {0}")]
    ResultLog(String),

    /// The operator declined a confirmation prompt.
    #[error("aborted: {0}")]
    Aborted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PushCampError>;

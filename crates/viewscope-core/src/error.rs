use thiserror::Error;

use crate::id::ScopeId;

/// Canonical result for the store and its callers.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The bucket existed but sat idle past the TTL. It has been torn down;
    /// callers should treat the scope as gone and start a new one.
    #[error("{id} expired: idle for {idle_secs}s, ttl is {ttl_secs}s")]
    ExpiredScope {
        id: ScopeId,
        idle_secs: u64,
        ttl_secs: u64,
    },

    #[error("{0} is being destroyed or was already destroyed")]
    ScopeDestroyed(ScopeId),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("factory for instance '{name}' failed: {reason}")]
    Factory { name: String, reason: String },
}

impl Error {
    /// True for errors that mean "this scope no longer exists".
    pub fn is_scope_gone(&self) -> bool {
        matches!(self, Error::ExpiredScope { .. } | Error::ScopeDestroyed(_))
    }
}

/// Fatal configuration problems. These must stop initialization; a malformed
/// value is never replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("setting '{key}' has value '{value}', which is not an integer")]
    Unparseable { key: String, value: String },

    #[error("setting '{key}' must be a positive integer")]
    NonPositive { key: String },

    #[error("{0}")]
    Invalid(String),

    #[error("malformed config document: {0}")]
    Document(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Document(e.to_string())
    }
}

/// Failure reported by a `Destroyer` for one instance.
///
/// Recovered locally: collected into a `DestructionReport`, never propagated
/// as the failure of a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to destroy instance '{instance}': {reason}")]
pub struct DestructionError {
    pub instance: String,
    pub reason: String,
}

impl DestructionError {
    pub fn new(instance: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            reason: reason.into(),
        }
    }
}

use thiserror::Error;

/// Every recoverable and fatal error kind surfaced by the core, per the
/// error handling design: recoverable conditions are retried locally,
/// partial failures are surfaced to the caller, and corrupt persistent
/// state is auto-healed by forcing a rebuild rather than silently dropping
/// data.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A path was rejected by the ignore/extension/binary filter. Non-fatal:
    /// the caller skips the path silently.
    #[error("path rejected: {0}")]
    PathRejected(String),

    /// A file could not be parsed by any supported grammar. Non-fatal: the
    /// chunker falls back to a single whole-file module chunk.
    #[error("unsupported/unparseable file: {0}")]
    ParseUnsupported(String),

    /// The embedding provider returned HTTP 429 or an equivalent throttle
    /// signal. Retriable with backoff.
    #[error("provider rate limited: {0}")]
    ProviderRateLimited(String),

    /// A known-benign transient auth failure (e.g. "API key expired").
    /// Retriable with backoff.
    #[error("provider transient auth failure: {0}")]
    ProviderTransient(String),

    /// A persistent authentication failure. Fatal for the run.
    #[error("provider auth failure: {0}")]
    ProviderAuth(String),

    /// Network-level failure talking to the provider.
    #[error("provider network error: {0}")]
    ProviderNetwork(String),

    /// The provider rejected the request as structurally invalid, or the
    /// requested provider configuration cannot be satisfied (e.g. `local`
    /// with no local runtime available).
    #[error("invalid provider request: {0}")]
    ProviderInvalid(String),

    /// The store's persisted vector column width disagrees with the
    /// provider's declared dimensionality; the table was dropped and
    /// recreated.
    #[error("store schema mismatch, table recreated: {0}")]
    StoreSchemaMismatch(String),

    /// The manifest on disk could not be parsed.
    #[error("manifest corrupt: {0}")]
    ManifestCorrupt(String),

    /// The manifest's schemaVersion does not match the running core.
    #[error("manifest schema version mismatch: on-disk {on_disk}, current {current}")]
    ManifestVersionMismatch { on_disk: u32, current: u32 },

    /// The run was cancelled before completion; no manifest write occurs.
    #[error("index run cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    pub fn path_rejected(msg: impl Into<String>) -> Self {
        Self::PathRejected(msg.into())
    }

    pub fn parse_unsupported(msg: impl Into<String>) -> Self {
        Self::ParseUnsupported(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only `RateLimited` and `TransientAuth` provider errors are retriable
    /// by the batch pipeline (spec §4.5/§4.6).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimited(_) | Self::ProviderTransient(_)
        )
    }

    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::ProviderAuth(_) | Self::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_kinds() {
        assert!(IndexError::ProviderRateLimited("x".into()).is_retriable());
        assert!(IndexError::ProviderTransient("x".into()).is_retriable());
        assert!(!IndexError::ProviderAuth("x".into()).is_retriable());
        assert!(!IndexError::ProviderNetwork("x".into()).is_retriable());
    }

    #[test]
    fn fatal_kinds() {
        assert!(IndexError::ProviderAuth("x".into()).is_fatal_for_run());
        assert!(IndexError::Cancelled.is_fatal_for_run());
        assert!(!IndexError::ProviderRateLimited("x".into()).is_fatal_for_run());
    }
}

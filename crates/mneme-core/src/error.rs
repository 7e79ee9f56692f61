//! Error types for the memory engine.
//!
//! Mirrors the error taxonomy in spec.md §7: bad input, not-found,
//! embedder-unavailable, index inconsistency, storage I/O, lock
//! contention, and internal invariant violation.

/// Top-level error type returned by every fallible `mneme-core` operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MnemeError {
    /// Missing or out-of-range argument; no state change occurred.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The id did not resolve to a node in any tier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedder has no ready backend; caller should fall back to
    /// sparse-only search or a zero-vector write.
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    /// Underlying storage I/O failed. `retryable` mirrors spec.md §7's
    /// transient-vs-persistent distinction.
    #[error("storage error ({}): {0}", if *.1 { "transient" } else { "persistent" })]
    Storage(String, bool),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage directory is held by another process.
    #[error("lock contention: {0}")]
    LockContention(String),

    /// An invariant the engine relies on was violated. In debug builds
    /// callers should prefer `debug_assert!` at the call site; this
    /// variant is what release builds surface instead of panicking.
    #[error("internal invariant violation: {0}")]
    Internal(String),

    /// Caller observed more frequently than the minimum inter-observation
    /// interval (spec.md §5 rate limiting).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}

pub type Result<T> = std::result::Result<T, MnemeError>;

impl MnemeError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn storage_transient(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into(), true)
    }

    pub fn storage_persistent(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into(), false)
    }
}

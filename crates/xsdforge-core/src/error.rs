use thiserror::Error;

/// Core error type shared across xsdforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema model is malformed or violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A schema construct the generator cannot handle.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by xsdforge crates.
pub type Result<T> = std::result::Result<T, Error>;

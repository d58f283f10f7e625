use thiserror::Error;

/// Failure of a [`crate::Backend`] operation.
///
/// "Not found" on a read is not an error: single-row fetches return `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row a write targets does not exist.
    #[error("{0} does not exist")]
    Missing(&'static str),

    /// Stored data broke an invariant, e.g. several rows where one was expected.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The backend call itself failed.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl Error {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Error::Backend(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

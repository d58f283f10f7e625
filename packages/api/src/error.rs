use thiserror::Error;

/// Outcome of a request flow that did not succeed.
///
/// Each variant corresponds to one HTTP outcome; the mapping lives in the `web` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input, rejected before any backend call.
    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not permitted")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("username is already taken")]
    UsernameTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("session store failure: {0}")]
    Session(String),

    #[error(transparent)]
    Store(#[from] store::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

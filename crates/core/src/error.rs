//! Error types for ezpoll-core.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Poll, token or commitment absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A poll already exists under this id.
    #[error("poll {0} already exists")]
    AlreadyExists(String),

    /// Caller is not allowed to perform a creator-only action.
    #[error("{caller} is not authorized to {action} poll {poll_id}")]
    Unauthorized {
        caller: String,
        action: &'static str,
        poll_id: String,
    },

    /// Action attempted outside the required poll status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Option label not in the poll's fixed option set.
    #[error("option {option:?} is not offered by poll {poll_id}")]
    InvalidOption { poll_id: String, option: String },

    /// The recipient already holds a token for the poll.
    #[error("a vote token for {recipient} on poll {poll_id} was already issued")]
    AlreadyIssued { poll_id: String, recipient: String },

    /// No token matches the redemption key.
    #[error("vote token {handle} not found on poll {poll_id}")]
    TokenNotFound { poll_id: String, handle: String },

    /// The token was redeemed before.
    #[error("vote token {handle} on poll {poll_id} was already used")]
    TokenAlreadyUsed { poll_id: String, handle: String },

    /// Missing or unparseable arguments or transient payload.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The ledger rejected the unit of work because a read went stale.
    #[error("conflicting write on key {0:?}")]
    Conflict(String),

    /// Any other failure reported by the hosting ledger.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Stable, payload-free classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Unauthorized,
    InvalidState,
    InvalidOption,
    AlreadyIssued,
    TokenNotFound,
    TokenAlreadyUsed,
    MalformedInput,
    Conflict,
    Ledger,
    Serialization,
    Config,
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::InvalidOption { .. } => ErrorKind::InvalidOption,
            Error::AlreadyIssued { .. } => ErrorKind::AlreadyIssued,
            Error::TokenNotFound { .. } => ErrorKind::TokenNotFound,
            Error::TokenAlreadyUsed { .. } => ErrorKind::TokenAlreadyUsed,
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Ledger(_) => ErrorKind::Ledger,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(message: S) -> Self {
        Error::MalformedInput(message.into())
    }

    pub(crate) fn invalid_state<S: Into<String>>(message: S) -> Self {
        Error::InvalidState(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

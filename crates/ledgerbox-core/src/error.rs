//! Error types for the Ledgerbox core.
//!
//! Strongly-typed errors per layer: persistence ([`StoreError`]), remote
//! collaborators ([`RemoteError`]) and the protocol itself ([`Error`]). Every
//! error maps to an [`ErrorClass`] so callers can tell bad input apart from
//! transient failures and from corrupt or forged data.

use ledgerbox_crypto::CryptoError;
use thiserror::Error;

use crate::call_queue::CallFailed;

/// Errors from the local key-value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying storage failed (disk, database, lock)
    #[error("storage I/O error: {0}")]
    Io(String),
}

/// Errors from remote read/write collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection dropped or could not be established
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote did not answer in time
    #[error("remote call timed out")]
    Timeout,

    /// Remote refused the operation (bad arguments, insufficient funds, etc.)
    #[error("remote call rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Rejections are never transient - the same call will be rejected again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

/// How a caller should react to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fix the input (bad length, missing parameter, wrong call order)
    InvalidInput,
    /// Try again later (peer not published yet, network trouble)
    Retryable,
    /// Data is corrupt or forged, do not retry with the same input
    Corrupt,
}

/// Errors from Ledgerbox protocol operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Key validation or authenticated encryption failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Peer key resolution needs a public key or an account id
    #[error("missing parameters: {0}")]
    MissingParameters(&'static str),

    /// Peer has not published an encryption key
    #[error("peer {account_id} has not published an encryption key")]
    PeerKeyUnavailable {
        /// Account whose key was looked up
        account_id: String,
    },

    /// No committed access credential exists yet
    #[error("access credential is not ready")]
    NotReady,

    /// Key injection confirmed while no temporary key was pending
    #[error("no temporary access key is pending")]
    NothingPending,

    /// Key is reserved for protocol use and cannot be written as a value
    #[error("storage key {0:?} is reserved")]
    ReservedKey(String),

    /// Base64 or prefix decoding failed
    #[error("encoding error: {0}")]
    Encoding(String),

    /// JSON encoding or decoding of a stored value failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Local persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote read failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Queued remote write failed on every attempt
    #[error(transparent)]
    CallFailed(#[from] CallFailed<RemoteError>),
}

impl Error {
    /// Classify this error for caller-side handling.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Crypto(CryptoError::AuthenticationFailed | CryptoError::MalformedBox { .. })
            | Self::Encoding(_)
            | Self::Serialization(_) => ErrorClass::Corrupt,
            Self::Crypto(_)
            | Self::MissingParameters(_)
            | Self::NotReady
            | Self::NothingPending
            | Self::ReservedKey(_) => ErrorClass::InvalidInput,
            Self::PeerKeyUnavailable { .. } | Self::Store(_) => ErrorClass::Retryable,
            Self::Remote(err) => remote_class(err),
            Self::CallFailed(failed) => remote_class(failed.last()),
        }
    }

    /// Returns true if this error may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

fn remote_class(err: &RemoteError) -> ErrorClass {
    if err.is_transient() { ErrorClass::Retryable } else { ErrorClass::InvalidInput }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_transient() {
        assert!(RemoteError::Transport("reset".to_string()).is_transient());
        assert!(RemoteError::Timeout.is_transient());
        assert!(!RemoteError::Rejected("bad args".to_string()).is_transient());
    }

    #[test]
    fn validation_errors_are_invalid_input() {
        let err = Error::from(CryptoError::InvalidKeyLength { expected: 32, actual: 31 });
        assert_eq!(err.class(), ErrorClass::InvalidInput);

        let err = Error::from(CryptoError::InvalidPeerKey { reason: "short".to_string() });
        assert_eq!(err.class(), ErrorClass::InvalidInput);

        assert_eq!(Error::MissingParameters("account id").class(), ErrorClass::InvalidInput);
        assert_eq!(Error::NotReady.class(), ErrorClass::InvalidInput);
        assert_eq!(Error::NothingPending.class(), ErrorClass::InvalidInput);
    }

    #[test]
    fn authentication_failure_is_corrupt() {
        let err = Error::from(CryptoError::AuthenticationFailed);
        assert_eq!(err.class(), ErrorClass::Corrupt);
        assert!(!err.is_transient());
    }

    #[test]
    fn unavailable_peer_is_retryable() {
        let err = Error::PeerKeyUnavailable { account_id: "bob.near".to_string() };
        assert_eq!(err.class(), ErrorClass::Retryable);
        assert!(err.is_transient());
    }

    #[test]
    fn call_failure_is_classified_by_last_error() {
        let failed = CallFailed::new(
            2,
            RemoteError::Timeout,
            Some(RemoteError::Rejected("out of gas".to_string())),
        );
        assert_eq!(Error::from(failed).class(), ErrorClass::InvalidInput);

        let failed = CallFailed::new(1, RemoteError::Timeout, None);
        assert_eq!(Error::from(failed).class(), ErrorClass::Retryable);
    }
}

//! Error types for key handling and box operations.

use thiserror::Error;

/// Errors from key parsing and authenticated encryption.
///
/// None of these are transient. Retrying with the same input yields the same
/// error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Secret or symmetric key has the wrong byte length
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Peer public key is malformed or unusable
    #[error("invalid peer key: {reason}")]
    InvalidPeerKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Box is too short to contain a nonce and any ciphertext
    #[error("malformed box: {len} bytes cannot hold a nonce and ciphertext")]
    MalformedBox {
        /// Length of the rejected box
        len: usize,
    },

    /// Authentication tag did not verify (tampered, forged or wrong key)
    #[error("authentication failed")]
    AuthenticationFailed,
}

//! Authenticated-encryption boxes using `XChaCha20-Poly1305`
//!
//! Two families share one wire layout (`nonce ‖ ciphertext ‖ tag`):
//!
//! - [`seal_secret`] / [`open_secret`]: symmetric, one shared key
//! - [`seal_box`] / [`open_box`]: asymmetric, X25519 between two key pairs
//!
//! All functions are pure - the nonce must be provided by the caller and MUST
//! be freshly random for every seal.

mod asymmetric;
mod symmetric;

pub use asymmetric::{open_box, seal_box};
pub use symmetric::{open_secret, seal_secret};

use crate::error::CryptoError;

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// A sealed box: nonce followed by ciphertext and tag.
///
/// # Invariants
///
/// - Total length is strictly greater than [`NONCE_SIZE`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBox {
    bytes: Vec<u8>,
}

impl EncryptedBox {
    /// Assemble a box from its nonce and AEAD output.
    pub(crate) fn assemble(nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        bytes.extend_from_slice(nonce);
        bytes.extend_from_slice(ciphertext);
        Self { bytes }
    }

    /// Parse a box received from storage or the network.
    ///
    /// Only the length is checked here. Authenticity is checked on open.
    ///
    /// # Errors
    ///
    /// - `MalformedBox`: if `bytes` is not longer than the nonce
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() <= NONCE_SIZE {
            return Err(CryptoError::MalformedBox { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    /// The leading nonce bytes.
    pub fn nonce(&self) -> &[u8] {
        &self.bytes[..NONCE_SIZE]
    }

    /// Ciphertext including the trailing Poly1305 tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[NONCE_SIZE..]
    }

    /// Full wire encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the box, returning its wire encoding.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

//! Box construction with environment-drawn nonces.
//!
//! Thin layer over the pure `ledgerbox-crypto` functions: every seal draws a
//! fresh random nonce from the [`Environment`], so callers cannot reuse one.

use ledgerbox_crypto::{EncryptedBox, NONCE_SIZE, open_box, open_secret, seal_box, seal_secret};

use crate::{env::Environment, error::Error};

/// Stateless authenticated-encryption routines.
#[derive(Debug, Clone)]
pub struct BoxCodec<E: Environment> {
    env: E,
}

impl<E: Environment> BoxCodec<E> {
    /// Create a codec drawing nonces from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Seal `plaintext` under a symmetric `key` with a fresh nonce.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `key` is not 32 bytes
    pub fn seal_secret(&self, plaintext: &[u8], key: &[u8]) -> Result<EncryptedBox, Error> {
        Ok(seal_secret(plaintext, key, self.fresh_nonce())?)
    }

    /// Open a symmetric box.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `key` is not 32 bytes
    /// - `AuthenticationFailed`: if the box is corrupt or the key is wrong
    pub fn open_secret(&self, sealed: &EncryptedBox, key: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(open_secret(sealed, key)?)
    }

    /// Seal `plaintext` from `sender_secret` to `recipient_public` with a
    /// fresh nonce.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerKey`: if `recipient_public` is malformed
    /// - `InvalidKeyLength`: if `sender_secret` is not 32 bytes
    pub fn seal_box(
        &self,
        plaintext: &[u8],
        recipient_public: &[u8],
        sender_secret: &[u8],
    ) -> Result<EncryptedBox, Error> {
        Ok(seal_box(plaintext, recipient_public, sender_secret, self.fresh_nonce())?)
    }

    /// Open a box sealed by `sender_public` for `recipient_secret`.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerKey`: if `sender_public` is malformed
    /// - `InvalidKeyLength`: if `recipient_secret` is not 32 bytes
    /// - `AuthenticationFailed`: if the box is corrupt, forged or misaddressed
    pub fn open_box(
        &self,
        sealed: &EncryptedBox,
        sender_public: &[u8],
        recipient_secret: &[u8],
    ) -> Result<Vec<u8>, Error> {
        Ok(open_box(sealed, sender_public, recipient_secret)?)
    }

    fn fresh_nonce(&self) -> [u8; NONCE_SIZE] {
        self.env.random_array()
    }
}

//! Symmetric box: one shared 32-byte key seals and opens.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use super::{EncryptedBox, NONCE_SIZE};
use crate::{error::CryptoError, keys::KEY_SIZE};

/// Seal `plaintext` under a symmetric `key`.
///
/// # Security
///
/// - Caller MUST provide a fresh cryptographically random `nonce` per call
/// - Reusing a nonce under the same key breaks confidentiality
///
/// # Errors
///
/// - `InvalidKeyLength`: if `key` is not exactly 32 bytes long
pub fn seal_secret(
    plaintext: &[u8],
    key: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<EncryptedBox, CryptoError> {
    let key = symmetric_key(key)?;
    let cipher = XChaCha20Poly1305::new(key.into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    Ok(EncryptedBox::assemble(&nonce, &ciphertext))
}

/// Open a symmetric box.
///
/// # Errors
///
/// - `InvalidKeyLength`: if `key` is not exactly 32 bytes long
/// - `AuthenticationFailed`: if the tag does not verify (tamper or wrong key).
///   The input is corrupt, retrying with it will fail again.
pub fn open_secret(sealed: &EncryptedBox, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = symmetric_key(key)?;
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(XNonce::from_slice(sealed.nonce()), sealed.ciphertext())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

fn symmetric_key(key: &[u8]) -> Result<&[u8; KEY_SIZE], CryptoError> {
    key.try_into()
        .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: key.len() })
}

//! Asymmetric box: X25519 key agreement between a sender and a recipient.
//!
//! The AEAD key is derived from the shared secret and both public keys, so a
//! box only opens for the exact (sender, recipient) pair it was sealed for.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use super::{EncryptedBox, NONCE_SIZE};
use crate::{
    error::CryptoError,
    keys::{KEY_SIZE, KeyPair, PublicKey, SecretKey, derive_box_key},
};

/// Seal `plaintext` from the holder of `sender_secret` to `recipient_public`.
///
/// Key lengths are validated before any primitive runs.
///
/// # Security
///
/// - Caller MUST provide a fresh cryptographically random `nonce` per call
///
/// # Errors
///
/// - `InvalidPeerKey`: if `recipient_public` is not 32 bytes or is a
///   low-order point
/// - `InvalidKeyLength`: if `sender_secret` is not 32 bytes
pub fn seal_box(
    plaintext: &[u8],
    recipient_public: &[u8],
    sender_secret: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<EncryptedBox, CryptoError> {
    let recipient = PublicKey::from_slice(recipient_public)?;
    let sender = KeyPair::from_secret_slice(sender_secret)?;

    let key = agree(sender.secret_key(), &recipient, sender.public_key(), &recipient)?;
    let cipher = XChaCha20Poly1305::new((&*key).into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    Ok(EncryptedBox::assemble(&nonce, &ciphertext))
}

/// Open a box sealed by `sender_public` for the holder of `recipient_secret`.
///
/// # Errors
///
/// - `InvalidPeerKey`: if `sender_public` is not 32 bytes or is a low-order
///   point
/// - `InvalidKeyLength`: if `recipient_secret` is not 32 bytes
/// - `AuthenticationFailed`: if the tag does not verify (tampered box, wrong
///   sender or wrong recipient)
pub fn open_box(
    sealed: &EncryptedBox,
    sender_public: &[u8],
    recipient_secret: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sender = PublicKey::from_slice(sender_public)?;
    let recipient = KeyPair::from_secret_slice(recipient_secret)?;

    let key = agree(recipient.secret_key(), &sender, &sender, recipient.public_key())?;
    let cipher = XChaCha20Poly1305::new((&*key).into());

    cipher
        .decrypt(XNonce::from_slice(sealed.nonce()), sealed.ciphertext())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// X25519 agreement followed by box key derivation.
fn agree(
    own_secret: &SecretKey,
    peer: &PublicKey,
    sender: &PublicKey,
    recipient: &PublicKey,
) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let scalar = StaticSecret::from(*own_secret.as_bytes());
    let shared = scalar.diffie_hellman(&x25519_dalek::PublicKey::from(*peer.as_bytes()));

    if !shared.was_contributory() {
        return Err(CryptoError::InvalidPeerKey { reason: "low-order public key".to_string() });
    }

    Ok(derive_box_key(shared.as_bytes(), sender, recipient))
}

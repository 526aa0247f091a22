//! Encryption key types and key-pair derivation.
//!
//! A [`KeyPair`] is always reconstructible from its secret half: the public
//! key is the X25519 base-point multiple of the secret. This lets storage keep
//! only the secret and rebuild the pair deterministically on load.

mod access;
mod derivation;

use std::fmt;

pub use access::AccessKeyPair;
pub(crate) use derivation::derive_box_key;
pub use derivation::derive_storage_key;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of every key handled by this crate (X25519, Ed25519 seed, AEAD key).
pub const KEY_SIZE: usize = 32;

/// X25519 public key, safe to publish.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a public key, rejecting any length other than [`KEY_SIZE`].
    ///
    /// # Errors
    ///
    /// - `InvalidPeerKey`: if `bytes` is not exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidPeerKey {
            reason: format!("expected {KEY_SIZE} bytes, got {}", bytes.len()),
        })?;
        Ok(Self(bytes))
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// X25519 secret key. Zeroized on drop, redacted in debug output.
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Wrap raw secret key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a secret key, rejecting any length other than [`KEY_SIZE`].
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `bytes` is not exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self(bytes))
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Long-lived X25519 encryption key pair.
///
/// # Invariants
///
/// - `public` is always the X25519 base-point multiple of `secret`
/// - Not `Clone`: one owner holds the pair, everyone else borrows it
#[derive(Debug)]
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    /// Reconstruct the key pair belonging to `secret`.
    ///
    /// Deterministic: the same secret always yields the same public key.
    pub fn from_secret(secret: SecretKey) -> Self {
        let scalar = StaticSecret::from(*secret.as_bytes());
        let public = PublicKey(x25519_dalek::PublicKey::from(&scalar).to_bytes());
        Self { public, secret }
    }

    /// Reconstruct a key pair from untrusted secret bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `secret` is not exactly 32 bytes long
    pub fn from_secret_slice(secret: &[u8]) -> Result<Self, CryptoError> {
        SecretKey::from_slice(secret).map(Self::from_secret)
    }

    /// Create a fresh key pair from caller-provided random bytes.
    ///
    /// Caller MUST provide cryptographically secure random bytes in
    /// production.
    pub fn generate(random: [u8; KEY_SIZE]) -> Self {
        Self::from_secret(SecretKey::from_bytes(random))
    }

    /// Public half of the pair.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Secret half of the pair.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let first = KeyPair::generate([7u8; KEY_SIZE]);
        let second = KeyPair::from_secret_slice(&[7u8; KEY_SIZE]).unwrap();

        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn different_secrets_produce_different_public_keys() {
        let first = KeyPair::generate([1u8; KEY_SIZE]);
        let second = KeyPair::generate([2u8; KEY_SIZE]);

        assert_ne!(first.public_key(), second.public_key());
    }

    #[test]
    fn public_key_matches_x25519_base_point_multiple() {
        let secret = [0x42u8; KEY_SIZE];
        let pair = KeyPair::generate(secret);
        let expected = x25519_dalek::x25519(secret, x25519_dalek::X25519_BASEPOINT_BYTES);

        assert_eq!(pair.public_key().as_bytes(), &expected);
    }

    #[test]
    fn short_secret_rejected() {
        let result = KeyPair::from_secret_slice(&[0u8; 31]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 })));
    }

    #[test]
    fn long_secret_rejected() {
        let result = SecretKey::from_slice(&[0u8; 64]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 64 })));
    }

    #[test]
    fn wrong_length_public_key_is_invalid_peer_key() {
        let result = PublicKey::from_slice(&[0u8; 33]);
        assert!(matches!(result, Err(CryptoError::InvalidPeerKey { .. })));

        let result = PublicKey::from_slice(&[]);
        assert!(matches!(result, Err(CryptoError::InvalidPeerKey { .. })));
    }

    #[test]
    fn secret_key_debug_is_redacted() {
        let secret = SecretKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{secret:?}");

        assert!(!rendered.contains("ab"));
        assert!(rendered.contains("redacted"));
    }
}

//! Ed25519 access credentials.
//!
//! The access key pair authorizes state-mutating ledger operations. It is a
//! different key from the X25519 encryption pair and never encrypts anything.

use ed25519_dalek::SigningKey;
use zeroize::Zeroizing;

use super::KEY_SIZE;
use crate::error::CryptoError;

/// Ed25519 key pair used as the ledger access credential.
///
/// The signing key is zeroized on drop by `ed25519-dalek`.
pub struct AccessKeyPair {
    signing: SigningKey,
}

impl AccessKeyPair {
    /// Create an access key pair from a caller-provided random seed.
    pub fn generate(seed: [u8; KEY_SIZE]) -> Self {
        Self { signing: SigningKey::from_bytes(&seed) }
    }

    /// Restore an access key pair from stored seed bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `seed` is not exactly 32 bytes long
    pub fn from_secret_slice(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; KEY_SIZE] = seed.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: seed.len() }
        })?;
        Ok(Self::generate(seed))
    }

    /// Seed bytes for persistence.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    /// Verifying key bytes, registered with the ledger.
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for AccessKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyPair").field("public", &self.public_bytes()).finish_non_exhaustive()
    }
}

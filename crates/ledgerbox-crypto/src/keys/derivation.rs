//! Key derivation using HKDF

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{KEY_SIZE, PublicKey, SecretKey};

/// Label for the symmetric key protecting an account's own stored values
const STORAGE_KEY_LABEL: &[u8] = b"ledgerbox-storage-v1";

/// Label for the per-pair asymmetric box key
const BOX_KEY_LABEL: &[u8] = b"ledgerbox-box-v1";

/// Derive the symmetric storage key from an encryption secret key.
///
/// The storage key seals values only the owner reads back. Deriving it keeps
/// the X25519 scalar from doubling as an AEAD key.
///
/// Deterministic: the same secret always yields the same storage key.
pub fn derive_storage_key(secret: &SecretKey) -> SecretKey {
    let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());

    let mut key = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(STORAGE_KEY_LABEL, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    SecretKey::from_bytes(key)
}

/// Derive the AEAD key for a box between `sender` and `recipient`.
///
/// Both public keys go into the info parameter in sender → recipient order,
/// so a box sealed from A to B cannot be reinterpreted as one from B to A.
pub(crate) fn derive_box_key(
    shared_secret: &[u8; KEY_SIZE],
    sender: &PublicKey,
    recipient: &PublicKey,
) -> Zeroizing<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);

    // Capacity: 16 (label) + 32 (sender) + 32 (recipient) = 80
    let mut info = Vec::with_capacity(80);
    info.extend_from_slice(BOX_KEY_LABEL);
    info.extend_from_slice(sender.as_bytes());
    info.extend_from_slice(recipient.as_bytes());

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    let Ok(()) = hkdf.expand(&info, &mut key[..]) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    key
}

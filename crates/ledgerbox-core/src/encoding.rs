//! Base64 encoding for binary values crossing the storage and ledger boundary.
//!
//! Keys and boxes are standard base64 (with padding). Access public keys carry
//! an `ed25519:` prefix, the form ledgers expect when registering a key.

use base64::{Engine, engine::general_purpose::STANDARD};
use ledgerbox_crypto::{AccessKeyPair, CryptoError, EncryptedBox, PublicKey};
use zeroize::Zeroizing;

use crate::error::Error;

/// Prefix of an encoded access public key.
pub const ACCESS_KEY_PREFIX: &str = "ed25519:";

/// Encode bytes as standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode secret material. The buffer is zeroized when dropped.
pub fn decode_secret(text: &str) -> Result<Zeroizing<Vec<u8>>, Error> {
    Ok(Zeroizing::new(STANDARD.decode(text.trim())?))
}

/// Decode and length-check a peer public key.
///
/// Both bad base64 and a wrong length are `InvalidPeerKey`: a peer key is
/// either exactly usable or rejected.
pub fn decode_public_key(text: &str) -> Result<PublicKey, Error> {
    let bytes = STANDARD.decode(text.trim()).map_err(|err| CryptoError::InvalidPeerKey {
        reason: format!("not valid base64: {err}"),
    })?;
    Ok(PublicKey::from_slice(&bytes)?)
}

/// Decode a box received from storage or another account.
pub fn decode_box(text: &str) -> Result<EncryptedBox, Error> {
    let bytes = STANDARD.decode(text.trim())?;
    Ok(EncryptedBox::from_bytes(bytes)?)
}

/// Render an access public key as `ed25519:<base64>`.
pub fn encode_access_public_key(pair: &AccessKeyPair) -> String {
    format!("{ACCESS_KEY_PREFIX}{}", encode(&pair.public_bytes()))
}

#[cfg(test)]
mod tests {
    use ledgerbox_crypto::{KEY_SIZE, NONCE_SIZE};

    use super::*;

    #[test]
    fn public_key_roundtrip() {
        let key = PublicKey::from_bytes([0x3C; KEY_SIZE]);
        let decoded = decode_public_key(&encode(key.as_bytes())).unwrap();

        assert_eq!(decoded, key);
    }

    #[test]
    fn short_public_key_is_invalid_peer_key() {
        let result = decode_public_key(&encode(&[0u8; 16]));
        assert!(matches!(result, Err(Error::Crypto(CryptoError::InvalidPeerKey { .. }))));
    }

    #[test]
    fn garbage_public_key_is_invalid_peer_key() {
        let result = decode_public_key("not base64 !!");
        assert!(matches!(result, Err(Error::Crypto(CryptoError::InvalidPeerKey { .. }))));
    }

    #[test]
    fn garbage_secret_is_encoding_error() {
        assert!(matches!(decode_secret("%%%"), Err(Error::Encoding(_))));
    }

    #[test]
    fn short_box_is_malformed() {
        let result = decode_box(&encode(&[0u8; NONCE_SIZE]));
        assert!(matches!(result, Err(Error::Crypto(CryptoError::MalformedBox { .. }))));
    }

    #[test]
    fn access_key_carries_prefix() {
        let pair = AccessKeyPair::generate([1u8; KEY_SIZE]);
        let rendered = encode_access_public_key(&pair);

        assert!(rendered.starts_with(ACCESS_KEY_PREFIX));
        let body = rendered.trim_start_matches(ACCESS_KEY_PREFIX);
        assert_eq!(STANDARD.decode(body).unwrap(), pair.public_bytes());
    }
}

//! Fuzz target for opening boxes
//!
//! Opens attacker-controlled boxes under attacker-controlled keys, and
//! tampers with genuine boxes.
//!
//! # Strategy
//!
//! - Raw bytes as box, public key and secret key (any lengths)
//! - Genuine boxes between two derived key pairs, then one mutation
//! - Symmetric boxes under a derived storage key, then one mutation
//!
//! # Invariants
//!
//! - Opening never panics, whatever the input
//! - Wrong-length keys fail with a length error, never an auth error
//! - A genuine box opens to its plaintext
//! - Any mutation of a genuine box fails authentication or framing

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ledgerbox_crypto::{
    CryptoError, EncryptedBox, KeyPair, KEY_SIZE, NONCE_SIZE, derive_storage_key, open_box,
    open_secret, seal_box, seal_secret,
};

#[derive(Debug, Clone, Arbitrary)]
enum BoxScenario {
    /// Completely arbitrary inputs
    Raw { sealed: Vec<u8>, public_key: Vec<u8>, secret_key: Vec<u8> },
    /// Genuine asymmetric box with one mutation
    TamperedBox {
        sender_seed: [u8; KEY_SIZE],
        recipient_seed: [u8; KEY_SIZE],
        nonce: [u8; NONCE_SIZE],
        plaintext: Vec<u8>,
        mutation: Mutation,
    },
    /// Genuine symmetric box with one mutation
    TamperedSecret {
        secret_seed: [u8; KEY_SIZE],
        nonce: [u8; NONCE_SIZE],
        plaintext: Vec<u8>,
        mutation: Mutation,
    },
}

#[derive(Debug, Clone, Arbitrary)]
enum Mutation {
    /// Leave the box intact
    None,
    /// XOR one byte (position wraps) with a non-zero mask
    FlipByte { position: u16, mask: u8 },
    /// Drop bytes from the end
    Truncate { remove: u16 },
    /// Append bytes
    Extend { extra: Vec<u8> },
}

impl Mutation {
    /// Apply to `bytes`; returns true if the bytes changed.
    fn apply(&self, bytes: &mut Vec<u8>) -> bool {
        match self {
            Mutation::None => false,
            Mutation::FlipByte { position, mask } => {
                if *mask == 0 {
                    return false;
                }
                let index = *position as usize % bytes.len();
                bytes[index] ^= mask;
                true
            },
            Mutation::Truncate { remove } => {
                let remove = (*remove as usize).min(bytes.len());
                bytes.truncate(bytes.len() - remove);
                remove > 0
            },
            Mutation::Extend { extra } => {
                bytes.extend_from_slice(extra);
                !extra.is_empty()
            },
        }
    }
}

fn check_tampered(result: Result<Vec<u8>, CryptoError>, plaintext: &[u8], changed: bool) {
    match (result, changed) {
        (Ok(opened), false) => assert_eq!(opened, plaintext, "genuine box must open"),
        (Ok(_), true) => panic!("tampered box must not open"),
        (Err(err), false) => panic!("genuine box failed to open: {err}"),
        (Err(err), true) => assert!(
            matches!(err, CryptoError::AuthenticationFailed | CryptoError::MalformedBox { .. }),
            "unexpected error for tampered box: {err}"
        ),
    }
}

fn reframe(bytes: Vec<u8>) -> Result<EncryptedBox, CryptoError> {
    EncryptedBox::from_bytes(bytes)
}

fuzz_target!(|scenario: BoxScenario| {
    match scenario {
        BoxScenario::Raw { sealed, public_key, secret_key } => {
            // INVARIANT: never panic
            let Ok(sealed) = EncryptedBox::from_bytes(sealed) else {
                return;
            };

            let result = open_box(&sealed, &public_key, &secret_key);
            if public_key.len() != KEY_SIZE {
                assert!(matches!(result, Err(CryptoError::InvalidPeerKey { .. })));
            } else if secret_key.len() != KEY_SIZE {
                assert!(matches!(result, Err(CryptoError::InvalidKeyLength { .. })));
            }

            let result = open_secret(&sealed, &secret_key);
            if secret_key.len() != KEY_SIZE {
                assert!(matches!(result, Err(CryptoError::InvalidKeyLength { .. })));
            }
        },
        BoxScenario::TamperedBox { sender_seed, recipient_seed, nonce, plaintext, mutation } => {
            let sender = KeyPair::generate(sender_seed);
            let recipient = KeyPair::generate(recipient_seed);

            // Low-order derived keys are rejected at seal time
            let Ok(sealed) = seal_box(
                &plaintext,
                recipient.public_key().as_bytes(),
                sender.secret_key().as_bytes(),
                nonce,
            ) else {
                return;
            };

            let mut bytes = sealed.into_bytes();
            let changed = mutation.apply(&mut bytes);
            let result = reframe(bytes).and_then(|sealed| {
                open_box(&sealed, sender.public_key().as_bytes(), recipient.secret_key().as_bytes())
            });
            check_tampered(result, &plaintext, changed);
        },
        BoxScenario::TamperedSecret { secret_seed, nonce, plaintext, mutation } => {
            let pair = KeyPair::generate(secret_seed);
            let storage_key = derive_storage_key(pair.secret_key());

            let Ok(sealed) = seal_secret(&plaintext, storage_key.as_bytes(), nonce) else {
                panic!("sealing under a 32-byte key must succeed");
            };

            let mut bytes = sealed.into_bytes();
            let changed = mutation.apply(&mut bytes);
            let result =
                reframe(bytes).and_then(|sealed| open_secret(&sealed, storage_key.as_bytes()));
            check_tampered(result, &plaintext, changed);
        },
    }
});

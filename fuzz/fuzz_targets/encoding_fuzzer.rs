//! Fuzz target for decoding untrusted base64 values
//!
//! Everything read back from the ledger or from local storage passes through
//! these decoders before any key or box is used.
//!
//! # Invariants
//!
//! - Decoding never panics
//! - A decoded public key is exactly 32 bytes and re-encodes to an equivalent
//!   value
//! - A decoded box is longer than its nonce

#![no_main]

use libfuzzer_sys::fuzz_target;
use ledgerbox_core::encoding::{decode_box, decode_public_key, decode_secret, encode};
use ledgerbox_crypto::NONCE_SIZE;

fuzz_target!(|text: &str| {
    if let Ok(public_key) = decode_public_key(text) {
        let reencoded = encode(public_key.as_bytes());
        assert_eq!(decode_public_key(&reencoded).ok(), Some(public_key));
    }

    if let Ok(sealed) = decode_box(text) {
        assert!(sealed.as_bytes().len() > NONCE_SIZE, "box must carry ciphertext");
    }

    let _ = decode_secret(text);
});

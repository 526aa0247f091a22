//! Ledgerbox Cryptographic Primitives
//!
//! Cryptographic building blocks for Ledgerbox. Pure functions with
//! deterministic outputs. Callers provide random bytes (key seeds, nonces) so
//! every operation can be replayed in tests.
//!
//! # Key Hierarchy
//!
//! Each (account, app) identity owns one long-lived X25519 key pair. Its
//! public half is published for peers; its secret half is used for two
//! purposes, never directly as an AEAD key:
//!
//! ```text
//! Encryption Secret Key (X25519)
//!        │
//!        ├──▶ HKDF("ledgerbox-storage-v1") → Storage Key → Secret Box
//!        │
//!        └──▶ X25519(peer public) → HKDF("ledgerbox-box-v1" ‖ pubs) → Box Key
//! ```
//!
//! Access credentials (the keys that authorize ledger writes) are separate
//! Ed25519 key pairs, see [`AccessKeyPair`].
//!
//! # Box Layout
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┬──────────────┐
//! │ nonce (24 bytes) │ ciphertext (len of msg)  │ tag (16 B)   │
//! └──────────────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! # Security
//!
//! Confidentiality and Authenticity:
//! - XChaCha20-Poly1305 AEAD, a failed tag rejects the whole box
//! - Asymmetric boxes bind sender and recipient public keys into the key
//!   derivation, so only those two key pairs can produce or open them
//!
//! Nonce Freshness:
//! - Nonces travel in-band and must be drawn fresh for every seal
//! - 192-bit nonces make random collisions negligible
//!
//! Input Validation:
//! - Key lengths are checked before any primitive runs
//! - Low-order peer keys (non-contributory X25519 results) are rejected

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod boxes;
mod error;
pub mod keys;

pub use boxes::{
    EncryptedBox, NONCE_SIZE, TAG_SIZE, open_box, open_secret, seal_box, seal_secret,
};
pub use error::CryptoError;
pub use keys::{AccessKeyPair, KEY_SIZE, KeyPair, PublicKey, SecretKey, derive_storage_key};

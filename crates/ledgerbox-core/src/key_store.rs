//! Encryption key-pair lifecycle per (account, app) identity.
//!
//! The key store is the sole owner of every current [`KeyPair`]. Other
//! components borrow a pair for the duration of one call and never retain it.

use std::collections::{HashMap, hash_map::Entry};

use ledgerbox_crypto::KeyPair;
use tracing::{debug, info};

use crate::{
    encoding::{decode_secret, encode},
    env::Environment,
    error::Error,
    storage::{KeyValueStore, encryption_key_slot},
};

/// An (account, app) pair owning one encryption key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Ledger account id
    pub account_id: String,
    /// Application (contract) id
    pub app_id: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(account_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), app_id: app_id.into() }
    }
}

/// Persistent store of encryption key pairs.
///
/// # Invariants
///
/// - At most one cached pair per identity, always matching the persisted
///   secret after any successful call
/// - Exactly one persisted record per identity
/// - Mutation requires `&mut self`, so readers never observe a half-updated
///   pair
pub struct KeyStore<S: KeyValueStore, E: Environment> {
    store: S,
    env: E,
    pairs: HashMap<Identity, KeyPair>,
}

impl<S: KeyValueStore, E: Environment> KeyStore<S, E> {
    /// Create a key store backed by `store`, drawing fresh keys from `env`.
    pub fn new(store: S, env: E) -> Self {
        Self { store, env, pairs: HashMap::new() }
    }

    /// Current key pair for `identity`, loading or generating it on first use.
    ///
    /// A stored secret is decoded and length-checked. Without one, a fresh
    /// pair is generated and its secret persisted before returning.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if the stored secret is not 32 bytes
    /// - `Encoding`: if the stored secret is not valid base64
    /// - `Store`: if reading or persisting fails (no retry)
    pub fn get_or_create_key_pair(&mut self, identity: &Identity) -> Result<&KeyPair, Error> {
        match self.pairs.entry(identity.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let pair = load_or_generate(&self.store, &self.env, identity)?;
                Ok(entry.insert(pair))
            },
        }
    }

    /// Replace the key pair for `identity` with one derived from `new_secret`.
    ///
    /// The record is persisted before the cached pair changes; on a
    /// persistence failure the previous pair stays current.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `new_secret` is not 32 bytes
    /// - `Store`: if persisting fails
    pub fn update_key_pair(
        &mut self,
        identity: &Identity,
        new_secret: &[u8],
    ) -> Result<&KeyPair, Error> {
        let pair = KeyPair::from_secret_slice(new_secret)?;
        self.store.set(&encryption_key_slot(identity), &encode(pair.secret_key().as_bytes()))?;

        info!(
            account_id = %identity.account_id,
            app_id = %identity.app_id,
            public_key = %encode(pair.public_key().as_bytes()),
            "encryption key replaced"
        );

        match self.pairs.entry(identity.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(pair);
                Ok(entry.into_mut())
            },
            Entry::Vacant(entry) => Ok(entry.insert(pair)),
        }
    }

    /// Base64 public key for `identity`, the form published to peers.
    ///
    /// # Errors
    ///
    /// Same as [`get_or_create_key_pair`](Self::get_or_create_key_pair).
    pub fn public_key_encoded(&mut self, identity: &Identity) -> Result<String, Error> {
        let pair = self.get_or_create_key_pair(identity)?;
        Ok(encode(pair.public_key().as_bytes()))
    }

    /// Cached key pair for `identity`, without touching storage.
    pub fn current(&self, identity: &Identity) -> Option<&KeyPair> {
        self.pairs.get(identity)
    }
}

fn load_or_generate<S: KeyValueStore, E: Environment>(
    store: &S,
    env: &E,
    identity: &Identity,
) -> Result<KeyPair, Error> {
    let slot = encryption_key_slot(identity);

    if let Some(encoded) = store.get(&slot)? {
        let secret = decode_secret(&encoded)?;
        let pair = KeyPair::from_secret_slice(&secret)?;
        debug!(account_id = %identity.account_id, app_id = %identity.app_id, "loaded encryption key");
        return Ok(pair);
    }

    let pair = KeyPair::generate(env.random_array());
    store.set(&slot, &encode(pair.secret_key().as_bytes()))?;
    debug!(
        account_id = %identity.account_id,
        app_id = %identity.app_id,
        public_key = %encode(pair.public_key().as_bytes()),
        "generated encryption key"
    );
    Ok(pair)
}

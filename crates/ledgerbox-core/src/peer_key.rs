//! Peer public-key discovery.
//!
//! Every message seal and open obtains the counterpart's key here, so
//! validation is identical regardless of call site.
//!
//! # Resolution Order
//!
//! 1. Decoded public key supplied → returned as is
//! 2. Encoded public key supplied → base64-decoded and length-checked
//! 3. Account id supplied → remote read of the peer's `"encryptionKey"` slot,
//!    then decoded and length-checked

use std::sync::Arc;

use ledgerbox_crypto::PublicKey;
use tracing::debug;

use crate::{
    encoding::decode_public_key,
    error::Error,
    remote::{ENCRYPTION_KEY_SLOT, RemoteRead},
};

/// What the caller knows about a peer's encryption key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerKeyRequest {
    /// Already-decoded public key
    pub public_key: Option<PublicKey>,
    /// Base64-encoded public key
    pub encoded_public_key: Option<String>,
    /// Account whose published key should be fetched
    pub account_id: Option<String>,
}

impl PeerKeyRequest {
    /// Request resolving to a known public key.
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self { public_key: Some(public_key), ..Self::default() }
    }

    /// Request decoding a base64 public key.
    pub fn from_encoded(encoded_public_key: impl Into<String>) -> Self {
        Self { encoded_public_key: Some(encoded_public_key.into()), ..Self::default() }
    }

    /// Request fetching the key `account_id` published.
    pub fn for_account(account_id: impl Into<String>) -> Self {
        Self { account_id: Some(account_id.into()), ..Self::default() }
    }

    /// Resolve the key from what the request itself carries, without reading
    /// the ledger. `None` when only an account id is given.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerKey`: if the encoded key is malformed
    pub fn local_key(&self) -> Result<Option<PublicKey>, Error> {
        if let Some(public_key) = self.public_key {
            return Ok(Some(public_key));
        }
        self.encoded_public_key.as_deref().map(decode_public_key).transpose()
    }
}

/// Resolves peer public keys, reading published keys from the ledger.
pub struct PeerKeyResolver<R: RemoteRead + ?Sized> {
    remote: Arc<R>,
    app_id: String,
}

impl<R: RemoteRead + ?Sized> PeerKeyResolver<R> {
    /// Create a resolver reading published keys of `app_id` through `remote`.
    pub fn new(remote: Arc<R>, app_id: impl Into<String>) -> Self {
        Self { remote, app_id: app_id.into() }
    }

    /// Resolve the peer public key described by `request`.
    ///
    /// # Errors
    ///
    /// - `MissingParameters`: if neither a key nor an account id is given
    /// - `PeerKeyUnavailable`: if the peer has not published a key
    /// - `InvalidPeerKey`: if the supplied or published key is malformed
    /// - `Remote`: if the remote read fails
    pub async fn resolve_peer_public_key(
        &self,
        request: &PeerKeyRequest,
    ) -> Result<PublicKey, Error> {
        if let Some(public_key) = request.local_key()? {
            return Ok(public_key);
        }

        let Some(account_id) = &request.account_id else {
            return Err(Error::MissingParameters("peer public key or account id"));
        };

        let published = self.remote.get(account_id, &self.app_id, ENCRYPTION_KEY_SLOT).await?;
        let Some(encoded) = published else {
            return Err(Error::PeerKeyUnavailable { account_id: account_id.clone() });
        };

        let public_key = decode_public_key(&encoded)?;
        debug!(peer = %account_id, app_id = %self.app_id, "resolved published peer key");
        Ok(public_key)
    }
}

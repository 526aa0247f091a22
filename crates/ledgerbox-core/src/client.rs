//! Per-identity client composing keys, readiness, peer discovery and ordered
//! remote writes.
//!
//! # Stored Values
//!
//! ```text
//! value ──serde_json──> JSON ─┬─ Plain ───────────────────────────> ledger
//!                             └─ Sealed ─seal_secret(storage key)─base64─> ledger
//! ```
//!
//! The storage key is derived from the identity's encryption secret, so a
//! sealed value can only be read back by the same identity. Rotating the
//! encryption key makes previously sealed values unreadable.
//!
//! # Messages
//!
//! Messages are boxes from the sender's encryption key to the receiver's
//! published key, base64-encoded and delivered through the ledger.

#![allow(clippy::disallowed_types, reason = "Key store lock is never held across an await")]

use std::sync::{Arc, Mutex, PoisonError};

use ledgerbox_crypto::{KeyPair, PublicKey, derive_storage_key};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    call_queue::CallSerializer,
    codec::BoxCodec,
    config::{ClientConfig, ValueProtection},
    encoding::{decode_box, encode},
    env::Environment,
    error::Error,
    key_store::{Identity, KeyStore},
    peer_key::{PeerKeyRequest, PeerKeyResolver},
    readiness::{ReadinessHandshake, ReadinessState},
    remote::{ENCRYPTION_KEY_SLOT, RemoteRead, RemoteWrite},
    storage::KeyValueStore,
};

/// Encrypted storage and messaging for one (network, account, app).
///
/// # Invariants
///
/// - Every remote write goes through one [`CallSerializer`], after the
///   readiness check. Clients that share a signer must share the serializer
///   (see [`Client::with_call_serializer`]) to keep writes one at a time
/// - The encryption key pair is borrowed only inside synchronous sections
pub struct Client<S, R, W, E>
where
    S: KeyValueStore,
    R: RemoteRead + 'static,
    W: RemoteWrite + 'static,
    E: Environment,
{
    config: ClientConfig,
    identity: Identity,
    keys: Mutex<KeyStore<S, E>>,
    codec: BoxCodec<E>,
    peers: PeerKeyResolver<R>,
    remote: Arc<R>,
    writer: Arc<W>,
    readiness: ReadinessHandshake<S, E>,
    calls: Arc<CallSerializer>,
}

impl<S, R, W, E> Client<S, R, W, E>
where
    S: KeyValueStore,
    R: RemoteRead + 'static,
    W: RemoteWrite + 'static,
    E: Environment,
{
    /// Create a client with its own call serializer using `config.retry`.
    /// Nothing is loaded or generated until first use.
    pub fn new(config: ClientConfig, store: S, env: E, remote: Arc<R>, writer: Arc<W>) -> Self {
        let calls = Arc::new(CallSerializer::new(config.retry));
        Self::with_call_serializer(config, store, env, remote, writer, calls)
    }

    /// Create a client whose remote writes queue on `calls`.
    ///
    /// Every client writing through the same signer in this process should be
    /// given the same serializer. The serializer's own retry policy applies;
    /// `config.retry` is ignored.
    pub fn with_call_serializer(
        config: ClientConfig,
        store: S,
        env: E,
        remote: Arc<R>,
        writer: Arc<W>,
        calls: Arc<CallSerializer>,
    ) -> Self {
        let identity = config.identity();
        let readiness = ReadinessHandshake::new(
            store.clone(),
            env.clone(),
            &config.network_id,
            &config.account_id,
        );

        Self {
            keys: Mutex::new(KeyStore::new(store, env.clone())),
            codec: BoxCodec::new(env),
            peers: PeerKeyResolver::new(Arc::clone(&remote), &config.app_id),
            calls,
            remote,
            writer,
            readiness,
            identity,
            config,
        }
    }

    /// Configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Identity owning the encryption key.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Own encryption public key, generating the key pair on first use.
    ///
    /// # Errors
    ///
    /// - `Store`, `Encoding`, `InvalidKeyLength`: see
    ///   [`KeyStore::get_or_create_key_pair`]
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        self.with_key_pair(|pair| Ok(*pair.public_key()))
    }

    /// Replace the encryption key with one derived from `new_secret`.
    ///
    /// The new public key is not published; call
    /// [`publish_encryption_key`](Self::publish_encryption_key) afterwards.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: if `new_secret` is not 32 bytes
    /// - `Store`: if persisting fails
    pub fn rotate_encryption_key(&self, new_secret: &[u8]) -> Result<PublicKey, Error> {
        let mut keys = self.lock_keys();
        let pair = keys.update_key_pair(&self.identity, new_secret)?;
        Ok(*pair.public_key())
    }

    /// Publish the own public key under the well-known slot so peers can
    /// address messages to this identity.
    ///
    /// # Errors
    ///
    /// - `NotReady`: if no access credential is committed
    /// - `CallFailed`: if the remote write fails on every attempt
    pub async fn publish_encryption_key(&self) -> Result<(), Error> {
        self.readiness.require_ready()?;
        let public_key = self.lock_keys().public_key_encoded(&self.identity)?;
        self.write_value(ENCRYPTION_KEY_SLOT, public_key).await?;

        debug!(
            account_id = %self.config.account_id,
            app_id = %self.config.app_id,
            "published encryption key"
        );
        Ok(())
    }

    /// Store `value` under `key` with the configured default protection.
    ///
    /// # Errors
    ///
    /// See [`set_value_with`](Self::set_value_with).
    pub async fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        self.set_value_with(key, value, self.config.default_protection).await
    }

    /// Store `value` under `key` with explicit `protection`.
    ///
    /// # Errors
    ///
    /// - `ReservedKey`: if `key` is the encryption key slot
    /// - `NotReady`: if no access credential is committed
    /// - `Serialization`: if `value` cannot be encoded as JSON
    /// - `CallFailed`: if the remote write fails on every attempt
    pub async fn set_value_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        protection: ValueProtection,
    ) -> Result<(), Error> {
        if key == ENCRYPTION_KEY_SLOT {
            return Err(Error::ReservedKey(key.to_string()));
        }
        self.readiness.require_ready()?;

        let json = serde_json::to_string(value)?;
        let stored = match protection {
            ValueProtection::Plain => json,
            ValueProtection::Sealed => self.with_key_pair(|pair| {
                let storage_key = derive_storage_key(pair.secret_key());
                let sealed = self.codec.seal_secret(json.as_bytes(), storage_key.as_bytes())?;
                Ok(encode(sealed.as_bytes()))
            })?,
        };

        self.write_value(key, stored).await?;
        debug!(key, ?protection, "stored value");
        Ok(())
    }

    /// Read back the own value under `key` with the configured default
    /// protection. `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// See [`get_value_with`](Self::get_value_with).
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.get_value_with(key, self.config.default_protection).await
    }

    /// Read back the own value under `key`, stored with `protection`.
    ///
    /// # Errors
    ///
    /// - `Remote`: if the read fails
    /// - `Encoding` / `MalformedBox`: if a sealed value is not a valid box
    /// - `AuthenticationFailed`: if a sealed value was tampered with or sealed
    ///   under a different key
    /// - `Serialization`: if the JSON does not match `T`
    pub async fn get_value_with<T: DeserializeOwned>(
        &self,
        key: &str,
        protection: ValueProtection,
    ) -> Result<Option<T>, Error> {
        let Some(stored) =
            self.remote.get(&self.config.account_id, &self.config.app_id, key).await?
        else {
            return Ok(None);
        };

        let json = match protection {
            ValueProtection::Plain => stored.into_bytes(),
            ValueProtection::Sealed => {
                let sealed = decode_box(&stored)?;
                self.with_key_pair(|pair| {
                    let storage_key = derive_storage_key(pair.secret_key());
                    self.codec.open_secret(&sealed, storage_key.as_bytes())
                })?
            },
        };

        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Read a plain value another account stored under `key` in this app.
    ///
    /// # Errors
    ///
    /// - `Remote`: if the read fails
    /// - `Serialization`: if the value is not JSON matching `T`
    pub async fn get_peer_value<T: DeserializeOwned>(
        &self,
        account_id: &str,
        key: &str,
    ) -> Result<Option<T>, Error> {
        match self.remote.get(account_id, &self.config.app_id, key).await? {
            Some(stored) => Ok(Some(serde_json::from_str(&stored)?)),
            None => Ok(None),
        }
    }

    /// Seal `plaintext` to the key `receiver_id` published and deliver it.
    ///
    /// # Errors
    ///
    /// - `NotReady`: if no access credential is committed
    /// - `PeerKeyUnavailable` / `InvalidPeerKey`: if the receiver's key cannot
    ///   be resolved
    /// - `CallFailed`: if the remote write fails on every attempt
    pub async fn send_message(&self, receiver_id: &str, plaintext: &[u8]) -> Result<(), Error> {
        self.readiness.require_ready()?;
        let peer = self.peers.resolve_peer_public_key(&PeerKeyRequest::for_account(receiver_id)).await?;

        let body = self.with_key_pair(|pair| {
            let sealed =
                self.codec.seal_box(plaintext, peer.as_bytes(), pair.secret_key().as_bytes())?;
            Ok(encode(sealed.as_bytes()))
        })?;

        let writer = Arc::clone(&self.writer);
        let app_id = self.config.app_id.clone();
        let receiver = receiver_id.to_string();
        self.calls
            .enqueue(move || {
                let (writer, app_id, receiver, body) =
                    (Arc::clone(&writer), app_id.clone(), receiver.clone(), body.clone());
                async move { writer.send_message(&receiver, &app_id, &body).await }
            })
            .await?;

        debug!(receiver = %receiver_id, app_id = %self.config.app_id, "message sent");
        Ok(())
    }

    /// Open a message body sealed by the peer described by `sender`.
    ///
    /// # Errors
    ///
    /// - `MissingParameters` / `PeerKeyUnavailable` / `InvalidPeerKey`: if the
    ///   sender's key cannot be resolved
    /// - `Encoding` / `MalformedBox`: if `body` is not an encoded box
    /// - `AuthenticationFailed`: if the box is forged, corrupt or not
    ///   addressed to this identity
    pub async fn open_message(
        &self,
        sender: &PeerKeyRequest,
        body: &str,
    ) -> Result<Vec<u8>, Error> {
        let peer = self.peers.resolve_peer_public_key(sender).await?;
        let sealed = decode_box(body)?;

        self.with_key_pair(|pair| {
            self.codec.open_box(&sealed, peer.as_bytes(), pair.secret_key().as_bytes())
        })
    }

    /// See [`ReadinessHandshake::probe_ready`].
    ///
    /// # Errors
    ///
    /// - `Store`: if reading or persisting fails
    pub fn probe_ready(&self) -> Result<bool, Error> {
        self.readiness.probe_ready()
    }

    /// See [`ReadinessHandshake::wait_until_ready`].
    ///
    /// # Errors
    ///
    /// - `Store`: if the initial probe fails
    pub async fn wait_until_ready(&self) -> Result<(), Error> {
        self.readiness.wait_until_ready().await
    }

    /// See [`ReadinessHandshake::confirm_key_injected`].
    ///
    /// # Errors
    ///
    /// - `NothingPending`: if no temporary key exists
    /// - `Store`: if persisting the credential fails
    pub fn confirm_key_injected(&self) -> Result<(), Error> {
        self.readiness.confirm_key_injected()
    }

    /// Temporary access public key awaiting registration, if any.
    pub fn pending_access_key(&self) -> Option<String> {
        self.readiness.pending_public_key()
    }

    /// Current readiness state.
    pub fn readiness_state(&self) -> ReadinessState {
        self.readiness.state()
    }

    async fn write_value(&self, key: &str, value: String) -> Result<(), Error> {
        let writer = Arc::clone(&self.writer);
        let app_id = self.config.app_id.clone();
        let key = key.to_string();

        self.calls
            .enqueue(move || {
                let (writer, app_id, key, value) =
                    (Arc::clone(&writer), app_id.clone(), key.clone(), value.clone());
                async move { writer.set(&app_id, &key, &value).await }
            })
            .await?;
        Ok(())
    }

    fn with_key_pair<T>(&self, f: impl FnOnce(&KeyPair) -> Result<T, Error>) -> Result<T, Error> {
        let mut keys = self.lock_keys();
        let pair = keys.get_or_create_key_pair(&self.identity)?;
        f(pair)
    }

    // Key store methods leave the cache consistent before any fallible step,
    // so a poisoned lock still guards valid state.
    fn lock_keys(&self) -> std::sync::MutexGuard<'_, KeyStore<S, E>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use ledgerbox_crypto::{CryptoError, KEY_SIZE};
    use serde::Deserialize;

    use super::*;
    use crate::{
        call_queue::RetryPolicy,
        env::SystemEnv,
        error::ErrorClass,
        remote::{LedgerHandle, MemoryLedger},
        storage::MemoryStore,
    };

    type TestClient = Client<MemoryStore, MemoryLedger, LedgerHandle, SystemEnv>;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        pinned: bool,
    }

    fn client(ledger: &MemoryLedger, account_id: &str) -> TestClient {
        Client::new(
            ClientConfig::new("testnet", account_id, "chat"),
            MemoryStore::new(),
            SystemEnv::new(),
            Arc::new(ledger.clone()),
            Arc::new(ledger.handle(account_id)),
        )
    }

    fn ready_client(ledger: &MemoryLedger, account_id: &str) -> TestClient {
        let client = client(ledger, account_id);
        assert!(!client.probe_ready().unwrap());
        client.confirm_key_injected().unwrap();
        client
    }

    fn note() -> Note {
        Note { title: "groceries".to_string(), pinned: true }
    }

    #[tokio::test]
    async fn writes_require_readiness() {
        let ledger = MemoryLedger::new();
        let client = client(&ledger, "alice.near");

        assert!(matches!(client.publish_encryption_key().await, Err(Error::NotReady)));
        assert!(matches!(client.set_value("note", &note()).await, Err(Error::NotReady)));
        assert!(client.pending_access_key().is_some());
        assert_eq!(ledger.write_attempts(), 0);
    }

    #[tokio::test]
    async fn published_key_matches_own_key() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");

        alice.publish_encryption_key().await.unwrap();

        let published = ledger.get("alice.near", "chat", ENCRYPTION_KEY_SLOT).await.unwrap();
        assert_eq!(published, Some(encode(alice.public_key().unwrap().as_bytes())));
    }

    #[tokio::test]
    async fn sealed_value_roundtrip_hides_plaintext() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");

        alice.set_value("note", &note()).await.unwrap();

        let raw = ledger.get("alice.near", "chat", "note").await.unwrap().unwrap();
        assert!(!raw.contains("groceries"));
        assert_eq!(alice.get_value::<Note>("note").await.unwrap(), Some(note()));
    }

    #[tokio::test]
    async fn plain_value_readable_by_peer() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        let bob = client(&ledger, "bob.near");

        alice.set_value_with("profile", &note(), ValueProtection::Plain).await.unwrap();

        let seen: Option<Note> = bob.get_peer_value("alice.near", "profile").await.unwrap();
        assert_eq!(seen, Some(note()));
    }

    #[tokio::test]
    async fn missing_value_is_none() {
        let ledger = MemoryLedger::new();
        let alice = client(&ledger, "alice.near");

        assert_eq!(alice.get_value::<Note>("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn encryption_key_slot_is_reserved() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");

        let result = alice.set_value(ENCRYPTION_KEY_SLOT, "spoofed").await;
        assert!(matches!(result, Err(Error::ReservedKey(_))));
    }

    #[tokio::test]
    async fn rotation_invalidates_sealed_values() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        alice.set_value("note", &note()).await.unwrap();

        alice.rotate_encryption_key(&[0x5A; KEY_SIZE]).unwrap();

        let result = alice.get_value::<Note>("note").await;
        assert!(matches!(result, Err(Error::Crypto(CryptoError::AuthenticationFailed))));
        assert_eq!(result.unwrap_err().class(), ErrorClass::Corrupt);
    }

    #[tokio::test]
    async fn message_roundtrip_between_accounts() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        let bob = ready_client(&ledger, "bob.near");
        alice.publish_encryption_key().await.unwrap();
        bob.publish_encryption_key().await.unwrap();

        alice.send_message("bob.near", b"lunch at noon?").await.unwrap();

        let inbox = ledger.inbox("bob.near", "chat");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_id, "alice.near");

        let opened = bob
            .open_message(&PeerKeyRequest::for_account("alice.near"), &inbox[0].body)
            .await
            .unwrap();
        assert_eq!(opened, b"lunch at noon?");
    }

    #[tokio::test]
    async fn message_for_someone_else_does_not_open() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        let bob = ready_client(&ledger, "bob.near");
        let eve = ready_client(&ledger, "eve.near");
        for peer in [&alice, &bob, &eve] {
            peer.publish_encryption_key().await.unwrap();
        }

        alice.send_message("bob.near", b"secret").await.unwrap();
        let body = ledger.inbox("bob.near", "chat")[0].body.clone();

        let result = eve.open_message(&PeerKeyRequest::for_account("alice.near"), &body).await;
        assert!(matches!(result, Err(Error::Crypto(CryptoError::AuthenticationFailed))));
    }

    #[tokio::test]
    async fn sending_to_unpublished_peer_fails_without_writing() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");

        let result = alice.send_message("bob.near", b"hello?").await;

        assert!(matches!(result, Err(Error::PeerKeyUnavailable { .. })));
        assert_eq!(ledger.write_attempts(), 0);
    }

    #[tokio::test]
    async fn transient_write_failure_is_retried() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        ledger.fail_next_writes(1);

        alice.set_value("note", &note()).await.unwrap();

        assert_eq!(ledger.write_attempts(), 2);
        assert_eq!(alice.get_value::<Note>("note").await.unwrap(), Some(note()));
    }

    #[tokio::test]
    async fn persistent_write_failure_surfaces_both_errors() {
        let ledger = MemoryLedger::new();
        let alice = ready_client(&ledger, "alice.near");
        ledger.fail_next_writes(2);

        let result = alice.set_value("note", &note()).await;

        let failed = match result {
            Err(Error::CallFailed(failed)) => failed,
            other => panic!("expected CallFailed, got {other:?}"),
        };
        assert_eq!(failed.attempts(), 2);
        assert!(failed.first().is_transient());
    }

    #[tokio::test]
    async fn configured_retry_policy_is_applied() {
        let ledger = MemoryLedger::new();
        let alice = Client::new(
            ClientConfig::new("testnet", "alice.near", "chat").with_retry(RetryPolicy::no_retry()),
            MemoryStore::new(),
            SystemEnv::new(),
            Arc::new(ledger.clone()),
            Arc::new(ledger.handle("alice.near")),
        );
        alice.probe_ready().unwrap();
        alice.confirm_key_injected().unwrap();
        ledger.fail_next_writes(1);

        let result = alice.set_value("note", &note()).await;

        assert!(matches!(result, Err(Error::CallFailed(ref failed)) if failed.attempts() == 1));
        assert_eq!(ledger.write_attempts(), 1);
    }
}

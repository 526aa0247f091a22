//! Readiness handshake for the ledger access credential.
//!
//! An app may not issue state-mutating calls until its account holds an
//! access credential. When none exists, a temporary access key pair is minted
//! and its public half exposed for external registration; once the external
//! collaborator confirms the key was committed, the handshake becomes ready.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐  probe (no credential)  ┌──────────────────────┐
//! │ NotReady │────────────────────────>│ TemporaryKeyPending  │
//! └──────────┘                         └──────────────────────┘
//!      │                                          │
//!      │ probe (credential stored)                │ confirm_key_injected
//!      ↓                                          ↓
//! ┌───────────────────────────────────────────────────────────┐
//! │ Ready (terminal for the session, releases all waiters)    │
//! └───────────────────────────────────────────────────────────┘
//! ```

#![allow(clippy::disallowed_types, reason = "Lock is never held across an await")]

use std::sync::{Mutex, MutexGuard, PoisonError};

use ledgerbox_crypto::AccessKeyPair;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    encoding::{decode_secret, encode, encode_access_public_key},
    env::Environment,
    error::Error,
    storage::{KeyValueStore, access_key_slot, pending_access_key_slot},
};

/// Observable handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// No credential, nothing minted yet
    NotReady,
    /// Temporary key minted, waiting for confirmation
    TemporaryKeyPending,
    /// Credential committed
    Ready,
}

enum Phase {
    NotReady,
    Pending(AccessKeyPair),
    Ready,
}

struct Inner {
    phase: Phase,
    /// Callers parked in `wait_until_ready`, released together on Ready
    waiters: Vec<oneshot::Sender<()>>,
}

/// Tracks whether the account holds a usable access credential.
///
/// # Invariants
///
/// - At most one temporary key is pending at a time
/// - The Ready transition happens once and releases every waiter exactly once
/// - Ready is never left
pub struct ReadinessHandshake<S: KeyValueStore, E: Environment> {
    store: S,
    env: E,
    network_id: String,
    account_id: String,
    inner: Mutex<Inner>,
}

impl<S: KeyValueStore, E: Environment> ReadinessHandshake<S, E> {
    /// Create a handshake for `account_id` on `network_id`.
    pub fn new(
        store: S,
        env: E,
        network_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            env,
            network_id: network_id.into(),
            account_id: account_id.into(),
            inner: Mutex::new(Inner { phase: Phase::NotReady, waiters: Vec::new() }),
        }
    }

    /// Check for a committed credential, minting a temporary key if needed.
    ///
    /// Returns false while a temporary key is pending; never mints a second
    /// one. A temporary key persisted by an earlier session is resumed instead
    /// of minting a new one.
    ///
    /// # Errors
    ///
    /// - `Store`: if reading or persisting fails
    /// - `InvalidKeyLength` / `Encoding`: if a persisted pending key is corrupt
    pub fn probe_ready(&self) -> Result<bool, Error> {
        let mut inner = self.lock();
        self.probe_locked(&mut inner)
    }

    /// Suspend until the credential is ready.
    ///
    /// Resolves immediately when already ready. Otherwise the caller is parked
    /// until [`confirm_key_injected`](Self::confirm_key_injected) or a later
    /// successful probe fires the Ready transition. Does not time out; a
    /// caller that stops waiting leaves nothing behind beyond the next call.
    ///
    /// # Errors
    ///
    /// - `Store`: if the initial probe fails
    /// - `NotReady`: if the handshake is dropped while the caller waits
    pub async fn wait_until_ready(&self) -> Result<(), Error> {
        let ready = {
            let mut inner = self.lock();
            if self.probe_locked(&mut inner)? {
                return Ok(());
            }
            // Waiters whose caller gave up (timeout, cancellation) are dropped
            inner.waiters.retain(|waiter| !waiter.is_closed());
            let (sender, receiver) = oneshot::channel();
            inner.waiters.push(sender);
            debug!(waiters = inner.waiters.len(), "parked until access key is injected");
            receiver
        };

        ready.await.map_err(|_| Error::NotReady)
    }

    /// Commit the pending temporary key as the account's access credential.
    ///
    /// Persists the credential, clears the pending slot and releases every
    /// parked waiter.
    ///
    /// # Errors
    ///
    /// - `NothingPending`: if no temporary key exists (including when already
    ///   ready)
    /// - `Store`: if persisting the credential fails; the key stays pending
    pub fn confirm_key_injected(&self) -> Result<(), Error> {
        let mut inner = self.lock();

        if matches!(inner.phase, Phase::NotReady) {
            if let Some(pair) = self.load_pending()? {
                inner.phase = Phase::Pending(pair);
            }
        }

        let pair = match std::mem::replace(&mut inner.phase, Phase::NotReady) {
            Phase::Pending(pair) => pair,
            other => {
                inner.phase = other;
                return Err(Error::NothingPending);
            },
        };

        let slot = access_key_slot(&self.network_id, &self.account_id);
        if let Err(err) = self.store.set(&slot, &encode(&*pair.secret_bytes())) {
            inner.phase = Phase::Pending(pair);
            return Err(err.into());
        }

        let pending_slot = pending_access_key_slot(&self.network_id, &self.account_id);
        if let Err(err) = self.store.remove(&pending_slot) {
            // Credential is committed; a stale pending record is ignored by probes
            warn!(error = %err, "failed to clear pending access key");
        }

        info!(
            account_id = %self.account_id,
            public_key = %encode_access_public_key(&pair),
            "access key injected"
        );
        inner.phase = Phase::Ready;
        release(&mut inner);
        Ok(())
    }

    /// Guard for state-mutating operations.
    ///
    /// # Errors
    ///
    /// - `NotReady`: if no credential is committed
    /// - `Store`: if the probe fails
    pub fn require_ready(&self) -> Result<(), Error> {
        if self.probe_ready()? { Ok(()) } else { Err(Error::NotReady) }
    }

    /// Public half of the pending temporary key as `ed25519:<base64>`.
    ///
    /// Returns `None` unless a temporary key is pending.
    pub fn pending_public_key(&self) -> Option<String> {
        match &self.lock().phase {
            Phase::Pending(pair) => Some(encode_access_public_key(pair)),
            Phase::NotReady | Phase::Ready => None,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> ReadinessState {
        match self.lock().phase {
            Phase::NotReady => ReadinessState::NotReady,
            Phase::Pending(_) => ReadinessState::TemporaryKeyPending,
            Phase::Ready => ReadinessState::Ready,
        }
    }

    fn probe_locked(&self, inner: &mut Inner) -> Result<bool, Error> {
        if matches!(inner.phase, Phase::Ready) {
            return Ok(true);
        }

        let slot = access_key_slot(&self.network_id, &self.account_id);
        if self.store.get(&slot)?.is_some() {
            info!(account_id = %self.account_id, "access credential found");
            inner.phase = Phase::Ready;
            release(inner);
            return Ok(true);
        }

        if matches!(inner.phase, Phase::Pending(_)) {
            return Ok(false);
        }

        let pair = match self.load_pending()? {
            Some(pair) => {
                debug!(account_id = %self.account_id, "resumed pending access key");
                pair
            },
            None => self.mint_pending()?,
        };
        inner.phase = Phase::Pending(pair);
        Ok(false)
    }

    fn load_pending(&self) -> Result<Option<AccessKeyPair>, Error> {
        let slot = pending_access_key_slot(&self.network_id, &self.account_id);
        let Some(encoded) = self.store.get(&slot)? else {
            return Ok(None);
        };
        let seed = decode_secret(&encoded)?;
        Ok(Some(AccessKeyPair::from_secret_slice(&seed)?))
    }

    fn mint_pending(&self) -> Result<AccessKeyPair, Error> {
        let pair = AccessKeyPair::generate(self.env.random_array());
        let slot = pending_access_key_slot(&self.network_id, &self.account_id);
        self.store.set(&slot, &encode(&*pair.secret_bytes()))?;

        info!(
            account_id = %self.account_id,
            public_key = %encode_access_public_key(&pair),
            "minted temporary access key, awaiting injection"
        );
        Ok(pair)
    }

    // Poisoning only follows a panic in another caller; the phase is always
    // left consistent before any fallible step, so the state stays usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn release(inner: &mut Inner) {
    let count = inner.waiters.len();
    for waiter in inner.waiters.drain(..) {
        // Receiver gone means the waiter gave up; nothing to deliver
        let _ = waiter.send(());
    }
    if count > 0 {
        debug!(released = count, "released readiness waiters");
    }
}

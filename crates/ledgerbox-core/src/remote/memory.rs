#![allow(clippy::disallowed_types, reason = "Locking simple ledger state")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{RemoteRead, RemoteWrite};
use crate::error::RemoteError;

/// A message delivered to an account's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxMessage {
    /// Account that sent the message
    pub sender_id: String,
    /// Message body as submitted (an encoded box)
    pub body: String,
}

/// In-memory ledger for testing and simulation
///
/// Stores per-(account, app) values and per-(receiver, app) inboxes. Writes
/// go through a [`LedgerHandle`] bound to the signing account. Supports
/// deterministic fault injection and tracks write concurrency so tests can
/// check that calls are serialized.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<LedgerState>>,
}

#[derive(Default)]
struct LedgerState {
    /// (account, app, key) -> value
    values: HashMap<(String, String, String), String>,
    /// (receiver, app) -> delivered messages, oldest first
    inboxes: HashMap<(String, String), Vec<InboxMessage>>,
    /// Number of upcoming writes that fail with a transport error
    failures_remaining: usize,
    /// Writes currently between start and completion
    writes_in_flight: usize,
    /// Highest `writes_in_flight` observed
    max_writes_in_flight: usize,
    /// Total write attempts, including failed ones
    write_attempts: usize,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write access on behalf of `account_id`.
    pub fn handle(&self, account_id: impl Into<String>) -> LedgerHandle {
        LedgerHandle { ledger: self.clone(), account_id: account_id.into() }
    }

    /// Make the next `count` write attempts fail with a transport error.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().failures_remaining = count;
    }

    /// Messages delivered to `receiver_id` in `app_id`, oldest first.
    pub fn inbox(&self, receiver_id: &str, app_id: &str) -> Vec<InboxMessage> {
        self.lock()
            .inboxes
            .get(&(receiver_id.to_string(), app_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_writes_in_flight(&self) -> usize {
        self.lock().max_writes_in_flight
    }

    /// Total write attempts, including injected failures.
    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    /// Store a value directly, bypassing write accounting.
    ///
    /// Used to seed a peer's published state in tests.
    pub fn seed_value(&self, account_id: &str, app_id: &str, key: &str, value: &str) {
        self.lock().values.insert(
            (account_id.to_string(), app_id.to_string(), key.to_string()),
            value.to_string(),
        );
    }

    // Poisoning only follows a panic elsewhere in a test; the state itself is
    // plain data and stays usable.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run one write: account for concurrency, yield once so overlapping
    /// writers would be observed, then apply or fail.
    async fn write(&self, apply: impl FnOnce(&mut LedgerState)) -> Result<(), RemoteError> {
        {
            let mut state = self.lock();
            state.write_attempts += 1;
            state.writes_in_flight += 1;
            state.max_writes_in_flight = state.max_writes_in_flight.max(state.writes_in_flight);
        }

        tokio::task::yield_now().await;

        let mut state = self.lock();
        state.writes_in_flight -= 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(RemoteError::Transport("injected failure".to_string()));
        }
        apply(&mut state);
        Ok(())
    }
}

#[async_trait]
impl RemoteRead for MemoryLedger {
    async fn get(
        &self,
        account_id: &str,
        app_id: &str,
        key: &str,
    ) -> Result<Option<String>, RemoteError> {
        let state = self.lock();
        Ok(state
            .values
            .get(&(account_id.to_string(), app_id.to_string(), key.to_string()))
            .cloned())
    }
}

/// Write access to a [`MemoryLedger`] as one signing account.
#[derive(Clone)]
pub struct LedgerHandle {
    ledger: MemoryLedger,
    account_id: String,
}

#[async_trait]
impl RemoteWrite for LedgerHandle {
    async fn set(&self, app_id: &str, key: &str, value: &str) -> Result<(), RemoteError> {
        let slot = (self.account_id.clone(), app_id.to_string(), key.to_string());
        let value = value.to_string();
        self.ledger
            .write(move |state| {
                state.values.insert(slot, value);
            })
            .await
    }

    async fn send_message(
        &self,
        receiver_id: &str,
        app_id: &str,
        message: &str,
    ) -> Result<(), RemoteError> {
        let inbox = (receiver_id.to_string(), app_id.to_string());
        let message = InboxMessage { sender_id: self.account_id.clone(), body: message.to_string() };
        self.ledger
            .write(move |state| {
                state.inboxes.entry(inbox).or_default().push(message);
            })
            .await
    }
}

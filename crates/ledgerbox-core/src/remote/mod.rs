//! Remote ledger collaborators.
//!
//! The ledger connection, transaction signing and contract dispatch live
//! outside this crate. Ledgerbox only needs two narrow seams:
//!
//! - [`RemoteRead`]: read any account's stored value (view call)
//! - [`RemoteWrite`]: mutate ledger state as the current account (change
//!   call). Only ever invoked through [`crate::CallSerializer`].

mod memory;

use async_trait::async_trait;
pub use memory::{InboxMessage, LedgerHandle, MemoryLedger};

use crate::error::RemoteError;

/// Well-known slot under which an account publishes its encryption public key.
pub const ENCRYPTION_KEY_SLOT: &str = "encryptionKey";

/// Read-only access to values stored on the ledger.
#[async_trait]
pub trait RemoteRead: Send + Sync {
    /// Value `account_id` stored under `key` for `app_id`. `None` if absent.
    async fn get(
        &self,
        account_id: &str,
        app_id: &str,
        key: &str,
    ) -> Result<Option<String>, RemoteError>;
}

/// State-mutating ledger operations on behalf of the current account.
#[async_trait]
pub trait RemoteWrite: Send + Sync {
    /// Store `value` under `key` in the current account's app storage.
    async fn set(&self, app_id: &str, key: &str, value: &str) -> Result<(), RemoteError>;

    /// Deliver `message` to `receiver_id` within `app_id`.
    async fn send_message(
        &self,
        receiver_id: &str,
        app_id: &str,
        message: &str,
    ) -> Result<(), RemoteError>;
}
